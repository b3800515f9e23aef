//! Directory entries returned by `SSH_FXP_NAME` replies.

use crate::attributes::{Attributes, FileType};
use crate::path::RemotePath;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// One entry of a directory listing or path lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    /// The name exactly as the server sent it, usable in later requests.
    pub filename: RemotePath,
    /// Server-rendered `ls -l` line. Only versions 1 to 3 send one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longname: Option<String>,
    pub attributes: Attributes,
}

impl Name {
    pub fn new(
        filename: impl Into<RemotePath>,
        longname: Option<String>,
        attributes: Attributes,
    ) -> Self {
        Self {
            filename: filename.into(),
            longname,
            attributes,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.classify() == Some(FileType::Directory)
    }

    pub fn is_symlink(&self) -> bool {
        self.classify() == Some(FileType::Symlink)
    }

    pub fn is_file(&self) -> bool {
        self.classify() == Some(FileType::Regular)
    }

    /// Uses the type tag when the server sent one. Older servers only send
    /// the longname, which the protocol says not to parse; its first column
    /// is read as a best-effort guess and may be wrong for non-`ls` formats.
    fn classify(&self) -> Option<FileType> {
        if let Some(file_type) = self.attributes.file_type {
            return Some(file_type);
        }
        match self.longname.as_deref()?.chars().next()? {
            'd' => Some(FileType::Directory),
            'l' => Some(FileType::Symlink),
            '-' => Some(FileType::Regular),
            _ => None,
        }
    }

    /// Returns the server's longname, or renders one from the attributes in
    /// `ls -l` style when the server did not send it.
    pub fn longname(&self) -> Cow<'_, str> {
        match &self.longname {
            Some(longname) => Cow::Borrowed(longname.as_str()),
            None => Cow::Owned(self.render_longname()),
        }
    }

    fn render_longname(&self) -> String {
        let attrs = &self.attributes;
        let permissions = attrs.permissions.unwrap_or(0);

        let mut line = String::with_capacity(64 + self.filename.len());
        line.push(attrs.file_type.unwrap_or(FileType::Regular).long_listing_char());
        for shift in [6u32, 3, 0] {
            let bits = (permissions >> shift) & 0o7;
            line.push(if bits & 0o4 != 0 { 'r' } else { '-' });
            line.push(if bits & 0o2 != 0 { 'w' } else { '-' });
            line.push(if bits & 0o1 != 0 { 'x' } else { '-' });
        }

        line.push_str(&format!(
            " {:<8} {:<8} {:>8} ",
            attrs.owner_display(),
            attrs.group_display(),
            attrs.size.unwrap_or(0)
        ));

        let mtime = attrs
            .mtime
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_default();
        line.push_str(&mtime.format("%b %e %H:%M ").to_string());
        line.push_str(&self.filename.to_string_lossy());
        line
    }
}
