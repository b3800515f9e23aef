//! Server replies as seen by callers.

use bytes::Bytes;
use rsftp_protocol::{Attributes, ExtendedReply, Name, ReplyData, StatusCode};
use std::fmt;

/// The outcome of one request.
///
/// Replies other than STATUS count as success: their code is `OK` and
/// their message is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    id: u32,
    code: StatusCode,
    message: String,
    language: Option<String>,
    data: ReplyData,
}

impl Response {
    pub fn new(id: u32, data: ReplyData) -> Self {
        let (code, message, language) = match &data {
            ReplyData::Status(status) => (
                status.code,
                status.message.clone().unwrap_or_default(),
                status.language.clone(),
            ),
            _ => (StatusCode::OK, String::new(), None),
        };
        Self {
            id,
            code,
            message,
            language,
            data,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn ok(&self) -> bool {
        self.code.is_ok()
    }

    pub fn eof(&self) -> bool {
        self.code.is_eof()
    }

    pub fn reply(&self) -> &ReplyData {
        &self.data
    }

    pub fn into_reply(self) -> ReplyData {
        self.data
    }

    pub fn handle(&self) -> Option<&Bytes> {
        match &self.data {
            ReplyData::Handle(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn data(&self) -> Option<&Bytes> {
        match &self.data {
            ReplyData::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn names(&self) -> Option<&[Name]> {
        match &self.data {
            ReplyData::Names(names) => Some(names),
            _ => None,
        }
    }

    pub fn attrs(&self) -> Option<&Attributes> {
        match &self.data {
            ReplyData::Attrs(attrs) => Some(attrs),
            _ => None,
        }
    }

    pub fn extended(&self) -> Option<&ExtendedReply> {
        match &self.data {
            ReplyData::Extended(reply) => Some(reply),
            _ => None,
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{} ({})", self.code, self.code.code())
        } else {
            write!(f, "{} ({}, {})", self.message, self.code, self.code.code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsftp_protocol::Status;

    #[test]
    fn test_status_response() {
        let response = Response::new(
            4,
            ReplyData::Status(Status {
                code: StatusCode::NO_SUCH_FILE,
                message: Some("no such file".into()),
                language: Some("en".into()),
            }),
        );
        assert_eq!(response.id(), 4);
        assert!(!response.ok());
        assert!(!response.eof());
        assert_eq!(response.code(), StatusCode::NO_SUCH_FILE);
        assert_eq!(response.language(), Some("en"));
        assert_eq!(response.to_string(), "no such file (no such file, 2)");
    }

    #[test]
    fn test_data_response_is_ok() {
        let response = Response::new(1, ReplyData::Data(Bytes::from_static(b"abc")));
        assert!(response.ok());
        assert_eq!(response.message(), "");
        assert_eq!(response.data().unwrap().as_ref(), b"abc");
        assert!(response.handle().is_none());
        assert_eq!(response.to_string(), "ok (0)");
    }

    #[test]
    fn test_eof_without_message() {
        let response = Response::new(
            2,
            ReplyData::Status(Status {
                code: StatusCode::EOF,
                message: None,
                language: None,
            }),
        );
        assert!(response.eof());
        assert_eq!(response.message(), "");
        assert_eq!(response.language(), None);
    }
}
