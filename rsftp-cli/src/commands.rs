//! Command execution.

use crate::Commands;
use bytes::Bytes;
use chrono::DateTime;
use colored::Colorize;
use rsftp_client::{Client, Transport};
use rsftp_protocol::constants::rename_flags;
use rsftp_protocol::{Attributes, FileType, Name, OpenMode};
use std::path::Path;

/// Executes a command and returns the formatted output.
pub async fn execute<T: Transport>(
    client: &mut Client<T>,
    cmd: Commands,
    json: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Ls { path, long, all } => {
            let mut entries: Vec<Name> = client
                .read_dir(&path)
                .await?
                .into_iter()
                .filter(|entry| all || !entry.filename.starts_with("."))
                .collect();
            entries.sort_by(|a, b| a.filename.cmp(&b.filename));

            if json {
                return Ok(serde_json::to_string_pretty(&entries)?);
            }
            if entries.is_empty() {
                return Ok(String::new());
            }

            let lines: Vec<String> = entries
                .iter()
                .map(|entry| {
                    if long {
                        entry.longname().into_owned()
                    } else {
                        colorize_name(entry)
                    }
                })
                .collect();
            Ok(lines.join("\n"))
        }

        Commands::Stat { path, no_follow } => {
            let attrs = if no_follow {
                client.lstat(&path).await?
            } else {
                client.stat(&path).await?
            };
            if json {
                return Ok(serde_json::to_string_pretty(&attrs)?);
            }
            Ok(format_attributes(&path, &attrs))
        }

        Commands::Get { remote, local } => {
            let local = match local {
                Some(local) => local,
                None => file_name(&remote).into(),
            };
            let data = client.download(&remote).await?;
            tokio::fs::write(&local, &data).await?;
            Ok(format!(
                "{} {} -> {} ({} bytes)",
                "Downloaded".green(),
                remote.cyan(),
                local.display(),
                data.len()
            ))
        }

        Commands::Put { local, remote } => {
            let remote = match remote {
                Some(remote) => remote,
                None => local
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .ok_or("local path has no file name")?,
            };
            let data = tokio::fs::read(&local).await?;
            let written = client.upload(&remote, Bytes::from(data)).await?;
            Ok(format!(
                "{} {} -> {} ({} bytes)",
                "Uploaded".green(),
                local.display(),
                remote.cyan(),
                written
            ))
        }

        Commands::Mkdir { path, mode } => {
            let mut attrs = Attributes::new();
            if let Some(mode) = mode {
                let permissions = u32::from_str_radix(&mode, 8)
                    .map_err(|_| format!("invalid octal mode: {}", mode))?;
                attrs = attrs.with_permissions(permissions);
            }
            client.mkdir(&path, attrs).await?;
            Ok(format!("{} {}", "Created".green(), path.cyan()))
        }

        Commands::Rmdir { path } => {
            client.rmdir(&path).await?;
            Ok(format!("{} {}", "Removed".green(), path.cyan()))
        }

        Commands::Rm { path } => {
            client.remove(&path).await?;
            Ok(format!("{} {}", "Removed".green(), path.cyan()))
        }

        Commands::Mv { from, to, force } => {
            let flags = force.then_some(rename_flags::OVERWRITE);
            client.rename(&from, &to, flags).await?;
            Ok(format!("{} {} -> {}", "Renamed".green(), from.cyan(), to.cyan()))
        }

        Commands::Ln {
            symbolic,
            target,
            link,
        } => {
            if symbolic {
                client.symlink(&link, &target).await?;
            } else {
                client.link(&link, &target, false).await?;
            }
            Ok(format!("{} {} -> {}", "Linked".green(), link.cyan(), target))
        }

        Commands::Readlink { path } => Ok(client.readlink(&path).await?.to_string()),

        Commands::Realpath { path } => Ok(client.realpath(&path).await?.to_string()),

        Commands::Df { path } => {
            let space = client.space_available(&path).await?;
            if json {
                return Ok(serde_json::to_string_pretty(&space)?);
            }
            Ok(format!(
                "{:<24} {}\n{:<24} {}\n{:<24} {}\n{:<24} {}\n{:<24} {}",
                "bytes on device:",
                space.bytes_on_device,
                "unused on device:",
                space.unused_bytes_on_device,
                "available to user:",
                space.bytes_available_to_user,
                "unused available to user:",
                space.unused_bytes_available_to_user,
                "allocation unit:",
                space.bytes_per_allocation_unit
            ))
        }

        Commands::Sum { path } => {
            let handle = client.open(&path, OpenMode::Read, Attributes::new()).await?;
            let checked = client.check_file(handle.clone(), 0, 0, 0).await;
            client.close(handle).await?;
            let sums = checked?;
            let digest: String = sums.hashes.iter().map(hex::encode).collect();
            if json {
                let value = serde_json::json!({
                    "path": path,
                    "algorithm": sums.algorithm,
                    "digest": digest,
                });
                return Ok(serde_json::to_string_pretty(&value)?);
            }
            Ok(format!("{}  {} ({})", digest, path, sums.algorithm.dimmed()))
        }

        Commands::Version => {
            let session = client.session();
            let version = session.protocol_version().unwrap_or(0);
            if json {
                let extensions: Vec<_> = session
                    .extensions()
                    .iter()
                    .map(|(name, data)| {
                        serde_json::json!({
                            "name": name,
                            "data": String::from_utf8_lossy(data),
                        })
                    })
                    .collect();
                let value = serde_json::json!({
                    "version": version,
                    "extensions": extensions,
                });
                return Ok(serde_json::to_string_pretty(&value)?);
            }

            let mut output = format!("{} {}", "Protocol version".bold(), version);
            for (name, data) in session.extensions() {
                output.push_str(&format!(
                    "\n  {} {}",
                    name.cyan(),
                    String::from_utf8_lossy(data)
                ));
            }
            Ok(output)
        }
    }
}

fn colorize_name(entry: &Name) -> String {
    let name = entry.filename.to_string();
    if entry.is_directory() {
        name.blue().bold().to_string()
    } else if entry.is_symlink() {
        name.cyan().to_string()
    } else {
        name
    }
}

/// Last component of a remote path.
fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((_, name)) if !name.is_empty() => name,
        _ if trimmed.is_empty() => path,
        _ => trimmed,
    }
}

/// Type name, taken from the type tag or else from the mode bits.
fn type_name(attrs: &Attributes) -> &'static str {
    let file_type = attrs.file_type.or_else(|| {
        attrs.permissions.map(|mode| match mode & 0o170000 {
            0o040000 => FileType::Directory,
            0o120000 => FileType::Symlink,
            0o100000 => FileType::Regular,
            0o140000 => FileType::Socket,
            0o020000 => FileType::CharDevice,
            0o060000 => FileType::BlockDevice,
            0o010000 => FileType::Fifo,
            _ => FileType::Unknown,
        })
    });
    match file_type {
        Some(FileType::Regular) => "regular file",
        Some(FileType::Directory) => "directory",
        Some(FileType::Symlink) => "symbolic link",
        Some(FileType::Special) => "special file",
        Some(FileType::Socket) => "socket",
        Some(FileType::CharDevice) => "character device",
        Some(FileType::BlockDevice) => "block device",
        Some(FileType::Fifo) => "fifo",
        Some(FileType::Unknown) | None => "unknown",
    }
}

fn format_time(secs: Option<u64>) -> Option<String> {
    let secs = i64::try_from(secs?).ok()?;
    let time = DateTime::from_timestamp(secs, 0)?;
    Some(time.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

fn format_attributes(path: &str, attrs: &Attributes) -> String {
    let mut lines = vec![
        format!("{:>9} {}", "File:", path.cyan()),
        format!("{:>9} {}", "Type:", type_name(attrs)),
    ];
    if let Some(size) = attrs.size {
        lines.push(format!("{:>9} {}", "Size:", size));
    }
    if let Some(permissions) = attrs.permissions {
        lines.push(format!("{:>9} {:04o}", "Mode:", permissions & 0o7777));
    }
    let owner = attrs.owner_display();
    if !owner.is_empty() {
        lines.push(format!(
            "{:>9} {} / {}",
            "Owner:",
            owner,
            attrs.group_display()
        ));
    }
    if let Some(atime) = format_time(attrs.atime) {
        lines.push(format!("{:>9} {}", "Access:", atime));
    }
    if let Some(mtime) = format_time(attrs.mtime) {
        lines.push(format!("{:>9} {}", "Modify:", mtime));
    }
    if let Some(mime) = &attrs.mime_type {
        lines.push(format!("{:>9} {}", "MIME:", mime));
    }
    lines.join("\n")
}
