//! File attachments forwarded with a prompt, and their optional persisted
//! copies under the uploads directory.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::utils::filename;

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    /// Read a file into memory, sniffing the MIME type from its extension.
    pub fn read_from(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("attachment")
            .to_string();
        Ok(Self {
            mime_type: mime_type_for(path).to_string(),
            file_name,
            data,
        })
    }
}

/// Extension-based MIME lookup for the attachment kinds the API accepts.
/// Anything unrecognized is forwarded as an opaque byte blob.
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_ascii_lowercase());
    match ext.as_deref() {
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("csv") => "text/csv",
        Some("html") | Some("htm") => "text/html",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// Copy an attachment into `dir` as `<timestamp>_<sanitized name>` and return
/// the written path. Used when the save-uploads setting is on.
pub fn persist(dir: &Path, attachment: &Attachment) -> Result<PathBuf, Box<dyn std::error::Error>> {
    fs::create_dir_all(dir)?;
    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    let name = filename::sanitize(&attachment.file_name);
    let path = dir.join(format!("{timestamp}_{name}"));
    fs::write(&path, &attachment.data)?;
    Ok(path)
}
