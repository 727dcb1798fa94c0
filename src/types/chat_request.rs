use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Body of a chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's text, exactly as typed.
    pub message: String,

    /// An attached file, or `null` when there is none.
    pub file_data: Option<FileData>,
}

impl ChatRequest {
    /// Create a request without an attachment.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file_data: None,
        }
    }

    /// Attach a file.
    pub fn with_file_data(mut self, file_data: FileData) -> Self {
        self.file_data = Some(file_data);
        self
    }
}

/// A file, base64-encoded wholesale.
///
/// No size limit or MIME validation is applied; the service decides what it
/// accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileData {
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,

    /// Standard base64 (with padding) of the file's bytes.
    pub data: String,
}

impl FileData {
    /// Encode raw bytes.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

/// A file picked for the next message.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    /// File name shown in the conversation.
    pub name: String,

    /// Size of the original file in bytes.
    pub size: usize,

    /// The encoded payload.
    pub file_data: FileData,
}

impl Attachment {
    /// Read and encode a file from disk.
    ///
    /// The MIME type is inferred from the file extension, falling back to
    /// `application/octet-stream`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(String::from)
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("{} does not name a file", path.display()),
                )
            })?;

        let mut file = File::open(path)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;

        Ok(Self {
            name,
            size: buffer.len(),
            file_data: FileData::from_bytes(mime_type_for(path), &buffer),
        })
    }

    /// The user-visible note appended to the message that carries this file.
    pub fn note(&self) -> String {
        format!("[Attached file: {}]", self.name)
    }
}

/// Guess a MIME type from a path's extension.
pub fn mime_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        _ => "application/octet-stream",
    }
}
