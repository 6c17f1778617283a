//! Error types for watermark removal.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while removing watermarks from a document.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or write a file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// The file extension does not name a supported container format.
    #[error("Unsupported or unrecognized file format: {0}")]
    UnsupportedFormat(String),

    /// The archive or document structure could not be opened.
    #[error("Invalid or corrupted document: {0}")]
    CorruptDocument(String),

    /// One page's content stream could not be parsed.
    ///
    /// Page-level failures never abort a whole document; strippers fold
    /// them into the per-page outcome list.
    #[error("Failed to parse content stream of page {page}: {reason}")]
    PageParseError { page: u32, reason: String },

    /// The cleaned document could not be re-serialized.
    #[error("Failed to write document: {0}")]
    WriteError(String),
}

impl Error {
    /// Stable machine-readable tag for rendering the error in a UI.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::IoError(_) => "io_error",
            Error::UnsupportedFormat(_) => "unsupported_format",
            Error::CorruptDocument(_) => "corrupt_document",
            Error::PageParseError { .. } => "page_parse_error",
            Error::WriteError(_) => "write_error",
        }
    }
}
