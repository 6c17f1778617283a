//! Upload handling for front ends: bytes plus a filename in, a cleaned
//! download out.

use crate::remover::Remover;
use serde::Serialize;
use unmark_core::{InputDocument, Result, StripReport};

/// A cleaned document ready to be offered as a download.
#[derive(Debug, Clone, Serialize)]
pub struct CleanedUpload {
    /// Suggested download name, `<stem>-clean.<ext>`.
    pub filename: String,
    pub mime_type: &'static str,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub report: StripReport,
}

/// Clean an uploaded file with the default signature.
///
/// The format comes from the filename extension; anything other than
/// `.pptx` or `.pdf` fails with `UnsupportedFormat` before the bytes are
/// looked at.
pub fn clean_upload(bytes: &[u8], filename: &str) -> Result<CleanedUpload> {
    Remover::new().clean_upload(bytes, filename)
}

impl Remover {
    /// Clean an uploaded file with this remover's settings.
    pub fn clean_upload(&self, bytes: &[u8], filename: &str) -> Result<CleanedUpload> {
        let input = InputDocument::from_upload(bytes, filename)?;
        log::info!("Cleaning upload '{}' as {}", filename, input.format());

        let output = self.strip(&input)?;
        Ok(CleanedUpload {
            filename: output_filename(filename),
            mime_type: output.format().mime_type(),
            bytes: output.bytes,
            report: output.report,
        })
    }
}

/// `deck.pptx` becomes `deck-clean.pptx`; directories in the upload name
/// are dropped.
pub fn output_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}-clean.{}", stem, ext),
        _ => format!("{}-clean", base),
    }
}
