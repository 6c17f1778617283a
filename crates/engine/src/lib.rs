//! Watermark removal entry points.
//!
//! Dispatches a document to the presentation or page-document stripper by
//! format, and wraps the result for upload-style front ends.

pub mod remover;
pub mod upload;

#[cfg(test)]
mod test_fixtures;

pub use remover::{strip_watermark, Remover};
pub use upload::{clean_upload, output_filename, CleanedUpload};
pub use unmark_core::{
    DocumentFormat, Error, InputDocument, Location, OutputDocument, PageOutcome, Removal,
    RemovalKind, Result, StripReport, WatermarkSignature,
};
