//! Core domain types, error taxonomy, and watermark signature matching
//! for document watermark removal.

pub mod element;
pub mod error;
pub mod normalize;
pub mod signature;
pub mod types;

pub use element::DocumentElement;
pub use error::{Error, Result};
pub use normalize::{decode_pdf_text, normalize_for_match};
pub use signature::WatermarkSignature;
pub use types::{
    DocumentFormat, InputDocument, Location, OutputDocument, PageOutcome, Removal, RemovalKind,
    StripReport,
};
