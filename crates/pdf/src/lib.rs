//! PDF watermark stripper.
//!
//! Watermark text and image operators are cut out of page content streams,
//! watermark link annotations are dropped, and badge images no page draws
//! any more are pruned. Pages are processed independently; one unreadable
//! page does not stop the rest of the document from being cleaned.

pub mod annotations;
pub mod content;
pub mod font;
pub mod metadata;
pub mod resources;
pub mod stripper;

pub use content::{parse_content, LexError, Operation};
pub use stripper::PdfStripper;
