//! PPTX (Office Open XML) watermark stripper.
//!
//! A .pptx file is a ZIP package of XML parts. Watermark text runs and
//! picture shapes are cut out of slide, layout and master parts; everything
//! else is written back untouched.

pub mod metadata;
pub mod package;
pub mod parser;
pub mod rels;
pub mod stripper;
pub mod xml;

pub use package::Package;
pub use parser::PresentationStructure;
pub use stripper::PptxStripper;
