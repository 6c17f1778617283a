//! Format dispatch.

use unmark_core::{DocumentFormat, InputDocument, OutputDocument, Result, WatermarkSignature};
use unmark_pdf::PdfStripper;
use unmark_pptx::PptxStripper;

/// Strip watermark artifacts from a document of a known format.
///
/// A document with nothing to remove is not an error; the report is simply
/// empty.
pub fn strip_watermark(
    bytes: &[u8],
    format: DocumentFormat,
    signature: &WatermarkSignature,
) -> Result<OutputDocument> {
    Remover::new().with_signature(signature.clone()).dispatch(bytes, format)
}

/// Configurable watermark remover.
#[derive(Debug, Clone, Default)]
pub struct Remover {
    signature: WatermarkSignature,
    scrub_metadata: bool,
}

impl Remover {
    /// Remover using the default (Gamma) signature.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signature(mut self, signature: WatermarkSignature) -> Self {
        self.signature = signature;
        self
    }

    /// Also blank author/title style document metadata.
    pub fn with_metadata_scrub(mut self, scrub: bool) -> Self {
        self.scrub_metadata = scrub;
        self
    }

    pub fn signature(&self) -> &WatermarkSignature {
        &self.signature
    }

    /// Strip an input document after checking its content matches its
    /// declared format.
    pub fn strip(&self, input: &InputDocument) -> Result<OutputDocument> {
        input.validate_magic()?;
        self.dispatch(input.bytes(), input.format())
    }

    fn dispatch(&self, bytes: &[u8], format: DocumentFormat) -> Result<OutputDocument> {
        log::debug!("Stripping {} ({} bytes)", format, bytes.len());
        match format {
            DocumentFormat::Presentation => PptxStripper::new(self.signature.clone())
                .with_metadata_scrub(self.scrub_metadata)
                .strip(bytes),
            DocumentFormat::PageDocument => PdfStripper::new(self.signature.clone())
                .with_metadata_scrub(self.scrub_metadata)
                .strip(bytes),
        }
    }
}
