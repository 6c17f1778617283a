//! Domain types for documents flowing through the watermark strippers.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The container format of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentFormat {
    /// Presentation archive (Office Open XML `.pptx`).
    Presentation,
    /// Page-description document (`.pdf`).
    PageDocument,
}

impl DocumentFormat {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "pptx" => Some(Self::Presentation),
            "pdf" => Some(Self::PageDocument),
            _ => None,
        }
    }

    /// Detect format from a filename, failing for anything but `.pptx` and `.pdf`.
    pub fn from_filename(filename: &str) -> Result<Self> {
        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .ok_or_else(|| Error::UnsupportedFormat(format!("'{}' has no extension", filename)))?;

        Self::from_extension(ext)
            .ok_or_else(|| Error::UnsupportedFormat(format!(".{}", ext.to_lowercase())))
    }

    /// Detect format from file magic bytes.
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }

        // PPTX is a ZIP file (PK\x03\x04)
        if bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
            return Some(Self::Presentation);
        }

        // PDF header may be preceded by junk bytes; readers accept it within the first KiB
        let window = &bytes[..bytes.len().min(1024)];
        if window.windows(5).any(|w| w == b"%PDF-") {
            return Some(Self::PageDocument);
        }

        None
    }

    /// Canonical file extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Presentation => "pptx",
            Self::PageDocument => "pdf",
        }
    }

    /// MIME type for serving the cleaned file as a download.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Presentation => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            Self::PageDocument => "application/pdf",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Presentation => write!(f, "presentation"),
            Self::PageDocument => write!(f, "page-document"),
        }
    }
}

/// Raw bytes of one uploaded document plus its declared format.
#[derive(Debug, Clone)]
pub struct InputDocument {
    bytes: Vec<u8>,
    format: DocumentFormat,
}

impl InputDocument {
    /// Wrap bytes whose format is already known.
    pub fn new(bytes: impl Into<Vec<u8>>, format: DocumentFormat) -> Self {
        Self {
            bytes: bytes.into(),
            format,
        }
    }

    /// Build an input document from an upload, deriving the format from the filename.
    pub fn from_upload(bytes: impl Into<Vec<u8>>, filename: &str) -> Result<Self> {
        let format = DocumentFormat::from_filename(filename)?;
        Ok(Self::new(bytes, format))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    /// Fail with `CorruptDocument` if the magic bytes disagree with the declared format.
    pub fn validate_magic(&self) -> Result<()> {
        match DocumentFormat::from_magic(&self.bytes) {
            Some(detected) if detected == self.format => Ok(()),
            Some(detected) => Err(Error::CorruptDocument(format!(
                "declared {} but content looks like a {}",
                self.format, detected
            ))),
            None => Err(Error::CorruptDocument(format!(
                "content is not a valid {}",
                self.format
            ))),
        }
    }
}

/// Where in a document an element lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "container", content = "at")]
pub enum Location {
    /// 1-based slide number in presentation order.
    Slide(usize),
    /// Slide layout part name.
    Layout(String),
    /// Slide master part name.
    Master(String),
    /// 1-based page number.
    Page(u32),
    /// A package- or document-level location (media parts, resource tables).
    Document,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Slide(n) => write!(f, "slide {}", n),
            Location::Layout(part) => write!(f, "layout {}", part),
            Location::Master(part) => write!(f, "master {}", part),
            Location::Page(n) => write!(f, "page {}", n),
            Location::Document => write!(f, "document"),
        }
    }
}

/// The kind of artifact that was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalKind {
    TextRun,
    Image,
    TextOperator,
    ImageOperator,
    Hyperlink,
    Resource,
    Media,
}

/// A single removed watermark artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Removal {
    pub location: Location,
    pub kind: RemovalKind,
    /// Short description (matched text, resource name, link target).
    pub detail: String,
}

impl Removal {
    pub fn new(location: Location, kind: RemovalKind, detail: impl Into<String>) -> Self {
        Self {
            location,
            kind,
            detail: detail.into(),
        }
    }
}

/// What happened to one page of a page document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum PageOutcome {
    /// At least one watermark artifact was removed.
    Cleaned { removed: usize },
    /// Nothing matched; the page passed through untouched.
    Unchanged,
    /// The content stream could not be parsed; the page passed through untouched.
    Failed { reason: String },
}

impl PageOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, PageOutcome::Failed { .. })
    }
}

/// Summary of one stripping run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripReport {
    pub format: DocumentFormat,

    /// Number of slides (presentation) or pages (page document) in the output.
    pub unit_count: usize,

    /// Every artifact that was removed, in processing order.
    pub removals: Vec<Removal>,

    /// Per-page outcomes, keyed by 1-based page number. Empty for presentations.
    pub pages: BTreeMap<u32, PageOutcome>,

    /// Whether document metadata was blanked.
    pub metadata_scrubbed: bool,
}

impl StripReport {
    pub fn new(format: DocumentFormat) -> Self {
        Self {
            format,
            unit_count: 0,
            removals: Vec::new(),
            pages: BTreeMap::new(),
            metadata_scrubbed: false,
        }
    }

    /// Record a removal.
    pub fn add_removal(&mut self, removal: Removal) {
        log::debug!("Removed {:?} at {}: {}", removal.kind, removal.location, removal.detail);
        self.removals.push(removal);
    }

    /// Record a page outcome.
    pub fn set_page(&mut self, page: u32, outcome: PageOutcome) {
        self.pages.insert(page, outcome);
    }

    pub fn removed_count(&self) -> usize {
        self.removals.len()
    }

    /// Pages whose content stream failed to parse, with the reason.
    pub fn failed_pages(&self) -> Vec<(u32, &str)> {
        self.pages
            .iter()
            .filter_map(|(page, outcome)| match outcome {
                PageOutcome::Failed { reason } => Some((*page, reason.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Removals recorded at a given location.
    pub fn removals_at(&self, location: &Location) -> Vec<&Removal> {
        self.removals
            .iter()
            .filter(|r| &r.location == location)
            .collect()
    }
}

/// Cleaned document bytes plus the report describing what changed.
#[derive(Debug, Clone)]
pub struct OutputDocument {
    pub bytes: Vec<u8>,
    pub report: StripReport,
}

impl OutputDocument {
    pub fn new(bytes: Vec<u8>, report: StripReport) -> Self {
        Self { bytes, report }
    }

    pub fn format(&self) -> DocumentFormat {
        self.report.format
    }
}
