//! Document elements inspected by the strippers.

use crate::signature::WatermarkSignature;
use crate::types::{Location, RemovalKind};

/// One unit of document content, as seen by a stripper.
///
/// Strippers build these while walking a slide or page and only ever ask
/// whether one matches; removal itself happens in the container format.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentElement<'a> {
    /// A run of text inside a slide text frame.
    TextRun {
        location: Location,
        text: &'a str,
        /// Target of a run-level hyperlink, if any.
        link: Option<&'a str>,
    },

    /// A picture shape or image resource.
    ImageRef {
        location: Location,
        /// Shape name/description or resource name.
        name: &'a str,
        /// Hyperlink target attached to the picture, if any.
        link: Option<&'a str>,
        /// Pixel size, when the container records it.
        dimensions: Option<(u32, u32)>,
    },

    /// A text-drawing operator in a page content stream.
    ContentOperator {
        location: Location,
        operator: &'a str,
        text: &'a str,
    },

    /// A hyperlink relationship or link annotation.
    Hyperlink { location: Location, target: &'a str },
}

impl DocumentElement<'_> {
    /// Whether this element is a watermark artifact under the given signature.
    pub fn matches(&self, signature: &WatermarkSignature) -> bool {
        match self {
            DocumentElement::TextRun { text, link, .. } => {
                signature.matches_text(text) || link.is_some_and(|l| signature.matches_link(l))
            }
            DocumentElement::ImageRef {
                name,
                link,
                dimensions,
                ..
            } => {
                signature.matches_image_name(name)
                    || link.is_some_and(|l| signature.matches_link(l))
                    || dimensions.is_some_and(|(w, h)| signature.matches_image_dimensions(w, h))
            }
            DocumentElement::ContentOperator { text, .. } => signature.matches_text(text),
            DocumentElement::Hyperlink { target, .. } => signature.matches_link(target),
        }
    }

    pub fn location(&self) -> &Location {
        match self {
            DocumentElement::TextRun { location, .. }
            | DocumentElement::ImageRef { location, .. }
            | DocumentElement::ContentOperator { location, .. }
            | DocumentElement::Hyperlink { location, .. } => location,
        }
    }

    /// The removal kind recorded when this element is taken out.
    pub fn removal_kind(&self) -> RemovalKind {
        match self {
            DocumentElement::TextRun { .. } => RemovalKind::TextRun,
            DocumentElement::ImageRef { .. } => RemovalKind::Image,
            DocumentElement::ContentOperator { .. } => RemovalKind::TextOperator,
            DocumentElement::Hyperlink { .. } => RemovalKind::Hyperlink,
        }
    }

    /// Short description for the removal report.
    pub fn describe(&self) -> String {
        match self {
            DocumentElement::TextRun { text, .. } => format!("text run '{}'", text.trim()),
            DocumentElement::ImageRef { name, link, .. } => match link {
                Some(link) => format!("image '{}' linking to {}", name, link),
                None => format!("image '{}'", name),
            },
            DocumentElement::ContentOperator { operator, text, .. } => {
                format!("{} '{}'", operator, text.trim())
            }
            DocumentElement::Hyperlink { target, .. } => format!("link to {}", target),
        }
    }
}
