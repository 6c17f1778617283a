//! Presentation structure: slide order and the layout/master parts.

use crate::package::Package;
use crate::rels::{resolve_target, Relationships};
use crate::xml::XmlPart;
use unmark_core::{Error, Result};

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const PRESENTATION_RELS: &str = "ppt/_rels/presentation.xml.rels";
const LAYOUT_DIR: &str = "ppt/slideLayouts/";
const MASTER_DIR: &str = "ppt/slideMasters/";

/// The parts of a presentation that can carry watermark artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresentationStructure {
    /// Slide parts in presentation order.
    pub slides: Vec<String>,
    /// Slide layout parts, ordered by number.
    pub layouts: Vec<String>,
    /// Slide master parts, ordered by number.
    pub masters: Vec<String>,
}

impl PresentationStructure {
    /// Read the structure of a package.
    pub fn read(package: &Package) -> Result<Self> {
        Ok(Self {
            slides: get_slide_order(package)?,
            layouts: parts_in(package, LAYOUT_DIR),
            masters: parts_in(package, MASTER_DIR),
        })
    }
}

/// Get the ordered list of slide paths.
///
/// The slide id list in `presentation.xml` is authoritative; when it is absent
/// the relationships are ordered by the number in their id or target.
fn get_slide_order(package: &Package) -> Result<Vec<String>> {
    let rels_bytes = package.get(PRESENTATION_RELS).ok_or_else(|| {
        Error::CorruptDocument(format!("Missing '{}'; not a presentation", PRESENTATION_RELS))
    })?;
    let rels = Relationships::parse(PRESENTATION_RELS, rels_bytes)?;

    let slide_rels: Vec<_> = rels
        .iter()
        .filter(|r| r.rel_type.ends_with("/slide"))
        .collect();

    if let Some(bytes) = package.get(PRESENTATION_PART) {
        let presentation = XmlPart::parse(PRESENTATION_PART, bytes)?;
        let ordered: Vec<String> = presentation
            .elements(b"sldId")
            .into_iter()
            .filter_map(|span| presentation.relationship_attribute(span, b"id"))
            .filter_map(|rid| rels.get(&rid))
            .filter(|r| r.rel_type.ends_with("/slide"))
            .map(|r| resolve_target(PRESENTATION_PART, &r.target))
            .collect();

        if ordered.len() == slide_rels.len() {
            return Ok(ordered);
        }
        log::warn!(
            "Slide id list names {} slides but relationships list {}; ordering by number",
            ordered.len(),
            slide_rels.len()
        );
    }

    let mut slides: Vec<(String, Option<usize>)> = slide_rels
        .iter()
        .map(|r| {
            let order_num = extract_slide_number(&r.target).or_else(|| extract_slide_number(&r.id));
            (resolve_target(PRESENTATION_PART, &r.target), order_num)
        })
        .collect();

    // Sort slides by their number
    slides.sort_by(|a, b| match (a.1, b.1) {
        (Some(na), Some(nb)) => na.cmp(&nb),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.0.cmp(&b.0),
    });

    Ok(slides.into_iter().map(|(path, _)| path).collect())
}

/// XML parts directly inside `dir`, ordered by their trailing number.
fn parts_in(package: &Package, dir: &str) -> Vec<String> {
    let mut parts: Vec<String> = package
        .names()
        .filter(|name| {
            name.strip_prefix(dir)
                .is_some_and(|rest| !rest.contains('/') && rest.ends_with(".xml"))
        })
        .map(str::to_string)
        .collect();

    parts.sort_by_key(|name| (extract_slide_number(name), name.clone()));
    parts
}

/// Extract a slide number from a string like "rId2" or "slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    // Remove common extensions first
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    // Try to find digits at the end
    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}
