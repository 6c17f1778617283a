//! Presentation watermark stripper.

use crate::metadata::scrub_metadata;
use crate::package::Package;
use crate::parser::PresentationStructure;
use crate::rels::{rels_path_for, resolve_target, source_part_for, Relationships};
use crate::xml::{Span, XmlPart};
use std::collections::{BTreeSet, HashSet};
use unmark_core::{
    DocumentElement, DocumentFormat, Error, Location, OutputDocument, Removal, RemovalKind,
    Result, StripReport, WatermarkSignature,
};

const CONTENT_TYPES: &str = "[Content_Types].xml";

/// Removes watermark runs and pictures from PPTX packages.
#[derive(Debug, Clone, Default)]
pub struct PptxStripper {
    signature: WatermarkSignature,
    scrub_metadata: bool,
}

/// A picture shape and what it points at.
#[derive(Debug)]
struct PictureInfo {
    span: Span,
    name: String,
    link: Option<String>,
    rel_ids: Vec<String>,
}

/// A text run and what it points at.
#[derive(Debug)]
struct RunInfo {
    span: Span,
    text: String,
    link: Option<String>,
    rel_ids: Vec<String>,
}

/// Outcome of stripping one part.
#[derive(Debug, Default)]
struct PartChanges {
    /// Package paths of internal relationship targets that were dropped.
    dropped_targets: Vec<String>,
}

impl PptxStripper {
    /// Create a stripper for the given signature.
    pub fn new(signature: WatermarkSignature) -> Self {
        Self {
            signature,
            scrub_metadata: false,
        }
    }

    /// Also blank author/title/company document properties.
    pub fn with_metadata_scrub(mut self, scrub: bool) -> Self {
        self.scrub_metadata = scrub;
        self
    }

    /// Strip watermarks from a PPTX archive.
    ///
    /// Slides, layouts and masters are all inspected. A deck without any
    /// watermark comes back as a re-saved copy with an empty report.
    pub fn strip(&self, bytes: &[u8]) -> Result<OutputDocument> {
        let mut package = Package::read(bytes)?;
        let structure = PresentationStructure::read(&package)?;
        let mut report = StripReport::new(DocumentFormat::Presentation);
        report.unit_count = structure.slides.len();

        log::debug!(
            "Presentation has {} slides, {} layouts, {} masters",
            structure.slides.len(),
            structure.layouts.len(),
            structure.masters.len()
        );

        let mut dropped_targets = Vec::new();

        for (idx, slide) in structure.slides.iter().enumerate() {
            if !package.contains(slide) {
                return Err(Error::CorruptDocument(format!(
                    "Slide {} ('{}') is missing from the archive",
                    idx + 1,
                    slide
                )));
            }
            let changes = self.strip_part(&mut package, slide, Location::Slide(idx + 1), &mut report)?;
            dropped_targets.extend(changes.dropped_targets);
        }

        for layout in &structure.layouts {
            let changes =
                self.strip_part(&mut package, layout, Location::Layout(layout.clone()), &mut report)?;
            dropped_targets.extend(changes.dropped_targets);
        }

        for master in &structure.masters {
            let changes =
                self.strip_part(&mut package, master, Location::Master(master.clone()), &mut report)?;
            dropped_targets.extend(changes.dropped_targets);
        }

        prune_media(&mut package, &dropped_targets, &mut report)?;

        if self.scrub_metadata {
            report.metadata_scrubbed = scrub_metadata(&mut package)?;
        }

        if report.removals.is_empty() {
            log::info!("No watermark found in presentation");
        } else {
            log::info!("Removed {} watermark element(s) from presentation", report.removed_count());
        }

        Ok(OutputDocument::new(package.write()?, report))
    }

    /// Strip one slide, layout or master part in place.
    fn strip_part(
        &self,
        package: &mut Package,
        part_name: &str,
        location: Location,
        report: &mut StripReport,
    ) -> Result<PartChanges> {
        let Some(bytes) = package.get(part_name) else {
            return Ok(PartChanges::default());
        };
        let xml = XmlPart::parse(part_name, bytes)?;

        let rels_name = rels_path_for(part_name);
        let mut rels = match package.get(&rels_name) {
            Some(bytes) => Some(Relationships::parse(&rels_name, bytes)?),
            None => None,
        };

        let mut removed: Vec<Span> = Vec::new();
        let mut candidate_ids: BTreeSet<String> = BTreeSet::new();

        for picture in read_pictures(&xml, rels.as_ref()) {
            let element = DocumentElement::ImageRef {
                location: location.clone(),
                name: &picture.name,
                link: picture.link.as_deref(),
                dimensions: None,
            };
            if element.matches(&self.signature) {
                report.add_removal(Removal::new(
                    location.clone(),
                    element.removal_kind(),
                    element.describe(),
                ));
                removed.push(picture.span);
                candidate_ids.extend(picture.rel_ids);
            }
        }

        for paragraph in xml.elements(b"p") {
            if removed.iter().any(|s| s.contains(paragraph)) {
                continue;
            }

            let runs = read_runs(&xml, paragraph, rels.as_ref());
            if runs.is_empty() {
                continue;
            }

            let texts: Vec<&str> = runs.iter().map(|r| r.text.as_str()).collect();
            let mut doomed: BTreeSet<usize> = self
                .signature
                .matching_windows(&texts)
                .into_iter()
                .flatten()
                .collect();

            for (idx, run) in runs.iter().enumerate() {
                let element = DocumentElement::TextRun {
                    location: location.clone(),
                    text: &run.text,
                    link: run.link.as_deref(),
                };
                if element.matches(&self.signature) {
                    doomed.insert(idx);
                }
            }

            for idx in doomed {
                let run = &runs[idx];
                report.add_removal(Removal::new(
                    location.clone(),
                    RemovalKind::TextRun,
                    format!("text run '{}'", run.text.trim()),
                ));
                removed.push(run.span);
                candidate_ids.extend(run.rel_ids.iter().cloned());
            }
        }

        let mut changes = PartChanges::default();

        if let Some(rels) = rels.as_mut() {
            let still_referenced = xml.prefixed_attribute_values(&removed);

            for id in &candidate_ids {
                if still_referenced.contains(id) {
                    continue;
                }
                if let Some(rel) = rels.remove(id) {
                    if rel.external {
                        log::debug!("Dropped external relationship {} -> {}", rel.id, rel.target);
                    } else {
                        changes
                            .dropped_targets
                            .push(resolve_target(part_name, &rel.target));
                    }
                }
            }

            // Watermark hyperlinks nothing points at anymore (or never did)
            let orphan_links: Vec<String> = rels
                .iter()
                .filter(|r| r.is_hyperlink() && !still_referenced.contains(&r.id))
                .filter(|r| {
                    DocumentElement::Hyperlink {
                        location: location.clone(),
                        target: &r.target,
                    }
                    .matches(&self.signature)
                })
                .map(|r| r.id.clone())
                .collect();

            for id in orphan_links {
                if let Some(rel) = rels.remove(&id) {
                    report.add_removal(Removal::new(
                        location.clone(),
                        RemovalKind::Hyperlink,
                        format!("link to {}", rel.target),
                    ));
                }
            }
        }

        if !removed.is_empty() {
            log::debug!("Rewriting '{}' without {} element(s)", part_name, removed.len());
            package.set(part_name, xml.serialize(&removed)?);
        }
        if let Some(rels) = rels.filter(|r| r.is_modified()) {
            package.set(&rels_name, rels.serialize()?);
        }

        Ok(changes)
    }
}

/// Collect every picture shape with its name, hyperlink and relationship ids.
fn read_pictures(xml: &XmlPart, rels: Option<&Relationships>) -> Vec<PictureInfo> {
    xml.elements(b"pic")
        .into_iter()
        .map(|span| {
            let name = xml
                .elements_in(span, b"cNvPr")
                .first()
                .map(|&props| {
                    let name = xml.attribute(props, b"name").unwrap_or_default();
                    match xml.attribute(props, b"descr") {
                        Some(descr) if !descr.is_empty() => format!("{} ({})", name, descr),
                        _ => name,
                    }
                })
                .unwrap_or_default();

            let mut rel_ids = Vec::new();
            let mut link = None;
            for hlink in xml.elements_in(span, b"hlinkClick") {
                if let Some(rid) = xml.relationship_attribute(hlink, b"id") {
                    if link.is_none() {
                        link = rels.and_then(|r| r.get(&rid)).map(|r| r.target.clone());
                    }
                    rel_ids.push(rid);
                }
            }
            for blip in xml.elements_in(span, b"blip") {
                for attr in [b"embed".as_slice(), b"link".as_slice()] {
                    if let Some(rid) = xml.relationship_attribute(blip, attr) {
                        rel_ids.push(rid);
                    }
                }
            }

            PictureInfo {
                span,
                name,
                link,
                rel_ids,
            }
        })
        .collect()
}

/// Collect the text runs (`a:r`, `a:fld`) that are direct children of a paragraph.
fn read_runs(xml: &XmlPart, paragraph: Span, rels: Option<&Relationships>) -> Vec<RunInfo> {
    xml.children(paragraph)
        .into_iter()
        .filter(|&child| matches!(xml.local_name_of(child), Some(b"r") | Some(b"fld")))
        .map(|span| {
            let mut rel_ids = Vec::new();
            let mut link = None;
            for hlink in xml.elements_in(span, b"hlinkClick") {
                if let Some(rid) = xml.relationship_attribute(hlink, b"id") {
                    if link.is_none() {
                        link = rels.and_then(|r| r.get(&rid)).map(|r| r.target.clone());
                    }
                    rel_ids.push(rid);
                }
            }

            RunInfo {
                span,
                text: xml.text_of(span, b"t"),
                link,
                rel_ids,
            }
        })
        .collect()
}

/// Remove media parts that no relationship references anymore.
fn prune_media(
    package: &mut Package,
    dropped_targets: &[String],
    report: &mut StripReport,
) -> Result<()> {
    if dropped_targets.is_empty() {
        return Ok(());
    }

    let mut referenced: HashSet<String> = HashSet::new();
    let rels_parts: Vec<String> = package
        .names()
        .filter(|n| n.ends_with(".rels"))
        .map(str::to_string)
        .collect();

    for rels_name in &rels_parts {
        let Some(source) = source_part_for(rels_name) else {
            continue;
        };
        let Some(bytes) = package.get(rels_name) else {
            continue;
        };
        match Relationships::parse(rels_name, bytes) {
            Ok(rels) => {
                referenced.extend(
                    rels.iter()
                        .filter(|r| !r.external)
                        .map(|r| resolve_target(&source, &r.target)),
                );
            }
            Err(e) => {
                log::warn!("Keeping media: cannot read '{}': {}", rels_name, e);
                return Ok(());
            }
        }
    }

    let unique: BTreeSet<&String> = dropped_targets.iter().collect();
    let mut removed_parts = Vec::new();
    for target in unique {
        if referenced.contains(target.as_str()) {
            continue;
        }
        if package.remove(target) {
            report.add_removal(Removal::new(
                Location::Document,
                RemovalKind::Media,
                target.clone(),
            ));
            removed_parts.push(format!("/{}", target));
        }
    }

    if removed_parts.is_empty() {
        return Ok(());
    }

    if let Some(bytes) = package.get(CONTENT_TYPES) {
        let types = XmlPart::parse(CONTENT_TYPES, bytes)?;
        let overrides: Vec<Span> = types
            .elements(b"Override")
            .into_iter()
            .filter(|&span| {
                types
                    .attribute(span, b"PartName")
                    .is_some_and(|p| removed_parts.contains(&p))
            })
            .collect();
        if !overrides.is_empty() {
            package.set(CONTENT_TYPES, types.serialize(&overrides)?);
        }
    }

    Ok(())
}
