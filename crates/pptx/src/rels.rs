//! Package relationship parts (`_rels/*.rels`).

use crate::xml::{Span, XmlPart};
use unmark_core::Result;

/// Relationship type suffix for hyperlinks.
const HYPERLINK_TYPE: &str = "/hyperlink";

/// A single `<Relationship>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    /// `TargetMode="External"` (hyperlinks and linked media).
    pub external: bool,
    span: Span,
}

impl Relationship {
    pub fn is_hyperlink(&self) -> bool {
        self.rel_type.ends_with(HYPERLINK_TYPE)
    }
}

/// The relationships of one source part.
#[derive(Debug, Clone)]
pub struct Relationships {
    part: XmlPart,
    entries: Vec<Relationship>,
    removed: Vec<Span>,
}

impl Relationships {
    pub fn parse(name: &str, bytes: &[u8]) -> Result<Self> {
        let part = XmlPart::parse(name, bytes)?;

        let entries = part
            .elements(b"Relationship")
            .into_iter()
            .map(|span| Relationship {
                id: part.attribute(span, b"Id").unwrap_or_default(),
                rel_type: part.attribute(span, b"Type").unwrap_or_default(),
                target: part.attribute(span, b"Target").unwrap_or_default(),
                external: part
                    .attribute(span, b"TargetMode")
                    .is_some_and(|m| m.eq_ignore_ascii_case("external")),
                span,
            })
            .collect();

        Ok(Self {
            part,
            entries,
            removed: Vec::new(),
        })
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.entries.iter().find(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.entries.iter()
    }

    /// Remove a relationship by id, returning it.
    pub fn remove(&mut self, id: &str) -> Option<Relationship> {
        let pos = self.entries.iter().position(|r| r.id == id)?;
        let rel = self.entries.remove(pos);
        self.removed.push(rel.span);
        Some(rel)
    }

    pub fn is_modified(&self) -> bool {
        !self.removed.is_empty()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        self.part.serialize(&self.removed)
    }
}

/// Path of the relationships part for a source part.
///
/// `ppt/slides/slide1.xml` → `ppt/slides/_rels/slide1.xml.rels`
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Source part of a relationships part; the package root for `_rels/.rels`.
///
/// `ppt/slides/_rels/slide1.xml.rels` → `ppt/slides/slide1.xml`
pub fn source_part_for(rels_path: &str) -> Option<String> {
    let file = rels_path.rsplit('/').next()?.strip_suffix(".rels")?;
    let dir = rels_path
        .strip_suffix(rels_path.rsplit('/').next()?)?
        .trim_end_matches('/')
        .strip_suffix("_rels")?
        .trim_end_matches('/');

    Some(if dir.is_empty() {
        file.to_string()
    } else {
        format!("{}/{}", dir, file)
    })
}

/// Resolve a relationship target against the directory of its source part.
///
/// `("ppt/slides/slide1.xml", "../media/image1.png")` → `ppt/media/image1.png`
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').filter(|s| !s.is_empty()).collect(),
        None => Vec::new(),
    };

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}
