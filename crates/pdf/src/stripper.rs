//! Page document watermark stripper.

use crate::annotations::remove_link_annotations;
use crate::content::{excise, parse_content, Operation};
use crate::font::{shown_advance, text_states, FontMetrics};
use crate::metadata::scrub_info;
use crate::resources::{image_dimensions, images_used_by_forms, page_fonts, page_xobjects, remove_xobjects};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use unmark_core::{
    decode_pdf_text, DocumentElement, DocumentFormat, Error, Location, OutputDocument,
    PageOutcome, Removal, RemovalKind, Result, StripReport, WatermarkSignature,
};

/// Operators allowed in a `q`..`Q` block that is dropped together with the
/// watermark image it draws: graphics state, clipping, unpainted paths.
const STATE_OPERATORS: &[&str] = &[
    "q", "Q", "cm", "gs", "w", "J", "j", "M", "d", "ri", "i", "re", "W", "W*", "n", "m", "l",
    "c", "v", "y", "h",
];

/// TJ adjustment (thousandths of an em) wide enough to read as a space.
const WORD_GAP: f64 = 200.0;

/// Removes watermark text, images and links from PDF documents.
#[derive(Debug, Clone, Default)]
pub struct PdfStripper {
    signature: WatermarkSignature,
    scrub_metadata: bool,
}

/// Watermark images seen across the document, and which are still drawn.
#[derive(Debug, Default)]
struct ImageUsage {
    watermark: HashSet<ObjectId>,
    drawn: HashSet<ObjectId>,
}

/// Edits planned for one content stream.
#[derive(Debug, Default)]
struct Excisions {
    remove: HashSet<usize>,
    replace: HashMap<usize, String>,
    count: usize,
}

impl Excisions {
    fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.replace.is_empty()
    }
}

impl PdfStripper {
    /// Create a stripper for the given signature.
    pub fn new(signature: WatermarkSignature) -> Self {
        Self {
            signature,
            scrub_metadata: false,
        }
    }

    /// Also blank the document information dictionary.
    pub fn with_metadata_scrub(mut self, scrub: bool) -> Self {
        self.scrub_metadata = scrub;
        self
    }

    /// Strip watermarks from a PDF.
    ///
    /// Each page is handled on its own: a page whose content stream cannot
    /// be parsed is reported as failed and passes through untouched while
    /// the other pages are still cleaned. A document without any watermark
    /// is returned byte for byte.
    pub fn strip(&self, bytes: &[u8]) -> Result<OutputDocument> {
        let mut doc = Document::load_mem(bytes)
            .map_err(|e| Error::CorruptDocument(format!("Failed to load PDF: {}", e)))?;
        if doc.trailer.get(b"Encrypt").is_ok() {
            decrypt(&mut doc)?;
        }

        let pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();
        let mut report = StripReport::new(DocumentFormat::PageDocument);
        report.unit_count = pages.len();
        log::debug!("Document has {} pages", pages.len());

        // Content streams shared between pages are never deleted
        let mut content_owners: HashMap<ObjectId, usize> = HashMap::new();
        for (_, page_id) in &pages {
            for id in doc.get_page_contents(*page_id) {
                *content_owners.entry(id).or_default() += 1;
            }
        }

        let mut usage = ImageUsage::default();
        let mut modified = false;

        for (number, page_id) in &pages {
            let outcome =
                match self.strip_page(&mut doc, *number, *page_id, &content_owners, &mut report, &mut usage) {
                    Ok(0) => PageOutcome::Unchanged,
                    Ok(removed) => {
                        modified = true;
                        PageOutcome::Cleaned { removed }
                    }
                    Err(Error::PageParseError { page, reason }) => {
                        log::warn!("Page {}: {}; leaving it untouched", page, reason);
                        PageOutcome::Failed { reason }
                    }
                    Err(e) => return Err(e),
                };
            report.set_page(*number, outcome);
        }

        if self.prune_images(&mut doc, &usage, &mut report) > 0 {
            modified = true;
        }

        if self.scrub_metadata && scrub_info(&mut doc) {
            report.metadata_scrubbed = true;
            modified = true;
        }

        if report.removals.is_empty() {
            log::info!("No watermark found in document");
        } else {
            log::info!("Removed {} watermark element(s) from document", report.removed_count());
        }

        if !modified {
            return Ok(OutputDocument::new(bytes.to_vec(), report));
        }

        let mut out = Vec::new();
        doc.save_to(&mut out)
            .map_err(|e| Error::WriteError(format!("Failed to save PDF: {}", e)))?;
        Ok(OutputDocument::new(out, report))
    }

    /// Clean one page; returns how many artifacts were removed.
    fn strip_page(
        &self,
        doc: &mut Document,
        number: u32,
        page_id: ObjectId,
        content_owners: &HashMap<ObjectId, usize>,
        report: &mut StripReport,
        usage: &mut ImageUsage,
    ) -> Result<usize> {
        let location = Location::Page(number);
        let xobjects = page_xobjects(doc, page_id);

        let parsed = read_page_content(doc, page_id)
            .and_then(|content| match parse_content(&content) {
                Ok(operations) => Ok((content, operations)),
                Err(e) => Err(e.to_string()),
            });
        let (content, operations) = match parsed {
            Ok(parsed) => parsed,
            Err(reason) => {
                // Nothing on this page can be proven unused
                usage.drawn.extend(xobjects.values().copied());
                return Err(Error::PageParseError { page: number, reason });
            }
        };

        let watermark_images: HashMap<&[u8], ObjectId> = xobjects
            .iter()
            .filter(|(name, id)| {
                let name = String::from_utf8_lossy(name);
                DocumentElement::ImageRef {
                    location: location.clone(),
                    name: &name,
                    link: None,
                    dimensions: image_dimensions(doc, **id),
                }
                .matches(&self.signature)
            })
            .map(|(name, id)| (name.as_slice(), *id))
            .collect();
        usage.watermark.extend(watermark_images.values().copied());

        let fonts: BTreeMap<Vec<u8>, FontMetrics> = page_fonts(doc, page_id)
            .iter()
            .map(|(name, font)| (name.clone(), FontMetrics::from_font(doc, font)))
            .collect();

        let mut excisions = Excisions::default();
        self.plan_text(&operations, &fonts, &location, &mut excisions, report);
        plan_images(&operations, &watermark_images, &location, &mut excisions, report);

        for (idx, op) in operations.iter().enumerate() {
            if op.operator != "Do" || excisions.remove.contains(&idx) {
                continue;
            }
            if let Some(id) = xobject_name(op).and_then(|name| xobjects.get(name)) {
                usage.drawn.insert(*id);
            }
        }

        let mut removed = excisions.count;
        if !excisions.is_empty() {
            let cleaned = excise(
                &content,
                &operations,
                |idx| excisions.remove.contains(&idx),
                |idx| excisions.replace.get(&idx).cloned(),
            );
            replace_page_content(doc, page_id, cleaned, content_owners)?;
        }

        let signature = &self.signature;
        let links = remove_link_annotations(doc, page_id, |uri| {
            DocumentElement::Hyperlink {
                location: location.clone(),
                target: uri,
            }
            .matches(signature)
        });
        match links {
            Ok(targets) => {
                for target in targets {
                    let element = DocumentElement::Hyperlink {
                        location: location.clone(),
                        target: &target,
                    };
                    report.add_removal(Removal::new(
                        location.clone(),
                        element.removal_kind(),
                        element.describe(),
                    ));
                    removed += 1;
                }
            }
            Err(e) => log::warn!("Page {}: cannot read annotations: {}", number, e),
        }

        Ok(removed)
    }

    /// Mark text-showing operators that draw a watermark phrase.
    ///
    /// Each text object is matched on its own. Pieces are tried both joined
    /// directly (a phrase split inside a word) and joined with spaces (words
    /// placed by separate operators). A removed `Tj`/`TJ` followed by more
    /// text on the same line becomes a bare `TJ` advance of the same width.
    fn plan_text(
        &self,
        operations: &[Operation],
        fonts: &BTreeMap<Vec<u8>, FontMetrics>,
        location: &Location,
        excisions: &mut Excisions,
        report: &mut StripReport,
    ) {
        let states = text_states(operations);
        for block in text_objects(operations) {
            let texts: Vec<String> = block
                .iter()
                .map(|&idx| shown_text(&operations[idx]).unwrap_or_default())
                .collect();
            let spaced: Vec<String> = texts.iter().map(|t| format!("{} ", t)).collect();

            let hits: BTreeSet<usize> = self
                .signature
                .matching_windows(&texts)
                .into_iter()
                .chain(self.signature.matching_windows(&spaced))
                .flatten()
                .collect();
            let removed: HashSet<usize> = hits.iter().map(|&pos| block[pos]).collect();

            for pos in hits {
                let idx = block[pos];
                let op = &operations[idx];
                let element = DocumentElement::ContentOperator {
                    location: location.clone(),
                    operator: &op.operator,
                    text: &texts[pos],
                };
                report.add_removal(Removal::new(
                    location.clone(),
                    element.removal_kind(),
                    element.describe(),
                ));
                excisions.count += 1;

                // ' and " also move to the next line; keep that part
                match op.operator.as_str() {
                    "'" => {
                        excisions.replace.insert(idx, "T*".to_string());
                    }
                    "\"" => match (op.operands.first().and_then(format_number), op.operands.get(1).and_then(format_number)) {
                        (Some(aw), Some(ac)) => {
                            excisions.replace.insert(idx, format!("{} Tw {} Tc T*", aw, ac));
                        }
                        _ => {
                            excisions.replace.insert(idx, "T*".to_string());
                        }
                    },
                    _ => {
                        let advance = if moves_later_text(operations, idx, &removed) {
                            let state = &states[idx];
                            let metrics = state
                                .font
                                .as_ref()
                                .and_then(|name| fonts.get(name))
                                .cloned()
                                .unwrap_or_default();
                            shown_advance(op, state, &metrics).filter(|a| a.abs() >= 0.001)
                        } else {
                            None
                        };
                        match advance {
                            Some(advance) => {
                                excisions.replace.insert(idx, format!("[{}] TJ", format_adjustment(-advance)));
                            }
                            None => {
                                excisions.remove.insert(idx);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Remove watermark images nothing draws any more.
    fn prune_images(&self, doc: &mut Document, usage: &ImageUsage, report: &mut StripReport) -> usize {
        if usage.watermark.is_empty() {
            return 0;
        }
        let mut in_use = images_used_by_forms(doc);
        in_use.extend(usage.drawn.iter().copied());

        let targets: HashSet<ObjectId> = usage.watermark.difference(&in_use).copied().collect();
        let removed = remove_xobjects(doc, &targets);
        for (num, generation) in &removed {
            report.add_removal(Removal::new(
                Location::Document,
                RemovalKind::Resource,
                format!("image object {} {} R", num, generation),
            ));
        }
        removed.len()
    }
}

/// Mark `Do` operators that draw a watermark image, together with their
/// enclosing `q`..`Q` block when that block draws nothing else.
fn plan_images(
    operations: &[Operation],
    watermark_images: &HashMap<&[u8], ObjectId>,
    location: &Location,
    excisions: &mut Excisions,
    report: &mut StripReport,
) {
    let is_watermark_do = |op: &Operation| {
        op.operator == "Do" && xobject_name(op).is_some_and(|name| watermark_images.contains_key(name))
    };

    for (idx, op) in operations.iter().enumerate() {
        if !is_watermark_do(op) {
            continue;
        }
        let name = xobject_name(op).map(String::from_utf8_lossy).unwrap_or_default();
        let element = DocumentElement::ImageRef {
            location: location.clone(),
            name: &name,
            link: None,
            dimensions: None,
        };
        report.add_removal(Removal::new(
            location.clone(),
            RemovalKind::ImageOperator,
            element.describe(),
        ));
        excisions.count += 1;

        match enclosing_block(operations, idx) {
            Some((open, close))
                if (open..=close).all(|i| {
                    i == idx
                        || STATE_OPERATORS.contains(&operations[i].operator.as_str())
                        || is_watermark_do(&operations[i])
                }) =>
            {
                excisions.remove.extend(open..=close);
            }
            _ => {
                excisions.remove.insert(idx);
            }
        }
    }
}

/// Indices of the innermost `q` and matching `Q` around an operation.
fn enclosing_block(operations: &[Operation], idx: usize) -> Option<(usize, usize)> {
    let mut depth = 0;
    let open = (0..idx).rev().find(|&i| match operations[i].operator.as_str() {
        "Q" => {
            depth += 1;
            false
        }
        "q" if depth == 0 => true,
        "q" => {
            depth -= 1;
            false
        }
        _ => false,
    })?;

    let mut depth = 0;
    let close = (idx + 1..operations.len()).find(|&i| match operations[i].operator.as_str() {
        "q" => {
            depth += 1;
            false
        }
        "Q" if depth == 0 => true,
        "Q" => {
            depth -= 1;
            false
        }
        _ => false,
    })?;

    Some((open, close))
}

/// Text-showing operators grouped by `BT`..`ET` text object.
fn text_objects(operations: &[Operation]) -> Vec<Vec<usize>> {
    let mut blocks = Vec::new();
    let mut current: Option<Vec<usize>> = None;
    for (idx, op) in operations.iter().enumerate() {
        match op.operator.as_str() {
            "BT" => current = Some(Vec::new()),
            "ET" => {
                if let Some(block) = current.take() {
                    if !block.is_empty() {
                        blocks.push(block);
                    }
                }
            }
            "Tj" | "TJ" | "'" | "\"" => {
                if let Some(block) = current.as_mut() {
                    block.push(idx);
                }
            }
            _ => {}
        }
    }
    blocks
}

/// The text a text-showing operator draws, as far as it can be decoded.
fn shown_text(op: &Operation) -> Option<String> {
    let string = |obj: Option<&Object>| match obj {
        Some(Object::String(bytes, _)) => Some(decode_pdf_text(bytes)),
        _ => None,
    };

    match op.operator.as_str() {
        "Tj" | "'" => string(op.operands.first()),
        "\"" => string(op.operands.get(2)),
        "TJ" => match op.operands.first() {
            Some(Object::Array(items)) => {
                let mut text = String::new();
                for item in items {
                    match item {
                        Object::String(bytes, _) => text.push_str(&decode_pdf_text(bytes)),
                        Object::Integer(n) if (*n as f64) < -WORD_GAP => text.push(' '),
                        Object::Real(n) if f64::from(*n) < -WORD_GAP => text.push(' '),
                        _ => {}
                    }
                }
                Some(text)
            }
            _ => None,
        },
        _ => None,
    }
}

/// Open a document protected only by an owner password.
fn decrypt(doc: &mut Document) -> Result<()> {
    let encrypt_id = doc.trailer.get(b"Encrypt").and_then(Object::as_reference).ok();
    doc.decrypt("").map_err(|e| {
        Error::CorruptDocument(format!("Encrypted PDF cannot be opened without a password: {}", e))
    })?;
    if let Some(id) = encrypt_id {
        doc.objects.remove(&id);
    }
    log::info!("Decrypted PDF protected by an owner password");
    Ok(())
}

/// Whether text shown after `idx` starts where the operator at `idx` left
/// the pen, i.e. nothing repositions to a new line first.
fn moves_later_text(operations: &[Operation], idx: usize, removed: &HashSet<usize>) -> bool {
    for (i, op) in operations.iter().enumerate().skip(idx + 1) {
        match op.operator.as_str() {
            "Tj" | "TJ" if !removed.contains(&i) => return true,
            "Td" | "TD" | "Tm" | "T*" | "'" | "\"" | "ET" => return false,
            _ => {}
        }
    }
    false
}

/// A TJ adjustment with at most three decimals.
fn format_adjustment(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{:.3}", rounded).trim_end_matches('0').to_string()
    }
}

/// Decoded content of a page, its streams joined in order.
///
/// A stream boundary separates tokens, so each stream is followed by a
/// newline; otherwise `Q` closing one stream and `q` opening the next would
/// lex as `Qq`.
fn read_page_content(doc: &Document, page_id: ObjectId) -> std::result::Result<Vec<u8>, String> {
    let mut content = Vec::new();
    for id in doc.get_page_contents(page_id) {
        let stream = match doc.get_object(id).and_then(Object::as_stream) {
            Ok(stream) => stream,
            Err(e) => {
                log::debug!("Skipping content stream {} {} R: {}", id.0, id.1, e);
                continue;
            }
        };
        if stream.filters().is_ok() {
            let data = stream
                .decompressed_content()
                .map_err(|e| format!("unreadable content stream {} {} R: {}", id.0, id.1, e))?;
            content.extend_from_slice(&data);
        } else {
            content.extend_from_slice(&stream.content);
        }
        content.push(b'\n');
    }
    Ok(content)
}

fn xobject_name(op: &Operation) -> Option<&[u8]> {
    match op.operands.first() {
        Some(Object::Name(name)) => Some(name.as_slice()),
        _ => None,
    }
}

fn format_number(obj: &Object) -> Option<String> {
    match obj {
        Object::Integer(n) => Some(n.to_string()),
        Object::Real(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Point a page at a single new content stream, deleting the old streams
/// when no other page uses them.
fn replace_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    content: Vec<u8>,
    content_owners: &HashMap<ObjectId, usize>,
) -> Result<()> {
    let old_streams = doc.get_page_contents(page_id);
    let stream_id = doc.add_object(Stream::new(Dictionary::new(), content));

    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| Error::CorruptDocument(format!("Page object {:?} is not a dictionary: {}", page_id, e)))?
        .set("Contents", Object::Reference(stream_id));

    for id in old_streams {
        if content_owners.get(&id).copied().unwrap_or(0) <= 1 {
            doc.objects.remove(&id);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::encryption::{decrypt_object, get_encryption_key};
    use lopdf::{dictionary, StringFormat};

    struct Fixture {
        /// Content streams of each page.
        pages: Vec<Vec<Vec<u8>>>,
        badge: bool,
        link_on_first: bool,
    }

    impl Fixture {
        fn new(pages: &[&[u8]]) -> Self {
            Self {
                pages: pages.iter().map(|p| vec![p.to_vec()]).collect(),
                badge: false,
                link_on_first: false,
            }
        }

        /// A single page whose Contents is an array of streams.
        fn with_streams(streams: &[&[u8]]) -> Self {
            Self {
                pages: vec![streams.iter().map(|s| s.to_vec()).collect()],
                badge: false,
                link_on_first: false,
            }
        }

        fn with_badge(mut self) -> Self {
            self.badge = true;
            self
        }

        fn with_link(mut self) -> Self {
            self.link_on_first = true;
            self
        }

        /// Build the PDF; fonts and images live on the Pages node.
        fn build(&self) -> Vec<u8> {
            let mut doc = Document::with_version("1.5");
            let pages_id = doc.new_object_id();

            // Space is 250 wide, every other glyph 500
            let widths: Vec<Object> = (32..=126).map(|c| if c == 32 { 250.into() } else { 500.into() }).collect();
            let font = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
                "FirstChar" => 32,
                "LastChar" => 126,
                "Widths" => widths,
            });
            let logo = doc.add_object(image_stream(100, 50));
            let mut xobjects = dictionary! { "Logo" => logo };
            if self.badge {
                let mask = doc.add_object(Stream::new(
                    dictionary! { "Type" => "XObject", "Subtype" => "Image", "Width" => 575, "Height" => 137 },
                    vec![0u8; 4],
                ));
                let mut badge = image_stream(575, 137);
                badge.dict.set("SMask", mask);
                let badge = doc.add_object(badge);
                xobjects.set("Im1", badge);
            }

            let mut kids = Vec::new();
            for (i, streams) in self.pages.iter().enumerate() {
                let mut ids: Vec<Object> = streams
                    .iter()
                    .map(|content| Object::Reference(doc.add_object(Stream::new(Dictionary::new(), content.clone()))))
                    .collect();
                let contents = if ids.len() == 1 { ids.remove(0) } else { Object::Array(ids) };
                let mut page = dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                    "Contents" => contents,
                };
                if i == 0 && self.link_on_first {
                    let link = doc.add_object(dictionary! {
                        "Type" => "Annot",
                        "Subtype" => "Link",
                        "Rect" => vec![480.into(), 10.into(), 600.into(), 40.into()],
                        "A" => dictionary! {
                            "S" => "URI",
                            "URI" => Object::String(b"https://gamma.app/?utm_source=made-with-gamma".to_vec(), StringFormat::Literal),
                        },
                    });
                    page.set("Annots", vec![Object::Reference(link)]);
                }
                kids.push(Object::Reference(doc.add_object(page)));
            }

            doc.objects.insert(
                pages_id,
                Object::Dictionary(dictionary! {
                    "Type" => "Pages",
                    "Count" => self.pages.len() as i64,
                    "Kids" => kids,
                    "Resources" => dictionary! {
                        "Font" => dictionary! { "F1" => font },
                        "XObject" => xobjects,
                    },
                }),
            );
            let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
            let info = doc.add_object(dictionary! {
                "Producer" => Object::string_literal("Gamma"),
                "Title" => Object::string_literal("Board deck"),
            });
            doc.trailer.set("Root", catalog);
            doc.trailer.set("Info", info);

            let mut out = Vec::new();
            doc.save_to(&mut out).unwrap();
            out
        }
    }

    fn image_stream(width: i64, height: i64) -> Stream {
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            vec![0u8; 6],
        )
    }

    /// Add a Standard security handler dictionary and a file ID.
    fn add_encryption(doc: &mut Document, version: i64, revision: i64) {
        let encrypt = doc.add_object(dictionary! {
            "Filter" => "Standard",
            "V" => version,
            "R" => revision,
            "Length" => 40,
            "O" => Object::String(vec![0x5a; 32], StringFormat::Hexadecimal),
            "P" => -44,
        });
        doc.trailer.set("Encrypt", encrypt);
        let file_id = Object::String(b"unmark-fixture-1".to_vec(), StringFormat::Hexadecimal);
        doc.trailer.set("ID", vec![file_id.clone(), file_id]);
    }

    /// RC4-encrypt every stream for an empty user password.
    fn encrypt_with_empty_password(bytes: &[u8]) -> Vec<u8> {
        let mut doc = Document::load_mem(bytes).unwrap();
        doc.trailer.remove(b"Info");
        add_encryption(&mut doc, 1, 2);

        let key = get_encryption_key(&doc, "", false).unwrap();
        for (&id, obj) in doc.objects.iter_mut() {
            if let Ok(data) = decrypt_object(&key, id, &*obj) {
                if let Object::Stream(stream) = obj {
                    stream.set_content(data);
                }
            }
        }

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    fn page_content(bytes: &[u8], page: u32) -> String {
        let doc = Document::load_mem(bytes).unwrap();
        let page_id = doc.get_pages()[&page];
        String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned()
    }

    fn has_image_of_size(bytes: &[u8], width: i64, height: i64) -> bool {
        let doc = Document::load_mem(bytes).unwrap();
        doc.objects.values().any(|obj| match obj.as_stream() {
            Ok(stream) => {
                stream.dict.get(b"Width").and_then(Object::as_i64).ok() == Some(width)
                    && stream.dict.get(b"Height").and_then(Object::as_i64).ok() == Some(height)
            }
            Err(_) => false,
        })
    }

    const BODY: &[u8] = b"BT /F1 24 Tf 72 720 Td (Quarterly results) Tj ET";

    #[test]
    fn test_clean_document_passes_through() {
        let pages: Vec<&[u8]> = vec![BODY; 5];
        let input = Fixture::new(&pages).build();

        let output = PdfStripper::default().strip(&input).unwrap();
        assert_eq!(output.report.unit_count, 5);
        assert_eq!(output.report.removed_count(), 0);
        assert_eq!(output.report.pages.len(), 5);
        assert!(output.report.pages.values().all(|o| *o == PageOutcome::Unchanged));
        assert_eq!(output.bytes, input);
    }

    #[test]
    fn test_corrupt_page_is_isolated() {
        let watermarked: &[u8] =
            b"BT /F1 24 Tf 72 720 Td (Quarterly results) Tj ET BT /F1 9 Tf 480 20 Td (Made with Gamma) Tj ET";
        let truncated: &[u8] = b"BT /F1 9 Tf 480 20 Td (Made with GAM";
        let input = Fixture::new(&[watermarked, watermarked, truncated, watermarked, watermarked]).build();

        let output = PdfStripper::default().strip(&input).unwrap();
        let report = &output.report;

        assert_eq!(report.failed_pages().len(), 1);
        assert_eq!(report.failed_pages()[0].0, 3);
        for page in [1, 2, 4, 5] {
            assert_eq!(report.pages[&page], PageOutcome::Cleaned { removed: 1 });
            assert!(!page_content(&output.bytes, page).contains("Gamma"));
            assert!(page_content(&output.bytes, page).contains("(Quarterly results) Tj"));
        }

        // Output is a valid document with every page, page 3 untouched
        let doc = Document::load_mem(&output.bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 5);
        assert_eq!(page_content(&output.bytes, 3).as_bytes(), truncated);
    }

    #[test]
    fn test_streams_stay_separate_tokens() {
        let input = Fixture::with_streams(&[
            b"q 1 0 0 1 0 0 cm BT /F1 24 Tf 72 720 Td (Body) Tj ET Q",
            b"q 0 0 1 rg BT /F1 9 Tf 480 20 Td (Made with Gamma) Tj ET Q",
        ])
        .build();

        let output = PdfStripper::default().strip(&input).unwrap();
        assert_eq!(output.report.pages[&1], PageOutcome::Cleaned { removed: 1 });

        let cleaned = page_content(&output.bytes, 1);
        assert!(!cleaned.contains("Gamma"));
        let operators: Vec<String> = parse_content(cleaned.as_bytes())
            .unwrap()
            .into_iter()
            .map(|op| op.operator)
            .collect();
        assert!(!operators.iter().any(|op| op == "Qq"));
        assert_eq!(operators.iter().filter(|op| *op == "q").count(), 2);
        assert_eq!(operators.iter().filter(|op| *op == "Q").count(), 2);
    }

    #[test]
    fn test_text_object_per_stream_is_not_a_parse_error() {
        let input = Fixture::with_streams(&[
            b"BT /F1 24 Tf 72 720 Td (Body) Tj ET",
            b"q BT /F1 9 Tf 480 20 Td (Made with Gamma) Tj ET Q",
        ])
        .build();

        let output = PdfStripper::default().strip(&input).unwrap();
        assert_eq!(output.report.pages[&1], PageOutcome::Cleaned { removed: 1 });
        assert!(page_content(&output.bytes, 1).contains("(Body) Tj ET"));
    }

    #[test]
    fn test_following_text_keeps_its_position() {
        let content: &[u8] = b"BT /F1 9 Tf 380 20 Td (Made with Gamma) Tj ( | Page 2) Tj ET";
        let input = Fixture::new(&[content]).build();

        let output = PdfStripper::default().strip(&input).unwrap();
        assert_eq!(output.report.pages[&1], PageOutcome::Cleaned { removed: 1 });

        // 13 glyphs at 500 and two spaces at 250
        let cleaned = page_content(&output.bytes, 1);
        assert!(cleaned.contains("380 20 Td [-7000] TJ ( | Page 2) Tj"), "{}", cleaned);
    }

    #[test]
    fn test_following_text_on_new_line_needs_no_advance() {
        let content: &[u8] = b"BT /F1 9 Tf 380 20 Td (Made with Gamma) Tj 0 -12 Td (Page 2) Tj ET";
        let input = Fixture::new(&[content]).build();

        let output = PdfStripper::default().strip(&input).unwrap();
        let cleaned = page_content(&output.bytes, 1);
        assert!(!cleaned.contains("TJ"));
        assert!(cleaned.contains("0 -12 Td (Page 2) Tj"));
    }

    #[test]
    fn test_split_text_operators() {
        let content: &[u8] =
            b"BT /F1 24 Tf 72 720 Td (Quarterly results) Tj ET\nBT /F1 9 Tf 480 20 Td (Made with ) Tj (Gamma) Tj ET";
        let input = Fixture::new(&[content]).build();

        let output = PdfStripper::default().strip(&input).unwrap();
        assert_eq!(output.report.pages[&1], PageOutcome::Cleaned { removed: 2 });
        assert_eq!(output.report.removals[0].kind, RemovalKind::TextOperator);

        let cleaned = page_content(&output.bytes, 1);
        assert!(!cleaned.contains("Made with"));
        assert!(!cleaned.contains("Gamma"));
        assert!(cleaned.contains("BT /F1 9 Tf 480 20 Td"));
        assert!(parse_content(cleaned.as_bytes()).is_ok());
    }

    #[test]
    fn test_words_in_separate_operators() {
        let content: &[u8] = b"BT /F1 9 Tf 480 20 Td (Made) Tj 30 0 Td (with) Tj 25 0 Td (Gamma) Tj ET";
        let input = Fixture::new(&[content]).build();

        let output = PdfStripper::default().strip(&input).unwrap();
        assert_eq!(output.report.pages[&1], PageOutcome::Cleaned { removed: 3 });
        assert!(!page_content(&output.bytes, 1).contains("Made"));
    }

    #[test]
    fn test_tj_array_with_kerning() {
        let content: &[u8] = b"BT /F1 9 Tf 480 20 Td [(Made) -278 (with) -278 (Ga) 10 (mma)] TJ ET";
        let input = Fixture::new(&[content]).build();

        let output = PdfStripper::default().strip(&input).unwrap();
        assert_eq!(output.report.pages[&1], PageOutcome::Cleaned { removed: 1 });
        assert!(!page_content(&output.bytes, 1).contains("TJ"));
    }

    #[test]
    fn test_quote_operator_keeps_line_advance() {
        let content: &[u8] = b"BT /F1 12 Tf 14 TL 72 700 Td (Intro) Tj (Made with Gamma) ' (Next) ' ET";
        let input = Fixture::new(&[content]).build();

        let output = PdfStripper::default().strip(&input).unwrap();
        let cleaned = page_content(&output.bytes, 1);
        assert!(cleaned.contains("(Intro) Tj T* (Next) '"));
    }

    #[test]
    fn test_badge_image_removed_and_pruned() {
        let content: &[u8] = b"q 575 0 0 137 20 20 cm /Im1 Do Q BT /F1 24 Tf 72 720 Td (Body) Tj ET q 100 0 0 50 0 0 cm /Logo Do Q";
        let input = Fixture::new(&[content, BODY]).with_badge().build();
        assert!(has_image_of_size(&input, 575, 137));

        let output = PdfStripper::default().strip(&input).unwrap();
        let report = &output.report;
        assert_eq!(report.pages[&1], PageOutcome::Cleaned { removed: 1 });
        assert_eq!(report.pages[&2], PageOutcome::Unchanged);
        assert_eq!(report.removals_at(&Location::Page(1))[0].kind, RemovalKind::ImageOperator);
        assert_eq!(report.removals_at(&Location::Document)[0].kind, RemovalKind::Resource);

        let cleaned = page_content(&output.bytes, 1);
        assert!(!cleaned.contains("/Im1"));
        assert!(!cleaned.contains("575 0 0 137"));
        assert!(cleaned.contains("/Logo Do"));
        assert!(cleaned.contains("(Body) Tj"));

        // Badge and its soft mask are gone, the other image stays
        assert!(!has_image_of_size(&output.bytes, 575, 137));
        assert!(has_image_of_size(&output.bytes, 100, 50));
    }

    #[test]
    fn test_badge_in_busy_block_removes_only_do() {
        let content: &[u8] = b"q 1 0 0 1 0 0 cm /Im1 Do 0 0 1 rg 0 0 10 10 re f Q";
        let input = Fixture::new(&[content]).with_badge().build();

        let output = PdfStripper::default().strip(&input).unwrap();
        let cleaned = page_content(&output.bytes, 1);
        assert!(!cleaned.contains("/Im1 Do"));
        assert!(cleaned.contains("0 0 10 10 re f Q"));
    }

    #[test]
    fn test_badge_kept_while_failed_page_may_draw_it() {
        let drawn: &[u8] = b"q 575 0 0 137 20 20 cm /Im1 Do Q";
        let truncated: &[u8] = b"q 575 0 0 137 20 20 cm /Im1 Do Q BT (cut";
        let input = Fixture::new(&[drawn, truncated]).with_badge().build();

        let output = PdfStripper::default().strip(&input).unwrap();
        assert_eq!(output.report.pages[&1], PageOutcome::Cleaned { removed: 1 });
        assert!(output.report.pages[&2].is_failed());
        assert!(has_image_of_size(&output.bytes, 575, 137));
        assert!(output.report.removals_at(&Location::Document).is_empty());
    }

    #[test]
    fn test_link_annotation_removed() {
        let input = Fixture::new(&[BODY]).with_link().build();

        let output = PdfStripper::default().strip(&input).unwrap();
        assert_eq!(output.report.pages[&1], PageOutcome::Cleaned { removed: 1 });
        assert_eq!(output.report.removals[0].kind, RemovalKind::Hyperlink);

        let doc = Document::load_mem(&output.bytes).unwrap();
        let page = doc.get_object(doc.get_pages()[&1]).unwrap().as_dict().unwrap();
        assert!(page.get(b"Annots").is_err());
    }

    #[test]
    fn test_strip_is_idempotent() {
        let content: &[u8] = b"q 575 0 0 137 20 20 cm /Im1 Do Q BT /F1 9 Tf 480 20 Td (Made with Gamma) Tj ET";
        let input = Fixture::new(&[content, BODY]).with_badge().with_link().build();
        let stripper = PdfStripper::default();

        let once = stripper.strip(&input).unwrap();
        let twice = stripper.strip(&once.bytes).unwrap();
        assert!(once.report.removed_count() > 0);
        assert_eq!(twice.report.removed_count(), 0);
        assert_eq!(once.bytes, twice.bytes);
    }

    #[test]
    fn test_metadata_scrub() {
        let input = Fixture::new(&[BODY]).build();

        let output = PdfStripper::default()
            .with_metadata_scrub(true)
            .strip(&input)
            .unwrap();
        assert!(output.report.metadata_scrubbed);

        let doc = Document::load_mem(&output.bytes).unwrap();
        let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = doc.get_object(info_id).unwrap().as_dict().unwrap();
        assert!(matches!(info.get(b"Producer"), Ok(Object::String(s, _)) if s.is_empty()));
    }

    #[test]
    fn test_empty_signature_changes_nothing() {
        let content: &[u8] = b"BT /F1 9 Tf 480 20 Td (Made with Gamma) Tj ET";
        let input = Fixture::new(&[content]).with_badge().with_link().build();

        let output = PdfStripper::new(WatermarkSignature::empty()).strip(&input).unwrap();
        assert_eq!(output.report.removed_count(), 0);
        assert_eq!(output.bytes, input);
    }

    #[test]
    fn test_owner_password_only_is_opened() {
        let content: &[u8] =
            b"BT /F1 24 Tf 72 720 Td (Quarterly results) Tj ET BT /F1 9 Tf 480 20 Td (Made with Gamma) Tj ET";
        let input = encrypt_with_empty_password(&Fixture::new(&[content]).build());
        assert!(Document::load_mem(&input).unwrap().is_encrypted());

        let output = PdfStripper::default().strip(&input).unwrap();
        assert_eq!(output.report.pages[&1], PageOutcome::Cleaned { removed: 1 });

        let doc = Document::load_mem(&output.bytes).unwrap();
        assert!(!doc.is_encrypted());
        let cleaned = page_content(&output.bytes, 1);
        assert!(cleaned.contains("(Quarterly results) Tj"));
        assert!(!cleaned.contains("Gamma"));
    }

    #[test]
    fn test_unsupported_encryption_is_corrupt() {
        let mut doc = Document::load_mem(&Fixture::new(&[BODY]).build()).unwrap();
        add_encryption(&mut doc, 4, 4);
        let mut input = Vec::new();
        doc.save_to(&mut input).unwrap();

        let result = PdfStripper::default().strip(&input);
        assert!(matches!(result, Err(Error::CorruptDocument(msg)) if msg.contains("password")));
    }

    #[test]
    fn test_not_a_pdf_is_corrupt() {
        let result = PdfStripper::default().strip(b"not a pdf at all");
        assert!(matches!(result, Err(Error::CorruptDocument(_))));
    }

    #[test]
    fn test_enclosing_block() {
        let ops = parse_content(b"q q 1 w Q /Im1 Do q Q Q").unwrap();
        assert_eq!(enclosing_block(&ops, 4), Some((0, 7)));
        let ops = parse_content(b"/Im1 Do").unwrap();
        assert_eq!(enclosing_block(&ops, 0), None);
    }
}
