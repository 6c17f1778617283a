//! In-memory documents for dispatch and upload tests.

use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::ZipWriter;

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;
const REL_SLIDE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";

/// A deck with one text box per slide.
pub fn pptx_with_slides(texts: &[&str]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut add = |name: &str, data: String| {
        writer.start_file(name, FileOptions::default()).unwrap();
        writer.write_all(data.as_bytes()).unwrap();
    };

    let rels: String = (1..=texts.len())
        .map(|i| format!(r#"<Relationship Id="rId{i}" Type="{REL_SLIDE}" Target="slides/slide{i}.xml"/>"#))
        .collect();
    add(
        "ppt/_rels/presentation.xml.rels",
        format!(r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#),
    );

    let ids: String = (1..=texts.len())
        .map(|i| format!(r#"<p:sldId id="{}" r:id="rId{i}"/>"#, 255 + i))
        .collect();
    add(
        "ppt/presentation.xml",
        format!(r#"<p:presentation {NS}><p:sldIdLst>{ids}</p:sldIdLst></p:presentation>"#),
    );

    for (i, text) in texts.iter().enumerate() {
        add(
            &format!("ppt/slides/slide{}.xml", i + 1),
            format!(
                r#"<p:sld {NS}><p:cSld><p:spTree><p:sp><p:txBody><a:p><a:r><a:t>{text}</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#
            ),
        );
    }

    writer.finish().unwrap().into_inner()
}

/// A PDF with one line of Helvetica text per page and an Info dictionary.
pub fn pdf_with_pages(texts: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for text in texts {
        let content = format!("BT /F1 24 Tf 72 720 Td ({}) Tj ET", text);
        let contents = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
        let page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => contents,
        });
        kids.push(Object::Reference(page));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => texts.len() as i64,
            "Kids" => kids,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font } },
        }),
    );
    let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    let info = doc.add_object(dictionary! { "Producer" => Object::string_literal("Gamma") });
    doc.trailer.set("Root", catalog);
    doc.trailer.set("Info", info);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}
