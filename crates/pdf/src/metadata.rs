//! Document information scrubbing.

use lopdf::{Document, Object, StringFormat};

/// Info dictionary entries blanked to an empty string.
const INFO_TEXT_FIELDS: &[&str] = &["Title", "Author", "Subject", "Keywords", "Creator", "Producer"];

/// Info dictionary entries removed outright; an empty date is invalid.
const INFO_DATE_FIELDS: &[&[u8]] = &[b"CreationDate", b"ModDate"];

/// Blank the document information dictionary and drop the catalog's XMP
/// metadata stream.
///
/// Returns whether anything was present to scrub.
pub fn scrub_info(doc: &mut Document) -> bool {
    let mut touched = false;

    let info_id = doc.trailer.get(b"Info").ok().and_then(|o| o.as_reference().ok());
    if let Some(info) = info_id.and_then(|id| doc.objects.get_mut(&id)) {
        if let Ok(dict) = info.as_dict_mut() {
            for field in INFO_TEXT_FIELDS {
                dict.set(*field, Object::String(Vec::new(), StringFormat::Literal));
            }
            for field in INFO_DATE_FIELDS {
                dict.remove(field);
            }
            touched = true;
        }
    } else if let Ok(Object::Dictionary(dict)) = doc.trailer.get_mut(b"Info") {
        for field in INFO_TEXT_FIELDS {
            dict.set(*field, Object::String(Vec::new(), StringFormat::Literal));
        }
        for field in INFO_DATE_FIELDS {
            dict.remove(field);
        }
        touched = true;
    }

    let catalog_id = doc.trailer.get(b"Root").ok().and_then(|o| o.as_reference().ok());
    if let Some(catalog_id) = catalog_id {
        let xmp = doc
            .get_object_mut(catalog_id)
            .ok()
            .and_then(|catalog| catalog.as_dict_mut().ok())
            .and_then(|catalog| catalog.remove(b"Metadata"));
        if let Some(xmp) = xmp {
            if let Ok(id) = xmp.as_reference() {
                doc.objects.remove(&id);
            }
            touched = true;
        }
    }

    if touched {
        log::debug!("Scrubbed document information");
    }
    touched
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    #[test]
    fn test_scrub_info_and_xmp() {
        let mut doc = Document::with_version("1.5");
        let info = doc.add_object(dictionary! {
            "Title" => Object::string_literal("Board deck"),
            "Producer" => Object::string_literal("Gamma"),
            "CreationDate" => Object::string_literal("D:20240501100000Z"),
            "Custom" => Object::string_literal("kept"),
        });
        let xmp = doc.add_object(Stream::new(
            dictionary! { "Type" => "Metadata", "Subtype" => "XML" },
            b"<x:xmpmeta/>".to_vec(),
        ));
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Metadata" => xmp });
        doc.trailer.set("Root", catalog);
        doc.trailer.set("Info", info);

        assert!(scrub_info(&mut doc));

        let info = doc.get_object(info).unwrap().as_dict().unwrap();
        assert!(matches!(info.get(b"Title"), Ok(Object::String(s, _)) if s.is_empty()));
        assert!(matches!(info.get(b"Producer"), Ok(Object::String(s, _)) if s.is_empty()));
        assert!(info.get(b"CreationDate").is_err());
        assert!(matches!(info.get(b"Custom"), Ok(Object::String(s, _)) if s == b"kept"));

        assert!(doc.get_object(xmp).is_err());
        let catalog = doc.get_object(catalog).unwrap().as_dict().unwrap();
        assert!(catalog.get(b"Metadata").is_err());
    }

    #[test]
    fn test_scrub_without_info() {
        let mut doc = Document::with_version("1.5");
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog" });
        doc.trailer.set("Root", catalog);
        assert!(!scrub_info(&mut doc));
    }
}
