//! Link annotation removal.

use lopdf::{Document, Object, ObjectId};

/// URI of a link annotation, if it is one.
fn link_uri(doc: &Document, annotation: &Object) -> Option<String> {
    let dict = match annotation {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok()?,
        Object::Dictionary(d) => d,
        _ => return None,
    };
    match dict.get(b"Subtype") {
        Ok(Object::Name(subtype)) if subtype == b"Link" => {}
        _ => return None,
    }

    let action = match dict.get(b"A").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok()?,
        Object::Dictionary(d) => d,
        _ => return None,
    };
    match action.get(b"URI").ok()? {
        Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

/// Remove link annotations whose URI satisfies `is_watermark` from a page.
///
/// Returns the URIs of the removed annotations. Annotation objects that were
/// stored indirectly are deleted from the document.
pub fn remove_link_annotations(
    doc: &mut Document,
    page_id: ObjectId,
    is_watermark: impl Fn(&str) -> bool,
) -> lopdf::Result<Vec<String>> {
    let annots = match doc.get_object(page_id)?.as_dict()?.get(b"Annots") {
        Ok(obj) => obj.clone(),
        Err(_) => return Ok(Vec::new()),
    };

    // Annots is either inline or a reference to a shared array
    let (shared_array, entries) = match annots {
        Object::Array(entries) => (None, entries),
        Object::Reference(id) => (Some(id), doc.get_object(id)?.as_array()?.clone()),
        _ => return Ok(Vec::new()),
    };

    let mut kept = Vec::with_capacity(entries.len());
    let mut removed = Vec::new();
    let mut dead_objects = Vec::new();
    for entry in entries {
        match link_uri(doc, &entry) {
            Some(uri) if is_watermark(&uri) => {
                if let Object::Reference(id) = entry {
                    dead_objects.push(id);
                }
                removed.push(uri);
            }
            _ => kept.push(entry),
        }
    }

    if removed.is_empty() {
        return Ok(removed);
    }

    match shared_array {
        Some(id) => {
            doc.objects.insert(id, Object::Array(kept));
        }
        None => {
            let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
            if kept.is_empty() {
                page.remove(b"Annots");
            } else {
                page.set("Annots", Object::Array(kept));
            }
        }
    }

    for id in dead_objects {
        doc.objects.remove(&id);
    }
    Ok(removed)
}
