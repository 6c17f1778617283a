//! Page resource lookup and image XObject pruning.

use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeMap, HashSet};

/// Follow a reference to a dictionary, or return an inline one.
fn resolve_dict(doc: &Document, obj: &Object) -> Option<Dictionary> {
    match obj {
        Object::Dictionary(d) => Some(d.clone()),
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok().cloned(),
        _ => None,
    }
}

/// The Resources dictionary that applies to a page, inherited through the
/// page tree when the page itself has none.
pub fn effective_resources(doc: &Document, page_id: ObjectId) -> Option<Dictionary> {
    let mut current = doc.get_object(page_id).ok()?.as_dict().ok()?;
    // Bounded walk; a cyclic Parent chain must not hang
    for _ in 0..64 {
        if let Ok(obj) = current.get(b"Resources") {
            return resolve_dict(doc, obj);
        }
        match current.get(b"Parent") {
            Ok(Object::Reference(parent)) => {
                current = doc.get_object(*parent).ok()?.as_dict().ok()?;
            }
            _ => return None,
        }
    }
    None
}

/// XObject names usable on a page, mapped to their objects.
pub fn page_xobjects(doc: &Document, page_id: ObjectId) -> BTreeMap<Vec<u8>, ObjectId> {
    effective_resources(doc, page_id)
        .and_then(|res| res.get(b"XObject").ok().and_then(|x| resolve_dict(doc, x)))
        .map(|xobjects| {
            xobjects
                .iter()
                .filter_map(|(name, obj)| match obj {
                    Object::Reference(id) => Some((name.clone(), *id)),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Font dictionaries usable on a page, keyed by resource name.
pub fn page_fonts(doc: &Document, page_id: ObjectId) -> BTreeMap<Vec<u8>, Dictionary> {
    effective_resources(doc, page_id)
        .and_then(|res| res.get(b"Font").ok().and_then(|f| resolve_dict(doc, f)))
        .map(|fonts| {
            fonts
                .iter()
                .filter_map(|(name, obj)| Some((name.clone(), resolve_dict(doc, obj)?)))
                .collect()
        })
        .unwrap_or_default()
}

/// Pixel dimensions of an image XObject; `None` for forms and anything else.
pub fn image_dimensions(doc: &Document, id: ObjectId) -> Option<(u32, u32)> {
    let stream = doc.get_object(id).ok()?.as_stream().ok()?;
    match stream.dict.get(b"Subtype") {
        Ok(Object::Name(subtype)) if subtype == b"Image" => {}
        _ => return None,
    }
    let width = stream.dict.get(b"Width").ok()?.as_i64().ok()?;
    let height = stream.dict.get(b"Height").ok()?.as_i64().ok()?;
    Some((u32::try_from(width).ok()?, u32::try_from(height).ok()?))
}

/// Image XObjects referenced from the Resources of any form XObject.
///
/// Form content is not rewritten, so images a form draws are never pruned.
pub fn images_used_by_forms(doc: &Document) -> HashSet<ObjectId> {
    let mut used = HashSet::new();
    for obj in doc.objects.values() {
        let Object::Stream(stream) = obj else {
            continue;
        };
        match stream.dict.get(b"Subtype") {
            Ok(Object::Name(subtype)) if subtype == b"Form" => {}
            _ => continue,
        }
        let xobjects = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|r| resolve_dict(doc, r))
            .and_then(|res| res.get(b"XObject").ok().and_then(|x| resolve_dict(doc, x)));
        if let Some(xobjects) = xobjects {
            used.extend(xobjects.iter().filter_map(|(_, v)| v.as_reference().ok()));
        }
    }
    used
}

/// Remove XObject entries pointing at `targets` from every resource
/// dictionary in the document, then delete the targets and their masks.
///
/// Returns the ids that were deleted.
pub fn remove_xobjects(doc: &mut Document, targets: &HashSet<ObjectId>) -> Vec<ObjectId> {
    if targets.is_empty() {
        return Vec::new();
    }

    // XObject dictionaries stored as their own objects
    let mut shared_dicts = Vec::new();

    for obj in doc.objects.values_mut() {
        let dict = match obj {
            Object::Dictionary(d) => d,
            Object::Stream(s) => &mut s.dict,
            _ => continue,
        };
        if let Ok(Object::Dictionary(resources)) = dict.get_mut(b"Resources") {
            strip_entries(resources, targets, &mut shared_dicts);
        }
        // A Resources dictionary that is its own object
        strip_entries(dict, targets, &mut shared_dicts);
    }

    for id in shared_dicts {
        if let Some(Object::Dictionary(xobjects)) = doc.objects.get_mut(&id) {
            drop_references(xobjects, targets);
        }
    }

    let mut removed = Vec::new();
    for id in targets {
        let masks: Vec<ObjectId> = doc
            .get_object(*id)
            .ok()
            .and_then(|obj| obj.as_stream().ok())
            .map(|stream| {
                [b"SMask".as_slice(), b"Mask".as_slice()]
                    .iter()
                    .filter_map(|key| stream.dict.get(key).ok()?.as_reference().ok())
                    .collect()
            })
            .unwrap_or_default();

        if doc.objects.remove(id).is_some() {
            removed.push(*id);
            for mask in masks {
                doc.objects.remove(&mask);
            }
        }
    }
    removed.sort();
    removed
}

fn strip_entries(resources: &mut Dictionary, targets: &HashSet<ObjectId>, shared: &mut Vec<ObjectId>) {
    match resources.get_mut(b"XObject") {
        Ok(Object::Dictionary(xobjects)) => drop_references(xobjects, targets),
        Ok(Object::Reference(id)) => shared.push(*id),
        _ => {}
    }
}

fn drop_references(xobjects: &mut Dictionary, targets: &HashSet<ObjectId>) {
    let names: Vec<Vec<u8>> = xobjects
        .iter()
        .filter(|(_, v)| matches!(v, Object::Reference(id) if targets.contains(id)))
        .map(|(k, _)| k.clone())
        .collect();
    for name in names {
        log::debug!("Dropping XObject resource /{}", String::from_utf8_lossy(&name));
        xobjects.remove(&name);
    }
}
