use anyhow::{anyhow, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::BTreeSet;

/// Page attributes that a page may inherit from its ancestors in the page tree
fn inherited_attribute<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    // Bounded walk; malformed files can contain Parent cycles.
    for _ in 0..64 {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Result<&'a Object> {
    match object {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        other => Ok(other),
    }
}

fn number(doc: &Document, object: &Object) -> Result<f64> {
    match resolve(doc, object)? {
        Object::Integer(i) => Ok(*i as f64),
        Object::Real(f) => Ok(f64::from(*f)),
        other => Err(anyhow!("Expected a number, found {:?}", other)),
    }
}

/// The page's MediaBox as `[llx, lly, urx, ury]`, following inheritance
pub fn page_media_box(doc: &Document, page_id: ObjectId) -> Result<[f64; 4]> {
    let media_box = inherited_attribute(doc, page_id, b"MediaBox")
        .ok_or_else(|| anyhow!("Page {:?} has no MediaBox", page_id))?;
    let values = resolve(doc, media_box)?.as_array()?;
    if values.len() != 4 {
        return Err(anyhow!("Malformed MediaBox on page {:?}", page_id));
    }

    let mut rect = [0.0; 4];
    for (slot, value) in rect.iter_mut().zip(values) {
        *slot = number(doc, value)?;
    }
    Ok(rect)
}

/// Effective resource dictionary of a page, own or inherited, as an owned copy
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    match inherited_attribute(doc, page_id, b"Resources") {
        Some(resources) => Ok(resolve(doc, resources)?.as_dict()?.clone()),
        None => Ok(Dictionary::new()),
    }
}

/// The XObject dictionary of a page's effective resources
pub fn page_xobjects(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    match page_resources(doc, page_id)?.get(b"XObject") {
        Ok(xobj) => Ok(resolve(doc, xobj)?.as_dict()?.clone()),
        Err(_) => Ok(Dictionary::new()),
    }
}

/// Add XObjects to a page's resources
///
/// The merged dictionary is stored inline on the page, so pages that share
/// a resource dictionary with this one keep their original resources.
pub fn update_page_resources(
    doc: &mut Document,
    page_id: ObjectId,
    xobject_dict: &Dictionary,
) -> Result<()> {
    let mut resources = page_resources(doc, page_id)?;

    let mut xobject_resources = page_xobjects(doc, page_id)?;
    for (key, value) in xobject_dict.iter() {
        xobject_resources.set(key.to_vec(), value.clone());
    }
    resources.set("XObject", Object::Dictionary(xobject_resources));

    doc.get_dictionary_mut(page_id)?
        .set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Isolate the page's existing content in `q … Q` and append `overlay` after it
pub fn wrap_page_contents(doc: &mut Document, page_id: ObjectId, overlay: Vec<u8>) -> Result<()> {
    let existing = doc.get_dictionary(page_id)?.get(b"Contents").ok().cloned();

    let mut contents = match existing {
        Some(Object::Reference(id)) => match doc.get_object(id)? {
            Object::Array(items) => items.clone(),
            _ => vec![Object::Reference(id)],
        },
        Some(Object::Array(items)) => items,
        _ => Vec::new(),
    };

    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let mut closing = b"\nQ\n".to_vec();
    closing.extend(overlay);
    let close_id = doc.add_object(Stream::new(Dictionary::new(), closing));

    contents.insert(0, Object::Reference(open_id));
    contents.push(Object::Reference(close_id));

    doc.get_dictionary_mut(page_id)?
        .set("Contents", Object::Array(contents));
    Ok(())
}

/// Collect every object id reachable from `object`
pub fn collect_references(doc: &Document, object: &Object, found: &mut BTreeSet<ObjectId>) {
    match object {
        Object::Reference(id) => {
            if found.insert(*id) {
                if let Ok(target) = doc.get_object(*id) {
                    collect_references(doc, target, found);
                }
            }
        }
        Object::Array(items) => {
            for item in items {
                collect_references(doc, item, found);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter() {
                collect_references(doc, value, found);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter() {
                collect_references(doc, value, found);
            }
        }
        _ => {}
    }
}
