//! Content stream generation for the stamp overlay.
//!
//! This module provides:
//! - Conversion of a rendered stamp page into a Form XObject
//! - The operators that paint the form on a target page
//! - Stream compression

use anyhow::Result;
use lopdf::content::Content;
use lopdf::{Dictionary, Object, ObjectId, Stream};
use std::io::Write;

/// Builder for the content appended to a stamped page and the XObjects it uses
pub struct OverlayBuilder {
    pub content_parts: Vec<String>,
    pub xobjects: Dictionary,
}

impl OverlayBuilder {
    pub fn new() -> Self {
        Self {
            content_parts: Vec::new(),
            xobjects: Dictionary::new(),
        }
    }

    /// Paint a form XObject with its origin on the page origin.
    ///
    /// The resource name avoids every name in `existing`, the page's own XObjects.
    pub fn add_form(&mut self, form_id: ObjectId, existing: &Dictionary) -> String {
        let taken = |name: &str| existing.has(name.as_bytes()) || self.xobjects.has(name.as_bytes());

        let mut name = format!("Stamp{}", form_id.0);
        let mut suffix = 1;
        while taken(&name) {
            name = format!("Stamp{}_{}", form_id.0, suffix);
            suffix += 1;
        }

        self.xobjects.set(name.clone(), Object::Reference(form_id));
        self.content_parts.push(format!("q /{} Do Q\n", name));
        name
    }

    /// Build the final content bytes
    pub fn build_content_bytes(&self) -> Vec<u8> {
        self.content_parts.join("").into_bytes()
    }
}

impl Default for OverlayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop marked-content sections (`BDC`/`EMC`) that tie the content to
/// optional content groups of the document it came from.
pub fn strip_marked_content(content: &[u8]) -> Result<Vec<u8>> {
    let mut decoded = Content::decode(content)?;
    decoded
        .operations
        .retain(|op| !matches!(op.operator.as_str(), "BDC" | "BMC" | "EMC"));
    Ok(decoded.encode()?)
}

/// Wrap page content into a Form XObject covering `bbox`
pub fn build_form_xobject(content: &[u8], bbox: [f64; 4], resources: Dictionary) -> Result<Stream> {
    let mut dict = Dictionary::new();
    dict.set("Type", "XObject");
    dict.set("Subtype", "Form");
    dict.set("FormType", 1_i64);
    dict.set(
        "BBox",
        bbox.iter().map(|v| Object::Real(*v as f32)).collect::<Vec<_>>(),
    );
    dict.set("Resources", Object::Dictionary(resources));
    dict.set("Filter", "FlateDecode");

    Ok(Stream::new(dict, compress_data(content)?))
}

/// Compress data using zlib/flate2
pub fn compress_data(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_overlay_builder_new() {
        let builder = OverlayBuilder::new();
        assert!(builder.content_parts.is_empty());
        assert!(builder.xobjects.is_empty());
        assert!(builder.build_content_bytes().is_empty());
    }

    #[test]
    fn test_overlay_builder_add_form() {
        let mut builder = OverlayBuilder::new();
        let name = builder.add_form((42, 0), &Dictionary::new());

        assert_eq!(name, "Stamp42");
        assert_eq!(builder.build_content_bytes(), b"q /Stamp42 Do Q\n".to_vec());
        assert_eq!(
            builder.xobjects.get(b"Stamp42").unwrap().as_reference().unwrap(),
            (42, 0)
        );
    }

    #[test]
    fn test_overlay_builder_avoids_existing_names() {
        let mut existing = Dictionary::new();
        existing.set("Stamp42", Object::Reference((7, 0)));
        existing.set("Stamp42_1", Object::Reference((8, 0)));

        let mut builder = OverlayBuilder::new();
        let name = builder.add_form((42, 0), &existing);

        assert_eq!(name, "Stamp42_2");
        assert_eq!(builder.build_content_bytes(), b"q /Stamp42_2 Do Q\n".to_vec());
        assert!(!builder.xobjects.has(b"Stamp42"));
    }

    #[test]
    fn test_strip_marked_content() {
        let content = b"/OC /MC0 BDC\nq 0.5 w 10 10 m 20 20 l S Q\nEMC\n";
        let stripped = strip_marked_content(content).unwrap();
        let ops: Vec<String> = Content::decode(&stripped)
            .unwrap()
            .operations
            .into_iter()
            .map(|op| op.operator)
            .collect();

        assert_eq!(ops, vec!["q", "w", "m", "l", "S", "Q"]);
    }

    #[test]
    fn test_form_xobject_is_compressed() {
        let content = b"0 0 m 10 10 l S";
        let form = build_form_xobject(content, [0.0, 0.0, 612.0, 792.0], Dictionary::new()).unwrap();

        assert!(matches!(form.dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Form"));
        assert_eq!(form.dict.get(b"BBox").unwrap().as_array().unwrap().len(), 4);
        assert_ne!(form.content, content.to_vec());
        assert_eq!(form.decompressed_content().unwrap(), content.to_vec());
    }
}
