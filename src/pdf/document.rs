use anyhow::{anyhow, Context, Result};
use chrono::Local;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};

use super::content::{build_form_xobject, strip_marked_content, OverlayBuilder};
use super::resources::{
    collect_references, page_media_box, page_resources, page_xobjects, update_page_resources,
    wrap_page_contents,
};
use super::stamp::{PageSize, StampRenderer};
use crate::config::{read_pdf_bytes, StampSettings, UserData};

/// Which pages of the document receive a stamp
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PageSelection {
    #[default]
    All,
    First,
    /// Zero-based page index
    Single(usize),
}

impl PageSelection {
    /// An explicit page index wins over `all_pages`; without either, only the first page.
    pub fn from_options(all_pages: bool, page_number: Option<usize>) -> Self {
        match (page_number, all_pages) {
            (Some(index), _) => PageSelection::Single(index),
            (None, true) => PageSelection::All,
            (None, false) => PageSelection::First,
        }
    }

    pub fn includes(&self, index: usize) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::First => index == 0,
            PageSelection::Single(selected) => index == *selected,
        }
    }
}

/// Outcome of a stamping run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampReport {
    pub page_count: usize,
    /// Zero-based indices of the pages that received a stamp
    pub stamped_pages: Vec<usize>,
}

/// Copies rendered stamp pages into a document as Form XObjects.
///
/// Every stamp page of a run embeds the same complete font under the same
/// resource name, so the fonts of the first import are shared by all later
/// forms instead of being copied again.
#[derive(Default)]
struct StampImporter {
    shared_fonts: Option<Dictionary>,
}

impl StampImporter {
    fn import(&mut self, doc: &mut Document, stamp_pdf: &[u8], page: PageSize) -> Result<ObjectId> {
        let mut stamp_doc = Document::load_mem(stamp_pdf)
            .with_context(|| "Failed to parse rendered stamp")?;
        stamp_doc.renumber_objects_with(doc.max_id + 1);

        let stamp_page_id = *stamp_doc.get_pages().values().next()
            .ok_or_else(|| anyhow!("Rendered stamp has no pages"))?;

        let content = strip_marked_content(&stamp_doc.get_page_content(stamp_page_id)?)?;
        let mut resources = page_resources(&stamp_doc, stamp_page_id)?;
        resources.remove(b"Properties");

        let own_fonts = match resources.get(b"Font") {
            Ok(Object::Reference(id)) => stamp_doc.get_dictionary(*id).ok().cloned(),
            Ok(Object::Dictionary(dict)) => Some(dict.clone()),
            _ => None,
        };
        if let Some(own) = own_fonts {
            let fonts = self.shared_fonts.get_or_insert_with(|| own.clone());
            if same_names(fonts, &own) {
                resources.set("Font", Object::Dictionary(fonts.clone()));
            }
        }

        let mut needed = BTreeSet::new();
        collect_references(&stamp_doc, &Object::Dictionary(resources.clone()), &mut needed);
        for id in needed {
            if let Some(object) = stamp_doc.objects.remove(&id) {
                doc.objects.insert(id, object);
            }
        }
        doc.max_id = doc.max_id.max(stamp_doc.max_id);

        let form = build_form_xobject(&content, [0.0, 0.0, page.width, page.height], resources)?;
        Ok(doc.add_object(form))
    }
}

fn same_names(a: &Dictionary, b: &Dictionary) -> bool {
    let names = |dict: &Dictionary| dict.iter().map(|(name, _)| name.clone()).collect::<BTreeSet<_>>();
    names(a) == names(b)
}

/// Stamp the selected pages of `doc` in place
pub fn stamp_document(
    doc: &mut Document,
    user: &UserData,
    selection: PageSelection,
    renderer: &StampRenderer,
) -> Result<StampReport> {
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    let page_count = page_ids.len();

    if let PageSelection::Single(index) = selection {
        if index >= page_count {
            warn!("page index {} is out of range for a {}-page document; nothing is stamped", index, page_count);
        }
    }

    let mut importer = StampImporter::default();
    let mut stamped_pages = Vec::new();
    for (index, page_id) in page_ids.into_iter().enumerate() {
        if !selection.includes(index) {
            continue;
        }

        let size = PageSize::from_media_box(&page_media_box(doc, page_id)?);
        debug!("stamping page {} ({} x {} pt)", index, size.width, size.height);

        let signed_at = Local::now().naive_local();
        let stamp_pdf = renderer.render(user, size, &signed_at)?;
        let form_id = importer.import(doc, &stamp_pdf, size)
            .with_context(|| format!("Failed to merge stamp onto page {}", index))?;

        let mut overlay = OverlayBuilder::new();
        let name = overlay.add_form(form_id, &page_xobjects(doc, page_id)?);
        debug!("page {} paints the stamp as /{}", index, name);
        update_page_resources(doc, page_id, &overlay.xobjects)?;
        wrap_page_contents(doc, page_id, overlay.build_content_bytes())?;

        stamped_pages.push(index);
    }

    Ok(StampReport { page_count, stamped_pages })
}

/// Read `input`, stamp the selected pages and write the result to `output`.
///
/// An existing `output` file is overwritten.
pub fn add_signature_stamp(
    input: &Path,
    output: &Path,
    user: &UserData,
    selection: PageSelection,
    settings: &StampSettings,
) -> Result<StampReport> {
    let pdf_bytes = read_pdf_bytes(input)?;
    let mut doc = Document::load_mem(&pdf_bytes)
        .with_context(|| format!("Failed to parse PDF {:?}", input))?;

    let renderer = StampRenderer::new(settings)?;
    let report = stamp_document(&mut doc, user, selection, &renderer)?;

    doc.save(output)
        .with_context(|| format!("Failed to write {:?}", output))?;
    info!(
        "stamped {} of {} pages into {:?}",
        report.stamped_pages.len(),
        report.page_count,
        output
    );

    Ok(report)
}
