//! Rendering of the signature stamp as a standalone one-page PDF.
//!
//! The stamp page has the size of the page it will be merged onto; the box and
//! text sit at fixed offsets from the page origin.

use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;
use printpdf::{Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, Point, Rgb};
use tracing::debug;

use super::fonts::{resolve_stamp_font, StampFont, StandardFont};
use crate::config::{StampLabels, StampLayout, StampSettings, UserData, POINTS_PER_MM};

/// Page size in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub fn from_media_box(media_box: &[f64; 4]) -> Self {
        Self {
            width: (media_box[2] - media_box[0]).abs(),
            height: (media_box[3] - media_box[1]).abs(),
        }
    }
}

fn mm(points: f64) -> Mm {
    Mm((points / POINTS_PER_MM) as f32)
}

pub fn format_signing_time(signed_at: &NaiveDateTime, labels: &StampLabels) -> String {
    signed_at.format(&labels.time_format).to_string()
}

/// The five text lines of the stamp, top to bottom
pub fn stamp_lines(user: &UserData, signed_at: &NaiveDateTime, labels: &StampLabels) -> [String; 5] {
    [
        labels.heading.clone(),
        format!("{}: {}", labels.signer, user.name),
        format!("{}: {}", labels.signed_at, format_signing_time(signed_at, labels)),
        format!("{}:", labels.fingerprint),
        user.signature_hash.clone(),
    ]
}

fn stamp_color(layout: &StampLayout) -> Color {
    let [r, g, b] = layout.color;
    Color::Rgb(Rgb::new(
        f32::from(r) / 255.0,
        f32::from(g) / 255.0,
        f32::from(b) / 255.0,
        None,
    ))
}

/// Closed outline of the stamp box
fn frame_outline(layout: &StampLayout) -> Line {
    let left = layout.x.as_points();
    let bottom = layout.y.as_points();
    let right = left + layout.width.as_points();
    let top = bottom + layout.height.as_points();

    let points = [(left, bottom), (right, bottom), (right, top), (left, top)]
        .into_iter()
        .map(|(x, y)| (Point::new(mm(x), mm(y)), false))
        .collect();

    Line {
        points,
        is_closed: true,
    }
}

pub struct StampRenderer<'a> {
    settings: &'a StampSettings,
    font: StampFont,
    fallback: StandardFont,
}

impl<'a> StampRenderer<'a> {
    /// Resolve the stamp font once; every rendered stamp reuses the decision.
    pub fn new(settings: &'a StampSettings) -> Result<Self> {
        settings.validate()?;
        let fallback = settings.fallback()?;
        let font = resolve_stamp_font(settings.font.as_deref(), fallback);
        Ok(Self { settings, font, fallback })
    }

    fn register_font(&self, doc: &PdfDocumentReference) -> Result<IndirectFontRef> {
        if let StampFont::TrueType(font) = &self.font {
            match doc.add_external_font(font.data.as_slice()) {
                Ok(font_ref) => return Ok(font_ref),
                Err(err) => debug!("font '{}' could not be registered: {}", font.family, err),
            }
        }
        doc.add_builtin_font(self.fallback.builtin())
            .map_err(|e| anyhow!("Failed to register built-in font {:?}: {}", self.fallback, e))
    }

    /// Render the stamp for a page of `page` size, signed at `signed_at`.
    pub fn render(&self, user: &UserData, page: PageSize, signed_at: &NaiveDateTime) -> Result<Vec<u8>> {
        let layout = &self.settings.stamp;
        let (doc, page_index, layer_index) =
            PdfDocument::new("Signature stamp", mm(page.width), mm(page.height), "Stamp");
        let font = self.register_font(&doc)?;
        let layer = doc.get_page(page_index).get_layer(layer_index);

        layer.set_outline_color(stamp_color(layout));
        layer.set_outline_thickness(layout.line_width.as_points() as f32);
        layer.add_line(frame_outline(layout));

        layer.set_fill_color(stamp_color(layout));
        let font_size = layout.font_size.as_points() as f32;
        let text_x = layout.x.as_points() + layout.padding.as_points();
        let first_baseline =
            layout.y.as_points() + layout.height.as_points() - layout.first_line_offset.as_points();

        for (i, line) in stamp_lines(user, signed_at, &self.settings.labels).iter().enumerate() {
            let baseline = first_baseline - i as f64 * layout.line_spacing.as_points();
            layer.use_text(line.as_str(), font_size, mm(text_x), mm(baseline), &font);
        }

        doc.save_to_bytes()
            .map_err(|e| anyhow!("Failed to serialize stamp page: {}", e))
    }
}
