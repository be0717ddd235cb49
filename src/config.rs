//! Configuration loading and parsing.
//!
//! This module handles:
//! - Loading and parsing settings.json (stamp geometry, labels, fonts)
//! - Loading signer data (name and signature hash)
//! - Unit conversion for dimensions (mm, cm, in, pt)
//! - Dimension type with flexible deserialization

use anyhow::{anyhow, Context, Result};
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Deserializer};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::pdf::fonts::StandardFont;

/// 1 inch = 72 points = 25.4 mm
pub const POINTS_PER_MM: f64 = 72.0 / 25.4;

/// Dimension value that can be specified as:
/// - A number (interpreted as points)
/// - A string with unit: e.g., "100 mm", "10 cm", "1 in" (inches)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimension(pub f64);

impl Dimension {
    pub fn mm(value: f64) -> Self {
        Dimension(value * POINTS_PER_MM)
    }

    /// Convert to points (internal PDF unit)
    pub fn as_points(&self) -> f64 {
        self.0
    }

    #[cfg(test)]
    fn as_mm(&self) -> f64 {
        self.0 / POINTS_PER_MM
    }
}

fn unit_to_points(num: f64, unit: &str) -> Option<f64> {
    match unit {
        "" | "pt" | "point" | "points" => Some(num),
        "mm" => Some(num * POINTS_PER_MM),
        "cm" => Some(num * POINTS_PER_MM * 10.0),
        "in" | "inch" | "inches" => Some(num * 72.0),
        _ => None,
    }
}

impl<'de> Deserialize<'de> for Dimension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DimensionVisitor;

        impl serde::de::Visitor<'_> for DimensionVisitor {
            type Value = Dimension;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a number or a string with unit (e.g., \"130 mm\", \"3 cm\", \"1 in\")")
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Dimension(value as f64))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Dimension(value as f64))
            }

            fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Dimension(value))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let value = value.trim();
                let split = value
                    .find(|c: char| c.is_alphabetic() || c.is_whitespace())
                    .unwrap_or(value.len());
                let (num_str, unit) = value.split_at(split);
                let unit = unit.trim().to_lowercase();

                let num: f64 = num_str.trim().parse().map_err(|_| {
                    E::custom(format!("invalid number in dimension: {}", num_str))
                })?;

                unit_to_points(num, &unit).map(Dimension).ok_or_else(|| {
                    E::custom(format!("unknown unit '{}'. Supported: mm, cm, in, pt", unit))
                })
            }
        }

        deserializer.deserialize_any(DimensionVisitor)
    }
}

/// Accepts a missing key, `null`, or a string.
fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Data about the signer printed inside the stamp.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UserData {
    #[serde(deserialize_with = "string_or_empty")]
    pub name: String,
    #[serde(deserialize_with = "string_or_empty")]
    pub signature_hash: String,
}

/// Geometry and colour of the stamp box, relative to the page origin.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StampLayout {
    pub x: Dimension,
    pub y: Dimension,
    pub width: Dimension,
    pub height: Dimension,
    /// Gap between the left edge of the box and the text
    pub padding: Dimension,
    /// Distance from the top edge of the box to the first baseline
    pub first_line_offset: Dimension,
    pub line_spacing: Dimension,
    pub font_size: Dimension,
    pub line_width: Dimension,
    /// 8-bit RGB components
    pub color: [u8; 3],
}

impl Default for StampLayout {
    fn default() -> Self {
        Self {
            x: Dimension::mm(130.0),
            y: Dimension::mm(10.0),
            width: Dimension::mm(75.0),
            height: Dimension::mm(30.0),
            padding: Dimension::mm(2.0),
            first_line_offset: Dimension::mm(4.0),
            line_spacing: Dimension::mm(4.0),
            font_size: Dimension(9.0),
            line_width: Dimension(0.5),
            color: [0, 0, 80],
        }
    }
}

/// Static text of the stamp.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StampLabels {
    pub heading: String,
    pub signer: String,
    pub signed_at: String,
    pub fingerprint: String,
    /// chrono strftime pattern for the signing time
    pub time_format: String,
}

impl Default for StampLabels {
    fn default() -> Self {
        Self {
            heading: "Signed with a simple electronic signature".to_string(),
            signer: "Signer".to_string(),
            signed_at: "Time of signing".to_string(),
            fingerprint: "Digital fingerprint of signature".to_string(),
            time_format: "%d.%m.%Y at %H:%M".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StampSettings {
    /// TrueType font file or system family name; `None` goes straight to the fallback
    pub font: Option<String>,
    pub fallback_font: String,
    pub stamp: StampLayout,
    pub labels: StampLabels,
}

impl Default for StampSettings {
    fn default() -> Self {
        Self {
            font: Some("arial.ttf".to_string()),
            fallback_font: "Helvetica".to_string(),
            stamp: StampLayout::default(),
            labels: StampLabels::default(),
        }
    }
}

impl StampSettings {
    pub fn fallback(&self) -> Result<StandardFont> {
        StandardFont::from_name(&self.fallback_font)
            .ok_or_else(|| anyhow!("Unknown fallback font '{}'", self.fallback_font))
    }

    pub fn validate(&self) -> Result<()> {
        self.fallback()?;
        if StrftimeItems::new(&self.labels.time_format).any(|item| matches!(item, Item::Error)) {
            return Err(anyhow!("Invalid time format '{}'", self.labels.time_format));
        }
        Ok(())
    }
}

/// Helper function to open a file with consistent error context
fn open_file_with_context(path: &Path, description: &str) -> Result<File> {
    File::open(path)
        .with_context(|| format!("Failed to open {} at {:?}", description, path))
}

pub fn load_settings_config(path: &Path) -> Result<StampSettings> {
    let file = open_file_with_context(path, "settings")?;
    let reader = BufReader::new(file);
    let settings: StampSettings = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to parse settings {:?}", path))?;
    settings.validate()?;
    Ok(settings)
}

pub fn load_user_data(path: &Path) -> Result<UserData> {
    let file = open_file_with_context(path, "user data")?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse user data {:?}", path))
}

pub fn read_pdf_bytes(path: &Path) -> Result<Vec<u8>> {
    let file = open_file_with_context(path, "input PDF")?;
    let mut buf = Vec::new();
    let mut reader = BufReader::new(file);
    reader.read_to_end(&mut buf)
        .with_context(|| format!("Failed to read {:?}", path))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_dimension_from_number() {
        let dim: Dimension = serde_json::from_value(json!(9)).unwrap();
        assert_eq!(dim.as_points(), 9.0);
        let dim: Dimension = serde_json::from_value(json!(0.5)).unwrap();
        assert_eq!(dim.as_points(), 0.5);
    }

    #[test]
    fn test_dimension_units() {
        let mm: Dimension = serde_json::from_value(json!("130 mm")).unwrap();
        assert!((mm.as_points() - 368.50).abs() < 0.01);

        let cm: Dimension = serde_json::from_value(json!("3 cm")).unwrap();
        assert!((cm.as_points() - 85.04).abs() < 0.01);

        let inch: Dimension = serde_json::from_value(json!("1 inch")).unwrap();
        assert_eq!(inch.as_points(), 72.0);

        let pt: Dimension = serde_json::from_value(json!("12 pt")).unwrap();
        assert_eq!(pt.as_points(), 12.0);
    }

    #[test]
    fn test_dimension_without_space_and_mixed_case() {
        let dim: Dimension = serde_json::from_value(json!("  75MM ")).unwrap();
        assert!((dim.as_mm() - 75.0).abs() < 1e-9);
        let dim: Dimension = serde_json::from_value(json!("10pt")).unwrap();
        assert_eq!(dim.as_points(), 10.0);
    }

    #[test]
    fn test_dimension_invalid() {
        assert!(serde_json::from_value::<Dimension>(json!("100 furlongs")).is_err());
        assert!(serde_json::from_value::<Dimension>(json!("abc mm")).is_err());
    }

    #[test]
    fn test_user_data_missing_keys_are_empty() {
        let user: UserData = serde_json::from_value(json!({"email": "x@example.com"})).unwrap();
        assert_eq!(user, UserData::default());

        let user: UserData = serde_json::from_value(json!({"name": null, "signature_hash": "ab12"})).unwrap();
        assert_eq!(user.name, "");
        assert_eq!(user.signature_hash, "ab12");
    }

    #[test]
    fn test_default_layout_matches_stamp_geometry() {
        let layout = StampLayout::default();
        // 1 mm = 2.8346 pt
        assert!((layout.x.as_points() - 130.0 * 2.8346).abs() < 0.01);
        assert!((layout.y.as_points() - 10.0 * 2.8346).abs() < 0.01);
        assert!((layout.width.as_points() - 75.0 * 2.8346).abs() < 0.01);
        assert!((layout.height.as_points() - 30.0 * 2.8346).abs() < 0.01);
        assert_eq!(layout.font_size.as_points(), 9.0);
        assert_eq!(layout.color, [0, 0, 80]);
    }

    #[test]
    fn test_partial_settings_keep_defaults() {
        let settings: StampSettings = serde_json::from_value(json!({
            "font": null,
            "stamp": { "x": "20 mm", "color": [10, 20, 30] },
            "labels": { "signer": "Подписант" }
        }))
        .unwrap();

        assert!(settings.font.is_none());
        assert!((settings.stamp.x.as_mm() - 20.0).abs() < 1e-9);
        assert!((settings.stamp.width.as_mm() - 75.0).abs() < 1e-9);
        assert_eq!(settings.stamp.color, [10, 20, 30]);
        assert_eq!(settings.labels.signer, "Подписант");
        assert_eq!(settings.labels.heading, StampLabels::default().heading);
        assert_eq!(settings.fallback_font, "Helvetica");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = StampSettings::default();
        assert!(settings.validate().is_ok());

        settings.fallback_font = "Comic Sans".to_string();
        assert!(settings.validate().is_err());

        settings.fallback_font = "courier".to_string();
        settings.labels.time_format = "%d.%m.%Y %Q".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_settings_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"fallback_font": "Times-Roman", "stamp": {"line_spacing": "5 mm"}}"#).unwrap();

        let settings = load_settings_config(&path).unwrap();
        assert_eq!(settings.fallback().unwrap(), StandardFont::TimesRoman);
        assert!((settings.stamp.line_spacing.as_mm() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_files_report_path() {
        let err = load_user_data(Path::new("/nonexistent/user.json")).unwrap_err();
        assert!(err.to_string().contains("user data"));
        assert!(read_pdf_bytes(Path::new("/nonexistent/input.pdf")).is_err());
    }
}
