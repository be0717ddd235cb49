use fontdb::Database;
use printpdf::BuiltinFont;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use ttf_parser::{name_id, Face};

/// Standard PDF Type1 fonts usable without embedding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl StandardFont {
    pub fn builtin(&self) -> BuiltinFont {
        match self {
            StandardFont::Helvetica => BuiltinFont::Helvetica,
            StandardFont::HelveticaBold => BuiltinFont::HelveticaBold,
            StandardFont::HelveticaOblique => BuiltinFont::HelveticaOblique,
            StandardFont::HelveticaBoldOblique => BuiltinFont::HelveticaBoldOblique,
            StandardFont::TimesRoman => BuiltinFont::TimesRoman,
            StandardFont::TimesBold => BuiltinFont::TimesBold,
            StandardFont::TimesItalic => BuiltinFont::TimesItalic,
            StandardFont::TimesBoldItalic => BuiltinFont::TimesBoldItalic,
            StandardFont::Courier => BuiltinFont::Courier,
            StandardFont::CourierBold => BuiltinFont::CourierBold,
            StandardFont::CourierOblique => BuiltinFont::CourierOblique,
            StandardFont::CourierBoldOblique => BuiltinFont::CourierBoldOblique,
        }
    }

    /// Parse a font name into a StandardFont
    pub fn from_name(name: &str) -> Option<StandardFont> {
        let name_lower = name.trim().to_lowercase();
        match name_lower.as_str() {
            "helvetica" => Some(StandardFont::Helvetica),
            "helvetica-bold" => Some(StandardFont::HelveticaBold),
            "helvetica-oblique" => Some(StandardFont::HelveticaOblique),
            "helvetica-boldoblique" => Some(StandardFont::HelveticaBoldOblique),
            "times" | "times-roman" => Some(StandardFont::TimesRoman),
            "times-bold" => Some(StandardFont::TimesBold),
            "times-italic" => Some(StandardFont::TimesItalic),
            "times-bolditalic" => Some(StandardFont::TimesBoldItalic),
            "courier" => Some(StandardFont::Courier),
            "courier-bold" => Some(StandardFont::CourierBold),
            "courier-oblique" => Some(StandardFont::CourierOblique),
            "courier-boldoblique" => Some(StandardFont::CourierBoldOblique),
            _ => None,
        }
    }
}

/// A font file that parsed as a TrueType/OpenType face
#[derive(Debug, Clone)]
pub struct TrueTypeFont {
    pub data: Vec<u8>,
    pub family: String,
    pub path: PathBuf,
}

impl TrueTypeFont {
    /// Read and parse a font file. Any failure yields `None`.
    pub fn probe(path: &Path) -> Option<TrueTypeFont> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(err) => {
                debug!("cannot read font {:?}: {}", path, err);
                return None;
            }
        };

        let family = match Face::parse(&data, 0) {
            Ok(face) => family_name(&face),
            Err(err) => {
                debug!("{:?} is not a usable font: {}", path, err);
                return None;
            }
        };

        let family = family.unwrap_or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string()
        });

        Some(TrueTypeFont { data, family, path: path.to_path_buf() })
    }
}

fn family_name(face: &Face) -> Option<String> {
    face.names()
        .into_iter()
        .filter(|name| name.name_id == name_id::FAMILY && name.is_unicode())
        .find_map(|name| name.to_string())
}

/// Font used for the stamp text
#[derive(Debug, Clone)]
pub enum StampFont {
    TrueType(TrueTypeFont),
    Builtin(StandardFont),
}

/// Decide the stamp font once per run.
///
/// The requested font wins when it can be located and parsed; anything else
/// selects the fallback.
pub fn resolve_stamp_font(requested: Option<&str>, fallback: StandardFont) -> StampFont {
    match requested.and_then(locate_true_type_font) {
        Some(font) => {
            debug!("using font '{}' from {:?}", font.family, font.path);
            StampFont::TrueType(font)
        }
        None => {
            debug!("falling back to built-in font {:?}", fallback);
            StampFont::Builtin(fallback)
        }
    }
}

/// Locate a font by file path, or by family name among the system fonts.
///
/// `"arial.ttf"` that is not an existing file is looked up as family `arial`.
pub fn locate_true_type_font(requested: &str) -> Option<TrueTypeFont> {
    let path = Path::new(requested);
    if path.is_file() {
        return TrueTypeFont::probe(path);
    }

    let family = path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(requested);
    find_system_font(family).and_then(|found| TrueTypeFont::probe(&found))
}

/// Find a system font file by family name, case-insensitively.
///
/// The regular face of the family is preferred when there are several.
pub fn find_system_font(family: &str) -> Option<PathBuf> {
    if family.is_empty() {
        return None;
    }

    let mut db = Database::new();
    db.load_system_fonts();

    let matches: Vec<_> = db
        .faces()
        .filter(|face| face.families.iter().any(|(name, _)| name.eq_ignore_ascii_case(family)))
        .filter_map(|face| match &face.source {
            fontdb::Source::File(path) => Some((face, path.clone())),
            _ => None,
        })
        .collect();

    matches
        .iter()
        .find(|(face, _)| face.style == fontdb::Style::Normal && face.weight == fontdb::Weight::NORMAL)
        .or_else(|| matches.first())
        .map(|(_, path)| path.clone())
}
