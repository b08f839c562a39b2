//! Brand palette produced by the design stage.
//!
//! A palette always carries exactly five semantic colour roles. Generated
//! output is parsed strictly: the text must contain a JSON object, and every
//! role that is missing or not a hex colour is replaced by its default.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_PRIMARY: &str = "#0062FF";
pub const DEFAULT_SECONDARY: &str = "#FFC107";
pub const DEFAULT_TEXT_LIGHT: &str = "#FFFFFF";
pub const DEFAULT_TEXT_DARK: &str = "#212121";
pub const DEFAULT_BACKGROUND: &str = "#F5F5F5";

static HEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{6}|[0-9a-fA-F]{3})$").expect("valid regex"));

static FENCED_JSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid regex"));

// ---------------------------------------------------------------------------
// PaletteRole
// ---------------------------------------------------------------------------

/// The five semantic colour roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteRole {
    Primary,
    Secondary,
    TextLight,
    TextDark,
    Background,
}

impl PaletteRole {
    pub const ALL: [PaletteRole; 5] = [
        Self::Primary,
        Self::Secondary,
        Self::TextLight,
        Self::TextDark,
        Self::Background,
    ];

    /// JSON key for this role.
    pub fn key(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::TextLight => "text_light",
            Self::TextDark => "text_dark",
            Self::Background => "background",
        }
    }

    pub fn default_hex(self) -> &'static str {
        match self {
            Self::Primary => DEFAULT_PRIMARY,
            Self::Secondary => DEFAULT_SECONDARY,
            Self::TextLight => DEFAULT_TEXT_LIGHT,
            Self::TextDark => DEFAULT_TEXT_DARK,
            Self::Background => DEFAULT_BACKGROUND,
        }
    }
}

// ---------------------------------------------------------------------------
// BrandPalette
// ---------------------------------------------------------------------------

/// A complete five-role palette of `#RRGGBB` strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandPalette {
    pub primary: String,
    pub secondary: String,
    pub text_light: String,
    pub text_dark: String,
    pub background: String,
}

impl Default for BrandPalette {
    fn default() -> Self {
        Self {
            primary: DEFAULT_PRIMARY.to_string(),
            secondary: DEFAULT_SECONDARY.to_string(),
            text_light: DEFAULT_TEXT_LIGHT.to_string(),
            text_dark: DEFAULT_TEXT_DARK.to_string(),
            background: DEFAULT_BACKGROUND.to_string(),
        }
    }
}

impl BrandPalette {
    pub fn get(&self, role: PaletteRole) -> &str {
        match role {
            PaletteRole::Primary => &self.primary,
            PaletteRole::Secondary => &self.secondary,
            PaletteRole::TextLight => &self.text_light,
            PaletteRole::TextDark => &self.text_dark,
            PaletteRole::Background => &self.background,
        }
    }

    fn slot(&mut self, role: PaletteRole) -> &mut String {
        match role {
            PaletteRole::Primary => &mut self.primary,
            PaletteRole::Secondary => &mut self.secondary,
            PaletteRole::TextLight => &mut self.text_light,
            PaletteRole::TextDark => &mut self.text_dark,
            PaletteRole::Background => &mut self.background,
        }
    }

    /// True when every role holds a normalized `#RRGGBB` value.
    pub fn is_valid(&self) -> bool {
        PaletteRole::ALL
            .iter()
            .all(|role| normalize_hex(self.get(*role)).as_deref() == Some(self.get(*role)))
    }
}

/// Outcome of parsing generated palette output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPalette {
    pub palette: BrandPalette,
    /// Roles that were missing or unusable and fell back to their default.
    pub defaulted: Vec<PaletteRole>,
}

/// Generated text could not be read as a palette at all.
#[derive(Debug, thiserror::Error)]
pub enum PaletteError {
    #[error("no JSON object found in generated palette output")]
    NoJsonObject,

    #[error("generated palette is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Parse model output into a palette, filling per-role defaults.
///
/// Accepts a bare object, an object wrapped in a fenced code block, or an
/// object embedded in surrounding prose. Extra keys are ignored.
pub fn parse_palette(text: &str) -> Result<ParsedPalette, PaletteError> {
    let json = extract_json_object(text).ok_or(PaletteError::NoJsonObject)?;
    let value: serde_json::Value = serde_json::from_str(json)?;
    let object = value.as_object().ok_or(PaletteError::NoJsonObject)?;

    let mut palette = BrandPalette::default();
    let mut defaulted = Vec::new();

    for role in PaletteRole::ALL {
        match object
            .get(role.key())
            .and_then(|v| v.as_str())
            .and_then(normalize_hex)
        {
            Some(hex) => *palette.slot(role) = hex,
            None => defaulted.push(role),
        }
    }

    Ok(ParsedPalette { palette, defaulted })
}

/// Normalize `#RGB` / `#RRGGBB` (any case) to upper-case `#RRGGBB`.
pub fn normalize_hex(value: &str) -> Option<String> {
    let value = value.trim();
    if !HEX_RE.is_match(value) {
        return None;
    }
    let digits = &value[1..];
    let expanded: String = if digits.len() == 3 {
        digits.chars().flat_map(|c| [c, c]).collect()
    } else {
        digits.to_string()
    };
    Some(format!("#{}", expanded.to_ascii_uppercase()))
}

fn extract_json_object(text: &str) -> Option<&str> {
    if let Some(captures) = FENCED_JSON_RE.captures(text) {
        return captures.get(1).map(|m| m.as_str());
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
