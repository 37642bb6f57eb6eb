//! Font discovery via fontconfig
//!
//! Resolve "Family" or "Family Style" names to font files, and list what is installed

use anyhow::{Context, Result, anyhow};
use fontconfig::{Fontconfig, Pattern};
use std::collections::BTreeSet;
use std::ffi::CString;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Style suffixes recognised in full font names.
/// Longer names come first so "SemiBold Italic" is not read as "Bold Italic".
const KNOWN_STYLES: &[&str] = &[
    "SemiBold Italic",
    "Bold Italic",
    "Bold Oblique",
    "Medium Italic",
    "Light Italic",
    "SemiBold",
    "Italic",
    "Oblique",
    "Bold",
    "Light",
    "Medium",
    "Regular",
];

/// Split "DejaVu Sans Bold" into ("DejaVu Sans", Some("Bold"))
fn split_style(font_name: &str) -> (&str, Option<&'static str>) {
    for style in KNOWN_STYLES {
        if let Some(family) = font_name.strip_suffix(style)
            && (family.is_empty() || family.ends_with(' '))
        {
            return (family.trim_end(), Some(style));
        }
    }
    (font_name, None)
}

/// Every installed font as "Family" or "Family Style", sorted
pub fn list_fonts() -> Result<Vec<String>> {
    let fc = Fontconfig::new().context("Failed to initialize fontconfig")?;
    let pattern = Pattern::new(&fc);
    let font_set = fontconfig::list_fonts(&pattern, None);

    let mut fonts = BTreeSet::new();
    for font in font_set.iter() {
        let family = font.get_string(fontconfig::FC_FAMILY).unwrap_or("Unknown");
        let name = match font.get_string(fontconfig::FC_STYLE) {
            Some(style) if style != "Regular" => format!("{family} {style}"),
            _ => family.to_string(),
        };
        fonts.insert(name);
    }

    info!(count = fonts.len(), "Discovered fonts via fontconfig");
    Ok(fonts.into_iter().collect())
}

/// Font file for a family name, optionally followed by a style
pub fn find_font_path(font_name: &str) -> Result<PathBuf> {
    let fc = Fontconfig::new().context("Failed to initialize fontconfig")?;
    let (family, style) = split_style(font_name);

    let mut pattern = Pattern::new(&fc);
    let family_cstr = CString::new(family).with_context(|| format!("Invalid family name: {family}"))?;
    pattern.add_string(fontconfig::FC_FAMILY, &family_cstr);
    if let Some(style) = style {
        let style_cstr = CString::new(style).with_context(|| format!("Invalid style name: {style}"))?;
        pattern.add_string(fontconfig::FC_STYLE, &style_cstr);
    }

    let matched = pattern.font_match();

    // Fontconfig always answers with something; a different family means ours is missing.
    // Generic aliases ("Sans", "Monospace") resolve to a concrete family and are accepted.
    if let Some(matched_family) = matched.get_string(fontconfig::FC_FAMILY)
        && !matched_family.eq_ignore_ascii_case(family)
        && !is_generic_family(family)
    {
        warn!(requested = font_name, matched_family, "Requested font is not installed");
        return Err(anyhow!("Font '{font_name}' not found, fontconfig offered '{matched_family}'"));
    }

    let path = PathBuf::from(
        matched
            .filename()
            .with_context(|| format!("No font file found for '{font_name}'"))?,
    );
    if !path.exists() {
        return Err(anyhow!("Font file '{}' does not exist", path.display()));
    }

    debug!(font = font_name, family, style = ?style, path = %path.display(), "Resolved font path");
    Ok(path)
}

fn is_generic_family(family: &str) -> bool {
    ["sans", "sans-serif", "serif", "monospace"]
        .iter()
        .any(|g| family.eq_ignore_ascii_case(g))
}
