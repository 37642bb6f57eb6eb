//! Text measurement using fontdue (pure Rust)

use anyhow::{Context, Result, anyhow};
use fontdue::{Font, FontSettings};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::font_discovery::find_font_path;
use super::policy::ContentMeasure;
use crate::constants::fonts;

/// Glyph metrics for one font, used to size bubbles before they are drawn
#[derive(Debug)]
pub struct TextMeasurer {
    font: Font,
}

impl TextMeasurer {
    pub fn from_path(path: PathBuf) -> Result<Self> {
        debug!(path = %path.display(), "Loading measurement font");
        let font_data = fs::read(&path)
            .with_context(|| format!("Failed to read font file: {}", path.display()))?;
        let font = Font::from_bytes(font_data, FontSettings::default())
            .map_err(|e| anyhow!("Failed to parse font {}: {}", path.display(), e))?;
        info!(path = %path.display(), "Loaded measurement font");
        Ok(Self { font })
    }

    /// Resolve a family (or "Family Style") name through fontconfig
    pub fn from_font_name(font_name: &str) -> Result<Self> {
        let path = find_font_path(font_name)
            .with_context(|| format!("Failed to resolve font '{font_name}'"))?;
        Self::from_path(path)
    }

    /// The generic sans family, then a few well-known files
    pub fn from_system_font() -> Result<Self> {
        match Self::from_font_name(fonts::FALLBACK_FAMILY) {
            Ok(measurer) => return Ok(measurer),
            Err(e) => debug!(error = %e, "Fontconfig lookup failed, trying hardcoded paths"),
        }
        for path in fonts::FALLBACK_PATHS {
            if let Ok(measurer) = Self::from_path(PathBuf::from(path)) {
                return Ok(measurer);
            }
        }
        Err(anyhow!(
            "Could not find any system font. Tried fontconfig family '{}' and {:?}",
            fonts::FALLBACK_FAMILY,
            fonts::FALLBACK_PATHS
        ))
    }

    /// Requested font, else the system fallback, else nothing (bubbles use the configured width)
    pub fn load(font_name: Option<&str>) -> Option<Self> {
        if let Some(name) = font_name {
            match Self::from_font_name(name) {
                Ok(measurer) => return Some(measurer),
                Err(e) => warn!(font = name, error = ?e, "Failed to load requested font, using system font"),
            }
        }
        match Self::from_system_font() {
            Ok(measurer) => Some(measurer),
            Err(e) => {
                warn!(error = %e, "No font available, bubble widths will not be measured");
                None
            }
        }
    }

    pub fn line_width(&self, text: &str, size: f32) -> f32 {
        text.chars()
            .map(|ch| self.font.metrics(ch, size).advance_width)
            .sum()
    }
}

impl ContentMeasure for TextMeasurer {
    fn text_width(&self, text: &str, font_size_px: f32) -> Option<f32> {
        if font_size_px <= 0.0 {
            return None;
        }
        let width = self.line_width(text, font_size_px);
        width.is_finite().then_some(width)
    }
}
