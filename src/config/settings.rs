//! Overlay settings and display modes
//!
//! Settings are an immutable snapshot: every change from the settings panel
//! arrives as a complete `OverlaySettings` value that replaces the old one.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::constants::{policy, timing, validation};

/// Screen corner a stacked overlay is anchored to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub fn is_top(self) -> bool {
        matches!(self, Corner::TopLeft | Corner::TopRight)
    }
}

/// How a mode places its messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutRule {
    /// Messages stack away from a fixed corner, newest nearest the corner
    CornerStack(Corner),
    /// Messages float as bubbles over the bottom of the viewport
    BubbleField,
}

/// Per-mode limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeConfig {
    /// Longest plain-text body shown in this mode
    pub max_body_length: usize,
    /// How long a message stays visible
    pub visible_duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    TopLeft,
    #[default]
    TopRight,
    BottomLeft,
    BottomRight,
    BottomBubble,
}

impl DisplayMode {
    pub fn config(self) -> ModeConfig {
        let max_body_length = match self {
            DisplayMode::BottomBubble => policy::BUBBLE_MAX_BODY_LENGTH,
            _ => policy::CORNER_MAX_BODY_LENGTH,
        };
        ModeConfig {
            max_body_length,
            visible_duration: Duration::from_millis(timing::VISIBLE_DURATION_MS),
        }
    }

    pub fn layout_rule(self) -> LayoutRule {
        match self {
            DisplayMode::TopLeft => LayoutRule::CornerStack(Corner::TopLeft),
            DisplayMode::TopRight => LayoutRule::CornerStack(Corner::TopRight),
            DisplayMode::BottomLeft => LayoutRule::CornerStack(Corner::BottomLeft),
            DisplayMode::BottomRight => LayoutRule::CornerStack(Corner::BottomRight),
            DisplayMode::BottomBubble => LayoutRule::BubbleField,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    pub font_size_px: u16,
    pub message_width_px: u16,
    /// Background opacity, 0.0 (transparent) to 1.0
    pub opacity: f32,
    pub show_author: bool,
    pub mode: DisplayMode,
    /// Upper bound on simultaneously visible messages (at least 1)
    pub max_visible: u16,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            font_size_px: 14,
            message_width_px: 300,
            opacity: 0.8,
            show_author: true,
            mode: DisplayMode::default(),
            max_visible: 200,
        }
    }
}

impl OverlaySettings {
    pub fn mode_config(&self) -> ModeConfig {
        self.mode.config()
    }

    pub fn max_visible(&self) -> usize {
        usize::from(self.max_visible.max(validation::MIN_VISIBLE))
    }

    /// Clamp every field into its supported range
    pub fn validated(mut self) -> Self {
        use validation::*;

        if !self.opacity.is_finite() {
            warn!(opacity = self.opacity, "opacity is not a number, using default");
            self.opacity = Self::default().opacity;
        } else if !(0.0..=1.0).contains(&self.opacity) {
            warn!(opacity = self.opacity, "opacity outside 0..=1, clamping");
            self.opacity = self.opacity.clamp(0.0, 1.0);
        }

        if !(MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&self.font_size_px) {
            warn!(font_size_px = self.font_size_px, min = MIN_FONT_SIZE, max = MAX_FONT_SIZE, "font_size_px out of range, clamping");
            self.font_size_px = self.font_size_px.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
        }

        if !(MIN_MESSAGE_WIDTH..=MAX_MESSAGE_WIDTH).contains(&self.message_width_px) {
            warn!(message_width_px = self.message_width_px, min = MIN_MESSAGE_WIDTH, max = MAX_MESSAGE_WIDTH, "message_width_px out of range, clamping");
            self.message_width_px = self.message_width_px.clamp(MIN_MESSAGE_WIDTH, MAX_MESSAGE_WIDTH);
        }

        if !(MIN_VISIBLE..=MAX_VISIBLE).contains(&self.max_visible) {
            warn!(max_visible = self.max_visible, min = MIN_VISIBLE, max = MAX_VISIBLE, "max_visible out of range, clamping");
            self.max_visible = self.max_visible.clamp(MIN_VISIBLE, MAX_VISIBLE);
        }

        self
    }
}
