//! Display policy
//!
//! Pure functions deciding whether a record is shown and where. Randomness and
//! measurement come in as arguments so every decision is reproducible.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{Corner, DisplayMode, LayoutRule, OverlaySettings};
use crate::constants::{layout, policy};
use crate::host::markup::{self, Segment};
use crate::ingest::MessageRecord;

/// Viewport of the page the overlay is drawn over
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub fullscreen: bool,
}

impl Bounds {
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Direction a corner stack grows in as messages arrive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackGrowth {
    /// Anchored at the top: new entries go in at the top and push older ones down
    Downward,
    /// Anchored at the bottom: new entries go in at the bottom and push older ones up
    Upward,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContainerLayout {
    /// Container pinned to a corner, offsets measured from the nearest edges
    Corner { corner: Corner, inset_x: f32, inset_y: f32 },
    /// Full-width strip along the bottom of the viewport
    BubbleField { height: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Placement {
    Stack { corner: Corner, growth: StackGrowth },
    /// Horizontal center at `left_percent` of the field, `bottom_px` above its bottom edge
    Bubble { left_percent: f32, bottom_px: f32 },
}

/// Presentational values shared by every message
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutParams {
    pub font_size_px: f32,
    pub emote_size_px: f32,
    pub opacity: f32,
    pub show_author: bool,
}

impl LayoutParams {
    pub fn from_settings(settings: &OverlaySettings) -> Self {
        let font_size_px = f32::from(settings.font_size_px);
        Self {
            font_size_px,
            emote_size_px: font_size_px * layout::EMOTE_SCALE,
            opacity: settings.opacity,
            show_author: settings.show_author,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MessageLayout {
    pub placement: Placement,
    pub width_px: f32,
    pub params: LayoutParams,
}

/// Width of a single line of text at a font size
pub trait ContentMeasure {
    /// `None` when no measurement is possible (no font available)
    fn text_width(&self, text: &str, font_size_px: f32) -> Option<f32>;
}

impl<M: ContentMeasure> ContentMeasure for Option<M> {
    fn text_width(&self, text: &str, font_size_px: f32) -> Option<f32> {
        self.as_ref()?.text_width(text, font_size_px)
    }
}

/// Plain-text length within the mode's ceiling; emote/sticker content gets a generous one
pub fn is_eligible(record: &MessageRecord, mode: DisplayMode) -> bool {
    let ceiling = if markup::has_special_image(&record.body_html) {
        policy::SPECIAL_MAX_BODY_LENGTH
    } else {
        mode.config().max_body_length
    };
    markup::strip_tags(&record.body_html).chars().count() <= ceiling
}

pub fn compute_layout(
    record: &MessageRecord,
    settings: &OverlaySettings,
    bounds: Bounds,
    measure: &impl ContentMeasure,
    rng: &mut impl Rng,
) -> MessageLayout {
    let params = LayoutParams::from_settings(settings);
    let max_width = f32::from(settings.message_width_px);

    let (placement, width_px) = match settings.mode.layout_rule() {
        LayoutRule::CornerStack(corner) => {
            let growth = if corner.is_top() {
                StackGrowth::Downward
            } else {
                StackGrowth::Upward
            };
            (Placement::Stack { corner, growth }, max_width)
        }
        LayoutRule::BubbleField => {
            let width = content_width(record, &params, measure)
                .map(|w| (w + 2.0 * layout::BUBBLE_PADDING_X).min(max_width))
                .unwrap_or(max_width);
            (bubble_placement(bounds, rng), width)
        }
    };

    MessageLayout {
        placement,
        width_px,
        params,
    }
}

pub fn container_layout(mode: DisplayMode, bounds: Bounds) -> ContainerLayout {
    match mode.layout_rule() {
        LayoutRule::BubbleField => ContainerLayout::BubbleField {
            height: layout::BUBBLE_FIELD_HEIGHT,
        },
        LayoutRule::CornerStack(corner) => {
            let (inset_x, inset_y) = if bounds.fullscreen {
                (layout::FULLSCREEN_INSET, layout::FULLSCREEN_INSET)
            } else if corner.is_top() {
                (layout::WINDOWED_SIDE_INSET, layout::WINDOWED_TOP_INSET)
            } else {
                (layout::WINDOWED_SIDE_INSET, layout::WINDOWED_SIDE_INSET)
            };
            ContainerLayout::Corner {
                corner,
                inset_x,
                inset_y,
            }
        }
    }
}

// 40% left band, 40% right band, 20% center band; offsets relative to the field center.
fn bubble_placement(bounds: Bounds, rng: &mut impl Rng) -> Placement {
    if bounds.is_empty() {
        return Placement::Bubble {
            left_percent: layout::FALLBACK_LEFT_PERCENT,
            bottom_px: layout::FALLBACK_BOTTOM,
        };
    }

    let band = rng.gen_range(0.0..100.0);
    let (offset, (low, high)) = if band < 40.0 {
        (rng.gen_range(-45.0..-15.0), layout::SIDE_BAND_BOTTOM)
    } else if band < 80.0 {
        (rng.gen_range(15.0..45.0), layout::SIDE_BAND_BOTTOM)
    } else {
        (rng.gen_range(-20.0..20.0), layout::CENTER_BAND_BOTTOM)
    };
    let field_height = bounds.height.min(layout::BUBBLE_FIELD_HEIGHT);
    let bottom: f32 = rng.gen_range(low..high);

    Placement::Bubble {
        left_percent: 50.0 + offset,
        bottom_px: bottom.min(field_height),
    }
}

/// Single-line width of the body (and author when shown)
fn content_width(record: &MessageRecord, params: &LayoutParams, measure: &impl ContentMeasure) -> Option<f32> {
    let mut body = 0.0;
    for segment in markup::segments(&record.body_html) {
        body += match segment {
            Segment::Text(text) => measure.text_width(&text, params.font_size_px)?,
            Segment::Image { .. } => params.emote_size_px + layout::EMOTE_MARGIN,
        };
    }
    if params.show_author && !record.author.is_empty() {
        let author = measure.text_width(&record.author, params.font_size_px)?;
        return Some(body.max(author));
    }
    Some(body)
}
