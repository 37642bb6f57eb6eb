//! Application-wide constants
//!
//! Selectors, timings and limits used throughout the bridge, collected in one
//! place so the host-page assumptions are easy to audit.

/// Host page structure (selectors are matched against the mirror document)
pub mod selectors {
    /// Nested frame that hosts the chat document on watch pages
    pub const CHAT_FRAME: &str = "iframe#chatframe";

    /// Chat container candidates, most specific first
    pub const CHAT_CONTAINERS: &[&str] = &["#chat", "#chat-messages", "yt-live-chat-app"];

    /// Signatures of a single chat message node
    pub const MESSAGE_NODE: &[&str] = &[
        "yt-live-chat-text-message-renderer",
        "yt-live-chat-paid-message-renderer",
        "[id^=\"message\"]",
        ".chat-message",
        ".yt-live-chat-item-list-renderer",
    ];

    /// Author name inside a message node
    pub const AUTHOR: &str = "#author-name";

    /// Message body inside a message node
    pub const BODY: &str = "#message";

    /// Timestamp text inside a message node (not always rendered)
    pub const TIMESTAMP: &str = "#timestamp";
}

/// Retry and expiry timings (milliseconds)
pub mod timing {
    /// Poll interval while the chat frame exists but its document is not accessible yet
    pub const FRAME_POLL_MS: u64 = 500;

    /// Retry interval when no chat container is present at all
    pub const ROOT_RETRY_MS: u64 = 1000;

    /// Delay between stop and start when the session re-initializes
    pub const REINIT_DELAY_MS: u64 = 1000;

    /// How long a message stays on screen
    pub const VISIBLE_DURATION_MS: u64 = 5000;
}

/// Eligibility limits
pub mod policy {
    /// Plain-text ceiling for corner-anchored modes
    pub const CORNER_MAX_BODY_LENGTH: usize = 200;

    /// Plain-text ceiling for the bubble field
    pub const BUBBLE_MAX_BODY_LENGTH: usize = 30;

    /// Ceiling for sticker/emote-only content
    pub const SPECIAL_MAX_BODY_LENGTH: usize = 5000;

    /// Class names that mark an inline image as an emote
    pub const SPECIAL_IMAGE_CLASSES: &[&str] = &["emoji", "small-emoji"];

    /// Host-generated message ids are long opaque tokens; shorter ids are structural
    pub const HOST_KEY_MIN_LEN: usize = 16;
}

/// Overlay geometry (pixels unless noted)
pub mod layout {
    /// Height of the bubble field along the bottom of the viewport
    pub const BUBBLE_FIELD_HEIGHT: f32 = 400.0;

    /// Horizontal padding on each side of a bubble
    pub const BUBBLE_PADDING_X: f32 = 20.0;

    /// Vertical range of bubbles in the side bands
    pub const SIDE_BAND_BOTTOM: (f32, f32) = (50.0, 220.0);

    /// Vertical range of bubbles in the center band
    pub const CENTER_BAND_BOTTOM: (f32, f32) = (50.0, 150.0);

    /// Bubble fallback position when the container has no usable size
    pub const FALLBACK_LEFT_PERCENT: f32 = 50.0;
    pub const FALLBACK_BOTTOM: f32 = 50.0;

    /// Container inset from the viewport edges in fullscreen
    pub const FULLSCREEN_INSET: f32 = 20.0;

    /// Container insets outside fullscreen (top clears the host page header)
    pub const WINDOWED_TOP_INSET: f32 = 60.0;
    pub const WINDOWED_SIDE_INSET: f32 = 10.0;

    /// Emote height relative to the font size
    pub const EMOTE_SCALE: f32 = 1.8;

    /// Horizontal margin around each emote
    pub const EMOTE_MARGIN: f32 = 4.0;
}

/// Configuration file locations
pub mod config {
    /// Directory under the user config dir
    pub const APP_DIR: &str = "live-chat-overlay";

    /// Settings store file name
    pub const FILENAME: &str = "settings.json";

    /// Key under which the overlay settings are stored
    pub const SETTINGS_KEY: &str = "live-chat-overlay.settings";
}

/// Validation ranges for user settings
pub mod validation {
    pub const MIN_FONT_SIZE: u16 = 8;
    pub const MAX_FONT_SIZE: u16 = 72;
    pub const MIN_MESSAGE_WIDTH: u16 = 100;
    pub const MAX_MESSAGE_WIDTH: u16 = 1000;
    pub const MIN_VISIBLE: u16 = 1;
    pub const MAX_VISIBLE: u16 = 500;
}

/// Bridge framing
pub mod bridge {
    /// Largest frame accepted from the page (10 MiB)
    pub const MAX_INBOUND_FRAME: usize = 10 * 1024 * 1024;

    /// Largest frame the browser accepts from a native host (1 MiB)
    pub const MAX_OUTBOUND_FRAME: usize = 1024 * 1024;

    /// Capacity of the reader → event loop channel
    pub const INBOUND_QUEUE: usize = 256;
}

/// Fonts used for content measurement
pub mod fonts {
    /// Generic family tried through fontconfig before the hardcoded paths
    pub const FALLBACK_FAMILY: &str = "Sans";

    /// Last-resort font files on common distributions
    pub const FALLBACK_PATHS: &[&str] = &[
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    ];
}
