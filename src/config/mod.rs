//! Configuration for the overlay
//!
//! - **settings**: `OverlaySettings` snapshot, display modes and their limits
//! - **store**: the asynchronous settings store and best-effort load/save

pub mod settings;
pub mod store;

// Re-export commonly used types
pub use settings::{Corner, DisplayMode, LayoutRule, OverlaySettings};
pub use store::{JsonFileStore, load_settings, save_settings};
