//! The on-screen overlay
//!
//! - **policy**: eligibility and placement decisions
//! - **store**: bounded, self-expiring collection of visible messages
//! - **surface**: render commands sent back to the page
//! - **font** / **font_discovery**: content measurement for bubble sizing

pub mod font;
pub mod font_discovery;
pub mod policy;
pub mod store;
pub mod surface;
pub mod timers;

pub use font::TextMeasurer;
pub use policy::{Bounds, ContentMeasure};
pub use store::{OverlayStore, StoreSink};
pub use surface::{Outbox, RenderCommand, RenderSurface};
