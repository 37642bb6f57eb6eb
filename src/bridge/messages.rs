//! Message types for page ↔ host communication

use serde::{Deserialize, Serialize};

use crate::config::OverlaySettings;
use crate::host::patch::HostPatch;
use crate::overlay::{Bounds, RenderCommand};

/// Messages sent from the page-side bridge to the host process
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    /// Structural changes observed in the host page, in order
    Mutations { patches: Vec<HostPatch> },

    /// New settings from the settings panel (complete snapshot)
    Settings { settings: OverlaySettings },

    /// Viewport size or fullscreen state changed
    Viewport(Bounds),

    /// Host page switched layout (theater mode etc.); re-initialize
    LayoutChanged,

    /// Health check
    Ping,

    /// Request graceful shutdown
    Shutdown,
}

/// Messages sent from the host process back to the page
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeReply {
    /// Drawing instruction for the overlay container
    Render(RenderCommand),

    /// Health check response
    Pong,

    /// Settings in effect at startup, so the panel shows current values
    SettingsLoaded { settings: OverlaySettings },
}
