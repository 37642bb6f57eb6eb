//! Session controller
//!
//! Wires the host mirror, the ingestor and the overlay together. Everything is
//! synchronous and driven by the event loop: inbound messages, control
//! commands and deadline ticks, each run to completion.

use anyhow::Result;
use rand::rngs::StdRng;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::bridge::BridgeMessage;
use crate::config::OverlaySettings;
use crate::constants::timing;
use crate::host::HostPage;
use crate::ingest::{IngestState, MutationIngestor};
use crate::overlay::{ContentMeasure, OverlayStore, RenderSurface, StoreSink};
use crate::signals::Control;

/// Follow-up the event loop has to perform after a handler ran
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    None,
    Pong,
    /// Settings were applied and should be persisted
    Persist(OverlaySettings),
    Shutdown,
}

pub struct Session<S: RenderSurface, M: ContentMeasure> {
    page: HostPage,
    ingestor: MutationIngestor,
    overlay: OverlayStore<S, M>,
    /// Pending delayed start after a re-initialization
    restart_at: Option<Instant>,
}

impl<S: RenderSurface, M: ContentMeasure> Session<S, M> {
    pub fn new(settings: OverlaySettings, surface: S, measure: M, rng: StdRng) -> Result<Self> {
        Ok(Self {
            page: HostPage::new(),
            ingestor: MutationIngestor::new()?,
            overlay: OverlayStore::new(settings, surface, measure, rng),
            restart_at: None,
        })
    }

    pub fn overlay(&self) -> &OverlayStore<S, M> {
        &self.overlay
    }

    pub fn surface_mut(&mut self) -> &mut S {
        self.overlay.surface_mut()
    }

    pub fn ingest_state(&self) -> IngestState {
        self.ingestor.state()
    }

    pub fn start(&mut self, now: Instant) {
        self.ingestor.start(&self.page, now);
    }

    pub fn handle_message(&mut self, message: BridgeMessage, now: Instant) -> Action {
        match message {
            BridgeMessage::Mutations { patches } => {
                let batch = self.page.apply(&patches);
                let mut sink = StoreSink {
                    store: &mut self.overlay,
                    now,
                };
                let outcome = self.ingestor.process(&self.page, &batch, &mut sink);
                if outcome.delivered > 0 {
                    debug!(delivered = outcome.delivered, visible = self.overlay.len(), "Processed mutation batch");
                }
                if outcome.root_detached {
                    self.reinitialize(now);
                }
                Action::None
            }
            BridgeMessage::Settings { settings } => Action::Persist(self.update_settings(settings)),
            BridgeMessage::Viewport(bounds) => {
                let previous = self.overlay.bounds();
                self.overlay.set_bounds(bounds);
                // Entering or leaving fullscreen rebuilds the host layout
                if !previous.is_empty() && previous.fullscreen != bounds.fullscreen {
                    self.reinitialize(now);
                }
                Action::None
            }
            BridgeMessage::LayoutChanged => {
                self.reinitialize(now);
                Action::None
            }
            BridgeMessage::Ping => Action::Pong,
            BridgeMessage::Shutdown => Action::Shutdown,
        }
    }

    pub fn handle_control(&mut self, control: Control, now: Instant) -> Action {
        match control {
            Control::Reinitialize => {
                self.reinitialize(now);
                Action::None
            }
            Control::Shutdown => Action::Shutdown,
        }
    }

    /// Validate and apply a settings snapshot; returns what was applied
    pub fn update_settings(&mut self, settings: OverlaySettings) -> OverlaySettings {
        let settings = settings.validated();
        self.overlay.update_settings(settings.clone());
        settings
    }

    /// Stop observing, clear the overlay and start again after a short delay
    pub fn reinitialize(&mut self, now: Instant) {
        info!("Reinitializing chat observation");
        self.ingestor.stop();
        self.overlay.reset();
        self.restart_at = Some(now + Duration::from_millis(timing::REINIT_DELAY_MS));
    }

    /// Run everything whose deadline has passed
    pub fn tick(&mut self, now: Instant) {
        if self.restart_at.is_some_and(|at| at <= now) {
            self.restart_at = None;
            self.ingestor.start(&self.page, now);
        }
        self.ingestor.poll_locate(&self.page, now);
        self.overlay.expire_due(now);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.restart_at,
            self.ingestor.next_deadline(),
            self.overlay.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DisplayMode;
    use crate::host::dom::NodeId;
    use crate::host::dom::tests::{el, text};
    use crate::host::patch::{HostPatch, Scope};
    use crate::host::tests::insert;
    use crate::ingest::extractor::tests::message;
    use crate::overlay::policy::tests::NoMeasure;
    use crate::overlay::{Bounds, Outbox, RenderCommand};
    use rand::SeedableRng;

    fn session() -> Session<Outbox, NoMeasure> {
        Session::new(OverlaySettings::default(), Outbox::new(), NoMeasure, StdRng::seed_from_u64(0)).unwrap()
    }

    fn mutations(patches: Vec<HostPatch>) -> BridgeMessage {
        BridgeMessage::Mutations { patches }
    }

    fn chat_message(key: u64, author: &str, body: &str, ts: &str) -> HostPatch {
        insert(Scope::Top, 1, message(key, author, vec![text(key * 100 + 50, body)], Some(ts)))
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    /// Session observing `#chat` (key 1) in the top document
    fn observing(t0: Instant) -> Session<Outbox, NoMeasure> {
        let mut session = session();
        session.handle_message(
            mutations(vec![insert(Scope::Top, 0, el(1, "div", &[("id", "chat")], vec![]))]),
            t0,
        );
        session.start(t0);
        assert!(matches!(session.ingest_state(), IngestState::Observing(_)));
        session
    }

    #[test]
    fn test_messages_flow_to_overlay_and_expire() {
        let t0 = Instant::now();
        let mut session = observing(t0);
        session.handle_message(
            mutations(vec![chat_message(2, "Alice", "hi", "12:00"), chat_message(3, "Alice", "hi", "12:00")]),
            t0,
        );
        assert_eq!(session.overlay().len(), 1);
        assert_eq!(session.next_deadline(), Some(t0 + ms(5000)));

        session.tick(t0 + ms(5000));
        assert!(session.overlay().is_empty());
        assert_eq!(session.next_deadline(), None);
    }

    #[test]
    fn test_cyclic_subtree_is_skipped_and_session_continues() {
        let t0 = Instant::now();
        let mut session = observing(t0);
        session.handle_message(
            mutations(vec![
                insert(Scope::Top, 1, el(2, "div", &[], vec![el(1, "span", &[], vec![])])),
                insert(Scope::Top, 1, el(3, "div", &[], vec![text(3, "x")])),
            ]),
            t0,
        );
        assert!(matches!(session.ingest_state(), IngestState::Observing(_)));

        session.handle_message(mutations(vec![chat_message(4, "Alice", "hi", "12:00")]), t0);
        assert_eq!(session.overlay().len(), 1);
    }

    #[test]
    fn test_locator_retry_is_a_deadline() {
        let t0 = Instant::now();
        let mut session = session();
        session.start(t0);
        assert_eq!(session.ingest_state(), IngestState::Locating);
        assert_eq!(session.next_deadline(), Some(t0 + ms(1000)));

        session.handle_message(
            mutations(vec![insert(Scope::Top, 0, el(1, "div", &[("id", "chat")], vec![]))]),
            t0 + ms(10),
        );
        session.tick(t0 + ms(1000));
        assert!(matches!(session.ingest_state(), IngestState::Observing(_)));
    }

    #[test]
    fn test_layout_change_resets_and_restarts_later() {
        let t0 = Instant::now();
        let mut session = observing(t0);
        session.handle_message(mutations(vec![chat_message(2, "Alice", "hi", "12:00")]), t0);
        session.surface_mut().drain();

        assert_eq!(session.handle_message(BridgeMessage::LayoutChanged, t0 + ms(100)), Action::None);
        assert_eq!(session.ingest_state(), IngestState::Stopped);
        assert!(session.overlay().is_empty());
        assert_eq!(session.surface_mut().drain(), vec![RenderCommand::Clear]);
        assert_eq!(session.next_deadline(), Some(t0 + ms(1100)));

        session.tick(t0 + ms(500));
        assert_eq!(session.ingest_state(), IngestState::Stopped);
        session.tick(t0 + ms(1100));
        assert!(matches!(session.ingest_state(), IngestState::Observing(_)));

        // dedup was reset along with the overlay
        session.handle_message(mutations(vec![chat_message(4, "Alice", "hi", "12:00")]), t0 + ms(1200));
        assert_eq!(session.overlay().len(), 1);
    }

    #[test]
    fn test_root_removal_triggers_reinit() {
        let t0 = Instant::now();
        let mut session = observing(t0);
        session.handle_message(
            mutations(vec![HostPatch::Remove {
                scope: Scope::Top,
                node: NodeId(1),
            }]),
            t0,
        );
        assert_eq!(session.ingest_state(), IngestState::Stopped);
        assert_eq!(session.next_deadline(), Some(t0 + ms(1000)));

        // no root yet, so the restart falls back to locating
        session.tick(t0 + ms(1000));
        assert_eq!(session.ingest_state(), IngestState::Locating);
    }

    #[test]
    fn test_settings_are_validated_and_persisted() {
        let t0 = Instant::now();
        let mut session = observing(t0);
        let requested = OverlaySettings {
            max_visible: 0,
            mode: DisplayMode::BottomBubble,
            ..OverlaySettings::default()
        };
        let action = session.handle_message(BridgeMessage::Settings { settings: requested }, t0);
        let Action::Persist(applied) = action else {
            panic!("expected settings to be persisted, got {action:?}");
        };
        assert_eq!(applied.max_visible, 1);
        assert_eq!(session.overlay().settings(), &applied);
    }

    #[test]
    fn test_fullscreen_toggle_reinitializes() {
        let t0 = Instant::now();
        let mut session = observing(t0);
        let windowed = Bounds {
            width: 1280.0,
            height: 720.0,
            fullscreen: false,
        };
        session.handle_message(BridgeMessage::Viewport(windowed), t0);
        assert!(matches!(session.ingest_state(), IngestState::Observing(_)));

        session.handle_message(
            BridgeMessage::Viewport(Bounds {
                width: 1300.0,
                ..windowed
            }),
            t0,
        );
        assert!(matches!(session.ingest_state(), IngestState::Observing(_)));

        session.handle_message(
            BridgeMessage::Viewport(Bounds {
                fullscreen: true,
                ..windowed
            }),
            t0,
        );
        assert_eq!(session.ingest_state(), IngestState::Stopped);
    }

    #[test]
    fn test_control_and_simple_messages() {
        let t0 = Instant::now();
        let mut session = observing(t0);
        assert_eq!(session.handle_message(BridgeMessage::Ping, t0), Action::Pong);
        assert_eq!(session.handle_message(BridgeMessage::Shutdown, t0), Action::Shutdown);
        assert_eq!(session.handle_control(Control::Shutdown, t0), Action::Shutdown);
        assert_eq!(session.handle_control(Control::Reinitialize, t0), Action::None);
        assert_eq!(session.ingest_state(), IngestState::Stopped);
    }
}
