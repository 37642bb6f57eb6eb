//! The visible message collection
//!
//! `OverlayStore` owns every message on screen, oldest first, together with
//! its removal timer and render handle. Collection membership and surface
//! nodes change together: nothing is drawn that the store does not hold.

use rand::rngs::StdRng;
use std::collections::VecDeque;
use std::time::Instant;
use tracing::{debug, info, trace};

use super::policy::{self, Bounds, ContentMeasure, MessageLayout};
use super::surface::{RenderHandle, RenderSurface};
use super::timers::{TimerQueue, TimerToken};
use crate::config::OverlaySettings;
use crate::ingest::{MessageRecord, RecordSink};

#[derive(Debug, Clone)]
pub struct VisibleMessage {
    pub record: MessageRecord,
    pub handle: RenderHandle,
    pub timer: TimerToken,
    pub layout: MessageLayout,
}

pub struct OverlayStore<S: RenderSurface, M: ContentMeasure> {
    settings: OverlaySettings,
    bounds: Bounds,
    visible: VecDeque<VisibleMessage>,
    timers: TimerQueue<RenderHandle>,
    surface: S,
    measure: M,
    rng: StdRng,
}

impl<S: RenderSurface, M: ContentMeasure> OverlayStore<S, M> {
    pub fn new(settings: OverlaySettings, surface: S, measure: M, rng: StdRng) -> Self {
        let mut store = Self {
            settings,
            bounds: Bounds::default(),
            visible: VecDeque::new(),
            timers: TimerQueue::new(),
            surface,
            measure,
            rng,
        };
        store.emit_container();
        store
    }

    #[cfg(test)]
    pub fn settings(&self) -> &OverlaySettings {
        &self.settings
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn len(&self) -> usize {
        self.visible.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    /// Visible messages, oldest first
    #[cfg(test)]
    pub fn visible(&self) -> impl Iterator<Item = &VisibleMessage> {
        self.visible.iter()
    }

    #[cfg(test)]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Show a record if the current mode allows it; true when it was drawn
    pub fn insert(&mut self, record: MessageRecord, now: Instant) -> bool {
        if !policy::is_eligible(&record, self.settings.mode) {
            debug!(id = %record.id, mode = ?self.settings.mode, "Message not eligible for display");
            return false;
        }

        let layout = policy::compute_layout(&record, &self.settings, self.bounds, &self.measure, &mut self.rng);
        let handle = self.surface.create(&record, &layout);
        let deadline = now + self.settings.mode_config().visible_duration;
        let timer = self.timers.schedule(deadline, handle);
        trace!(id = %record.id, handle = handle.0, "Message shown");

        self.visible.push_back(VisibleMessage {
            record,
            handle,
            timer,
            layout,
        });

        if self.visible.len() > self.settings.max_visible() {
            self.evict_oldest();
        }
        true
    }

    /// Remove every message whose timer is due; returns how many went away
    pub fn expire_due(&mut self, now: Instant) -> usize {
        let mut expired = 0;
        while let Some((_, handle)) = self.timers.pop_due(now) {
            let Some(pos) = self.visible.iter().position(|m| m.handle == handle) else {
                continue;
            };
            self.visible.remove(pos);
            self.surface.remove(handle);
            expired += 1;
        }
        if expired > 0 {
            trace!(expired, remaining = self.visible.len(), "Expired messages");
        }
        expired
    }

    /// Replace the settings snapshot, trim to the new limit and lay everything out again
    pub fn update_settings(&mut self, settings: OverlaySettings) {
        let mode_changed = settings.mode != self.settings.mode;
        self.settings = settings;
        info!(mode = ?self.settings.mode, max_visible = self.settings.max_visible, "Applying overlay settings");

        if mode_changed {
            self.emit_container();
        }
        while self.visible.len() > self.settings.max_visible() {
            self.evict_oldest();
        }
        self.relayout_all();
    }

    pub fn set_bounds(&mut self, bounds: Bounds) {
        if bounds == self.bounds {
            return;
        }
        debug!(width = bounds.width, height = bounds.height, fullscreen = bounds.fullscreen, "Viewport changed");
        self.bounds = bounds;
        self.emit_container();
    }

    /// Drop everything on screen along with its timers
    pub fn reset(&mut self) {
        if !self.visible.is_empty() {
            info!(count = self.visible.len(), "Clearing overlay");
        }
        self.visible.clear();
        self.timers.clear();
        self.surface.clear();
    }

    fn evict_oldest(&mut self) {
        if let Some(oldest) = self.visible.pop_front() {
            self.timers.cancel(oldest.timer);
            self.surface.remove(oldest.handle);
            trace!(id = %oldest.record.id, "Evicted oldest message");
        }
    }

    fn relayout_all(&mut self) {
        for message in self.visible.iter_mut() {
            message.layout = policy::compute_layout(&message.record, &self.settings, self.bounds, &self.measure, &mut self.rng);
            self.surface.relayout(message.handle, &message.layout);
        }
    }

    fn emit_container(&mut self) {
        self.surface
            .set_container(policy::container_layout(self.settings.mode, self.bounds));
    }
}

/// Records delivered by the ingestor go straight onto the screen
pub struct StoreSink<'a, S: RenderSurface, M: ContentMeasure> {
    pub store: &'a mut OverlayStore<S, M>,
    pub now: Instant,
}

impl<S: RenderSurface, M: ContentMeasure> RecordSink for StoreSink<'_, S, M> {
    fn deliver(&mut self, record: MessageRecord) {
        self.store.insert(record, self.now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DisplayMode;
    use crate::overlay::policy::tests::{FixedMeasure, NoMeasure, record};
    use crate::overlay::surface::{Outbox, RenderCommand};
    use rand::SeedableRng;
    use std::time::Duration;

    fn store(max_visible: u16) -> OverlayStore<Outbox, NoMeasure> {
        let settings = OverlaySettings {
            max_visible,
            ..OverlaySettings::default()
        };
        let mut store = OverlayStore::new(settings, Outbox::new(), NoMeasure, StdRng::seed_from_u64(0));
        store.surface_mut().drain();
        store
    }

    fn ids<S: RenderSurface, M: ContentMeasure>(store: &OverlayStore<S, M>) -> Vec<&str> {
        store.visible().map(|m| m.record.id.as_str()).collect()
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_capacity_evicts_single_oldest() {
        let t0 = Instant::now();
        let mut store = store(2);
        store.insert(record("m1", "a"), t0);
        store.insert(record("m2", "b"), t0 + ms(1));
        store.insert(record("m3", "c"), t0 + ms(2));

        assert_eq!(ids(&store), ["m2", "m3"]);
        let commands = store.surface_mut().drain();
        assert_eq!(commands.last(), Some(&RenderCommand::Remove { handle: RenderHandle(1) }));
        // the evicted message's timer went with it
        assert_eq!(store.next_deadline(), Some(t0 + ms(1) + ms(5000)));
    }

    #[test]
    fn test_ineligible_is_noop() {
        let mut store = store(5);
        let settings = OverlaySettings {
            mode: DisplayMode::BottomBubble,
            ..store.settings().clone()
        };
        store.update_settings(settings);
        store.surface_mut().drain();

        assert!(!store.insert(record("long", &"x".repeat(31)), Instant::now()));
        assert!(store.is_empty());
        assert!(store.surface().is_empty());
        assert_eq!(store.next_deadline(), None);
    }

    #[test]
    fn test_age_expiry() {
        let t0 = Instant::now();
        let mut store = store(10);
        store.insert(record("m1", "a"), t0);
        store.insert(record("m2", "b"), t0 + ms(1000));

        assert_eq!(store.expire_due(t0 + ms(4999)), 0);
        assert_eq!(store.expire_due(t0 + ms(5000)), 1);
        assert_eq!(ids(&store), ["m2"]);
        assert_eq!(store.expire_due(t0 + ms(5500)), 0);
        assert_eq!(store.expire_due(t0 + ms(6000)), 1);
        assert!(store.is_empty());
        assert_eq!(store.next_deadline(), None);
    }

    #[test]
    fn test_every_message_gone_by_its_deadline() {
        let t0 = Instant::now();
        let mut store = store(3);
        for i in 0..10u64 {
            let now = t0 + ms(i * 700);
            store.expire_due(now);
            store.insert(record(&format!("m{i}"), "x"), now);
            assert!(store.len() <= 3);
            for message in store.visible() {
                assert!(message.timer.deadline() <= now + ms(5000));
                assert!(message.timer.deadline() > now);
            }
        }
    }

    #[test]
    fn test_shrinking_limit_keeps_deadlines() {
        let t0 = Instant::now();
        let mut store = store(5);
        for i in 0..5u64 {
            store.insert(record(&format!("m{i}"), "x"), t0 + ms(i));
        }
        let before: Vec<_> = store.visible().skip(3).map(|m| m.timer).collect();

        let settings = OverlaySettings {
            max_visible: 2,
            ..store.settings().clone()
        };
        store.update_settings(settings);

        assert_eq!(ids(&store), ["m3", "m4"]);
        let after: Vec<_> = store.visible().map(|m| m.timer).collect();
        assert_eq!(before, after);
        assert_eq!(store.next_deadline(), Some(t0 + ms(3) + ms(5000)));

        let commands = store.surface_mut().drain();
        let removed = commands
            .iter()
            .filter(|c| matches!(c, RenderCommand::Remove { .. }))
            .count();
        let relaid = commands
            .iter()
            .filter(|c| matches!(c, RenderCommand::Relayout { .. }))
            .count();
        assert_eq!((removed, relaid), (3, 2));
    }

    #[test]
    fn test_mode_change_relayouts_and_reemits_container() {
        let t0 = Instant::now();
        let settings = OverlaySettings::default();
        let mut store = OverlayStore::new(settings.clone(), Outbox::new(), FixedMeasure { per_char: 8.0 }, StdRng::seed_from_u64(9));
        store.set_bounds(Bounds {
            width: 1000.0,
            height: 600.0,
            fullscreen: false,
        });
        store.insert(record("m1", "hey"), t0);
        store.surface_mut().drain();

        store.update_settings(OverlaySettings {
            mode: DisplayMode::BottomBubble,
            ..settings
        });
        let commands = store.surface_mut().drain();
        assert!(matches!(commands[0], RenderCommand::Container { .. }));
        match &commands[1] {
            RenderCommand::Relayout { layout, .. } => {
                assert!(matches!(layout.placement, policy::Placement::Bubble { .. }));
                assert!(layout.width_px < 300.0);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(matches!(
            store.visible().next().map(|m| m.layout.placement),
            Some(policy::Placement::Bubble { .. })
        ));
    }

    #[test]
    fn test_reset_clears_everything() {
        let t0 = Instant::now();
        let mut store = store(5);
        store.insert(record("m1", "a"), t0);
        store.insert(record("m2", "b"), t0);
        store.reset();

        assert!(store.is_empty());
        assert_eq!(store.next_deadline(), None);
        assert_eq!(store.surface_mut().drain().last(), Some(&RenderCommand::Clear));
        assert_eq!(store.expire_due(t0 + ms(10_000)), 0);

        store.reset();
        assert!(store.is_empty());
    }

    #[test]
    fn test_bounds_change_emits_container_once() {
        let mut store = store(5);
        let bounds = Bounds {
            width: 800.0,
            height: 600.0,
            fullscreen: true,
        };
        store.set_bounds(bounds);
        store.set_bounds(bounds);
        assert_eq!(store.surface_mut().drain().len(), 1);
        assert_eq!(store.bounds(), bounds);
    }

    #[test]
    fn test_sink_inserts() {
        let t0 = Instant::now();
        let mut store = store(5);
        let mut sink = StoreSink {
            store: &mut store,
            now: t0,
        };
        sink.deliver(record("m1", "a"));
        assert_eq!(ids(&store), ["m1"]);
    }
}
