//! Discovery of the chat container
//!
//! The chat root may live in a nested frame or directly in the page, and may
//! not exist yet when we start. Each attempt either finds it or asks to be
//! retried later; "not found yet" is never an error. The locator owns a single
//! retry deadline that every attempt replaces.

use anyhow::Result;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::constants::{selectors, timing};
use crate::host::dom::{DOCUMENT_ROOT, Document, NodeId};
use crate::host::patch::Scope;
use crate::host::selector::SelectorList;
use crate::host::{FrameAccess, HostPage};

/// The located chat container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootHandle {
    pub scope: Scope,
    pub node: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateOutcome {
    Found(RootHandle),
    RetryAfter(Duration),
}

#[derive(Debug)]
pub struct SourceLocator {
    frame: SelectorList,
    containers: Vec<SelectorList>,
    deadline: Option<Instant>,
}

impl SourceLocator {
    pub fn new() -> Result<Self> {
        Ok(Self {
            frame: SelectorList::parse(selectors::CHAT_FRAME)?,
            containers: selectors::CHAT_CONTAINERS
                .iter()
                .map(|s| SelectorList::parse(s))
                .collect::<Result<_>>()?,
            deadline: None,
        })
    }

    /// One discovery attempt against the current page
    pub fn attempt(&self, page: &HostPage) -> LocateOutcome {
        if let Some(frame) = page.top().query_selector(DOCUMENT_ROOT, &self.frame) {
            match page.frame_access(frame) {
                Some(FrameAccess::Loaded(doc)) => {
                    if let Some(node) = self.find_container(doc) {
                        return LocateOutcome::Found(RootHandle {
                            scope: Scope::Frame(frame),
                            node,
                        });
                    }
                    debug!(frame = %frame, "Chat frame has no container, searching the page");
                }
                Some(FrameAccess::CrossOrigin) => {
                    debug!(frame = %frame, "Chat frame is cross-origin, searching the page");
                }
                Some(FrameAccess::Loading) | None => {
                    debug!(frame = %frame, "Chat frame not accessible yet");
                    return LocateOutcome::RetryAfter(Duration::from_millis(timing::FRAME_POLL_MS));
                }
            }
        }

        match self.find_container(page.top()) {
            Some(node) => LocateOutcome::Found(RootHandle {
                scope: Scope::Top,
                node,
            }),
            None => LocateOutcome::RetryAfter(Duration::from_millis(timing::ROOT_RETRY_MS)),
        }
    }

    /// Attempt now; on failure arm the retry deadline, on success clear it
    pub fn poll(&mut self, page: &HostPage, now: Instant) -> Option<RootHandle> {
        match self.attempt(page) {
            LocateOutcome::Found(root) => {
                info!(scope = ?root.scope, node = %root.node, "Located chat container");
                self.deadline = None;
                Some(root)
            }
            LocateOutcome::RetryAfter(delay) => {
                debug!(delay_ms = delay.as_millis() as u64, "Chat container not found, retrying");
                self.deadline = Some(now + delay);
                None
            }
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    // Candidates are ordered by specificity; the first selector with any match wins.
    fn find_container(&self, doc: &Document) -> Option<NodeId> {
        self.containers
            .iter()
            .find_map(|sel| doc.query_selector(DOCUMENT_ROOT, sel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::dom::tests::el;
    use crate::host::patch::{FrameState, HostPatch};
    use crate::host::tests::insert;

    fn frame_state(frame: u64, state: FrameState) -> HostPatch {
        HostPatch::Frame {
            frame: NodeId(frame),
            state,
        }
    }

    #[test]
    fn test_nothing_found_retries_slowly() {
        let locator = SourceLocator::new().unwrap();
        let page = HostPage::new();
        assert_eq!(
            locator.attempt(&page),
            LocateOutcome::RetryAfter(Duration::from_millis(1000))
        );
    }

    #[test]
    fn test_top_level_specificity_order() {
        let locator = SourceLocator::new().unwrap();
        let mut page = HostPage::new();
        page.apply(&[
            insert(Scope::Top, 0, el(1, "yt-live-chat-app", &[], vec![])),
            insert(Scope::Top, 0, el(2, "div", &[("id", "chat-messages")], vec![])),
        ]);
        assert_eq!(
            locator.attempt(&page),
            LocateOutcome::Found(RootHandle { scope: Scope::Top, node: NodeId(2) })
        );

        page.apply(&[insert(Scope::Top, 0, el(3, "div", &[("id", "chat")], vec![]))]);
        assert_eq!(
            locator.attempt(&page),
            LocateOutcome::Found(RootHandle { scope: Scope::Top, node: NodeId(3) })
        );
    }

    #[test]
    fn test_loading_frame_polls_fast() {
        let locator = SourceLocator::new().unwrap();
        let mut page = HostPage::new();
        page.apply(&[
            insert(Scope::Top, 0, el(1, "div", &[("id", "chat")], vec![])),
            insert(Scope::Top, 0, el(5, "iframe", &[("id", "chatframe")], vec![])),
        ]);
        // no state reported yet counts as loading
        assert_eq!(
            locator.attempt(&page),
            LocateOutcome::RetryAfter(Duration::from_millis(500))
        );
        page.apply(&[frame_state(5, FrameState::Loading)]);
        assert_eq!(
            locator.attempt(&page),
            LocateOutcome::RetryAfter(Duration::from_millis(500))
        );
    }

    #[test]
    fn test_loaded_frame_preferred() {
        let locator = SourceLocator::new().unwrap();
        let mut page = HostPage::new();
        page.apply(&[
            insert(Scope::Top, 0, el(1, "div", &[("id", "chat")], vec![])),
            insert(Scope::Top, 0, el(5, "iframe", &[("id", "chatframe")], vec![])),
            frame_state(5, FrameState::Loaded),
            insert(Scope::Frame(NodeId(5)), 0, el(1, "yt-live-chat-app", &[], vec![])),
        ]);
        assert_eq!(
            locator.attempt(&page),
            LocateOutcome::Found(RootHandle { scope: Scope::Frame(NodeId(5)), node: NodeId(1) })
        );
    }

    #[test]
    fn test_empty_frame_and_cross_origin_fall_back_to_page() {
        let locator = SourceLocator::new().unwrap();
        let mut page = HostPage::new();
        page.apply(&[
            insert(Scope::Top, 0, el(1, "div", &[("id", "chat")], vec![])),
            insert(Scope::Top, 0, el(5, "iframe", &[("id", "chatframe")], vec![])),
            frame_state(5, FrameState::Loaded),
        ]);
        let top = LocateOutcome::Found(RootHandle { scope: Scope::Top, node: NodeId(1) });
        assert_eq!(locator.attempt(&page), top);

        page.apply(&[frame_state(5, FrameState::CrossOrigin)]);
        assert_eq!(locator.attempt(&page), top);
    }

    #[test]
    fn test_single_deadline_slot() {
        let mut locator = SourceLocator::new().unwrap();
        let mut page = HostPage::new();
        let t0 = Instant::now();

        assert!(locator.poll(&page, t0).is_none());
        assert_eq!(locator.deadline(), Some(t0 + Duration::from_millis(1000)));

        let t1 = t0 + Duration::from_millis(1000);
        assert!(locator.poll(&page, t1).is_none());
        assert_eq!(locator.deadline(), Some(t1 + Duration::from_millis(1000)));

        page.apply(&[insert(Scope::Top, 0, el(1, "div", &[("id", "chat")], vec![]))]);
        assert!(locator.poll(&page, t1).is_some());
        assert_eq!(locator.deadline(), None);

        assert!(locator.poll(&HostPage::new(), t1).is_none());
        locator.cancel();
        assert_eq!(locator.deadline(), None);
    }
}
