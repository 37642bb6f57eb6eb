//! Mutation ingestion
//!
//! `MutationIngestor` watches the located chat root for appended message
//! nodes, extracts records from them and hands each novel record to a sink
//! exactly once per observation session.

use anyhow::Result;
use std::time::Instant;
use tracing::{debug, info, trace};

use super::dedup::DeduplicationIndex;
use super::extractor::{MessageRecord, RecordExtractor};
use super::locator::{RootHandle, SourceLocator};
use crate::constants::selectors;
use crate::host::HostPage;
use crate::host::dom::{Document, NodeId};
use crate::host::patch::MutationRecord;
use crate::host::selector::SelectorList;

/// Receives novel records in observation order
pub trait RecordSink {
    fn deliver(&mut self, record: MessageRecord);
}

impl RecordSink for Vec<MessageRecord> {
    fn deliver(&mut self, record: MessageRecord) {
        self.push(record);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Idle,
    /// Waiting on the locator to find the chat root
    Locating,
    Observing(RootHandle),
    Stopped,
}

/// What one mutation batch produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub delivered: usize,
    /// The observed root left its document; the session must re-initialize
    pub root_detached: bool,
}

#[derive(Debug)]
pub struct MutationIngestor {
    state: IngestState,
    locator: SourceLocator,
    dedup: DeduplicationIndex,
    message_nodes: SelectorList,
    extractor: RecordExtractor,
}

impl MutationIngestor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            state: IngestState::Idle,
            locator: SourceLocator::new()?,
            dedup: DeduplicationIndex::new(),
            message_nodes: SelectorList::parse_all(selectors::MESSAGE_NODE)?,
            extractor: RecordExtractor::new()?,
        })
    }

    pub fn state(&self) -> IngestState {
        self.state
    }

    /// Begin a fresh observation session. No-op while locating or observing.
    pub fn start(&mut self, page: &HostPage, now: Instant) {
        match self.state {
            IngestState::Locating | IngestState::Observing(_) => {
                debug!(state = ?self.state, "Ingestor already started");
            }
            IngestState::Idle | IngestState::Stopped => {
                info!("Starting chat ingestion");
                self.dedup.clear();
                self.state = IngestState::Locating;
                self.try_locate(page, now);
            }
        }
    }

    /// Detach from the root and drop any pending locator retry
    pub fn stop(&mut self) {
        if matches!(self.state, IngestState::Idle | IngestState::Stopped) {
            return;
        }
        info!(state = ?self.state, "Stopping chat ingestion");
        self.locator.cancel();
        self.state = IngestState::Stopped;
    }

    /// Pending locator retry, if locating
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            IngestState::Locating => self.locator.deadline(),
            _ => None,
        }
    }

    /// Run the locator retry once its deadline has passed
    pub fn poll_locate(&mut self, page: &HostPage, now: Instant) {
        if self.next_deadline().is_some_and(|deadline| deadline <= now) {
            self.try_locate(page, now);
        }
    }

    fn try_locate(&mut self, page: &HostPage, now: Instant) {
        if let Some(root) = self.locator.poll(page, now) {
            self.state = IngestState::Observing(root);
        }
    }

    /// Scan one applied batch for appended message nodes under the root
    pub fn process(&mut self, page: &HostPage, batch: &[MutationRecord], sink: &mut impl RecordSink) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let IngestState::Observing(root) = self.state else {
            return outcome;
        };
        let Some(doc) = page.document(root.scope) else {
            debug!(scope = ?root.scope, "Observed document went away");
            outcome.root_detached = true;
            return outcome;
        };

        for record in batch {
            let MutationRecord::ChildList { scope, added, .. } = record else {
                continue;
            };
            if *scope != root.scope {
                continue;
            }
            for &node in added {
                if !doc.is_connected(node) || !doc.is_inclusive_ancestor(root.node, node) {
                    continue;
                }
                for candidate in self.candidates(doc, node) {
                    outcome.delivered += self.ingest(doc, candidate, sink);
                }
            }
        }

        if !doc.is_connected(root.node) {
            info!(node = %root.node, "Chat container detached from its document");
            outcome.root_detached = true;
        }
        outcome
    }

    // The node itself when it is a message, otherwise its message descendants in document order.
    fn candidates(&self, doc: &Document, node: NodeId) -> Vec<NodeId> {
        if doc.matches(node, &self.message_nodes) {
            return vec![node];
        }
        doc.descendants(node)
            .filter(|id| doc.matches(*id, &self.message_nodes))
            .collect()
    }

    fn ingest(&mut self, doc: &Document, candidate: NodeId, sink: &mut impl RecordSink) -> usize {
        let Some(record) = self.extractor.extract(doc, candidate) else {
            debug!(node = %candidate, "Dropped incomplete message node");
            return 0;
        };
        if !self.dedup.insert(&record.id) {
            trace!(id = %record.id, "Duplicate message suppressed");
            return 0;
        }
        sink.deliver(record);
        1
    }
}
