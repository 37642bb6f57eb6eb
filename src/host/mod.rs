//! Host page mirror
//!
//! The host page is untrusted and append-only from our point of view. The
//! bridge streams its structural changes as patches; `HostPage` applies them
//! to a top-level mirror document plus one mirror per nested frame and reports
//! what changed as mutation records. Nothing in here ever writes back to the
//! host.

pub mod dom;
pub mod markup;
pub mod patch;
pub mod selector;

use std::collections::HashMap;
use tracing::debug;

use dom::{Document, NodeId};
use patch::{FrameState, HostPatch, MutationBatch, MutationRecord, Scope};

/// What we can see of a nested frame's document
#[derive(Debug, Clone)]
pub enum FrameAccess {
    Loading,
    CrossOrigin,
    Loaded(Document),
}

#[derive(Debug, Default)]
pub struct HostPage {
    top: Document,
    frames: HashMap<NodeId, FrameAccess>,
}

impl HostPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn top(&self) -> &Document {
        &self.top
    }

    /// Access state of the frame whose element has this key in the top document
    pub fn frame_access(&self, frame: NodeId) -> Option<&FrameAccess> {
        if !self.top.contains(frame) {
            return None;
        }
        self.frames.get(&frame)
    }

    /// Readable document for a scope, if any
    pub fn document(&self, scope: Scope) -> Option<&Document> {
        match scope {
            Scope::Top => Some(&self.top),
            Scope::Frame(frame) => match self.frame_access(frame)? {
                FrameAccess::Loaded(doc) => Some(doc),
                FrameAccess::Loading | FrameAccess::CrossOrigin => None,
            },
        }
    }

    fn document_mut(&mut self, scope: Scope) -> Option<&mut Document> {
        match scope {
            Scope::Top => Some(&mut self.top),
            Scope::Frame(frame) => match self.frames.get_mut(&frame)? {
                FrameAccess::Loaded(doc) => Some(doc),
                FrameAccess::Loading | FrameAccess::CrossOrigin => None,
            },
        }
    }

    /// Apply one inbound batch in order. Patches addressing unknown nodes or
    /// unreadable documents are skipped.
    pub fn apply(&mut self, patches: &[HostPatch]) -> MutationBatch {
        let mut records = Vec::with_capacity(patches.len());
        for patch in patches {
            if let Some(record) = self.apply_one(patch) {
                records.push(record);
            } else {
                debug!(patch = ?patch, "Skipped patch for unknown node or unreadable document");
            }
        }
        records
    }

    fn apply_one(&mut self, patch: &HostPatch) -> Option<MutationRecord> {
        match patch {
            HostPatch::Insert { scope, parent, before, node } => {
                let added = self.document_mut(*scope)?.insert(*parent, *before, node)?;
                self.prune_frames(*scope);
                Some(MutationRecord::ChildList {
                    scope: *scope,
                    target: *parent,
                    added: vec![added],
                    removed: Vec::new(),
                })
            }
            HostPatch::Remove { scope, node } => {
                let parent = self.document_mut(*scope)?.remove(*node)?;
                self.prune_frames(*scope);
                Some(MutationRecord::ChildList {
                    scope: *scope,
                    target: parent,
                    added: Vec::new(),
                    removed: vec![*node],
                })
            }
            HostPatch::SetAttribute { scope, node, name, value } => {
                self.document_mut(*scope)?
                    .set_attribute(*node, name, value.as_deref())
                    .then(|| MutationRecord::Attributes {
                        scope: *scope,
                        target: *node,
                        name: name.clone(),
                    })
            }
            HostPatch::SetText { scope, node, text } => self
                .document_mut(*scope)?
                .set_text(*node, text)
                .then_some(MutationRecord::CharacterData {
                    scope: *scope,
                    target: *node,
                }),
            HostPatch::Frame { frame, state } => {
                self.top.element(*frame)?;
                let access = match state {
                    FrameState::Loading => FrameAccess::Loading,
                    FrameState::CrossOrigin => FrameAccess::CrossOrigin,
                    FrameState::Loaded => FrameAccess::Loaded(Document::new()),
                };
                self.frames.insert(*frame, access);
                Some(MutationRecord::Frame {
                    frame: *frame,
                    state: *state,
                })
            }
        }
    }

    // Frame documents die with their frame element.
    fn prune_frames(&mut self, scope: Scope) {
        if scope == Scope::Top && !self.frames.is_empty() {
            let top = &self.top;
            self.frames.retain(|frame, _| top.contains(*frame));
        }
    }
}
