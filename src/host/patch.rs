//! Structural patches streamed by the page-side bridge, and the mutation
//! records produced by applying them to the mirror

use serde::{Deserialize, Serialize};

use super::dom::{NodeId, NodeSpec};

/// Which document a patch addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// The top-level page document
    #[default]
    Top,
    /// The document inside the frame element with this key (in the top document)
    Frame(NodeId),
}

/// Access state of a nested frame's document, as reported by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameState {
    /// Frame element exists but its document is not readable yet
    Loading,
    /// Reading the document failed with a permission error
    CrossOrigin,
    /// A fresh, readable document was attached (previous content is discarded)
    Loaded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HostPatch {
    /// A subtree was appended (or inserted before `before`) under `parent`
    Insert {
        #[serde(default)]
        scope: Scope,
        parent: NodeId,
        #[serde(default)]
        before: Option<NodeId>,
        node: NodeSpec,
    },
    /// A node and its subtree left the document
    Remove {
        #[serde(default)]
        scope: Scope,
        node: NodeId,
    },
    /// An attribute changed; `None` removes it
    SetAttribute {
        #[serde(default)]
        scope: Scope,
        node: NodeId,
        name: String,
        #[serde(default)]
        value: Option<String>,
    },
    /// Character data of a text node changed
    SetText {
        #[serde(default)]
        scope: Scope,
        node: NodeId,
        text: String,
    },
    /// Access state of a frame document changed
    Frame { frame: NodeId, state: FrameState },
}

/// One observed change, in the order it was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    ChildList {
        scope: Scope,
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    Attributes {
        scope: Scope,
        target: NodeId,
        name: String,
    },
    CharacterData {
        scope: Scope,
        target: NodeId,
    },
    Frame {
        frame: NodeId,
        state: FrameState,
    },
}

/// Records produced by one inbound batch
pub type MutationBatch = Vec<MutationRecord>;
