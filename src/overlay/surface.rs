//! Rendering surface
//!
//! The overlay never touches host nodes. It draws through a `RenderSurface`
//! that hands out its own handles; the production surface queues
//! `RenderCommand`s for the bridge writer.

use serde::{Deserialize, Serialize};

use super::policy::{ContainerLayout, MessageLayout};
use crate::ingest::MessageRecord;

/// Surface-assigned identity of one drawn message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderHandle(pub u64);

pub trait RenderSurface {
    fn set_container(&mut self, layout: ContainerLayout);
    fn create(&mut self, record: &MessageRecord, layout: &MessageLayout) -> RenderHandle;
    fn relayout(&mut self, handle: RenderHandle, layout: &MessageLayout);
    fn remove(&mut self, handle: RenderHandle);
    fn clear(&mut self);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RenderCommand {
    Container {
        layout: ContainerLayout,
    },
    Create {
        handle: RenderHandle,
        author: String,
        body_html: String,
        layout: MessageLayout,
    },
    Relayout {
        handle: RenderHandle,
        layout: MessageLayout,
    },
    Remove {
        handle: RenderHandle,
    },
    Clear,
}

/// Surface that records commands until the bridge drains them
#[derive(Debug, Default)]
pub struct Outbox {
    next_handle: u64,
    pending: Vec<RenderCommand>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[cfg(test)]
    pub fn pending(&self) -> &[RenderCommand] {
        &self.pending
    }

    pub fn drain(&mut self) -> Vec<RenderCommand> {
        std::mem::take(&mut self.pending)
    }
}

impl RenderSurface for Outbox {
    fn set_container(&mut self, layout: ContainerLayout) {
        self.pending.push(RenderCommand::Container { layout });
    }

    fn create(&mut self, record: &MessageRecord, layout: &MessageLayout) -> RenderHandle {
        self.next_handle += 1;
        let handle = RenderHandle(self.next_handle);
        self.pending.push(RenderCommand::Create {
            handle,
            author: record.author.clone(),
            body_html: record.body_html.clone(),
            layout: *layout,
        });
        handle
    }

    fn relayout(&mut self, handle: RenderHandle, layout: &MessageLayout) {
        self.pending.push(RenderCommand::Relayout {
            handle,
            layout: *layout,
        });
    }

    fn remove(&mut self, handle: RenderHandle) {
        self.pending.push(RenderCommand::Remove { handle });
    }

    fn clear(&mut self) {
        self.pending.push(RenderCommand::Clear);
    }
}
