//! Message record extraction
//!
//! Pure, read-only mapping from a message node in the mirror to a structured
//! record. Anything missing an author or a body is not a chat message and is
//! rejected without fuss.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};

use crate::constants::{policy, selectors};
use crate::host::dom::{Document, NodeId};
use crate::host::markup;
use crate::host::selector::SelectorList;

/// One chat message as observed in the host page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Stable identity; equal ids are the same logical message
    pub id: String,
    pub author: String,
    /// Inner markup of the body, inline images preserved
    pub body_html: String,
    pub observed_at_millis: u64,
}

/// Where a record's id came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSource {
    Timestamp,
    HostKey,
    Random,
}

/// Reads message records out of candidate nodes
#[derive(Debug)]
pub struct RecordExtractor {
    author: SelectorList,
    body: SelectorList,
    timestamp: SelectorList,
}

impl RecordExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            author: SelectorList::parse(selectors::AUTHOR).context("Invalid author selector")?,
            body: SelectorList::parse(selectors::BODY).context("Invalid body selector")?,
            timestamp: SelectorList::parse(selectors::TIMESTAMP).context("Invalid timestamp selector")?,
        })
    }

    /// Extract a record from a candidate message node
    pub fn extract(&self, doc: &Document, node: NodeId) -> Option<MessageRecord> {
        self.extract_with_source(doc, node).map(|(record, _)| record)
    }

    pub(crate) fn extract_with_source(&self, doc: &Document, node: NodeId) -> Option<(MessageRecord, IdSource)> {
        let Some(author_node) = doc.query_selector(node, &self.author) else {
            trace!(node = %node, "No author element, not a message");
            return None;
        };
        let Some(body_node) = doc.query_selector(node, &self.body) else {
            trace!(node = %node, "No body element, not a message");
            return None;
        };

        let author = doc.text_content(author_node).trim().to_string();
        let body_html = doc.inner_html(body_node);
        let body_text = markup::strip_tags(&body_html);

        let timestamp = doc
            .query_selector(node, &self.timestamp)
            .map(|ts| doc.text_content(ts).trim().to_string())
            .filter(|ts| !ts.is_empty());
        let host_key = doc
            .element(node)
            .and_then(|e| e.attr("id"))
            .filter(|id| id.len() >= policy::HOST_KEY_MIN_LEN);

        let (id, source) = match (timestamp, host_key) {
            (Some(ts), _) => (content_id(&author, &body_text, &ts), IdSource::Timestamp),
            (None, Some(key)) => (content_id(&author, &body_text, key), IdSource::HostKey),
            (None, None) => {
                debug!(node = %node, "No timestamp or host key, using a random id");
                (uuid::Uuid::new_v4().to_string(), IdSource::Random)
            }
        };

        Some((
            MessageRecord {
                id,
                author,
                body_html,
                observed_at_millis: now_millis(),
            },
            source,
        ))
    }
}

/// Deterministic id over (author, plain body, discriminator)
///
/// Format: 32-character lowercase hex string (first 16 bytes of SHA-256)
pub fn content_id(author: &str, body_text: &str, discriminator: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [author, body_text, discriminator] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    let hash = hasher.finalize();
    hex_encode(&hash[..16])
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
            use std::fmt::Write;
            let _ = write!(s, "{b:02x}");
            s
        })
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
