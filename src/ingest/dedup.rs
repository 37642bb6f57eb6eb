use std::collections::HashSet;

/// Ids delivered since the ingestor was last started
#[derive(Debug, Default)]
pub struct DeduplicationIndex {
    seen: HashSet<String>,
}

impl DeduplicationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `id`; true when it had not been seen before
    pub fn insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string())
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}
