//! Deadline queue for message expiry
//!
//! Removal timers are plain entries ordered by deadline; the event loop sleeps
//! until the earliest one. Cancelling a token removes exactly that entry.

use std::collections::BTreeMap;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerToken {
    deadline: Instant,
    seq: u64,
}

impl TimerToken {
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

#[derive(Debug)]
pub struct TimerQueue<T> {
    entries: BTreeMap<TimerToken, T>,
    next_seq: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, deadline: Instant, value: T) -> TimerToken {
        let token = TimerToken {
            deadline,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.entries.insert(token, value);
        token
    }

    pub fn cancel(&mut self, token: TimerToken) -> Option<T> {
        self.entries.remove(&token)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.keys().next().map(TimerToken::deadline)
    }

    /// Earliest entry whose deadline is at or before `now`; ties fire in scheduling order
    pub fn pop_due(&mut self, now: Instant) -> Option<(TimerToken, T)> {
        let entry = self.entries.first_entry()?;
        if entry.key().deadline > now {
            return None;
        }
        let token = *entry.key();
        Some((token, entry.remove()))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
