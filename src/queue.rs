// src/queue.rs - FIFO of repeatable print jobs
use std::collections::{BTreeSet, VecDeque};

use crate::error::QueueError;

/// One file to print `total_count` times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEntry {
    id: u64,
    file: String,
    total_count: u32,
    remaining_count: u32,
}

impl JobEntry {
    fn new(id: u64, file: String, count: u32) -> Self {
        Self {
            id,
            file,
            total_count: count,
            remaining_count: count,
        }
    }

    pub fn id(&self) -> u64 { self.id }
    pub fn file(&self) -> &str { &self.file }
    pub fn total_count(&self) -> u32 { self.total_count }
    pub fn remaining_count(&self) -> u32 { self.remaining_count }

    /// Number of confirmed completions so far.
    pub fn completed_count(&self) -> u32 {
        self.total_count - self.remaining_count
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_count == 0
    }
}

/// Ordered job entries. Insertion order is dispatch order and only the head
/// is ever eligible for dispatch.
#[derive(Debug)]
pub struct JobQueue {
    entries: VecDeque<JobEntry>,
    next_id: u64,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            next_id: 1,
        }
    }

    /// Append a new entry at the tail and return its id.
    pub fn add_entry(&mut self, file: impl Into<String>, count: u32) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let entry = JobEntry::new(id, file.into(), count);
        tracing::debug!("Queued {} x{} as entry {}", entry.file, count, id);
        self.entries.push_back(entry);
        id
    }

    /// Remove the entry at `position`, or the head when `position` is `None`.
    pub fn remove_entry(&mut self, position: Option<usize>) -> Result<JobEntry, QueueError> {
        if self.entries.is_empty() {
            return Err(QueueError::QueueEmpty);
        }
        let position = position.unwrap_or(0);
        self.entries
            .remove(position)
            .ok_or(QueueError::InvalidPosition { position, len: self.entries.len() })
    }

    /// File reference of the next dispatch target. Exhausted head entries are
    /// retired first.
    pub fn peek_next(&mut self) -> Option<&str> {
        self.peek_next_with(|_| {}).map(JobEntry::file)
    }

    /// Like [`JobQueue::peek_next`], handing every retired entry to `on_retire`
    /// before it is dropped.
    pub fn peek_next_with(&mut self, mut on_retire: impl FnMut(&JobEntry)) -> Option<&JobEntry> {
        while self.entries.front().is_some_and(JobEntry::is_exhausted) {
            if let Some(retired) = self.entries.pop_front() {
                tracing::debug!("Retired entry {} ({})", retired.id, retired.file);
                on_retire(&retired);
            }
        }
        self.entries.front()
    }

    /// Count one confirmed completion against the head entry. Returns `None`
    /// (and changes nothing) when the queue is empty or the head is already
    /// exhausted. Retirement is left to the next `peek_next`.
    pub fn decrement_head(&mut self) -> Option<&JobEntry> {
        match self.entries.front_mut() {
            Some(head) if head.remaining_count >= 1 => {
                head.remaining_count -= 1;
                Some(&*head)
            }
            Some(head) => {
                tracing::warn!("Head entry {} is already exhausted; nothing to decrement", head.id);
                None
            }
            None => {
                tracing::warn!("Decrement requested on an empty queue");
                None
            }
        }
    }

    pub fn head(&self) -> Option<&JobEntry> {
        self.entries.front()
    }

    pub fn entries(&self) -> impl Iterator<Item = &JobEntry> {
        self.entries.iter()
    }

    /// Distinct file references currently queued.
    pub fn files(&self) -> BTreeSet<&str> {
        self.entries.iter().map(JobEntry::file).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
