//! Bounded ring buffer of captured output lines.

use lk_protocol::process_models::{OutputLine, OutputStream};
use std::collections::VecDeque;

/// Keeps the last `capacity` lines written by a process.
///
/// Older lines are discarded as new ones arrive; the number of discarded
/// lines is tracked so diagnostics can say how much was cut.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    capacity: usize,
    lines: VecDeque<OutputLine>,
    dropped: u64,
}

impl OutputBuffer {
    /// Create an empty buffer holding at most `capacity` lines.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            lines: VecDeque::with_capacity(capacity.min(1024)),
            dropped: 0,
        }
    }

    /// Append a line, evicting the oldest one when full.
    pub fn push(&mut self, stream: OutputStream, line: String) {
        if self.capacity == 0 {
            self.dropped += 1;
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
            self.dropped += 1;
        }
        self.lines.push_back(OutputLine { stream, line });
    }

    /// Copy of the retained lines, oldest first.
    pub fn snapshot(&self) -> Vec<OutputLine> {
        self.lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of lines evicted so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
