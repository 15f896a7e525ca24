//! Progress console shared by extraction and enrichment.
//!
//! Keeps the most recent entries in a bounded buffer for polling clients
//! and fans every new entry out over a broadcast channel for live
//! subscribers. Emitting never blocks and never fails.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::defaults;
use crate::traits::ProgressSink;

/// Severity of a console entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Info,
    Warning,
    Error,
    Success,
}

impl ConsoleLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsoleLevel::Info => "info",
            ConsoleLevel::Warning => "warning",
            ConsoleLevel::Error => "error",
            ConsoleLevel::Success => "success",
        }
    }
}

/// One line of the progress console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleEntry {
    /// Monotonic sequence number, unique for the console's lifetime.
    pub seq: u64,
    pub level: ConsoleLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

struct Buffer {
    entries: VecDeque<ConsoleEntry>,
    next_seq: u64,
}

/// Bounded progress console.
pub struct Console {
    capacity: usize,
    buffer: Mutex<Buffer>,
    tx: broadcast::Sender<ConsoleEntry>,
}

impl Console {
    /// Create a console holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(defaults::CONSOLE_BROADCAST_CAPACITY);
        let capacity = capacity.max(1);
        Self {
            capacity,
            buffer: Mutex::new(Buffer {
                entries: VecDeque::with_capacity(capacity),
                next_seq: 1,
            }),
            tx,
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(ConsoleLevel::Info, message.into());
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.push(ConsoleLevel::Warning, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(ConsoleLevel::Error, message.into());
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(ConsoleLevel::Success, message.into());
    }

    /// Append an entry, evicting the oldest when full.
    pub fn push(&self, level: ConsoleLevel, message: String) {
        let entry = {
            let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
            let entry = ConsoleEntry {
                seq: buffer.next_seq,
                level,
                message,
                timestamp: Utc::now(),
            };
            buffer.next_seq += 1;
            if buffer.entries.len() == self.capacity {
                buffer.entries.pop_front();
            }
            buffer.entries.push_back(entry.clone());
            entry
        };
        tracing::debug!(
            subsystem = "console",
            seq = entry.seq,
            level = ?entry.level,
            subscriber_count = self.tx.receiver_count(),
            "Console entry"
        );
        let _ = self.tx.send(entry);
    }

    /// Snapshot of the buffered entries, oldest first.
    pub fn entries(&self) -> Vec<ConsoleEntry> {
        let buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer.entries.iter().cloned().collect()
    }

    /// Buffered entries with a sequence number greater than `seq`.
    pub fn entries_since(&self, seq: u64) -> Vec<ConsoleEntry> {
        let buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer
            .entries
            .iter()
            .filter(|e| e.seq > seq)
            .cloned()
            .collect()
    }

    /// Drop all buffered entries. Sequence numbers keep increasing.
    pub fn clear(&self) {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer.entries.clear();
    }

    /// Subscribe to entries emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ConsoleEntry> {
        self.tx.subscribe()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new(defaults::CONSOLE_CAPACITY)
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.tx.receiver_count())
            .finish()
    }
}

impl ProgressSink for Console {
    fn log(&self, message: &str) {
        self.info(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_keeps_order_and_levels() {
        let console = Console::new(10);
        console.info("a");
        console.warning("b");
        console.error("c");
        console.success("d");

        let entries = console.entries();
        let levels: Vec<_> = entries.iter().map(|e| e.level).collect();
        assert_eq!(
            levels,
            vec![
                ConsoleLevel::Info,
                ConsoleLevel::Warning,
                ConsoleLevel::Error,
                ConsoleLevel::Success
            ]
        );
        assert_eq!(entries[0].seq, 1);
        assert_eq!(entries[3].seq, 4);
    }

    #[test]
    fn test_level_names_match_serde() {
        for level in [
            ConsoleLevel::Info,
            ConsoleLevel::Warning,
            ConsoleLevel::Error,
            ConsoleLevel::Success,
        ] {
            assert_eq!(serde_json::to_value(level).unwrap(), level.as_str());
        }
    }

    #[test]
    fn test_console_evicts_oldest() {
        let console = Console::new(2);
        console.info("1");
        console.info("2");
        console.info("3");
        let messages: Vec<_> = console.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["2", "3"]);
    }

    #[test]
    fn test_console_clear_keeps_sequence() {
        let console = Console::new(5);
        console.info("1");
        console.clear();
        assert!(console.entries().is_empty());
        console.info("2");
        assert_eq!(console.entries()[0].seq, 2);
    }

    #[test]
    fn test_entries_since() {
        let console = Console::new(5);
        console.info("1");
        console.info("2");
        console.info("3");
        let since: Vec<_> = console.entries_since(1).into_iter().map(|e| e.seq).collect();
        assert_eq!(since, vec![2, 3]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let console = Console::new(0);
        console.info("x");
        assert_eq!(console.capacity(), 1);
        assert_eq!(console.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_console_broadcasts_to_subscribers() {
        let console = Console::new(5);
        let mut rx = console.subscribe();
        ProgressSink::log(&console, "hello");
        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.message, "hello");
        assert_eq!(entry.level, ConsoleLevel::Info);
    }

    #[test]
    fn test_level_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ConsoleLevel::Success).unwrap(),
            "\"success\""
        );
    }
}
