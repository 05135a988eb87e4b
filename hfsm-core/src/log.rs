use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use tokio::sync::Notify;

/// Severity of a [`LogRecord`], matching `tracing`'s level names so the
/// in-memory stream and the `tracing` events the engine also emits
/// read the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// One record of the `subscribeLog` stream.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub seq: u64,
    pub scope: String,
    pub level: Level,
    pub message: String,
    pub timestamp: SystemTime,
}

/// A position into a [`LogStream`]; readers pass one in and receive only
/// records at or after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogCursor(pub u64);

struct Inner {
    records: VecDeque<LogRecord>,
    next_seq: u64,
    capacity: usize,
}

/// Bounded ring buffer, at-least-once delivery, cursor-based reads.
/// In-memory only — persistence across process restarts is out of scope.
pub struct LogStream {
    inner: Mutex<Inner>,
    notify: Notify,
}

impl LogStream {
    pub fn new(capacity: usize) -> Self {
        LogStream {
            inner: Mutex::new(Inner {
                records: VecDeque::with_capacity(capacity),
                next_seq: 0,
                capacity,
            }),
            notify: Notify::new(),
        }
    }

    pub fn push(&self, scope: impl Into<String>, level: Level, message: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let seq = inner.next_seq;
        inner.next_seq += 1;
        if inner.records.len() == inner.capacity {
            inner.records.pop_front();
        }
        inner.records.push_back(LogRecord {
            seq,
            scope: scope.into(),
            level,
            message: message.into(),
            timestamp: SystemTime::now(),
        });
        drop(inner);
        self.notify.notify_waiters();
    }

    /// Records at or after `cursor`, already available, returned
    /// immediately without waiting.
    pub fn read_since(&self, cursor: LogCursor) -> Vec<LogRecord> {
        let inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner
            .records
            .iter()
            .filter(|r| r.seq >= cursor.0)
            .cloned()
            .collect()
    }

    /// As [`LogStream::read_since`], but if nothing is available yet, waits
    /// up to `timeout` for the next push before returning whatever is (or
    /// still isn't) there.
    pub async fn read_since_blocking(&self, cursor: LogCursor, timeout: Duration) -> Vec<LogRecord> {
        let ready = self.read_since(cursor);
        if !ready.is_empty() {
            return ready;
        }
        let notified = self.notify.notified();
        let _ = tokio::time::timeout(timeout, notified).await;
        self.read_since(cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cursor_read_skips_already_seen_records() {
        let stream = LogStream::new(16);
        stream.push("m1", Level::Info, "entered A");
        let cursor = LogCursor(1);
        stream.push("m1", Level::Info, "entered B");
        let records = stream.read_since(cursor);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "entered B");
    }

    #[test]
    fn ring_buffer_drops_oldest_beyond_capacity() {
        let stream = LogStream::new(2);
        stream.push("m1", Level::Info, "first");
        stream.push("m1", Level::Info, "second");
        stream.push("m1", Level::Info, "third");
        let records = stream.read_since(LogCursor(0));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "second");
    }
}
