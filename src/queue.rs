//! The queue: configuration, cursor state, send and read paths.
//!
//! # Design
//!
//! A `Queue` owns one backing store and one consumer cursor. The cursor
//! (`total_sent`, `read_index`, `read_offset`) lives behind a single mutex
//! that is held for the whole of each `send` or `read`, so calls are strictly
//! serialized: appends never interleave and reads never race a cursor
//! advance. The handle is explicitly constructed and caller-owned; clone the
//! returned `Arc` to share one queue across threads.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::action_log::{Action, ActionSink, FacadeSink};
use crate::clock::{Clock, SystemClock};
use crate::store;
use crate::{Error, Result};

const DEFAULT_ROOT: &str = "queue_data";
const DEFAULT_CAPACITY: u64 = 1024;

/// Queue construction options.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of records the queue accepts over its lifetime.
    /// Values below 1 are clamped to 1.
    pub capacity: u64,
    /// Directory the backing store is provisioned under (created if missing).
    pub root: PathBuf,
}

impl QueueConfig {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            root: PathBuf::from(DEFAULT_ROOT),
        }
    }
}

/// Snapshot of the queue's counters and cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Records successfully appended since construction.
    pub total_sent: u64,
    /// Records successfully consumed since construction.
    pub read_index: u64,
    /// Byte position of the next unread record in the store.
    pub read_offset: u64,
}

#[derive(Debug, Default)]
struct CursorState {
    total_sent: u64,
    read_index: u64,
    read_offset: u64,
}

/// Durable single-file FIFO message queue.
pub struct Queue {
    path: PathBuf,
    capacity: u64,
    state: Mutex<CursorState>,
    clock: Box<dyn Clock>,
    sink: Box<dyn ActionSink>,
}

impl Queue {
    /// Opens a queue with a fresh, empty backing store.
    ///
    /// Uses the system clock and forwards action lines through the `log`
    /// facade. See [`Queue::open_with`] to inject either.
    ///
    /// # Errors
    ///
    /// - `Error::Io`: the store could not be provisioned. There is no queue
    ///   to return; construction failure is fatal for the caller.
    pub fn open(config: QueueConfig) -> Result<Arc<Self>> {
        Self::open_with(config, SystemClock, FacadeSink)
    }

    /// Opens a queue with an injected timestamp source and action sink.
    pub fn open_with<C, S>(config: QueueConfig, clock: C, sink: S) -> Result<Arc<Self>>
    where
        C: Clock,
        S: ActionSink + 'static,
    {
        let capacity = config.capacity.max(1);
        let path = store::provision(&config.root, &clock)?;
        log::info!("store file created: {}", path.display());

        Ok(Arc::new(Self {
            path,
            capacity,
            state: Mutex::new(CursorState::default()),
            clock: Box::new(clock),
            sink: Box::new(sink),
        }))
    }

    /// Serializes `value` and appends it to the store as one record.
    ///
    /// The record becomes durably visible at the end of the store and
    /// eligible for a future [`read`](Queue::read).
    ///
    /// # Errors
    ///
    /// Each failure leaves the counters and the store untouched:
    ///
    /// - `Error::QueueFull`: the capacity ceiling has been reached.
    /// - `Error::Serialize`: `value` cannot be encoded; nothing is written.
    /// - `Error::Io`: the store is unavailable for append.
    pub fn send<T>(&self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let mut state = self.lock_state()?;
        if state.total_sent >= self.capacity {
            return Err(Error::QueueFull);
        }

        let mut record = serde_json::to_vec(value).map_err(Error::Serialize)?;
        record.push(store::DELIMITER);
        store::append_record(&self.path, &record)?;

        state.total_sent += 1;
        self.sink.record(self.clock.now(), Action::Send, &self.path);
        Ok(())
    }

    /// Decodes the next undelivered record and advances the cursor.
    ///
    /// Strictly sequential and forward-only: no random access, no re-read of
    /// consumed records, no rollback.
    ///
    /// # Errors
    ///
    /// Each failure leaves the cursor unchanged (no partial advance):
    ///
    /// - `Error::Io`: the store cannot be opened or read.
    /// - `Error::EndOfData`: nothing unread yet; not a hard fault.
    /// - `Error::Deserialize`: the record does not decode into `T`. The
    ///   offset stays put, so retrying with the right shape re-reads the
    ///   same record.
    /// - `Error::Corrupt`: the cursor points beyond the end of the store.
    pub fn read<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let mut state = self.lock_state()?;
        let record = store::read_record_at(&self.path, state.read_offset)?;
        let value = serde_json::from_slice(&record).map_err(Error::Deserialize)?;

        state.read_offset += record.len() as u64;
        state.read_index += 1;
        self.sink.record(self.clock.now(), Action::Read, &self.path);
        Ok(value)
    }

    /// Returns the counters and cursor as one consistent snapshot.
    pub fn stats(&self) -> Result<QueueStats> {
        let state = self.lock_state()?;
        Ok(QueueStats {
            total_sent: state.total_sent,
            read_index: state.read_index,
            read_offset: state.read_offset,
        })
    }

    /// The configured capacity ceiling.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Path of the backing store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, CursorState>> {
        self.state
            .lock()
            .map_err(|_| Error::Corrupt("queue lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;
    use serde::Serializer;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tempfile::TempDir;

    fn open_in(dir: &TempDir, capacity: u64) -> Arc<Queue> {
        Queue::open(QueueConfig {
            capacity,
            root: dir.path().to_path_buf(),
        })
        .expect("open queue")
    }

    #[test]
    fn capacity_below_one_is_clamped() {
        let dir = TempDir::new().unwrap();
        let queue = open_in(&dir, 0);
        assert_eq!(queue.capacity(), 1);

        queue.send(&1u32).unwrap();
        assert!(matches!(queue.send(&2u32), Err(Error::QueueFull)));
    }

    #[test]
    fn send_past_capacity_is_queue_full() {
        let dir = TempDir::new().unwrap();
        let queue = open_in(&dir, 2);

        queue.send(&1u32).unwrap();
        queue.send(&2u32).unwrap();
        let err = queue.send(&3u32).unwrap_err();
        assert!(matches!(err, Error::QueueFull));

        let stats = queue.stats().unwrap();
        assert_eq!(stats.total_sent, 2);
        // The rejected record never reached the store.
        assert_eq!(
            std::fs::read_to_string(queue.path()).unwrap().lines().count(),
            2
        );
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(S::Error::custom("refuses to encode"))
        }
    }

    #[test]
    fn serialize_failure_mutates_nothing() {
        let dir = TempDir::new().unwrap();
        let queue = open_in(&dir, 8);
        queue.send(&"first").unwrap();

        let err = queue.send(&Unserializable).unwrap_err();
        assert!(matches!(err, Error::Serialize(_)));

        let stats = queue.stats().unwrap();
        assert_eq!(stats.total_sent, 1);
        assert_eq!(std::fs::metadata(queue.path()).unwrap().len(), "\"first\"\n".len() as u64);
    }

    #[test]
    fn decode_failure_keeps_cursor_for_retry() {
        let dir = TempDir::new().unwrap();
        let queue = open_in(&dir, 8);
        queue.send(&serde_json::json!({"id": 1})).unwrap();

        // Wrong destination shape: offset must not advance.
        let err = queue.read::<u64>().unwrap_err();
        assert!(matches!(err, Error::Deserialize(_)));
        let stats = queue.stats().unwrap();
        assert_eq!(stats.read_index, 0);
        assert_eq!(stats.read_offset, 0);

        // Same bytes decode on retry with the right shape.
        let value: serde_json::Value = queue.read().unwrap();
        assert_eq!(value["id"], 1);
        assert_eq!(queue.stats().unwrap().read_index, 1);
    }

    struct CountingSink {
        sends: AtomicU64,
        reads: AtomicU64,
    }

    impl ActionSink for Arc<CountingSink> {
        fn record(&self, _timestamp_ns: u64, action: Action, _store: &Path) {
            match action {
                Action::Send => self.sends.fetch_add(1, Ordering::Relaxed),
                Action::Read => self.reads.fetch_add(1, Ordering::Relaxed),
            };
        }
    }

    #[test]
    fn only_successful_calls_reach_the_sink() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(CountingSink {
            sends: AtomicU64::new(0),
            reads: AtomicU64::new(0),
        });
        let queue = Queue::open_with(
            QueueConfig {
                capacity: 1,
                root: dir.path().to_path_buf(),
            },
            SystemClock,
            Arc::clone(&sink),
        )
        .unwrap();

        queue.send(&"only").unwrap();
        let _ = queue.send(&"rejected");
        let _: String = queue.read().unwrap();
        let _ = queue.read::<String>();

        assert_eq!(sink.sends.load(Ordering::Relaxed), 1);
        assert_eq!(sink.reads.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn string_payload_with_newline_stays_one_record() {
        let dir = TempDir::new().unwrap();
        let queue = open_in(&dir, 8);

        queue.send("line one\nline two").unwrap();
        queue.send(&"after").unwrap();

        let first: String = queue.read().unwrap();
        assert_eq!(first, "line one\nline two");
        let second: String = queue.read().unwrap();
        assert_eq!(second, "after");
    }
}
