//! Durable single-file FIFO message queue.
//!
//! Producers append serialized records to one backing file; a single consumer
//! cursor reads them back in FIFO order, tracking its byte offset across
//! calls. Records are newline-delimited JSON; the cursor lives in memory only
//! and every construction provisions a fresh store.
//!
//! # Example
//!
//! ```no_run
//! use linequeue::{Queue, QueueConfig};
//!
//! let queue = Queue::open(QueueConfig::new(10))?;
//! queue.send(&serde_json::json!({"id": 1}))?;
//!
//! let value: serde_json::Value = queue.read()?;
//! assert_eq!(value["id"], 1);
//! # Ok::<(), linequeue::Error>(())
//! ```

pub mod action_log;
pub mod clock;
pub mod error;
pub mod queue;
mod store;

pub use action_log::{Action, ActionSink, FacadeSink, WriteSink};
pub use clock::{Clock, QuantaClock, SystemClock};
pub use error::{Error, Result};
pub use queue::{Queue, QueueConfig, QueueStats};
