//! Lifecycle callbacks for batch runs.
//!
//! This crate provides:
//! - The callback event set and its wire payloads
//! - The `EventSink` seam the orchestrator reports through
//! - An HTTP reporter that never fails the run

pub mod error;
pub mod event;
pub mod reporter;

pub use error::{CallbackError, CallbackResult};
pub use event::{CallbackEvent, CallbackStatus, ErrorKind, EventKind, RunSnapshot};
pub use reporter::{CallbackReporter, DeliveryStatus, EventSink};
