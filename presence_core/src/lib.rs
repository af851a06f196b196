#![forbid(unsafe_code)]

//! Core token lifecycle engine for the presence kiosk.
//!
//! This crate provides:
//! - Token model and scan records
//! - Session engine (check-in / check-out decisions)
//! - Ledger of checked-in tokens and its reconstruction from the log
//! - Forced-mode override channel
//! - Durable record store with quarantine recovery
//! - Serial output dispatch with reconnect
//! - Token sources and the kiosk processing loop

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod clock;
pub mod ledger;
pub mod session;
pub mod mode;
pub mod store;
pub mod export;
pub mod channel;
pub mod dispatcher;
pub mod source;
pub mod kiosk;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use clock::{Clock, LocalZone, SystemClock};
pub use ledger::TokenLedger;
pub use session::{Decision, LedgerChange, Outcome, SessionEngine};
pub use mode::ModeOverrideController;
pub use store::{reconstruct, AppendOutcome, JsonLogStore, RecordSink};
pub use channel::{ChannelConnector, LineChannel, SerialConnector};
pub use dispatcher::{AdmissionGate, OutputDispatcher};
pub use source::{spawn_line_listener, QueueSource, ScriptedSource, TokenSource};
pub use kiosk::{CycleOutcome, Kiosk};
