//! Runtime wiring between ingestion, fusion, and safety checks
//!
//! ```text
//! JSON-line readings ──ingest──▶ FusionEngine (fusion loop, 10 Hz)
//!                                    │ data observer (try_send)
//!                                    ▼
//!                          bounded mpsc channel
//!                                    │
//!                                    ▼
//!                     SafetyLoop ──▶ SafetyMonitor ──▶ EmergencyController
//! ```

mod safety_loop;
pub mod source;

pub use safety_loop::{LoopStats, SafetyLoop};
pub use source::{ingest, IngestSummary, JsonLineSource, ReadingEvent};
