//! # corral-sync
//!
//! Business orchestration over the vendor gateways.
//!
//! [`orchestrator::SyncOrchestrator`] composes identity resolution, record
//! conversion, and the gateways into the operations external callers see:
//! contact upserts, lookups, and vendor-originated event handling. Every
//! mutating operation is meant to run inside the task envelope; the
//! orchestrator itself only raises classified errors and leaves retry
//! decisions to the envelope.

pub mod events;
pub mod newsletters;
pub mod orchestrator;

pub use newsletters::ApiCallKind;
pub use orchestrator::{SyncConfig, SyncOrchestrator};
