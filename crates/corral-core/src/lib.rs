//! # corral-core
//!
//! Shared foundation for the corral contact synchronization pipeline.
//!
//! This crate provides the pieces every other corral crate builds on:
//!
//! - [`ids`] - Type-safe identifiers (`ContactToken`, `EmailId`)
//! - [`error`] - The error taxonomy with transient/permanent classification
//! - [`contact`] - Flat contact records and newsletter subscription types
//! - [`cache`] - The `KeyValueCache` capability trait
//! - [`registry`] - The `NewsletterRegistry` capability trait
//!
//! No I/O happens here; vendor gateways and the task envelope live in
//! sibling crates.

pub mod cache;
pub mod contact;
pub mod error;
pub mod ids;
pub mod registry;

pub use cache::{KeyValueCache, MemoryCache};
pub use contact::{FlatContact, NewsletterChange, NewsletterSubscription};
pub use error::{SyncError, SyncResult};
pub use ids::{ContactToken, EmailId};
pub use registry::{NewsletterRegistry, StaticRegistry};
