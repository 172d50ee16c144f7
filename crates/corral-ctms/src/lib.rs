//! # corral-ctms
//!
//! Gateway to the contact-management service (CTMS).
//!
//! The vendor keeps contacts as nested, grouped records behind a REST API
//! with OAuth2 client-credentials auth. This crate owns everything on that
//! boundary:
//!
//! - [`auth`] - token acquisition with shared-cache storage
//! - [`client`] - the HTTP client with single 401 re-auth semantics
//! - [`fields`] - the static vendor-field / application-field table
//! - [`convert`] - `from_vendor` / `to_vendor` record conversion
//! - [`resolver`] - contact lookup by alternate identifier
//!
//! Conversion is pure; only `auth`, `client`, and `resolver` touch the
//! network.

pub mod auth;
pub mod client;
pub mod config;
pub mod convert;
pub mod fields;
pub mod resolver;

pub use client::CtmsClient;
pub use config::CtmsConfig;
pub use convert::{from_vendor, ContactMapper};
pub use resolver::{resolve, ContactIdentifier};
