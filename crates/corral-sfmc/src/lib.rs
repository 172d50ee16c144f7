//! # corral-sfmc
//!
//! Gateway to the legacy marketing cloud (SFMC).
//!
//! The vendor models contact data as rows in named data extensions and
//! sends mail through triggered sends. This crate drives both over the
//! vendor's REST surface:
//!
//! - [`auth`] - token auth with a randomized early-expiry buffer
//! - [`rows`] - data-extension row operations
//! - [`messaging`] - triggered-send mail and SMS

pub mod auth;
pub mod config;
pub mod messaging;
pub mod rows;

pub use config::SfmcConfig;
pub use rows::{RowData, RowFilter, SfmcClient};
