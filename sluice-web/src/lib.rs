//! Sluice Web - HTTP transport boundary

#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]
//!
//! Exposes the relay core as a single streaming endpoint,
//! `GET /stream/{identifier}`, plus a health probe.

pub mod error;
pub mod handlers;
pub mod server;

// Re-export main types
pub use error::StreamFailure;
pub use server::{AppState, build_router, run_server};
