//! Gaterelay - HTTP relay over a rotating pool of proxy gates
//!
//! Inbound requests are forwarded through upstream HTTP proxies ("gates") chosen by an adaptive
//! selector that favours gates with a good track record while still exploring the rest.
//!
//! ## Features
//!
//! - Startup calibration of candidate gates against an IP echo responder
//! - Explore/exploit gate selection weighted by success history
//! - Fan-out dispatch with first-valid-response-wins semantics
//! - Response validation for complete HTML pages
//! - Bounded retries with per-gate outcome tracking
//! - Periodic pool status reporting

pub mod config;
pub mod error;
pub mod loader;
pub mod models;
pub mod relay;
pub mod services;

pub use config::Config;
pub use error::{RelayError, Result};
