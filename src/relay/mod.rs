//! Gate relay
//!
//! Everything between an inbound request and the gate that answers it:
//! - Gate pool with per-gate success/fail statistics
//! - Calibration of candidate gates against an IP echo responder
//! - Adaptive explore/exploit gate selection
//! - Fan-out dispatch with response validation
//! - Bounded retry over dispatch rounds

pub mod calibrate;
pub mod client;
pub mod dispatch;
pub mod handler;
pub mod pool;
pub mod retry;
pub mod selector;
pub mod server;
pub mod validate;

#[cfg(test)]
pub(crate) mod testutil;

pub use calibrate::{Calibrator, CalibratorConfig};
pub use client::{GateClient, GateResponse};
pub use dispatch::{Dispatcher, DispatcherConfig, Round};
pub use handler::RelayHandler;
pub use pool::{Gate, GatePool};
pub use retry::RetryController;
pub use selector::AdaptiveSelector;
pub use server::RelayServer;
