//! Background services

pub mod status_reporter;

pub use status_reporter::{StatusReporter, StatusReporterHandle};
