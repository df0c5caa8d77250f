//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - JSON or pretty stdout output
//! - Optional rolling JSON log files
//! - Token redaction helpers

pub mod config;
pub mod logger;
pub mod redact;

pub use config::{LogFormat, RotationPolicy, parse_log_level};
pub use logger::LoggerImpl;
pub use redact::redact_token;
