//! Infrastructure layer module
//!
//! - Configuration management
//! - Logging infrastructure
//! - Workspace file store (target file, backups, persisted logs)

pub mod config;
pub mod logging;
pub mod workspace;
