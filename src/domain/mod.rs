//! Domain layer for the AZC fixer
//!
//! Core models, error types and the ports the convergence loop drives.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{BuildError, ContractError, FixerError, FixerResult, Phase, WorkerError};
