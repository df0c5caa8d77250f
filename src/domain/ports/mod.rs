//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - BuildToolchain: TypeSpec compile, project preparation and .NET build
//! - WorkerClient: remote worker sessions, indexes and jobs
//!
//! These traits keep the convergence loop independent of the concrete
//! processes and HTTP endpoints it drives.

pub mod build_toolchain;
pub mod worker_client;

pub use build_toolchain::{BuildOutput, BuildToolchain};
pub use worker_client::WorkerClient;
