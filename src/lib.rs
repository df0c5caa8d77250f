//! azc-fixer - automated repair of AZC analyzer violations
//!
//! Compiles a TypeSpec project, builds the generated .NET SDK, extracts the
//! AZC analyzer violations from the build log and asks a remote AI worker
//! (an Azure AI Foundry agent) to rewrite `client.tsp` until the build is
//! clean or the iteration budget runs out.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and the port traits
//! - **Service Layer** (`services`): extraction, composition, dispatch and
//!   the convergence loop
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging and
//!   the workspace file store
//! - **Adapters** (`adapters`): TypeSpec/dotnet toolchain, Foundry HTTP
//!   client and scripted test doubles
//! - **CLI Layer** (`cli`): argument parsing and the run summary

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{FixerError, FixerResult};
pub use domain::models::{Config, RunOutcome, ViolationRecord};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{ConvergenceController, ConvergenceSettings, RemoteWorkDispatcher};
