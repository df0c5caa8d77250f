//! Services: the convergence loop and the pure helpers it composes.

pub mod contract_extractor;
pub mod convergence_controller;
pub mod dispatcher;
pub mod error_extractor;
pub mod fixer_registry;
pub mod prompt_composer;

pub use contract_extractor::{extract_json_object, parse_contract};
pub use convergence_controller::{ConvergenceController, ConvergenceSettings};
pub use dispatcher::{DispatcherConfig, RemoteWorkDispatcher};
pub use error_extractor::{extract_violations, render_violation_log};
pub use fixer_registry::FixerRegistry;
