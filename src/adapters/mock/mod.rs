//! Deterministic in-memory doubles for the toolchain and worker ports.

mod toolchain;
mod worker;

pub use toolchain::ScriptedToolchain;
pub use worker::{JobScript, ScriptedWorker};
