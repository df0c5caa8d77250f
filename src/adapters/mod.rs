//! Concrete implementations of the domain ports.

pub mod foundry;
pub mod mock;
pub mod typespec;
