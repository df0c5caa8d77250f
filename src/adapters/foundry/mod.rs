//! Azure AI Foundry agents adapter
//!
//! - Agents, threads, messages and runs
//! - File upload and vector store indexing
//! - Exponential backoff for transient HTTP failures
//! - Static keys or Azure CLI tokens refreshed before expiry

pub mod auth;
pub mod client;
pub mod retry;
pub mod types;

pub use auth::{AccessToken, AzureCliCredential, StaticToken, TokenCache, TokenSource};
pub use client::FoundryAgentsClient;
pub use retry::RetryPolicy;
