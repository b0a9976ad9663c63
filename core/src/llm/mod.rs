//! Secondary model client
//!
//! The secondary model is a stateless text-generation service consulted for
//! every user-facing reply. The orchestrator only sees the
//! [`SecondaryModel`] trait; [`OllamaClient`] is the HTTP implementation.

pub mod client;

pub use client::OllamaClient;

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait SecondaryModel: Send + Sync {
    /// One prompt in, one reply out. Failures are never retried here.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Cheap reachability check, bounded by a short timeout.
    async fn test_connection(&self) -> bool;

    /// Model identifier, for status output.
    fn name(&self) -> &str;
}
