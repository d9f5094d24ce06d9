//! The `TextGenerator` trait -- the single capability every provider offers.
//!
//! The trait is object-safe so backends can be stored as
//! `Box<dyn TextGenerator>` in a [`super::ProviderChain`].

use async_trait::async_trait;

use super::error::ProviderError;

/// Prompt in, text out.
///
/// Implementations differ only in request shape (model identifier, token
/// limits, message roles). A failed request is reported as a
/// [`ProviderError`]; an empty but successful response is `Ok("")`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Stable identifier (e.g. "openai"). Used in logs and artifact names.
    fn name(&self) -> &str;

    /// Model identifier requests are sent to.
    fn model(&self) -> &str;

    /// Send one generation request and return the model's text.
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, ProviderError>;
}

// Compile-time assertion: TextGenerator must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn TextGenerator) {}
};
