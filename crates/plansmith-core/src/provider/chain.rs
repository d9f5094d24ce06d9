//! Provider chain -- the ordered list of generators the pipeline falls back
//! through.
//!
//! Unlike a lookup table, order is the whole point: the pipeline walks the
//! chain front to back and stops at the first usable manifest.

use super::anthropic::AnthropicGenerator;
use super::error::ProviderError;
use super::openai::OpenAiGenerator;
use super::settings::{ProviderKind, ProviderSettings};
use super::trait_def::TextGenerator;

/// Generators in fallback priority order.
///
/// # Example
///
/// ```ignore
/// let chain = ProviderChain::from_settings(settings)?;
/// for generator in chain.iter() {
///     let text = generator.generate(&prompt.system, &prompt.user).await?;
/// }
/// ```
#[derive(Default)]
pub struct ProviderChain {
    generators: Vec<Box<dyn TextGenerator>>,
}

impl ProviderChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the real backends for every configured provider.
    ///
    /// Settings are sorted into [`ProviderKind::PRIORITY`] order regardless of
    /// the order they were given in. A kind given twice keeps its first entry.
    pub fn from_settings(
        settings: impl IntoIterator<Item = ProviderSettings>,
    ) -> Result<Self, ProviderError> {
        let mut settings: Vec<ProviderSettings> = settings.into_iter().collect();
        settings.sort_by_key(|s| s.kind);
        settings.dedup_by_key(|s| s.kind);

        let mut chain = Self::new();
        for s in settings {
            match s.kind {
                ProviderKind::OpenAi => chain.push(OpenAiGenerator::new(s)?),
                ProviderKind::Anthropic => chain.push(AnthropicGenerator::new(s)?),
            }
        }
        Ok(chain)
    }

    /// Append a generator at the lowest priority.
    pub fn push(&mut self, generator: impl TextGenerator + 'static) {
        self.generators.push(Box::new(generator));
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, generator: impl TextGenerator + 'static) -> Self {
        self.push(generator);
        self
    }

    /// Generators, highest priority first.
    pub fn iter(&self) -> impl Iterator<Item = &dyn TextGenerator> {
        self.generators.iter().map(|g| g.as_ref())
    }

    /// Names of all generators, in priority order.
    pub fn names(&self) -> Vec<&str> {
        self.generators.iter().map(|g| g.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }
}

impl std::fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderChain")
            .field("generators", &self.names())
            .finish()
    }
}
