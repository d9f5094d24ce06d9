//! Provider invocation: the [`TextGenerator`] capability and its backends.
//!
//! ```text
//! Pipeline
//!     |
//!     v
//! ProviderChain --[openai, anthropic]--> &dyn TextGenerator
//!                                             |
//!                    generate(system, prompt) -> raw text
//! ```
//!
//! Generators know nothing about manifests. They make exactly one request per
//! call and never retry; fallback belongs to the pipeline.

pub mod anthropic;
pub mod chain;
pub mod error;
pub mod openai;
pub mod settings;
pub mod trait_def;

pub use anthropic::AnthropicGenerator;
pub use chain::ProviderChain;
pub use error::ProviderError;
pub use openai::OpenAiGenerator;
pub use settings::{ProviderKind, ProviderSettings};
pub use trait_def::TextGenerator;
