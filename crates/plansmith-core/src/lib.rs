//! Generation pipeline: master plan + task in, files on disk out.
//!
//! ```text
//! MasterPlan + task --prompt--> ProviderChain --raw text--> extract
//!     --> parse (Format) --> validate (EmptyPolicy) --> materialize
//! ```

pub mod manifest;
pub mod materialize;
pub mod pipeline;
pub mod prompt;
pub mod provider;

pub use manifest::{FileEntry, Format, Manifest};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, ProviderAttempt, RunOutcome};
pub use prompt::{MasterPlan, Prompt};
pub use provider::{ProviderChain, ProviderError, ProviderKind, ProviderSettings, TextGenerator};
