//! Per-provider attempt records, kept for diagnostics only.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// Why an attempt did not yield a usable manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// Transport, authentication or rate-limit failure; no text was returned.
    Provider(String),
    /// Text came back but the extracted payload did not decode.
    Parse(String),
    /// The payload decoded but did not have the manifest shape.
    Validation(String),
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider(e) => write!(f, "provider error: {e}"),
            Self::Parse(e) => write!(f, "parse error: {e}"),
            Self::Validation(e) => write!(f, "validation error: {e}"),
        }
    }
}

/// One invocation of one provider during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAttempt {
    pub provider: String,
    pub model: String,
    /// 1-based position in the fallback sequence.
    pub ordinal: usize,
    pub started_at: DateTime<Utc>,
    /// Text returned by the provider, if the request succeeded.
    pub raw_response: Option<String>,
    /// Where the raw text was saved.
    pub artifact: Option<PathBuf>,
    /// `None` for the accepted attempt.
    pub failure: Option<AttemptFailure>,
}

impl ProviderAttempt {
    pub(crate) fn start(provider: &str, model: &str, ordinal: usize, started_at: DateTime<Utc>) -> Self {
        Self {
            provider: provider.to_string(),
            model: model.to_string(),
            ordinal,
            started_at,
            raw_response: None,
            artifact: None,
            failure: None,
        }
    }

    pub(crate) fn responded(mut self, raw: String, artifact: PathBuf) -> Self {
        self.raw_response = Some(raw);
        self.artifact = Some(artifact);
        self
    }

    pub(crate) fn replayed(mut self, raw: String) -> Self {
        self.raw_response = Some(raw);
        self
    }

    pub(crate) fn failed(mut self, failure: AttemptFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

impl fmt::Display for ProviderAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} ({})", self.ordinal, self.provider, self.model)?;
        match &self.failure {
            Some(failure) => write!(f, ": {failure}")?,
            None => f.write_str(": accepted")?,
        }
        if let Some(artifact) = &self.artifact {
            write!(f, " [raw output: {}]", artifact.display())?;
        }
        Ok(())
    }
}
