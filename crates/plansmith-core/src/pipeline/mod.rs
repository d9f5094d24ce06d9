//! Pipeline orchestrator: prompt -> providers with fallback -> manifest -> disk.
//!
//! Providers are tried strictly one after another in chain order. Each
//! response is saved as a raw diagnostic artifact before it is interpreted,
//! so the text survives whatever happens next. The first response that
//! extracts, parses and validates is applied and the run stops there; a
//! provider error or an unusable response just moves on to the next provider.

mod attempt;

use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::manifest::{self, EmptyPolicy, Format, Manifest, ValidationError, resolve_within};
use crate::materialize::{self, WriteError};
use crate::prompt::{MasterPlan, Prompt};
use crate::provider::{ProviderChain, ProviderKind};

pub use attempt::{AttemptFailure, ProviderAttempt};

/// File name of the notes artifact written after a successful run.
pub const NOTES_ARTIFACT: &str = "AI_NOTES.md";

const RAW_ARTIFACT_PREFIX: &str = "AI_RAW_";
const RAW_ARTIFACT_SUFFIX: &str = ".txt";

/// File name of the raw-output artifact for `provider`.
pub fn raw_artifact_name(provider: &str) -> String {
    format!("{RAW_ARTIFACT_PREFIX}{provider}{RAW_ARTIFACT_SUFFIX}")
}

/// Whether `name` is the file name of a raw-output or notes artifact.
pub fn is_artifact_name(name: &str) -> bool {
    name == NOTES_ARTIFACT
        || (name.starts_with(RAW_ARTIFACT_PREFIX) && name.ends_with(RAW_ARTIFACT_SUFFIX))
}

// ---------------------------------------------------------------------------
// Configuration and results
// ---------------------------------------------------------------------------

/// Immutable settings for one pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Manifest paths are resolved against this directory.
    pub root: PathBuf,
    /// Raw-output and notes artifacts are written here.
    pub artifacts_dir: PathBuf,
    /// Format the model is asked to answer in.
    pub format: Format,
    /// Whether an empty `files` list counts as a usable manifest.
    pub empty_policy: EmptyPolicy,
    /// Validate and report, but write neither manifest files nor notes.
    pub dry_run: bool,
}

impl PipelineConfig {
    /// Defaults: artifacts next to the files, JSON, empty manifests rejected.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            artifacts_dir: root.clone(),
            root,
            format: Format::default(),
            empty_policy: EmptyPolicy::default(),
            dry_run: false,
        }
    }

    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = dir.into();
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn with_empty_policy(mut self, policy: EmptyPolicy) -> Self {
        self.empty_policy = policy;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// A run that applied a manifest.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    /// Provider whose manifest was applied.
    pub provider: String,
    /// Files written (or, in a dry run, that would have been written).
    pub files: Vec<PathBuf>,
    /// Notes artifact, if the manifest carried non-blank notes and this was
    /// not a dry run.
    pub notes_artifact: Option<PathBuf>,
    /// Every attempt made, in order; the last one is the accepted one.
    pub attempts: Vec<ProviderAttempt>,
    pub dry_run: bool,
}

/// Terminal failures of a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(
        "no provider returned a valid manifest after {} attempt(s); see the raw output artifacts",
        attempts.len()
    )]
    NoValidManifest { attempts: Vec<ProviderAttempt> },

    #[error(transparent)]
    Write(#[from] WriteError),
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Drives one or more runs over a fixed provider chain and configuration.
#[derive(Debug)]
pub struct Pipeline {
    chain: ProviderChain,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(chain: ProviderChain, config: PipelineConfig) -> Self {
        Self { chain, config }
    }

    /// Generate a manifest for `task` and apply the first valid one.
    ///
    /// Fails with [`PipelineError::Configuration`] before any request or
    /// write when the chain is empty.
    pub async fn run(&self, master_plan: &MasterPlan, task: &str) -> Result<RunOutcome, PipelineError> {
        if self.chain.is_empty() {
            return Err(PipelineError::Configuration(no_provider_message()));
        }

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id, format = %self.config.format);
        self.run_inner(run_id, master_plan, task).instrument(span).await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        master_plan: &MasterPlan,
        task: &str,
    ) -> Result<RunOutcome, PipelineError> {
        let prompt = Prompt::build(master_plan, task, self.config.format);
        let mut attempts: Vec<ProviderAttempt> = Vec::with_capacity(self.chain.len());

        for (index, generator) in self.chain.iter().enumerate() {
            let provider = generator.name().to_string();
            let mut attempt = ProviderAttempt::start(&provider, generator.model(), index + 1, Utc::now());

            tracing::info!(
                provider = %provider,
                model = %generator.model(),
                ordinal = attempt.ordinal,
                "requesting manifest"
            );

            let raw = match generator.generate(&prompt.system, &prompt.user).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(provider = %provider, error = %e, "provider failed, trying next");
                    attempts.push(attempt.failed(AttemptFailure::Provider(e.to_string())));
                    continue;
                }
            };

            // Persist before interpreting so the text survives a parse failure.
            let artifact =
                materialize::write_artifact(&self.config.artifacts_dir, &raw_artifact_name(&provider), &raw)
                    .await?;
            let verdict = self.interpret(&raw);
            attempt = attempt.responded(raw, artifact);

            let manifest = match verdict {
                Ok(manifest) => manifest,
                Err(failure) => {
                    tracing::warn!(
                        provider = %provider,
                        error = %failure,
                        "response unusable, trying next"
                    );
                    attempts.push(attempt.failed(failure));
                    continue;
                }
            };

            tracing::info!(
                provider = %provider,
                files = manifest.files.len(),
                "accepted manifest"
            );
            attempts.push(attempt);
            return self.apply(run_id, provider, manifest, attempts).await;
        }

        tracing::error!(attempts = attempts.len(), "all providers exhausted without a valid manifest");
        Err(PipelineError::NoValidManifest { attempts })
    }

    /// Apply a previously saved raw response without calling any provider.
    ///
    /// `raw` goes through the same extraction, parsing and validation as a
    /// live response; `provider` is only used to attribute the notes.
    pub async fn replay(&self, provider: &str, raw: &str) -> Result<RunOutcome, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("replay", %run_id, %provider);

        async {
            let attempt = ProviderAttempt::start(provider, "replay", 1, Utc::now());
            match self.interpret(raw) {
                Ok(manifest) => {
                    let attempt = attempt.replayed(raw.to_string());
                    self.apply(run_id, provider.to_string(), manifest, vec![attempt])
                        .await
                }
                Err(failure) => {
                    tracing::warn!(error = %failure, "saved response unusable");
                    let attempt = attempt.replayed(raw.to_string()).failed(failure);
                    Err(PipelineError::NoValidManifest {
                        attempts: vec![attempt],
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Extract, parse and validate one raw response.
    pub fn interpret(&self, raw: &str) -> Result<Manifest, AttemptFailure> {
        let payload = manifest::extract(raw, self.config.format);
        let document = manifest::parse(payload, self.config.format)
            .map_err(|e| AttemptFailure::Parse(e.to_string()))?;
        manifest::validate(document, self.config.empty_policy)
            .and_then(|manifest| self.reject_artifact_paths(manifest))
            .map_err(|e| AttemptFailure::Validation(e.to_string()))
    }

    /// Refuse entries that would land on a raw-output or notes artifact, so
    /// a manifest can never overwrite the diagnostics of its own run.
    fn reject_artifact_paths(&self, manifest: Manifest) -> Result<Manifest, ValidationError> {
        for (index, entry) in manifest.files.iter().enumerate() {
            let Ok(target) = resolve_within(&self.config.root, &entry.path) else {
                continue;
            };
            let Some(name) = target.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if target.parent() == Some(self.config.artifacts_dir.as_path()) && is_artifact_name(name) {
                return Err(ValidationError::ReservedPath {
                    index,
                    path: entry.path.clone(),
                    artifact: name.to_string(),
                });
            }
        }
        Ok(manifest)
    }

    async fn apply(
        &self,
        run_id: Uuid,
        provider: String,
        manifest: Manifest,
        attempts: Vec<ProviderAttempt>,
    ) -> Result<RunOutcome, PipelineError> {
        let root = self.config.root.as_path();

        if self.config.dry_run {
            let files = materialize::plan_paths(&manifest, root).await?;
            for path in &files {
                tracing::info!(path = %display_relative(path, root), "would write");
            }
            return Ok(RunOutcome {
                run_id,
                provider,
                files,
                notes_artifact: None,
                attempts,
                dry_run: true,
            });
        }

        let files = materialize::materialize(&manifest, root).await?;

        let notes = manifest.notes.as_deref().filter(|n| !n.trim().is_empty());
        let notes_artifact = match notes {
            Some(notes) => Some(
                materialize::write_artifact(
                    &self.config.artifacts_dir,
                    NOTES_ARTIFACT,
                    &format_notes(&provider, notes),
                )
                .await?,
            ),
            None => None,
        };

        Ok(RunOutcome {
            run_id,
            provider,
            files,
            notes_artifact,
            attempts,
            dry_run: false,
        })
    }
}

/// Notes artifact content, attributed to the provider that produced them.
pub fn format_notes(provider: &str, notes: &str) -> String {
    format!("[provider: {provider}] {notes}\n")
}

fn no_provider_message() -> String {
    let vars: Vec<&str> = ProviderKind::PRIORITY.iter().map(|k| k.api_key_var()).collect();
    format!("no provider configured; set at least one of {}", vars.join(", "))
}

fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}
