//! `plansmith run` and `plansmith replay`: drive the pipeline and map the
//! outcome to an exit code.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};

use plansmith_core::{MasterPlan, Pipeline, PipelineError, ProviderChain, RunOutcome};

use crate::config::ResolvedConfig;

/// Exit code for a run whose accepted manifest listed no files.
pub const EXIT_EMPTY_MANIFEST: u8 = 2;

/// Generate a manifest from the configured providers and apply it.
pub async fn run_generate(config: ResolvedConfig) -> Result<ExitCode> {
    let master_plan = MasterPlan::load(&config.master_plan).await?;
    let chain = ProviderChain::from_settings(config.providers)
        .context("failed to initialise provider clients")?;

    tracing::info!(
        providers = ?chain.names(),
        master_plan = %config.master_plan.display(),
        "starting run"
    );

    let pipeline = Pipeline::new(chain, config.pipeline);
    let result = pipeline.run(&master_plan, &config.task).await;
    report(result)
}

/// Apply a saved raw response without calling any provider.
///
/// When `provider` is not given it is taken from an `AI_RAW_<provider>.txt`
/// file name, falling back to `replay`.
pub async fn run_replay(
    config: ResolvedConfig,
    raw_file: &Path,
    provider: Option<String>,
) -> Result<ExitCode> {
    let raw = tokio::fs::read_to_string(raw_file)
        .await
        .with_context(|| format!("failed to read raw response at {}", raw_file.display()))?;
    let provider = provider.unwrap_or_else(|| provider_from_artifact_name(raw_file));

    let pipeline = Pipeline::new(ProviderChain::new(), config.pipeline);
    let result = pipeline.replay(&provider, &raw).await;
    report(result)
}

fn provider_from_artifact_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix("AI_RAW_"))
        .and_then(|n| n.strip_suffix(".txt"))
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "replay".to_string())
}

/// Print the outcome and choose the exit code.
fn report(result: Result<RunOutcome, PipelineError>) -> Result<ExitCode> {
    if let Err(PipelineError::NoValidManifest { attempts }) = &result {
        eprintln!("Attempts:");
        for attempt in attempts {
            eprintln!("  {attempt}");
        }
    }
    let outcome = result?;

    let verb = if outcome.dry_run { "Would write" } else { "Wrote" };
    if outcome.files.is_empty() {
        println!(
            "Manifest from {} contained no files; nothing written.",
            outcome.provider
        );
    } else {
        println!("{verb} {} file(s) from {}:", outcome.files.len(), outcome.provider);
        for path in &outcome.files {
            println!("  {}", path.display());
        }
    }
    if let Some(notes) = &outcome.notes_artifact {
        println!("Notes: {}", notes.display());
    }

    if outcome.files.is_empty() {
        return Ok(ExitCode::from(EXIT_EMPTY_MANIFEST));
    }
    Ok(ExitCode::SUCCESS)
}
