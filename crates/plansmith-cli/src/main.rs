mod config;
mod run_cmd;
#[cfg(test)]
mod test_util;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use plansmith_core::Format;

use config::{Overrides, ResolvedConfig};

#[derive(Parser)]
#[command(
    name = "plansmith",
    version,
    about = "Generate project files from a master plan with an LLM"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the configured providers for a file manifest and write it
    Run {
        /// What to build (overrides TASK env var)
        #[arg(long)]
        task: Option<String>,
        /// Path to the master plan (overrides MASTER_PLAN_PATH env var)
        #[arg(long)]
        master_plan: Option<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Apply a saved raw response without calling any provider
    Replay {
        /// Raw response file, e.g. AI_RAW_openai.txt
        raw_file: PathBuf,
        /// Provider to attribute notes to (defaults to the name in the file name)
        #[arg(long)]
        provider: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// List configured providers in fallback order
    Providers,
    /// Write a default plansmith config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Flags shared by the commands that apply a manifest.
#[derive(Args)]
struct OutputArgs {
    /// Directory manifest paths are resolved against (overrides PLANSMITH_ROOT)
    #[arg(long)]
    root: Option<PathBuf>,
    /// Directory for raw-output and notes artifacts (defaults to the root)
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,
    /// Manifest format to request and parse: json or yaml
    #[arg(long)]
    format: Option<Format>,
    /// Accept a manifest with no files instead of falling back
    #[arg(long)]
    allow_empty: bool,
    /// Validate and list files without writing them
    #[arg(long)]
    dry_run: bool,
}

impl OutputArgs {
    fn into_overrides(self) -> Overrides {
        Overrides {
            root: self.root,
            artifacts_dir: self.artifacts_dir,
            format: self.format,
            allow_empty: self.allow_empty,
            dry_run: self.dry_run,
            ..Overrides::default()
        }
    }
}

/// Execute the `plansmith init` command: write config file.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let path = config::save_config(&config::default_config_file())?;

    println!("Config written to {}", path.display());
    println!();
    println!("API keys are read from the environment only. Set at least one of:");
    for kind in plansmith_core::ProviderKind::PRIORITY {
        println!("  {}", kind.api_key_var());
    }

    Ok(())
}

/// Execute the `plansmith providers` command: list the fallback order.
fn cmd_providers() -> anyhow::Result<()> {
    let resolved = ResolvedConfig::from_environment(&Overrides::default())?;

    if resolved.providers.is_empty() {
        let vars: Vec<&str> = plansmith_core::ProviderKind::PRIORITY
            .iter()
            .map(|k| k.api_key_var())
            .collect();
        println!("No providers configured. Set {}.", vars.join(" or "));
        return Ok(());
    }

    for (index, settings) in resolved.providers.iter().enumerate() {
        println!(
            "{}. {} model={} base_url={}",
            index + 1,
            settings.kind,
            settings.model,
            settings.base_url
        );
    }
    Ok(())
}

async fn execute(command: Commands) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Run {
            task,
            master_plan,
            output,
        } => {
            let overrides = Overrides {
                task,
                master_plan,
                ..output.into_overrides()
            };
            let resolved = ResolvedConfig::from_environment(&overrides)?;
            run_cmd::run_generate(resolved).await
        }
        Commands::Replay {
            raw_file,
            provider,
            output,
        } => {
            let resolved = ResolvedConfig::from_environment(&output.into_overrides())?;
            run_cmd::run_replay(resolved, &raw_file, provider).await
        }
        Commands::Providers => {
            cmd_providers()?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Init { force } => {
            cmd_init(force)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match execute(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
