//! Configuration file management for plansmith.
//!
//! Provides a TOML-based config file at `~/.config/plansmith/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.
//!
//! Credentials are read from the environment only and never written to the
//! config file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use plansmith_core::manifest::EmptyPolicy;
use plansmith_core::provider::settings::DEFAULT_TIMEOUT;
use plansmith_core::{Format, PipelineConfig, ProviderKind, ProviderSettings};

/// Task used when none is given on the command line or in `TASK`.
pub const DEFAULT_TASK: &str = "Scaffold the application";

/// Master plan location used when nothing else is configured.
pub const DEFAULT_MASTER_PLAN: &str = "docs/MASTER_PLAN.md";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub openai: ProviderSection,
    #[serde(default)]
    pub anthropic: ProviderSection,
}

impl ConfigFile {
    fn provider(&self, kind: ProviderKind) -> &ProviderSection {
        match kind {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Anthropic => &self.anthropic,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_plan: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts_dir: Option<PathBuf>,
    /// `json` or `yaml`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_empty: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the plansmith config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/plansmith` or
/// `~/.config/plansmith`, also on macOS.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg).join("plansmith");
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("plansmith")
}

/// Return the path to the plansmith config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns `Ok(None)` if it does not exist;
/// a file that exists but does not parse is an error.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(Some(config))
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    Ok(path)
}

/// The file `plansmith init` writes: every non-secret setting at its default.
pub fn default_config_file() -> ConfigFile {
    let section = |kind: ProviderKind| ProviderSection {
        model: Some(kind.default_model().to_string()),
        base_url: Some(kind.default_base_url().to_string()),
    };
    ConfigFile {
        pipeline: PipelineSection {
            master_plan: Some(PathBuf::from(DEFAULT_MASTER_PLAN)),
            artifacts_dir: None,
            format: Some(Format::default().to_string()),
            allow_empty: Some(false),
            timeout_secs: Some(DEFAULT_TIMEOUT.as_secs()),
        },
        openai: section(ProviderKind::OpenAi),
        anthropic: section(ProviderKind::Anthropic),
    }
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line. `None` (or `false` for switches) means
/// "not given", letting the env var, file or default decide.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub task: Option<String>,
    pub master_plan: Option<PathBuf>,
    pub root: Option<PathBuf>,
    pub artifacts_dir: Option<PathBuf>,
    pub format: Option<Format>,
    pub allow_empty: bool,
    pub dry_run: bool,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct ResolvedConfig {
    pub task: String,
    pub master_plan: PathBuf,
    pub pipeline: PipelineConfig,
    /// Providers that have a credential, in priority order.
    pub providers: Vec<ProviderSettings>,
}

impl ResolvedConfig {
    /// Resolve against the process environment and the config file on disk.
    pub fn from_environment(overrides: &Overrides) -> Result<Self> {
        let file = load_config()?;
        Self::resolve(overrides, |key| std::env::var(key).ok(), file.as_ref())
    }

    /// Resolve using the chain: CLI flag > env var > config file > default.
    ///
    /// `env` stands in for the process environment; values that are empty
    /// count as unset.
    pub fn resolve(
        overrides: &Overrides,
        env: impl Fn(&str) -> Option<String>,
        file: Option<&ConfigFile>,
    ) -> Result<Self> {
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let default_file = ConfigFile::default();
        let file = file.unwrap_or(&default_file);

        let task = overrides
            .task
            .clone()
            .or_else(|| lookup("TASK"))
            .unwrap_or_else(|| DEFAULT_TASK.to_string());

        let master_plan = overrides
            .master_plan
            .clone()
            .or_else(|| lookup("MASTER_PLAN_PATH").map(PathBuf::from))
            .or_else(|| file.pipeline.master_plan.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MASTER_PLAN));

        let root = overrides
            .root
            .clone()
            .or_else(|| lookup("PLANSMITH_ROOT").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));

        let artifacts_dir = overrides
            .artifacts_dir
            .clone()
            .or_else(|| lookup("PLANSMITH_ARTIFACTS_DIR").map(PathBuf::from))
            .or_else(|| file.pipeline.artifacts_dir.clone())
            .unwrap_or_else(|| root.clone());

        // Format.
        let format = if let Some(format) = overrides.format {
            format
        } else if let Some(name) = lookup("PLANSMITH_FORMAT") {
            name.parse::<Format>().context("invalid PLANSMITH_FORMAT")?
        } else if let Some(name) = &file.pipeline.format {
            name.parse::<Format>()
                .context("invalid pipeline.format in config file")?
        } else {
            Format::default()
        };

        // Empty-manifest policy.
        let allow_empty = if overrides.allow_empty {
            true
        } else if let Some(value) = lookup("PLANSMITH_ALLOW_EMPTY") {
            parse_bool(&value).context("invalid PLANSMITH_ALLOW_EMPTY")?
        } else {
            file.pipeline.allow_empty.unwrap_or(false)
        };

        // Request timeout.
        let timeout_secs = if let Some(value) = lookup("PLANSMITH_TIMEOUT_SECS") {
            Some(
                value
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("invalid PLANSMITH_TIMEOUT_SECS: {value:?}"))?,
            )
        } else {
            file.pipeline.timeout_secs
        };
        let timeout = match timeout_secs {
            Some(0) => bail!("request timeout must be at least one second"),
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_TIMEOUT,
        };

        // Providers: only those with a credential take part.
        let mut providers = Vec::new();
        for kind in ProviderKind::PRIORITY {
            let Some(api_key) = lookup(kind.api_key_var()) else {
                continue;
            };
            let section = file.provider(kind);
            let mut settings = ProviderSettings::new(kind, api_key).with_timeout(timeout);
            if let Some(model) = lookup(kind.model_var()).or_else(|| section.model.clone()) {
                settings = settings.with_model(model);
            }
            if let Some(url) = lookup(kind.base_url_var()).or_else(|| section.base_url.clone()) {
                settings = settings.with_base_url(url);
            }
            providers.push(settings);
        }

        let pipeline = PipelineConfig::new(root)
            .with_artifacts_dir(artifacts_dir)
            .with_format(format)
            .with_empty_policy(EmptyPolicy::from_allow_empty(allow_empty))
            .with_dry_run(overrides.dry_run);

        Ok(Self {
            task,
            master_plan,
            pipeline,
            providers,
        })
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean (true/false, 1/0, yes/no), got {other:?}"),
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn no_env() -> impl Fn(&str) -> Option<String> {
        env_of(&[])
    }

    fn file_with_pipeline(pipeline: PipelineSection) -> ConfigFile {
        ConfigFile {
            pipeline,
            ..ConfigFile::default()
        }
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = ResolvedConfig::resolve(&Overrides::default(), no_env(), None).unwrap();

        assert_eq!(config.task, DEFAULT_TASK);
        assert_eq!(config.master_plan, PathBuf::from("docs/MASTER_PLAN.md"));
        assert_eq!(config.pipeline.root, PathBuf::from("."));
        assert_eq!(config.pipeline.artifacts_dir, PathBuf::from("."));
        assert_eq!(config.pipeline.format, Format::Json);
        assert_eq!(config.pipeline.empty_policy, EmptyPolicy::Reject);
        assert!(!config.pipeline.dry_run);
        assert!(config.providers.is_empty());
    }

    #[test]
    fn cli_flag_overrides_env_and_file() {
        let overrides = Overrides {
            task: Some("from cli".into()),
            master_plan: Some("cli/PLAN.md".into()),
            format: Some(Format::Yaml),
            ..Overrides::default()
        };
        let env = env_of(&[
            ("TASK", "from env"),
            ("MASTER_PLAN_PATH", "env/PLAN.md"),
            ("PLANSMITH_FORMAT", "json"),
        ]);
        let file = file_with_pipeline(PipelineSection {
            master_plan: Some("file/PLAN.md".into()),
            format: Some("json".into()),
            ..PipelineSection::default()
        });

        let config = ResolvedConfig::resolve(&overrides, env, Some(&file)).unwrap();

        assert_eq!(config.task, "from cli");
        assert_eq!(config.master_plan, PathBuf::from("cli/PLAN.md"));
        assert_eq!(config.pipeline.format, Format::Yaml);
    }

    #[test]
    fn env_overrides_file() {
        let env = env_of(&[("MASTER_PLAN_PATH", "env/PLAN.md"), ("PLANSMITH_FORMAT", "yml")]);
        let file = file_with_pipeline(PipelineSection {
            master_plan: Some("file/PLAN.md".into()),
            format: Some("json".into()),
            ..PipelineSection::default()
        });

        let config = ResolvedConfig::resolve(&Overrides::default(), env, Some(&file)).unwrap();

        assert_eq!(config.master_plan, PathBuf::from("env/PLAN.md"));
        assert_eq!(config.pipeline.format, Format::Yaml);
    }

    #[test]
    fn file_overrides_default() {
        let file = file_with_pipeline(PipelineSection {
            master_plan: Some("file/PLAN.md".into()),
            artifacts_dir: Some(".plansmith".into()),
            allow_empty: Some(true),
            ..PipelineSection::default()
        });

        let config = ResolvedConfig::resolve(&Overrides::default(), no_env(), Some(&file)).unwrap();

        assert_eq!(config.master_plan, PathBuf::from("file/PLAN.md"));
        assert_eq!(config.pipeline.artifacts_dir, PathBuf::from(".plansmith"));
        assert_eq!(config.pipeline.empty_policy, EmptyPolicy::Accept);
    }

    #[test]
    fn empty_env_values_count_as_unset() {
        let env = env_of(&[("TASK", ""), ("OPENAI_API_KEY", "  "), ("PLANSMITH_FORMAT", "")]);

        let config = ResolvedConfig::resolve(&Overrides::default(), env, None).unwrap();

        assert_eq!(config.task, DEFAULT_TASK);
        assert_eq!(config.pipeline.format, Format::Json);
        assert!(config.providers.is_empty());
    }

    #[test]
    fn artifacts_dir_follows_root() {
        let env = env_of(&[("PLANSMITH_ROOT", "/srv/app")]);

        let config = ResolvedConfig::resolve(&Overrides::default(), env, None).unwrap();

        assert_eq!(config.pipeline.root, PathBuf::from("/srv/app"));
        assert_eq!(config.pipeline.artifacts_dir, PathBuf::from("/srv/app"));
    }

    #[test]
    fn providers_in_priority_order_with_overrides() {
        let env = env_of(&[
            ("ANTHROPIC_API_KEY", "ak"),
            ("OPENAI_API_KEY", "sk"),
            ("OPENAI_MODEL", "gpt-4o"),
            ("PLANSMITH_TIMEOUT_SECS", "30"),
        ]);
        let file = ConfigFile {
            anthropic: ProviderSection {
                model: Some("claude-from-file".into()),
                base_url: Some("http://localhost:9000/".into()),
            },
            openai: ProviderSection {
                model: Some("ignored-because-env-wins".into()),
                base_url: None,
            },
            ..ConfigFile::default()
        };

        let config = ResolvedConfig::resolve(&Overrides::default(), env, Some(&file)).unwrap();

        let kinds: Vec<ProviderKind> = config.providers.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![ProviderKind::OpenAi, ProviderKind::Anthropic]);

        let openai = &config.providers[0];
        assert_eq!(openai.api_key, "sk");
        assert_eq!(openai.model, "gpt-4o");
        assert_eq!(openai.base_url, "https://api.openai.com/v1");
        assert_eq!(openai.timeout, Duration::from_secs(30));

        let anthropic = &config.providers[1];
        assert_eq!(anthropic.model, "claude-from-file");
        assert_eq!(anthropic.base_url, "http://localhost:9000");
    }

    #[test]
    fn provider_without_key_is_skipped() {
        let env = env_of(&[("ANTHROPIC_API_KEY", "ak"), ("OPENAI_MODEL", "gpt-4o")]);

        let config = ResolvedConfig::resolve(&Overrides::default(), env, None).unwrap();

        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].kind, ProviderKind::Anthropic);
    }

    #[test]
    fn allow_empty_flag_beats_env_false() {
        let overrides = Overrides {
            allow_empty: true,
            ..Overrides::default()
        };
        let env = env_of(&[("PLANSMITH_ALLOW_EMPTY", "false")]);

        let config = ResolvedConfig::resolve(&overrides, env, None).unwrap();

        assert_eq!(config.pipeline.empty_policy, EmptyPolicy::Accept);
    }

    #[test]
    fn invalid_values_are_errors() {
        let cases = [
            ("PLANSMITH_FORMAT", "xml", "PLANSMITH_FORMAT"),
            ("PLANSMITH_ALLOW_EMPTY", "maybe", "PLANSMITH_ALLOW_EMPTY"),
            ("PLANSMITH_TIMEOUT_SECS", "soon", "PLANSMITH_TIMEOUT_SECS"),
            ("PLANSMITH_TIMEOUT_SECS", "0", "at least one second"),
        ];
        for (key, value, expected) in cases {
            let err = ResolvedConfig::resolve(&Overrides::default(), env_of(&[(key, value)]), None)
                .unwrap_err();
            let msg = format!("{err:#}");
            assert!(msg.contains(expected), "{key}={value}: unexpected error: {msg}");
        }
    }

    #[test]
    fn invalid_format_in_file_is_error() {
        let file = file_with_pipeline(PipelineSection {
            format: Some("toml".into()),
            ..PipelineSection::default()
        });

        let err = ResolvedConfig::resolve(&Overrides::default(), no_env(), Some(&file)).unwrap_err();

        assert!(format!("{err:#}").contains("pipeline.format"));
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        for v in ["1", "true", "TRUE", "yes", "on"] {
            assert!(parse_bool(v).unwrap(), "{v}");
        }
        for v in ["0", "false", "No", "off"] {
            assert!(!parse_bool(v).unwrap(), "{v}");
        }
    }

    #[test]
    fn default_config_file_roundtrips_through_toml() {
        let original = default_config_file();
        let contents = toml::to_string_pretty(&original).unwrap();
        let loaded: ConfigFile = toml::from_str(&contents).unwrap();

        assert_eq!(loaded, original);
        assert!(contents.contains("[pipeline]"));
        assert!(!contents.contains("api_key"));
    }

    #[test]
    fn partial_file_parses() {
        let loaded: ConfigFile = toml::from_str("[anthropic]\nmodel = \"claude-x\"\n").unwrap();

        assert_eq!(loaded.anthropic.model.as_deref(), Some("claude-x"));
        assert_eq!(loaded.pipeline, PipelineSection::default());
    }

    #[test]
    fn save_and_load_config_under_xdg() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let orig_xdg = std::env::var("XDG_CONFIG_HOME").ok();
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };

        let missing = load_config();
        let saved = save_config(&default_config_file());
        let loaded = load_config();

        // Restore env before asserting, to avoid poisoning the mutex on failure.
        match orig_xdg {
            Some(x) => unsafe { std::env::set_var("XDG_CONFIG_HOME", x) },
            None => unsafe { std::env::remove_var("XDG_CONFIG_HOME") },
        }

        assert!(missing.unwrap().is_none());
        assert_eq!(saved.unwrap(), tmp.path().join("plansmith").join("config.toml"));
        assert_eq!(loaded.unwrap(), Some(default_config_file()));
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let _lock = lock_env();
        let path = config_path();
        assert!(
            path.ends_with("plansmith/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
