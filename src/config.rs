//! Configuration for the relaycast pipeline.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (RELAYCAST_* for credentials and overrides)
//! 2. Config file (relaycast.yaml, searched in cwd and parents)
//! 3. Defaults
//!
//! Credentials never live in the YAML file; they come from the environment
//! only. Guardrail rules sit in their own file so the watcher can reload
//! them without touching the rest of the configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::guardrails::GuardrailRules;
use crate::retry::RetryPolicy;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    /// YouTube channel to watch
    pub channel_id: String,
    /// Captions service base URL
    #[serde(default = "default_transcript_service")]
    pub transcript_service: String,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub publish_retry: Option<RetryPolicy>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Ingestion lookback window in hours
    #[serde(default = "default_window_hours")]
    pub window_hours: f64,
    /// Preferred transcript languages, tried in order
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    /// Seconds between watcher cycles
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_hours: default_window_hours(),
            languages: default_languages(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// SQLite database file (relative to the config file)
    pub database: Option<String>,
    /// Guardrail rules YAML (relative to the config file)
    pub guardrails: Option<String>,
    /// Prompt template directory (relative to the config file)
    pub prompts: Option<String>,
}

fn default_window_hours() -> f64 {
    24.0
}

fn default_languages() -> Vec<String> {
    vec!["ru".to_string(), "en".to_string()]
}

fn default_poll_interval() -> u64 {
    300
}

fn default_transcript_service() -> String {
    "http://127.0.0.1:8090".to_string()
}

/// Credentials pulled from the environment
#[derive(Debug, Clone)]
pub struct Credentials {
    pub anthropic_api_key: String,
    pub threads_access_token: String,
    pub threads_user_id: String,
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
}

impl Credentials {
    /// Read all required credentials, naming every missing variable at once
    pub fn from_env() -> Result<Self> {
        let mut missing = Vec::new();
        let mut get = |name: &'static str| match std::env::var(name) {
            Ok(v) if !v.trim().is_empty() => Some(v),
            _ => {
                missing.push(name);
                None
            }
        };

        let anthropic_api_key = get("RELAYCAST_ANTHROPIC_API_KEY");
        let threads_access_token = get("RELAYCAST_THREADS_ACCESS_TOKEN");
        let threads_user_id = get("RELAYCAST_THREADS_USER_ID");
        let telegram_bot_token = get("RELAYCAST_TELEGRAM_BOT_TOKEN");
        let telegram_chat_id = get("RELAYCAST_TELEGRAM_CHAT_ID");

        if !missing.is_empty() {
            anyhow::bail!("Missing environment variables: {}", missing.join(", "));
        }

        Ok(Self {
            anthropic_api_key: anthropic_api_key.unwrap(),
            threads_access_token: threads_access_token.unwrap(),
            threads_user_id: threads_user_id.unwrap(),
            telegram_bot_token: telegram_bot_token.unwrap(),
            telegram_chat_id: telegram_chat_id.unwrap(),
        })
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub channel_id: String,
    pub transcript_service: String,
    pub pipeline: PipelineConfig,
    pub retry: RetryPolicy,
    pub publish_retry: RetryPolicy,
    /// Absolute path to the SQLite database
    pub database_path: PathBuf,
    /// Absolute path to the guardrail rules file, if one is configured
    pub guardrails_path: Option<PathBuf>,
    /// Absolute path to the prompt template directory, if configured
    pub prompts_dir: Option<PathBuf>,
    /// Path to the config file (if found)
    pub config_file: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration, searching cwd and parents for relaycast.yaml
    pub fn load() -> Result<Self> {
        match find_config_file() {
            Some(path) => Self::load_from(&path),
            None => anyhow::bail!(
                "No relaycast.yaml found in the current directory or its parents"
            ),
        }
    }

    /// Load configuration from an explicit file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let file: ConfigFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if file.channel_id.trim().is_empty() {
            anyhow::bail!("channel_id must not be empty in {}", path.display());
        }

        let base_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();

        let database_path = match std::env::var("RELAYCAST_DATABASE") {
            Ok(db) => PathBuf::from(db),
            Err(_) => match &file.paths.database {
                Some(db) => resolve_path(&base_dir, db),
                None => default_database_path()?,
            },
        };

        let guardrails_path = file
            .paths
            .guardrails
            .as_deref()
            .map(|p| resolve_path(&base_dir, p));
        let prompts_dir = file
            .paths
            .prompts
            .as_deref()
            .map(|p| resolve_path(&base_dir, p));

        let publish_retry = file.publish_retry.unwrap_or_else(|| RetryPolicy {
            max_attempts: 5,
            ..file.retry.clone()
        });

        Ok(Self {
            channel_id: file.channel_id,
            transcript_service: file.transcript_service,
            pipeline: file.pipeline,
            retry: file.retry,
            publish_retry,
            database_path,
            guardrails_path,
            prompts_dir,
            config_file: Some(path.to_path_buf()),
        })
    }

    /// Load guardrail rules from the configured file, or defaults.
    ///
    /// Called once per watcher cycle so rule edits take effect without a
    /// restart. A missing or broken file falls back to defaults with a
    /// warning rather than stopping the pipeline.
    pub fn load_rules(&self) -> GuardrailRules {
        let Some(path) = &self.guardrails_path else {
            return GuardrailRules::default();
        };

        match GuardrailRules::from_file(path) {
            Ok(rules) => rules,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to load guardrail rules, using defaults"
                );
                GuardrailRules::default()
            }
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join("relaycast.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

fn default_database_path() -> Result<PathBuf> {
    let dir = dirs::data_dir()
        .context("Failed to determine data directory")?
        .join("relaycast");
    Ok(dir.join("relaycast.db"))
}

/// Resolve a path that may be relative to the config file's directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
