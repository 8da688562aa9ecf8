//! Discovery configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level `discovery.yml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub llm: LlmConfig,
    pub discovery: DiscoveryConfig,
    pub storage: StorageConfig,

    /// TRACE, DEBUG, INFO, WARN or ERROR
    pub log_level: Option<String>,
}

impl Config {
    /// Fail fast on a missing API key or unusable job bounds
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            eyre::bail!("LLM API key not found. Set the {} environment variable.", self.llm.api_key_env);
        }
        self.discovery.validate()
    }

    /// `--config` if given; otherwise `.discovery.yml`, then the user config, then defaults
    ///
    /// An explicit path must load. Broken fallback files are skipped with a warning.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).with_context(|| format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::fallback_paths() {
            if !candidate.exists() {
                continue;
            }
            match Self::load_from_file(&candidate) {
                Ok(config) => return Ok(config),
                Err(e) => tracing::warn!(path = %candidate.display(), error = %e, "Skipping unreadable config"),
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn fallback_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".discovery.yml")];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("discovery").join("discovery.yml"));
        }
        paths
    }

    /// Log level only, read before logging exists; load errors surface later
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok()?.log_level
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!(path = %path.display(), "Loaded config");
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,

    /// Environment variable containing the API key
    pub api_key_env: String,

    pub base_url: String,
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 8192,
            timeout_ms: 300_000,
        }
    }
}

impl LlmConfig {
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).with_context(|| format!("{} is not set", self.api_key_env))
    }
}

/// Hard limits on how many analysis jobs one round may plan
pub const PLAN_MIN_JOBS: usize = 2;
pub const PLAN_MAX_JOBS: usize = 6;

/// Round orchestration tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DiscoveryConfig {
    /// Fewest analysis jobs a round may run
    pub min_jobs: usize,

    /// Most analysis jobs a round may run
    pub max_jobs: usize,

    /// Attempts per analysis job, first try included
    pub max_attempts: u32,

    /// Per-attempt timeout in seconds
    pub job_timeout_secs: u64,

    /// Pause between attempts of the same job
    pub retry_delay_ms: u64,

    /// Character distance allowed between a noun and a verb in change detection
    pub signal_window: usize,

    /// Step budget forwarded to the analysis call
    pub max_steps: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            min_jobs: 2,
            max_jobs: 6,
            max_attempts: 2,
            job_timeout_secs: 180,
            retry_delay_ms: 500,
            signal_window: 48,
            max_steps: 8,
        }
    }
}

impl DiscoveryConfig {
    /// Reject bounds the planner cannot honor
    pub fn validate(&self) -> Result<()> {
        let allowed = PLAN_MIN_JOBS..=PLAN_MAX_JOBS;
        if !allowed.contains(&self.min_jobs) || !allowed.contains(&self.max_jobs) || self.min_jobs > self.max_jobs {
            eyre::bail!(
                "Invalid job bounds: min-jobs={} max-jobs={} (both must lie in {}..={}, min <= max)",
                self.min_jobs,
                self.max_jobs,
                PLAN_MIN_JOBS,
                PLAN_MAX_JOBS
            );
        }
        if self.max_attempts == 0 {
            eyre::bail!("max-attempts must be at least 1");
        }
        Ok(())
    }
}

/// Where profiles, sessions and event logs live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Directory for per-project profile artifacts
    pub cache_dir: PathBuf,

    /// Directory for discovery sessions
    pub sessions_dir: PathBuf,

    /// Directory for per-session progress event logs
    pub events_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = dirs::data_dir()
            .map(|d| d.join("discovery"))
            .unwrap_or_else(|| PathBuf::from(".discovery"));

        Self {
            cache_dir: base.join("profiles"),
            sessions_dir: base.join("sessions"),
            events_dir: base.join("rounds"),
        }
    }
}
