//! Process configuration: TOML file, then environment overrides.
//!
//! Read once at startup. Provider credentials never live here; adapters read
//! them from the environment directly.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::gateway::{GatewayConfig, ModelRoute, ProviderId};
use crate::leaderboard;
use crate::pipeline::{PipelineConfig, StageRoutes};
use crate::retry::RetryPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid {stage} route: {message}")]
    InvalidRoute { stage: &'static str, message: String },
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutesSection {
    /// `provider/model`, e.g. `anthropic/claude-sonnet-4-5`.
    pub brainstorm: String,
    pub generate: String,
    pub tournament: String,
}

impl Default for RoutesSection {
    fn default() -> Self {
        let routes = StageRoutes::default();
        Self {
            brainstorm: routes.brainstorm.to_string(),
            generate: routes.generate.to_string(),
            tournament: routes.tournament.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSection {
    pub call_seconds: u64,
    pub story_seconds: u64,
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self {
            call_seconds: 60,
            story_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrainstormSection {
    pub angle_count: usize,
    pub inspiration_words: usize,
}

impl Default for BrainstormSection {
    fn default() -> Self {
        Self {
            angle_count: 5,
            inspiration_words: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TournamentSection {
    pub top_k: usize,
    pub rounds: Option<u32>,
    pub concurrency: usize,
    pub symmetry_probe: bool,
    pub require_independent_judge: bool,
}

impl Default for TournamentSection {
    fn default() -> Self {
        Self {
            top_k: 4,
            rounds: None,
            concurrency: 4,
            symmetry_probe: false,
            require_independent_judge: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    pub max_concurrency_per_provider: usize,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            max_concurrency_per_provider: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardSection {
    pub capacity: usize,
}

impl Default for LeaderboardSection {
    fn default() -> Self {
        Self {
            capacity: leaderboard::DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub routes: RoutesSection,
    pub retry: RetrySection,
    pub timeouts: TimeoutSection,
    pub brainstorm: BrainstormSection,
    pub tournament: TournamentSection,
    pub gateway: GatewaySection,
    pub leaderboard: LeaderboardSection,
}

impl AppConfig {
    /// Defaults, overlaid by `path` when given, overlaid by the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `{STAGE}_PROVIDER` / `{STAGE}_MODEL`, `STORY_TIMEOUT_SECONDS` and
    /// `CALL_TIMEOUT_SECONDS` overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        for (stage, prefix) in [
            ("brainstorm", "BRAINSTORM"),
            ("generate", "GENERATE"),
            ("tournament", "TOURNAMENT"),
        ] {
            let provider = lookup(&format!("{prefix}_PROVIDER"));
            let model = lookup(&format!("{prefix}_MODEL"));
            if provider.is_none() && model.is_none() {
                continue;
            }

            let slot = match stage {
                "brainstorm" => &mut self.routes.brainstorm,
                "generate" => &mut self.routes.generate,
                _ => &mut self.routes.tournament,
            };
            let current = parse_route(stage, slot)?;
            let provider = match provider {
                Some(p) => p.parse::<ProviderId>().map_err(|e| ConfigError::InvalidRoute {
                    stage,
                    message: e.to_string(),
                })?,
                None => current.provider,
            };
            let model = model.unwrap_or(current.model);
            *slot = ModelRoute::new(provider, model).to_string();
        }

        if let Some(v) = lookup("STORY_TIMEOUT_SECONDS") {
            self.timeouts.story_seconds = parse_secs("STORY_TIMEOUT_SECONDS", &v)?;
        }
        if let Some(v) = lookup("CALL_TIMEOUT_SECONDS") {
            self.timeouts.call_seconds = parse_secs("CALL_TIMEOUT_SECONDS", &v)?;
        }
        Ok(())
    }

    pub fn stage_routes(&self) -> Result<StageRoutes, ConfigError> {
        Ok(StageRoutes {
            brainstorm: parse_route("brainstorm", &self.routes.brainstorm)?,
            generate: parse_route("generate", &self.routes.generate)?,
            tournament: parse_route("tournament", &self.routes.tournament)?,
        })
    }

    pub fn pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        Ok(PipelineConfig {
            routes: self.stage_routes()?,
            retry: RetryPolicy {
                max_retries: self.retry.max_retries,
                base_delay: Duration::from_millis(self.retry.base_delay_ms),
            },
            story_timeout: Duration::from_secs(self.timeouts.story_seconds),
            angle_count: self.brainstorm.angle_count,
            inspiration_words: self.brainstorm.inspiration_words,
            top_k: self.tournament.top_k,
            tournament_rounds: self.tournament.rounds,
            comparison_concurrency: self.tournament.concurrency,
            symmetry_probe: self.tournament.symmetry_probe,
            require_independent_judge: self.tournament.require_independent_judge,
        })
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            max_concurrency_per_provider: self.gateway.max_concurrency_per_provider,
            call_timeout: Duration::from_secs(self.timeouts.call_seconds),
        }
    }
}

fn parse_route(stage: &'static str, raw: &str) -> Result<ModelRoute, ConfigError> {
    raw.parse().map_err(|e: crate::gateway::ProviderError| ConfigError::InvalidRoute {
        stage,
        message: e.to_string(),
    })
}

fn parse_secs(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
        }),
    }
}
