use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine configuration, loaded from TOML.
///
/// Every field has a default matching the documented reward table, so an
/// absent or empty config file yields stock behavior.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub rewards: RewardConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

/// Karma points granted per action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RewardConfig {
    #[serde(default = "default_report_reward")]
    pub report: i64,
    #[serde(default = "default_vote_reward")]
    pub vote: i64,
    #[serde(default = "default_comment_reward")]
    pub comment: i64,
    #[serde(default = "default_resolution_reward")]
    pub resolution: i64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            report: default_report_reward(),
            vote: default_vote_reward(),
            comment: default_comment_reward(),
            resolution: default_resolution_reward(),
        }
    }
}

/// Listing limits for work queues and leaderboards.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_notification_limit")]
    pub notification_limit: usize,
    #[serde(default = "default_leaderboard_limit")]
    pub leaderboard_limit: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            notification_limit: default_notification_limit(),
            leaderboard_limit: default_leaderboard_limit(),
        }
    }
}

const fn default_report_reward() -> i64 {
    10
}

const fn default_vote_reward() -> i64 {
    1
}

const fn default_comment_reward() -> i64 {
    1
}

const fn default_resolution_reward() -> i64 {
    50
}

const fn default_notification_limit() -> usize {
    50
}

const fn default_leaderboard_limit() -> usize {
    20
}

/// Load the engine config from `path`, falling back to defaults when the
/// file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        return Ok(EngineConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<EngineConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}
