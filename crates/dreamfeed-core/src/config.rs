use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Dispatch loop cadence: due schedules are scanned once per tick.
pub const DEFAULT_TICK_SECS: u64 = 60;
/// Completion waiter: overall deadline for an async generation job.
pub const DEFAULT_MAX_WAIT_MS: u64 = 300_000;
/// Completion waiter: pause between job status probes.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;
/// Points charged per image generation.
pub const DEFAULT_IMAGE_COST: i64 = 5;
/// Points charged per video generation.
pub const DEFAULT_VIDEO_COST: i64 = 25;

/// Top-level config (dreamfeed.toml + DREAMFEED_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DreamfeedConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub waiter: WaiterConfig,
    #[serde(default)]
    pub studio: StudioConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Dispatch loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Seconds between due-schedule scans (default: 60).
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            tick_secs: DEFAULT_TICK_SECS,
        }
    }
}

/// Completion waiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaiterConfig {
    /// Overall deadline in milliseconds (default: 300000, i.e. 5 minutes).
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
    /// Pause between status probes in milliseconds (default: 3000).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            max_wait_ms: DEFAULT_MAX_WAIT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// Generation executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudioConfig {
    /// Points charged per image generation (default: 5).
    #[serde(default = "default_image_cost")]
    pub image_cost: i64,
    /// Points charged per video generation (default: 25).
    #[serde(default = "default_video_cost")]
    pub video_cost: i64,
    /// Prompt-mutation templates; `{prompt}` is replaced with the resolved
    /// prompt. An empty list disables mutation even when a schedule asks for it.
    #[serde(default)]
    pub mutation_templates: Vec<String>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            image_cost: DEFAULT_IMAGE_COST,
            video_cost: DEFAULT_VIDEO_COST,
            mutation_templates: Vec::new(),
        }
    }
}

fn default_tick_secs() -> u64 {
    DEFAULT_TICK_SECS
}
fn default_max_wait_ms() -> u64 {
    DEFAULT_MAX_WAIT_MS
}
fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
fn default_image_cost() -> i64 {
    DEFAULT_IMAGE_COST
}
fn default_video_cost() -> i64 {
    DEFAULT_VIDEO_COST
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.dreamfeed/dreamfeed.db", home)
}

impl DreamfeedConfig {
    /// Load config from a TOML file with DREAMFEED_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.dreamfeed/dreamfeed.toml
    ///
    /// Env keys use a double underscore between the section and the field so
    /// snake_case fields stay addressable: `DREAMFEED_DATABASE__PATH`,
    /// `DREAMFEED_DISPATCH__TICK_SECS`, `DREAMFEED_WAITER__MAX_WAIT_MS`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: DreamfeedConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("DREAMFEED_").split("__"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.dreamfeed/dreamfeed.toml", home)
}
