use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::feishu::DEFAULT_BASE_URL;
use crate::images::fetch::DEFAULT_MAX_BYTES;
use crate::parser::tags::MAX_HEADING_LEVEL;
use crate::parser::DEFAULT_MERGE_THRESHOLD;
use crate::publish::DEFAULT_BATCH_SIZE;

/// Optional settings file, looked up in the working directory.
pub const CONFIG_FILE: &str = "article_publisher";
pub const ENV_PREFIX: &str = "PUBLISHER";

/// Runtime settings. Only the binary loads these; library components take
/// explicit options.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub feishu_app_id: String,
    pub feishu_app_secret: String,
    pub feishu_base_url: String,
    pub batch_size: usize,
    pub max_heading_level: u8,
    pub merge_threshold: usize,
    pub image_max_bytes: u64,
    pub request_timeout_secs: u64,
}

impl Settings {
    /// Defaults, then `article_publisher.toml` if present, then
    /// `PUBLISHER_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_builder(
            Config::builder()
                .add_source(File::with_name(CONFIG_FILE).required(false))
                .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true)),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        builder
            .set_default("feishu_app_id", "")?
            .set_default("feishu_app_secret", "")?
            .set_default("feishu_base_url", DEFAULT_BASE_URL)?
            .set_default("batch_size", DEFAULT_BATCH_SIZE as u64)?
            .set_default("max_heading_level", MAX_HEADING_LEVEL as u64)?
            .set_default("merge_threshold", DEFAULT_MERGE_THRESHOLD as u64)?
            .set_default("image_max_bytes", DEFAULT_MAX_BYTES)?
            .set_default("request_timeout_secs", 30u64)?
            .build()?
            .try_deserialize()
    }

    /// Required settings that are still empty, by environment variable name.
    pub fn missing(&self) -> Vec<String> {
        [
            ("feishu_app_id", &self.feishu_app_id),
            ("feishu_app_secret", &self.feishu_app_secret),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(key, _)| format!("{}_{}", ENV_PREFIX, key.to_uppercase()))
        .collect()
    }
}
