use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Token baked in at build time; runtime layers may override it.
const BUILD_TOKEN: Option<&str> = option_env!("CLIP_BOT_TOKEN");

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub telegram: TelegramConfig,
    pub media: MediaConfig,
    pub sessions: SessionsConfig,
    pub jobs: JobsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Transcoder executable (looked up on PATH when relative)
    pub ffmpeg_path: String,
    /// Where downloads and outputs live until released
    pub scratch_dir: Option<PathBuf>,
    /// Length of generated video samples
    pub sample_secs: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionsConfig {
    pub max_age_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    /// Upper bound on pipelines running at once
    pub max_concurrent: usize,
}

impl Config {
    /// Load defaults, then `path` if it exists, then `CLIP_BOT__*` environment variables.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.name", "clip-bot")?
            .set_default("telegram.token", BUILD_TOKEN.unwrap_or_default())?
            .set_default("media.ffmpeg_path", "ffmpeg")?
            .set_default("media.sample_secs", 15_i64)?
            .set_default("sessions.max_age_secs", 30_i64 * 60)?
            .set_default("sessions.sweep_interval_secs", 5_i64 * 60)?
            .set_default("jobs.max_concurrent", 4_i64)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("CLIP_BOT").separator("__"))
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        Ok(settings.try_deserialize()?)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.media
            .scratch_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

impl SessionsConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
