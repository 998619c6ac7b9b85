use crate::{engine, session};
use anyhow::Context;
use std::path::PathBuf;

#[derive(Clone)]
pub struct AppPaths {
  pub data_dir: PathBuf,
  pub logs_dir: PathBuf,
  pub output_dir: PathBuf,
}

impl AppPaths {
  /// Resolve and create the data directories. The root comes from
  /// `SHELFPULL_DATA_DIR` and defaults to `./data`.
  pub fn from_env() -> anyhow::Result<Self> {
    let data_dir = std::env::var("SHELFPULL_DATA_DIR")
      .map(PathBuf::from)
      .unwrap_or_else(|_| PathBuf::from("data"));
    std::fs::create_dir_all(&data_dir).context("failed to create data dir")?;

    let logs_dir = data_dir.join("logs");
    std::fs::create_dir_all(&logs_dir).context("failed to create logs dir")?;

    let output_dir = data_dir.join("outputs");
    std::fs::create_dir_all(&output_dir).context("failed to create outputs dir")?;

    Ok(Self {
      data_dir,
      logs_dir,
      output_dir,
    })
  }
}

/// Server configuration, environment-driven with local-dev defaults.
#[derive(Debug, Clone)]
pub struct Config {
  pub host: String,
  pub port: u16,
  /// Export directories older than this are swept away.
  pub retention_hours: u64,
  /// Pause between books so the upstream service is not hammered.
  pub book_pause_ms: u64,
  pub upstream_base: String,
  pub upstream_api_base: String,
}

impl Config {
  pub fn from_env() -> anyhow::Result<Self> {
    Ok(Self {
      host: std::env::var("SHELFPULL_HOST").unwrap_or_else(|_| "127.0.0.1".into()),
      port: env_parsed("SHELFPULL_PORT", 8930)?,
      retention_hours: env_parsed("SHELFPULL_RETENTION_HOURS", 24)?,
      book_pause_ms: env_parsed("SHELFPULL_BOOK_PAUSE_MS", 1000)?,
      upstream_base: std::env::var("SHELFPULL_UPSTREAM_BASE")
        .unwrap_or_else(|_| "https://weread.qq.com".into()),
      upstream_api_base: std::env::var("SHELFPULL_UPSTREAM_API_BASE")
        .unwrap_or_else(|_| "https://i.weread.qq.com".into()),
    })
  }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
  T::Err: std::error::Error + Send + Sync + 'static,
{
  match std::env::var(key) {
    Ok(raw) => raw.parse::<T>().with_context(|| format!("invalid {key}")),
    Err(_) => Ok(default),
  }
}

#[derive(Clone)]
pub struct AppState {
  pub config: Config,
  pub paths: AppPaths,
  pub sessions: session::SessionRegistry,
  pub engine: engine::ExtractEngineHandle,
}
