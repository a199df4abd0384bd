use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_REGISTRY_URL: &str = "https://platform.airqo.net/api/v1";
const DEFAULT_TENANT: &str = "airqo";
const DEFAULT_EXPECTED_DATA_POINTS: u32 = 15;

fn setup_config_path() -> Option<PathBuf> {
    env::var("UPTIME_SETUP_CONFIG_PATH")
        .ok()
        .map(|path| path.trim().to_string())
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct SetupConfigOverrides {
    #[serde(default)]
    database_url: Option<String>,
    #[serde(default)]
    registry_url: Option<String>,
    #[serde(default)]
    tenant: Option<String>,
    #[serde(default)]
    network: Option<String>,
    #[serde(default)]
    uptime_expected_data_points: Option<u32>,
    #[serde(default)]
    uptime_worker_count: Option<usize>,
    #[serde(default)]
    uptime_run_interval_seconds: Option<u64>,
}

pub(crate) fn load_setup_config_overrides(path: &Path) -> Option<SetupConfigOverrides> {
    if !path.exists() {
        return None;
    }
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "device-uptime failed to read setup config; using env defaults"
            );
            return None;
        }
    };
    let mut bytes = contents.into_bytes();
    match simd_json::serde::from_slice(&mut bytes) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "device-uptime failed to parse setup config; using env defaults"
            );
            None
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub db_pool_size: u32,
    pub registry_url: String,
    pub tenant: String,
    pub network: String,
    pub expected_data_points: NonZeroU32,
    pub lookback_hours: i64,
    pub channel_window_minutes: i64,
    pub worker_count: usize,
    pub run_interval_seconds: u64,
    pub otlp_endpoint: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        let overrides = setup_config_path().and_then(|path| load_setup_config_overrides(&path));
        Self::from_lookup(|key| env::var(key).ok(), overrides.as_ref())
    }

    /// Resolves settings from `lookup`, falling back to `overrides` for keys
    /// the environment leaves unset.
    pub(crate) fn from_lookup<F>(lookup: F, overrides: Option<&SetupConfigOverrides>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| non_empty(lookup(key).as_deref());
        let overrides = overrides.cloned().unwrap_or_default();

        let database_url = var("UPTIME_DATABASE_URL")
            .or_else(|| var("DATABASE_URL"))
            .or_else(|| non_empty(overrides.database_url.as_deref()))
            .context("UPTIME_DATABASE_URL or DATABASE_URL is required (or present as database_url in the setup config)")?;
        let database_url = normalize_database_url(database_url);

        let db_pool_size = var("UPTIME_DB_POOL_SIZE")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(5);
        let registry_url = var("UPTIME_REGISTRY_URL")
            .or_else(|| non_empty(overrides.registry_url.as_deref()))
            .unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string());
        let tenant = var("UPTIME_TENANT")
            .or_else(|| non_empty(overrides.tenant.as_deref()))
            .unwrap_or_else(|| DEFAULT_TENANT.to_string());
        let network = var("UPTIME_NETWORK")
            .or_else(|| non_empty(overrides.network.as_deref()))
            .unwrap_or_else(|| tenant.clone());

        let expected_data_points = match var("UPTIME_EXPECTED_DATA_POINTS") {
            Some(raw) => raw
                .parse::<u32>()
                .with_context(|| format!("UPTIME_EXPECTED_DATA_POINTS must be an integer, got {raw:?}"))?,
            None => overrides
                .uptime_expected_data_points
                .unwrap_or(DEFAULT_EXPECTED_DATA_POINTS),
        };
        let expected_data_points = NonZeroU32::new(expected_data_points)
            .context("UPTIME_EXPECTED_DATA_POINTS must be greater than zero")?;

        let lookback_hours = var("UPTIME_LOOKBACK_HOURS")
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(2);
        let channel_window_minutes = var("UPTIME_CHANNEL_WINDOW_MINUTES")
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(60);
        let worker_count = var("UPTIME_WORKER_COUNT")
            .and_then(|v| v.parse::<usize>().ok())
            .or(overrides.uptime_worker_count)
            .filter(|v| *v != 0)
            .unwrap_or(8);
        let run_interval_seconds = var("UPTIME_RUN_INTERVAL_SECONDS")
            .and_then(|v| v.parse::<u64>().ok())
            .or(overrides.uptime_run_interval_seconds)
            .filter(|v| *v != 0)
            .unwrap_or(3600);
        let otlp_endpoint = var("OTEL_EXPORTER_OTLP_ENDPOINT");

        Ok(Self {
            database_url,
            db_pool_size,
            registry_url,
            tenant,
            network,
            expected_data_points,
            lookback_hours,
            channel_window_minutes,
            worker_count,
            run_interval_seconds,
            otlp_endpoint,
        })
    }

    pub fn run_interval(&self) -> Duration {
        Duration::from_secs(self.run_interval_seconds)
    }

    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::hours(self.lookback_hours)
    }

    pub fn channel_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.channel_window_minutes)
    }
}

fn normalize_database_url(url: String) -> String {
    if let Some(stripped) = url.strip_prefix("postgresql+psycopg://") {
        return format!("postgresql://{stripped}");
    }
    if let Some(stripped) = url.strip_prefix("postgresql+asyncpg://") {
        return format!("postgresql://{stripped}");
    }
    url
}
