use std::path::PathBuf;
use std::time::Duration;

use checkpoint_client::LocatorConfig;
use checkpoint_client::config::{DEFAULT_BATCH_DELAY_MS, DEFAULT_BATCH_SIZE, DEFAULT_COUNTRY, DEFAULT_STATE};
use checkpoint_client::nominatim::{DEFAULT_BASE_URL, DEFAULT_USER_AGENT};

pub const DEFAULT_RECORD_SOURCE_URL: &str = "https://meehan-law-firm-dui-checkpoints.vercel.app";
pub const DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 3;
pub const DEFAULT_RECORD_POLL_INTERVAL_SECS: u64 = 300; // 5 minutes
pub const DEFAULT_MAP_COMMAND_BUFFER: usize = 256;
pub const DEFAULT_SERVER_PORT: u16 = 3000;

fn env_text(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn record_source_url() -> String {
    env_text("RECORD_SOURCE_URL").unwrap_or_else(|| DEFAULT_RECORD_SOURCE_URL.to_string())
}

pub fn geocoder_base_url() -> String {
    env_text("GEOCODER_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

pub fn geocoder_user_agent() -> String {
    env_text("GEOCODER_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
}

pub fn default_state() -> String {
    env_text("DEFAULT_STATE").unwrap_or_else(|| DEFAULT_STATE.to_string())
}

pub fn geocode_country() -> String {
    env_text("GEOCODE_COUNTRY").unwrap_or_else(|| DEFAULT_COUNTRY.to_string())
}

/// Curated coordinate table to load instead of the built-in one.
pub fn gazetteer_path() -> Option<PathBuf> {
    env_text("GAZETTEER_PATH").map(PathBuf::from)
}

pub fn upstream_http_timeout() -> Duration {
    std::env::var("UPSTREAM_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS))
}

pub fn upstream_connect_timeout() -> Duration {
    std::env::var("UPSTREAM_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS))
}

pub fn geocode_batch_size() -> usize {
    std::env::var("GEOCODE_BATCH_SIZE")
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_BATCH_SIZE)
}

pub fn geocode_batch_delay() -> Duration {
    std::env::var("GEOCODE_BATCH_DELAY_MS")
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_millis)
        .unwrap_or_else(|| Duration::from_millis(DEFAULT_BATCH_DELAY_MS))
}

pub fn record_poll_interval() -> Duration {
    std::env::var("RECORD_POLL_INTERVAL_SECS")
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_RECORD_POLL_INTERVAL_SECS))
}

pub fn map_command_buffer() -> usize {
    std::env::var("MAP_COMMAND_BUFFER")
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_MAP_COMMAND_BUFFER)
}

pub fn server_port() -> u16 {
    std::env::var("SERVER_PORT")
        .ok()
        .and_then(|value| value.trim().parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SERVER_PORT)
}

/// Locator settings assembled from the environment; unset values keep library defaults.
pub fn locator_config() -> LocatorConfig {
    LocatorConfig {
        default_state: default_state(),
        country: geocode_country(),
        batch_size: geocode_batch_size(),
        batch_delay: geocode_batch_delay(),
        request_timeout: upstream_http_timeout(),
        ..LocatorConfig::default()
    }
}
