use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::{RelayConfig, ServerConfig, TlsConfig};

/// Reads `name`, treating empty values as unset.
pub(super) fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Reads and parses `name`, falling back to `default` when unset.
pub(super) fn env_parse<T>(name: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| format!("Invalid value for {name}: '{raw}' ({e})")),
        None => Ok(default),
    }
}

/// Parses boolean flags the way operators write them in `.env` files.
pub(super) fn parse_bool(name: &str, raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("Invalid boolean for {name}: '{other}'")),
    }
}

fn load_tls() -> Result<Option<TlsConfig>, String> {
    let enabled = match env_string("TLS_ENABLED") {
        Some(raw) => parse_bool("TLS_ENABLED", &raw)?,
        None => false,
    };
    if !enabled {
        return Ok(None);
    }

    let cert_path = env_string("TLS_CERT_PATH")
        .ok_or("TLS_ENABLED is true but TLS_CERT_PATH is not set")?;
    let key_path =
        env_string("TLS_KEY_PATH").ok_or("TLS_ENABLED is true but TLS_KEY_PATH is not set")?;

    Ok(Some(TlsConfig {
        cert_path: PathBuf::from(cert_path),
        key_path: PathBuf::from(key_path),
    }))
}

fn load_relay() -> Result<RelayConfig, String> {
    let defaults = RelayConfig::default();
    Ok(RelayConfig {
        expected_layout: env_parse("RELAY_EXPECTED_LAYOUT", defaults.expected_layout)?,
        input_sample_rate: env_parse("RELAY_INPUT_SAMPLE_RATE", defaults.input_sample_rate)?,
        output_sample_rate: env_parse("RELAY_OUTPUT_SAMPLE_RATE", defaults.output_sample_rate)?,
        output_frame_size: env_parse("RELAY_OUTPUT_FRAME_SIZE", defaults.output_frame_size)?,
        fps: env_parse("RELAY_FPS", defaults.fps)?,
        stream_start_delay: env_parse("RELAY_STREAM_START_DELAY", defaults.stream_start_delay)?,
        idle_timeout_seconds: env_parse(
            "RELAY_IDLE_TIMEOUT_SECONDS",
            defaults.idle_timeout_seconds,
        )?,
    })
}

/// Build a configuration from environment variables and defaults.
pub(super) fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    Ok(ServerConfig {
        host: env_string("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
        port: env_parse("PORT", 3001)?,
        tls: load_tls()?,
        cors_allowed_origins: env_string("CORS_ALLOWED_ORIGINS"),
        relay: load_relay()?,
    })
}
