//! Configuration module for the avatar relay server
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use avatar_relay::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::core::{AudioLayout, SessionParams};

mod env;
mod merge;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

/// Upper bound for `idle_timeout_seconds` (one week)
pub const MAX_IDLE_TIMEOUT_SECONDS: u64 = 7 * 24 * 60 * 60;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Stream parameters applied to every session, plus the socket idle timeout
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    pub expected_layout: AudioLayout,
    pub input_sample_rate: u32,
    pub output_sample_rate: u32,
    pub output_frame_size: usize,
    pub fps: u32,
    /// Seconds after activation before inbound media and control messages are accepted
    pub stream_start_delay: f64,
    /// Closes a relay socket that has been silent this long
    pub idle_timeout_seconds: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        let params = SessionParams::default();
        Self {
            expected_layout: params.expected_layout,
            input_sample_rate: params.input_sample_rate,
            output_sample_rate: params.output_sample_rate,
            output_frame_size: params.output_frame_size,
            fps: params.fps,
            stream_start_delay: params.stream_start_delay,
            idle_timeout_seconds: 300,
        }
    }
}

impl RelayConfig {
    /// Session parameters handed to the session factory
    pub fn session_params(&self) -> SessionParams {
        SessionParams {
            expected_layout: self.expected_layout,
            input_sample_rate: self.input_sample_rate,
            output_sample_rate: self.output_sample_rate,
            output_frame_size: self.output_frame_size,
            fps: self.fps,
            stream_start_delay: self.stream_start_delay,
        }
    }

    /// Idle timeout, clamped to [`MAX_IDLE_TIMEOUT_SECONDS`]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds.min(MAX_IDLE_TIMEOUT_SECONDS))
    }
}

/// Server configuration
///
/// Contains all configuration needed to run the relay: listener settings,
/// optional TLS, CORS origins and the per-session stream parameters.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    /// Comma separated list of allowed origins, or "*"
    pub cors_allowed_origins: Option<String>,

    pub relay: RelayConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Expects the .env file (if any) to be loaded by the caller beforehand.
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or validation fails.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = env::load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, with environment variables as the base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        // .env is loaded in main.rs before this runs
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        validation::validate_relay(&self.relay)?;
        validation::validate_tls(&self.tls)?;
        Ok(())
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    fn cleanup_env_vars() {
        unsafe {
            env::remove_var("HOST");
            env::remove_var("PORT");
            env::remove_var("TLS_ENABLED");
            env::remove_var("TLS_CERT_PATH");
            env::remove_var("TLS_KEY_PATH");
            env::remove_var("CORS_ALLOWED_ORIGINS");
            env::remove_var("RELAY_EXPECTED_LAYOUT");
            env::remove_var("RELAY_INPUT_SAMPLE_RATE");
            env::remove_var("RELAY_OUTPUT_SAMPLE_RATE");
            env::remove_var("RELAY_OUTPUT_FRAME_SIZE");
            env::remove_var("RELAY_FPS");
            env::remove_var("RELAY_STREAM_START_DELAY");
            env::remove_var("RELAY_IDLE_TIMEOUT_SECONDS");
        }
    }

    #[test]
    fn test_relay_defaults() {
        let relay = RelayConfig::default();
        assert_eq!(relay.expected_layout, AudioLayout::Mono);
        assert_eq!(relay.input_sample_rate, 16000);
        assert_eq!(relay.output_sample_rate, 24000);
        assert_eq!(relay.output_frame_size, 480);
        assert_eq!(relay.fps, 30);
        assert_eq!(relay.stream_start_delay, 0.5);
        assert_eq!(relay.idle_timeout(), Duration::from_secs(300));
        assert_eq!(relay.session_params(), SessionParams::default());
    }

    #[test]
    fn test_idle_timeout_is_clamped() {
        let relay = RelayConfig {
            idle_timeout_seconds: u64::MAX,
            ..Default::default()
        };
        assert_eq!(
            relay.idle_timeout(),
            Duration::from_secs(MAX_IDLE_TIMEOUT_SECONDS)
        );
        // Deadline arithmetic on the clamped value must not overflow
        let _deadline = tokio::time::Instant::now() + relay.idle_timeout();
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.address(), "0.0.0.0:3001");
        assert!(!config.is_tls_enabled());
        assert!(config.cors_allowed_origins.is_none());
        assert_eq!(config.relay, RelayConfig::default());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_relay_overrides() {
        cleanup_env_vars();

        unsafe {
            env::set_var("PORT", "4000");
            env::set_var("RELAY_EXPECTED_LAYOUT", "stereo");
            env::set_var("RELAY_FPS", "25");
            env::set_var("RELAY_STREAM_START_DELAY", "0");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.relay.expected_layout, AudioLayout::Stereo);
        assert_eq!(config.relay.fps, 25);
        assert_eq!(config.relay.stream_start_delay, 0.0);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_port() {
        cleanup_env_vars();

        unsafe {
            env::set_var("PORT", "not-a-port");
        }

        let err = ServerConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("PORT"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_tls_requires_paths() {
        cleanup_env_vars();

        unsafe {
            env::set_var("TLS_ENABLED", "true");
        }

        let err = ServerConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("TLS_CERT_PATH"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 8080

relay:
  output_frame_size: 960
  idle_timeout_seconds: 60
"#;

        fs::write(&config_path, yaml_content).unwrap();

        unsafe {
            env::set_var("HOST", "0.0.0.0");
            env::set_var("RELAY_OUTPUT_FRAME_SIZE", "240");
            env::set_var("RELAY_FPS", "15");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();

        // YAML overrides ENV
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.relay.output_frame_size, 960);
        // ENV value survives where YAML is silent
        assert_eq!(config.relay.fps, 15);
        assert_eq!(config.relay.idle_timeout_seconds, 60);
        assert_eq!(config.port, 8080);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let config_path = PathBuf::from("/nonexistent/config.yaml");
        let result = ServerConfig::from_file(&config_path);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_invalid_relay_values() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "relay:\n  fps: 0\n").unwrap();

        let err = ServerConfig::from_file(&config_path).unwrap_err();
        assert!(err.to_string().contains("relay.fps"));

        fs::write(&config_path, "relay:\n  expected_layout: \"quad\"\n").unwrap();
        let err = ServerConfig::from_file(&config_path).unwrap_err();
        assert!(err.to_string().contains("Invalid audio layout"));

        cleanup_env_vars();
    }
}
