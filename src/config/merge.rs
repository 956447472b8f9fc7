use std::path::PathBuf;

use super::env::load_from_env;
use super::yaml::YamlConfig;
use super::{ServerConfig, TlsConfig};

/// Merge environment configuration (base) with YAML overrides.
///
/// YAML values win over environment variables, which win over defaults.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = load_from_env()?;
    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(tls) = server.tls {
            match tls.enabled {
                Some(false) => config.tls = None,
                Some(true) => {
                    let cert_path = tls
                        .cert_path
                        .or_else(|| config.tls.as_ref().map(|t| t.cert_path.display().to_string()))
                        .ok_or("server.tls.enabled is true but cert_path is not set")?;
                    let key_path = tls
                        .key_path
                        .or_else(|| config.tls.as_ref().map(|t| t.key_path.display().to_string()))
                        .ok_or("server.tls.enabled is true but key_path is not set")?;
                    config.tls = Some(TlsConfig {
                        cert_path: PathBuf::from(cert_path),
                        key_path: PathBuf::from(key_path),
                    });
                }
                None => {}
            }
        }
    }

    if let Some(security) = yaml.security
        && let Some(origins) = security.cors_allowed_origins
    {
        config.cors_allowed_origins = Some(origins);
    }

    if let Some(relay) = yaml.relay {
        if let Some(layout) = relay.expected_layout {
            config.relay.expected_layout = layout.parse()?;
        }
        if let Some(rate) = relay.input_sample_rate {
            config.relay.input_sample_rate = rate;
        }
        if let Some(rate) = relay.output_sample_rate {
            config.relay.output_sample_rate = rate;
        }
        if let Some(size) = relay.output_frame_size {
            config.relay.output_frame_size = size;
        }
        if let Some(fps) = relay.fps {
            config.relay.fps = fps;
        }
        if let Some(delay) = relay.stream_start_delay {
            config.relay.stream_start_delay = delay;
        }
        if let Some(timeout) = relay.idle_timeout_seconds {
            config.relay.idle_timeout_seconds = timeout;
        }
    }

    Ok(config)
}
