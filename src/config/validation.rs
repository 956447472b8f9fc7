use super::{MAX_IDLE_TIMEOUT_SECONDS, RelayConfig, TlsConfig};

/// Validate relay stream parameters
///
/// Rates and frame sizes must be positive; the start delay must be a finite,
/// non-negative number of seconds.
pub(super) fn validate_relay(relay: &RelayConfig) -> Result<(), String> {
    if relay.input_sample_rate == 0 {
        return Err("relay.input_sample_rate must be greater than 0".to_string());
    }
    if relay.output_sample_rate == 0 {
        return Err("relay.output_sample_rate must be greater than 0".to_string());
    }
    if relay.output_frame_size == 0 {
        return Err("relay.output_frame_size must be greater than 0".to_string());
    }
    if relay.fps == 0 {
        return Err("relay.fps must be greater than 0".to_string());
    }
    if !relay.stream_start_delay.is_finite() || relay.stream_start_delay < 0.0 {
        return Err(format!(
            "relay.stream_start_delay must be a non-negative number of seconds, got {}",
            relay.stream_start_delay
        ));
    }
    if relay.idle_timeout_seconds == 0 {
        return Err("relay.idle_timeout_seconds must be greater than 0".to_string());
    }
    if relay.idle_timeout_seconds > MAX_IDLE_TIMEOUT_SECONDS {
        return Err(format!(
            "relay.idle_timeout_seconds must be at most {MAX_IDLE_TIMEOUT_SECONDS}, got {}",
            relay.idle_timeout_seconds
        ));
    }
    Ok(())
}

/// Validate that configured TLS files exist
pub(super) fn validate_tls(tls: &Option<TlsConfig>) -> Result<(), String> {
    let Some(tls) = tls else {
        return Ok(());
    };
    if !tls.cert_path.exists() {
        return Err(format!(
            "TLS certificate file not found: {}",
            tls.cert_path.display()
        ));
    }
    if !tls.key_path.exists() {
        return Err(format!("TLS key file not found: {}", tls.key_path.display()));
    }
    Ok(())
}
