//! Configuration validation
//!
//! Validates critical configuration values at startup to catch misconfigurations early.

use anyhow::Result;
use wavepeak_core::{Config, StoreBackend};

/// Validate critical configuration values
///
/// Runs the backend-specific checks of [`Config::validate`] plus the checks
/// that only matter to the HTTP server.
pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    // Validate CORS configuration in production
    if config.is_production() && config.cors_origins().iter().any(|o| o == "*") {
        return Err(anyhow::anyhow!(
            "CORS configured to allow all origins (*) in production. \
            Please set specific allowed origins via CORS_ORIGINS environment variable."
        ));
    }

    if config.store_backend() == StoreBackend::Postgres {
        if config.db_max_connections() == 0 {
            return Err(anyhow::anyhow!("Database max connections cannot be 0"));
        }
        if config.db_timeout_seconds() == 0 {
            return Err(anyhow::anyhow!("Database timeout cannot be 0"));
        }
    }

    if config.request_timeout_secs() == 0 {
        return Err(anyhow::anyhow!("REQUEST_TIMEOUT_SECS cannot be 0"));
    }

    if config.max_audio_size_bytes() == 0 {
        return Err(anyhow::anyhow!("MAX_AUDIO_SIZE_MB cannot be 0"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use wavepeak_core::{BaseConfig, WaveformServiceConfig};

    fn config(environment: &str, cors: &str) -> Config {
        Config(Box::new(WaveformServiceConfig {
            base: BaseConfig {
                server_port: 3000,
                cors_origins: vec![cors.to_string()],
                environment: environment.to_string(),
                request_timeout_secs: 300,
            },
            store_backend: StoreBackend::Supabase,
            public_supabase_url: Some("https://project.supabase.co".to_string()),
            supabase_url: None,
            supabase_service_role_key: Some("service-role".to_string()),
            database_url: None,
            db_max_connections: 10,
            db_timeout_seconds: 30,
            dropbox_client_id: Some("client-id".to_string()),
            dropbox_client_secret: Some("client-secret".to_string()),
            dropbox_api_base_url: "https://api.dropboxapi.com/2".to_string(),
            dropbox_content_base_url: "https://content.dropboxapi.com/2".to_string(),
            http_timeout_secs: 120,
            max_audio_size_bytes: 1024,
            audiowaveform_path: "audiowaveform".to_string(),
            pixels_per_second: 20,
            split_channels: true,
            temp_dir: PathBuf::from("/tmp"),
        }))
    }

    #[test]
    fn test_wildcard_cors_allowed_outside_production() {
        assert!(validate_config(&config("development", "*")).is_ok());
    }

    #[test]
    fn test_wildcard_cors_rejected_in_production() {
        assert!(validate_config(&config("production", "*")).is_err());
        assert!(validate_config(&config("production", "https://app.example.com")).is_ok());
    }

    #[test]
    fn test_zero_request_timeout_rejected() {
        let mut config = config("development", "*");
        config.0.base.request_timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_missing_dropbox_credentials_rejected() {
        let mut config = config("development", "*");
        config.0.dropbox_client_secret = None;
        assert!(validate_config(&config).is_err());
    }
}
