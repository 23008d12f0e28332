//! Configuration module
//!
//! Process-wide configuration for the waveform service: HTTP server settings,
//! the persistence backend, Dropbox OAuth client credentials and the external
//! `audiowaveform` invocation. Loaded once at startup and injected everywhere
//! else through application state.

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// Common constants
const SERVER_PORT: u16 = 3000;
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 300;
const HTTP_TIMEOUT_SECS: u64 = 120;
const MAX_AUDIO_SIZE_MB: usize = 200;
const PIXELS_PER_SECOND: u32 = 20;

pub const DEFAULT_DROPBOX_API_BASE_URL: &str = "https://api.dropboxapi.com/2";
pub const DEFAULT_DROPBOX_CONTENT_BASE_URL: &str = "https://content.dropboxapi.com/2";

/// Persistence backend holding profiles and reference items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Supabase REST (PostgREST) API authenticated with the service-role key
    Supabase,
    /// Direct PostgreSQL connection
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "supabase" => Ok(StoreBackend::Supabase),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(anyhow::anyhow!(
                "STORE_BACKEND must be 'supabase' or 'postgres', got '{}'",
                other
            )),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Supabase => write!(f, "supabase"),
            StoreBackend::Postgres => write!(f, "postgres"),
        }
    }
}

/// HTTP server configuration
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub request_timeout_secs: u64,
}

/// Waveform service configuration
#[derive(Clone)]
pub struct WaveformServiceConfig {
    pub base: BaseConfig,
    // Persistence
    pub store_backend: StoreBackend,
    pub public_supabase_url: Option<String>,
    pub supabase_url: Option<String>,
    pub supabase_service_role_key: Option<String>,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    // Dropbox OAuth client and endpoints
    pub dropbox_client_id: Option<String>,
    pub dropbox_client_secret: Option<String>,
    pub dropbox_api_base_url: String,
    pub dropbox_content_base_url: String,
    pub http_timeout_secs: u64,
    pub max_audio_size_bytes: usize,
    // audiowaveform invocation
    pub audiowaveform_path: String,
    pub pixels_per_second: u32,
    pub split_channels: bool,
    pub temp_dir: PathBuf,
}

// Secrets stay out of Debug output so the config can be logged safely.
impl fmt::Debug for WaveformServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaveformServiceConfig")
            .field("base", &self.base)
            .field("store_backend", &self.store_backend)
            .field("supabase_url", &self.supabase_url())
            .field("dropbox_api_base_url", &self.dropbox_api_base_url)
            .field("dropbox_content_base_url", &self.dropbox_content_base_url)
            .field("audiowaveform_path", &self.audiowaveform_path)
            .field("pixels_per_second", &self.pixels_per_second)
            .field("split_channels", &self.split_channels)
            .field("temp_dir", &self.temp_dir)
            .finish_non_exhaustive()
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<WaveformServiceConfig>);

impl Config {
    fn as_service(&self) -> &WaveformServiceConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.as_service().base.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = WaveformServiceConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_service().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.as_service().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.as_service().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.as_service().base.environment
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.as_service().base.request_timeout_secs
    }

    pub fn store_backend(&self) -> StoreBackend {
        self.as_service().store_backend
    }

    pub fn supabase_url(&self) -> Option<&str> {
        self.as_service().supabase_url()
    }

    pub fn supabase_service_role_key(&self) -> Option<&str> {
        self.as_service().supabase_service_role_key.as_deref()
    }

    pub fn database_url(&self) -> Option<&str> {
        self.as_service().database_url.as_deref()
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_service().db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_service().db_timeout_seconds
    }

    pub fn dropbox_client_id(&self) -> Option<&str> {
        self.as_service().dropbox_client_id.as_deref()
    }

    pub fn dropbox_client_secret(&self) -> Option<&str> {
        self.as_service().dropbox_client_secret.as_deref()
    }

    pub fn dropbox_api_base_url(&self) -> &str {
        &self.as_service().dropbox_api_base_url
    }

    pub fn dropbox_content_base_url(&self) -> &str {
        &self.as_service().dropbox_content_base_url
    }

    pub fn http_timeout_secs(&self) -> u64 {
        self.as_service().http_timeout_secs
    }

    pub fn max_audio_size_bytes(&self) -> usize {
        self.as_service().max_audio_size_bytes
    }

    pub fn audiowaveform_path(&self) -> &str {
        &self.as_service().audiowaveform_path
    }

    pub fn pixels_per_second(&self) -> u32 {
        self.as_service().pixels_per_second
    }

    pub fn split_channels(&self) -> bool {
        self.as_service().split_channels
    }

    pub fn temp_dir(&self) -> &PathBuf {
        &self.as_service().temp_dir
    }

    /// "Set"/"Missing" for every variable the active backend requires.
    pub fn environment_report(&self) -> BTreeMap<&'static str, &'static str> {
        self.as_service().environment_report()
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn megabytes_to_bytes(megabytes: usize) -> Result<usize, anyhow::Error> {
    megabytes
        .checked_mul(1024 * 1024)
        .ok_or_else(|| anyhow::anyhow!("MAX_AUDIO_SIZE_MB is too large: {}", megabytes))
}

fn set_or_missing(value: Option<&str>) -> &'static str {
    if value.is_some() {
        "Set"
    } else {
        "Missing"
    }
}

impl WaveformServiceConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            environment,
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| REQUEST_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(REQUEST_TIMEOUT_SECS),
        };

        let store_backend = env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "supabase".to_string())
            .parse::<StoreBackend>()?;

        let config = WaveformServiceConfig {
            base,
            store_backend,
            public_supabase_url: env_non_empty("PUBLIC_SUPABASE_URL"),
            supabase_url: env_non_empty("SUPABASE_URL"),
            supabase_service_role_key: env_non_empty("SUPABASE_SERVICE_ROLE_KEY"),
            database_url: env_non_empty("DATABASE_URL"),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            dropbox_client_id: env_non_empty("DROPBOX_CLIENT_ID")
                .or_else(|| env_non_empty("VITE_DROPBOX_CLIENT_ID")),
            dropbox_client_secret: env_non_empty("DROPBOX_CLIENT_SECRET")
                .or_else(|| env_non_empty("VITE_DROPBOX_CLIENT_SECRET")),
            dropbox_api_base_url: env::var("DROPBOX_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_DROPBOX_API_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            dropbox_content_base_url: env::var("DROPBOX_CONTENT_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_DROPBOX_CONTENT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| HTTP_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(HTTP_TIMEOUT_SECS),
            max_audio_size_bytes: megabytes_to_bytes(
                env::var("MAX_AUDIO_SIZE_MB")
                    .unwrap_or_else(|_| MAX_AUDIO_SIZE_MB.to_string())
                    .parse::<usize>()
                    .unwrap_or(MAX_AUDIO_SIZE_MB),
            )?,
            audiowaveform_path: env::var("AUDIOWAVEFORM_PATH")
                .unwrap_or_else(|_| "audiowaveform".to_string()),
            pixels_per_second: env::var("WAVEFORM_PIXELS_PER_SECOND")
                .unwrap_or_else(|_| PIXELS_PER_SECOND.to_string())
                .parse()
                .unwrap_or(PIXELS_PER_SECOND),
            split_channels: env::var("WAVEFORM_SPLIT_CHANNELS")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(true),
            temp_dir: env_non_empty("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
        };

        Ok(config)
    }

    /// `PUBLIC_SUPABASE_URL` wins over `SUPABASE_URL` when both are set.
    pub fn supabase_url(&self) -> Option<&str> {
        self.public_supabase_url
            .as_deref()
            .or(self.supabase_url.as_deref())
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.dropbox_client_id.is_none() || self.dropbox_client_secret.is_none() {
            return Err(anyhow::anyhow!(
                "DROPBOX_CLIENT_ID and DROPBOX_CLIENT_SECRET must be set"
            ));
        }

        if self.pixels_per_second == 0 {
            return Err(anyhow::anyhow!(
                "WAVEFORM_PIXELS_PER_SECOND must be greater than zero"
            ));
        }

        match self.store_backend {
            StoreBackend::Supabase => {
                if self.supabase_url().is_none() || self.supabase_service_role_key.is_none() {
                    return Err(anyhow::anyhow!(
                        "PUBLIC_SUPABASE_URL (or SUPABASE_URL) and SUPABASE_SERVICE_ROLE_KEY must be set"
                    ));
                }
            }
            StoreBackend::Postgres => match self.database_url.as_deref() {
                Some(url) if url.starts_with("postgresql://") || url.starts_with("postgres://") => {}
                Some(_) => {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be a valid PostgreSQL connection string"
                    ));
                }
                None => {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be set when using the postgres store backend"
                    ));
                }
            },
        }

        Ok(())
    }

    pub fn environment_report(&self) -> BTreeMap<&'static str, &'static str> {
        let mut report = BTreeMap::new();
        match self.store_backend {
            StoreBackend::Supabase => {
                report.insert(
                    "PUBLIC_SUPABASE_URL",
                    set_or_missing(self.public_supabase_url.as_deref()),
                );
                report.insert("SUPABASE_URL", set_or_missing(self.supabase_url.as_deref()));
                report.insert(
                    "SUPABASE_SERVICE_ROLE_KEY",
                    set_or_missing(self.supabase_service_role_key.as_deref()),
                );
            }
            StoreBackend::Postgres => {
                report.insert("DATABASE_URL", set_or_missing(self.database_url.as_deref()));
            }
        }
        report.insert(
            "DROPBOX_CLIENT_ID",
            set_or_missing(self.dropbox_client_id.as_deref()),
        );
        report.insert(
            "DROPBOX_CLIENT_SECRET",
            set_or_missing(self.dropbox_client_secret.as_deref()),
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(store_backend: StoreBackend) -> WaveformServiceConfig {
        WaveformServiceConfig {
            base: BaseConfig {
                server_port: 3000,
                cors_origins: vec!["*".to_string()],
                environment: "test".to_string(),
                request_timeout_secs: 30,
            },
            store_backend,
            public_supabase_url: None,
            supabase_url: Some("https://project.supabase.co".to_string()),
            supabase_service_role_key: Some("service-role".to_string()),
            database_url: None,
            db_max_connections: 2,
            db_timeout_seconds: 5,
            dropbox_client_id: Some("client-id".to_string()),
            dropbox_client_secret: Some("client-secret".to_string()),
            dropbox_api_base_url: DEFAULT_DROPBOX_API_BASE_URL.to_string(),
            dropbox_content_base_url: DEFAULT_DROPBOX_CONTENT_BASE_URL.to_string(),
            http_timeout_secs: 10,
            max_audio_size_bytes: 1024,
            audiowaveform_path: "audiowaveform".to_string(),
            pixels_per_second: 20,
            split_channels: true,
            temp_dir: env::temp_dir(),
        }
    }

    #[test]
    fn test_max_audio_size_overflow_is_an_error() {
        assert_eq!(megabytes_to_bytes(200).unwrap(), 200 * 1024 * 1024);
        assert!(megabytes_to_bytes(usize::MAX / 1024).is_err());
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!(
            "supabase".parse::<StoreBackend>().unwrap(),
            StoreBackend::Supabase
        );
        assert_eq!(
            "PostgreSQL".parse::<StoreBackend>().unwrap(),
            StoreBackend::Postgres
        );
        assert!("mysql".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_supabase_backend_requires_url_and_key() {
        let mut config = test_config(StoreBackend::Supabase);
        assert!(config.validate().is_ok());

        config.supabase_service_role_key = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_postgres_backend_requires_database_url() {
        let mut config = test_config(StoreBackend::Postgres);
        assert!(config.validate().is_err());

        config.database_url = Some("mysql://localhost/db".to_string());
        assert!(config.validate().is_err());

        config.database_url = Some("postgresql://localhost/wavepeak".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dropbox_client_credentials_required() {
        let mut config = test_config(StoreBackend::Supabase);
        config.dropbox_client_secret = None;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("DROPBOX_CLIENT_SECRET"));
    }

    #[test]
    fn test_public_supabase_url_takes_precedence() {
        let mut config = test_config(StoreBackend::Supabase);
        config.public_supabase_url = Some("https://public.supabase.co".to_string());
        assert_eq!(config.supabase_url(), Some("https://public.supabase.co"));
    }

    #[test]
    fn test_environment_report_marks_missing_variables() {
        let mut config = test_config(StoreBackend::Supabase);
        config.dropbox_client_id = None;
        let report = config.environment_report();
        assert_eq!(report.get("SUPABASE_URL"), Some(&"Set"));
        assert_eq!(report.get("PUBLIC_SUPABASE_URL"), Some(&"Missing"));
        assert_eq!(report.get("DROPBOX_CLIENT_ID"), Some(&"Missing"));
        assert_eq!(report.get("DROPBOX_CLIENT_SECRET"), Some(&"Set"));
        assert!(!report.contains_key("DATABASE_URL"));
    }

    #[test]
    fn test_debug_output_hides_secrets() {
        let config = test_config(StoreBackend::Supabase);
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("service-role"));
        assert!(!rendered.contains("client-secret"));
    }
}
