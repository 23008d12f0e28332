//! Test helpers: build AppState and router for integration tests.
//!
//! Stores are in-memory mocks, Dropbox is a mockito server and audiowaveform
//! is a shell script, so these tests only run on unix.

#![allow(dead_code)]

use axum_test::TestServer;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use wavepeak_api::setup::{routes, services};
use wavepeak_core::{BaseConfig, Config, StoreBackend, WaveformServiceConfig};
use wavepeak_db::test_helpers::{MockProfileStore, MockReferenceItemStore};
use wavepeak_db::Stores;

/// What the fake audiowaveform writes on success.
pub const ANALYZER_OUTPUT: &str = r#"{"version":2,"channels":2,"sample_rate":44100,"samples_per_pixel":2205,"bits":8,"length":3,"data":[-12,14,-3,5,-100,101,0,0,-1,1,-7,7]}"#;

/// Test application: server, mocks, and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub dropbox: mockito::ServerGuard,
    pub profiles: MockProfileStore,
    pub reference_items: MockReferenceItemStore,
    pub config: Config,
    scratch_dir: PathBuf,
    _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Files left in the pipeline's scratch directory.
    pub fn scratch_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.scratch_dir)
            .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
            .unwrap_or_default()
    }
}

/// Fake audiowaveform that writes `json` to its `-o` argument.
pub fn succeeding_analyzer(json: &str) -> String {
    format!(
        r#"out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
printf '%s' '{}' > "$out""#,
        json
    )
}

fn write_script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("audiowaveform");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to chmod script");
    path
}

pub fn test_config(dropbox_url: &str, audiowaveform_path: &Path, scratch_dir: &Path) -> Config {
    Config(Box::new(WaveformServiceConfig {
        base: BaseConfig {
            server_port: 0,
            cors_origins: vec!["*".to_string()],
            environment: "test".to_string(),
            request_timeout_secs: 30,
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
        dropbox_api_base_url: dropbox_url.to_string(),
        dropbox_content_base_url: dropbox_url.to_string(),
        http_timeout_secs: 10,
        max_audio_size_bytes: 1024 * 1024,
        audiowaveform_path: audiowaveform_path.display().to_string(),
        pixels_per_second: 20,
        split_channels: true,
        temp_dir: scratch_dir.to_path_buf(),
    }))
}

/// Setup test app whose analyzer succeeds with [`ANALYZER_OUTPUT`].
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with_analyzer(&succeeding_analyzer(ANALYZER_OUTPUT)).await
}

/// Setup test app whose audiowaveform runs `script_body`.
pub async fn setup_test_app_with_analyzer(script_body: &str) -> TestApp {
    setup_test_app_with_timeout(script_body, 30).await
}

/// Setup test app with a custom per-request deadline.
pub async fn setup_test_app_with_timeout(script_body: &str, request_timeout_secs: u64) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let scratch_dir = temp_dir.path().join("scratch");
    let script = write_script(temp_dir.path(), script_body);

    let dropbox = mockito::Server::new_async().await;
    let mut config = test_config(&dropbox.url(), &script, &scratch_dir);
    config.0.base.request_timeout_secs = request_timeout_secs;

    let profiles = MockProfileStore::new();
    let reference_items = MockReferenceItemStore::new();
    let stores = Stores {
        profiles: Arc::new(profiles.clone()),
        reference_items: Arc::new(reference_items.clone()),
    };

    let state = services::initialize_services(&config, stores, None)
        .expect("Failed to initialize services");
    let app = routes::setup_routes(&config, state).expect("Failed to setup routes");

    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        dropbox,
        profiles,
        reference_items,
        config,
        scratch_dir,
        _temp_dir: temp_dir,
    }
}
