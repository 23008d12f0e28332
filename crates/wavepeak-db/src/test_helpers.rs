//! In-memory store implementations for testing
//!
//! These mocks allow testing the credential lifecycle and the pipeline
//! without a database. Every write is counted so tests can assert on
//! "at most one write" style properties.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wavepeak_core::models::{Credential, CredentialUpdate, ReferenceItem, WaveformUpdate};

use crate::store::{ProfileStore, ReferenceItemStore, StoreError, StoreResult};

/// Mock profile store keyed by user id
#[derive(Clone, Default)]
pub struct MockProfileStore {
    credentials: Arc<Mutex<HashMap<String, Credential>>>,
    reads: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MockProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_credential(&self, user_id: &str, credential: Credential) {
        self.credentials
            .lock()
            .unwrap()
            .insert(user_id.to_string(), credential);
    }

    pub fn credential(&self, user_id: &str) -> Option<Credential> {
        self.credentials.lock().unwrap().get(user_id).cloned()
    }

    /// Make every subsequent `update_credential` fail.
    pub fn fail_writes(&self) {
        *self.fail_writes.lock().unwrap() = true;
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileStore for MockProfileStore {
    async fn get_credential(&self, user_id: &str) -> StoreResult<Option<Credential>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.credential(user_id))
    }

    async fn update_credential(
        &self,
        user_id: &str,
        update: &CredentialUpdate,
    ) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if *self.fail_writes.lock().unwrap() {
            return Err(StoreError::Rejected {
                status: 500,
                body: "write failed".to_string(),
            });
        }
        let mut credentials = self.credentials.lock().unwrap();
        let entry = credentials.entry(user_id.to_string()).or_default();
        entry.access_token = Some(update.access_token.clone());
        entry.expires_at = Some(update.expires_at);
        Ok(())
    }
}

/// Mock reference item store keyed by item id
#[derive(Clone, Default)]
pub struct MockReferenceItemStore {
    items: Arc<Mutex<HashMap<String, ReferenceItem>>>,
    waveforms: Arc<Mutex<HashMap<String, WaveformUpdate>>>,
    reads: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MockReferenceItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&self, id: &str, user_id: &str) {
        self.items.lock().unwrap().insert(
            id.to_string(),
            ReferenceItem {
                id: id.to_string(),
                user_id: user_id.to_string(),
            },
        );
    }

    pub fn waveform(&self, id: &str) -> Option<WaveformUpdate> {
        self.waveforms.lock().unwrap().get(id).cloned()
    }

    /// Make every subsequent `update_waveform` fail.
    pub fn fail_writes(&self) {
        *self.fail_writes.lock().unwrap() = true;
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReferenceItemStore for MockReferenceItemStore {
    async fn get_reference_item(&self, id: &str) -> StoreResult<Option<ReferenceItem>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.items.lock().unwrap().get(id).cloned())
    }

    async fn update_waveform(&self, id: &str, update: &WaveformUpdate) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if *self.fail_writes.lock().unwrap() {
            return Err(StoreError::Rejected {
                status: 500,
                body: "permission denied for table reference_items".to_string(),
            });
        }
        self.waveforms
            .lock()
            .unwrap()
            .insert(id.to_string(), update.clone());
        Ok(())
    }
}
