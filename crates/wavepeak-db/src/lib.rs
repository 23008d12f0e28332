//! Wavepeak persistence layer
//!
//! Profiles (Dropbox credentials) and reference items (waveform peaks) live
//! behind the [`ProfileStore`] and [`ReferenceItemStore`] traits. Two
//! backends implement them: PostgreSQL through `sqlx`, and the Supabase REST
//! API.

pub mod factory;
pub mod postgres;
pub mod store;
pub mod supabase;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use factory::{create_stores, Stores};
pub use postgres::{ProfileRepository, ReferenceItemRepository};
pub use store::{ProfileStore, ReferenceItemStore, StoreError, StoreResult};
pub use supabase::SupabaseStore;
