//! PostgreSQL repositories
//!
//! Ids arrive as strings from the HTTP layer; a string that is not a UUID
//! cannot match any row and is reported as absent.

mod profile;
mod reference_item;

pub use profile::{ProfileRepository, ProfileRow};
pub use reference_item::{ReferenceItemRepository, ReferenceItemRow};

use crate::store::{StoreError, StoreResult};
use uuid::Uuid;

fn parse_id(id: &str) -> Option<Uuid> {
    Uuid::parse_str(id.trim()).ok()
}

fn require_id(id: &str) -> StoreResult<Uuid> {
    parse_id(id).ok_or_else(|| StoreError::InvalidId(id.to_string()))
}
