//! # Search Sync Shared
//!
//! This crate defines the data structures shared across the search sync workspace:
//! the `SearchableRecord` capability, the `IndexEntry` projection built from it,
//! the concrete team and event records, and the exclusive-relation validator
//! applied before records are committed to the local store.

pub mod relations;
pub mod types;

pub use relations::{ExclusiveRelations, RelationError, RelationSlot, RelationState};
pub use types::attributes::{AttributeValue, SearchAttributes};
pub use types::index_entry::{IndexEntry, CONTENT_URL_ATTRIBUTE, RELATED_ID_ATTRIBUTE};
pub use types::ranking_stat::{EventRankingStat, RankingOwner};
pub use types::records::{Event, Record, Team};
pub use types::searchable::SearchableRecord;
