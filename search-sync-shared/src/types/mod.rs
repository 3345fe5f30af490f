//! This module defines the core data structures used across the search sync service.
//! It re-exports the record capability, index entries and concrete record kinds.

pub mod attributes;
pub mod index_entry;
pub mod ranking_stat;
pub mod records;
pub mod searchable;

pub use attributes::{AttributeValue, SearchAttributes};
pub use index_entry::IndexEntry;
pub use ranking_stat::{EventRankingStat, RankingOwner};
pub use records::{Event, Record, Team};
pub use searchable::SearchableRecord;
