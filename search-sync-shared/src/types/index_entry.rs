//! Index entry types.
//!
//! An `IndexEntry` is the projection of a `SearchableRecord` submitted to the
//! index backend. It is derived at indexing time and never persisted locally.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::attributes::{AttributeValue, SearchAttributes};
use crate::types::searchable::SearchableRecord;

/// Attribute holding the record's canonical URL.
pub const CONTENT_URL_ATTRIBUTE: &str = "content_url";

/// Attribute holding the record's search key, used to relate the entry back to the store.
pub const RELATED_ID_ATTRIBUTE: &str = "related_id";

/// Document representation for the search index.
///
/// Entries have no identity beyond `id`: submitting a second entry with the
/// same `id` replaces the first one entirely, attributes are never merged.
///
/// # Fields
///
/// - `id`: The record's search key
/// - `attributes`: Indexable fields plus `content_url` and `related_id`
/// - `expires_at`: End of the freshness window, `None` when the entry never expires
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub attributes: SearchAttributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl IndexEntry {
    /// Build an entry from a searchable record.
    ///
    /// `content_url` and `related_id` always come from the record's identity,
    /// overwriting any value the record placed in its free-form attributes.
    ///
    /// # Example
    ///
    /// ```
    /// use search_sync_shared::{IndexEntry, Team};
    ///
    /// let team = Team::new(254, "The Cheesy Poofs");
    /// let entry = IndexEntry::from_record(&team, None);
    ///
    /// assert_eq!(entry.id, "frc254");
    /// assert_eq!(
    ///     entry.content_url(),
    ///     Some("https://www.thebluealliance.com/team/254")
    /// );
    /// ```
    pub fn from_record<R>(record: &R, expires_at: Option<DateTime<Utc>>) -> Self
    where
        R: SearchableRecord + ?Sized,
    {
        let id = record.search_key().to_string();
        let mut attributes = record.search_attributes();
        attributes.insert(
            CONTENT_URL_ATTRIBUTE.to_string(),
            AttributeValue::Text(record.canonical_url()),
        );
        attributes.insert(
            RELATED_ID_ATTRIBUTE.to_string(),
            AttributeValue::Text(id.clone()),
        );

        Self {
            id,
            attributes,
            expires_at,
        }
    }

    /// The canonical URL stored on the entry.
    pub fn content_url(&self) -> Option<&str> {
        self.attributes
            .get(CONTENT_URL_ATTRIBUTE)
            .and_then(AttributeValue::as_text)
    }

    /// The related store id stored on the entry.
    pub fn related_id(&self) -> Option<&str> {
        self.attributes
            .get(RELATED_ID_ATTRIBUTE)
            .and_then(AttributeValue::as_text)
    }

    /// Whether the entry's freshness window has elapsed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}
