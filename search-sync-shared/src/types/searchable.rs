//! The capability shared by every record that can appear in the search index.

use crate::types::attributes::SearchAttributes;

/// Identifies a domain record as eligible for the search index.
///
/// The `search_key` is reused as the index entry id and as the de-duplication
/// key against the local store, so two distinct records must never share one.
/// The `canonical_url` is where the record can be reached online; it keeps the
/// local index from producing a second result for an object that is also found
/// through its web representation.
pub trait SearchableRecord {
    /// Stable, globally unique identifier. Usually the record's store key.
    fn search_key(&self) -> &str;

    /// Indexable fields particular to the record kind.
    fn search_attributes(&self) -> SearchAttributes;

    /// Externally resolvable location of the record.
    fn canonical_url(&self) -> String;
}

impl<T: SearchableRecord + ?Sized> SearchableRecord for &T {
    fn search_key(&self) -> &str {
        (**self).search_key()
    }

    fn search_attributes(&self) -> SearchAttributes {
        (**self).search_attributes()
    }

    fn canonical_url(&self) -> String {
        (**self).canonical_url()
    }
}
