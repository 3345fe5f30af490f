//! Utility functions for the search sync repository.

use std::collections::HashMap;

use search_sync_shared::IndexEntry;

use crate::errors::IndexError;

/// Validate a record's search key.
///
/// # Returns
///
/// * `Ok(())` - If the key is usable as an entry id
/// * `Err(IndexError::InvalidRecord)` - If the key is empty or whitespace only
pub fn validate_search_key(key: &str) -> Result<(), IndexError> {
    if key.trim().is_empty() {
        return Err(IndexError::invalid_record("search key must not be empty"));
    }
    Ok(())
}

/// Collapse entries sharing an id, keeping the last one.
///
/// The surviving entry takes the position of the first occurrence, so the
/// batch order follows the order in which keys first appeared.
///
/// # Returns
///
/// The de-duplicated entries and the number of entries dropped.
///
/// # Example
///
/// ```
/// use search_sync_repository::utils::dedupe_last_wins;
/// use search_sync_shared::{IndexEntry, Team};
///
/// let first = IndexEntry::from_record(&Team::new(254, "Old"), None);
/// let second = IndexEntry::from_record(&Team::new(254, "New"), None);
///
/// let (entries, dropped) = dedupe_last_wins(vec![first, second.clone()]);
/// assert_eq!(entries, vec![second]);
/// assert_eq!(dropped, 1);
/// ```
pub fn dedupe_last_wins(entries: Vec<IndexEntry>) -> (Vec<IndexEntry>, usize) {
    let total = entries.len();
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(total);
    let mut unique: Vec<IndexEntry> = Vec::with_capacity(total);

    for entry in entries {
        match positions.get(&entry.id) {
            Some(&position) => unique[position] = entry,
            None => {
                positions.insert(entry.id.clone(), unique.len());
                unique.push(entry);
            }
        }
    }

    let dropped = total - unique.len();
    (unique, dropped)
}
