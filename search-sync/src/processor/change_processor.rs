//! Change processor implementation.
//!
//! Maps a `ChangeSet` from the store onto publish and retract operations.

use std::collections::HashSet;

use search_sync_shared::{Record, SearchableRecord};
use tracing::{debug, instrument};

use crate::store::ChangeSet;

/// An index operation derived from a change set.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOperation {
    /// Records to (re)index in one batch.
    Publish(Vec<Record>),
    /// Keys to remove from the index in one batch.
    Retract(Vec<String>),
}

/// Processor that turns store change sets into index operations.
///
/// Inserted and updated records are published together; deleted keys are
/// retracted. A key that is both deleted and upserted in the same change set
/// is only retracted.
#[derive(Debug, Default)]
pub struct ChangeProcessor;

impl ChangeProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Process a single change set.
    ///
    /// Returns at most one `Retract` followed by at most one `Publish`.
    #[instrument(skip(self, changes), fields(change_count = changes.len()))]
    pub fn process(&self, changes: ChangeSet) -> Vec<SyncOperation> {
        let deleted: HashSet<&str> = changes.deleted.iter().map(String::as_str).collect();

        let mut shadowed = 0usize;
        let publish: Vec<Record> = changes
            .inserted
            .iter()
            .chain(changes.updated.iter())
            .filter(|record| {
                let keep = !deleted.contains(record.search_key());
                if !keep {
                    shadowed += 1;
                }
                keep
            })
            .cloned()
            .collect();

        if shadowed > 0 {
            debug!(shadowed, "Upserts dropped in favour of deletes");
        }

        let mut operations = Vec::with_capacity(2);
        if !changes.deleted.is_empty() {
            operations.push(SyncOperation::Retract(changes.deleted.clone()));
        }
        if !publish.is_empty() {
            operations.push(SyncOperation::Publish(publish));
        }

        debug!(operation_count = operations.len(), "Processed change set");
        operations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_sync_shared::{Event, Team};

    #[test]
    fn test_upserts_become_one_publish() {
        let processor = ChangeProcessor::new();
        let changes = ChangeSet {
            inserted: vec![Team::new(254, "The Cheesy Poofs").into()],
            updated: vec![Event::new(2020, "casj", "Silicon Valley Regional").into()],
            deleted: vec![],
        };

        let operations = processor.process(changes);

        assert_eq!(operations.len(), 1);
        match &operations[0] {
            SyncOperation::Publish(records) => {
                let keys: Vec<&str> = records.iter().map(|r| r.search_key()).collect();
                assert_eq!(keys, vec!["frc254", "2020casj"]);
            }
            other => panic!("unexpected operation: {:?}", other),
        }
    }

    #[test]
    fn test_deletes_become_one_retract() {
        let processor = ChangeProcessor::new();
        let changes = ChangeSet {
            deleted: vec!["frc254".to_string(), "frc604".to_string()],
            ..Default::default()
        };

        assert_eq!(
            processor.process(changes),
            vec![SyncOperation::Retract(vec![
                "frc254".to_string(),
                "frc604".to_string()
            ])]
        );
    }

    #[test]
    fn test_delete_wins_over_upsert_of_same_key() {
        let processor = ChangeProcessor::new();
        let changes = ChangeSet {
            inserted: vec![Team::new(254, "The Cheesy Poofs").into()],
            updated: vec![Team::new(604, "Quixilver").into()],
            deleted: vec!["frc254".to_string()],
        };

        let operations = processor.process(changes);

        assert_eq!(operations.len(), 2);
        assert_eq!(
            operations[0],
            SyncOperation::Retract(vec!["frc254".to_string()])
        );
        assert_eq!(
            operations[1],
            SyncOperation::Publish(vec![Team::new(604, "Quixilver").into()])
        );
    }

    #[test]
    fn test_empty_change_set() {
        assert!(ChangeProcessor::new().process(ChangeSet::default()).is_empty());
    }
}
