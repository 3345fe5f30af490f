//! Event ranking statistics.
//!
//! A ranking stat is a single numeric value attached to an event ranking,
//! either as one of the ranking's sort-order values or as one of its extra
//! stats. It is never both.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::relations::{ExclusiveRelations, RelationError, RelationSlot, RelationState};

/// A numeric statistic belonging to exactly one event ranking relation.
///
/// Stored with two optional references, the shape the local store persists.
/// Use [`EventRankingStat::owner`] to get the validated single owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventRankingStat {
    pub id: Uuid,
    pub value: f64,
    /// Key of the ranking this value is a sort-order entry of.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order_ranking: Option<String>,
    /// Key of the ranking this value is an extra stat of.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_stats_ranking: Option<String>,
}

/// The single relation that owns a ranking stat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RankingOwner {
    SortOrder(String),
    ExtraStats(String),
}

impl EventRankingStat {
    /// Create an unattached stat.
    pub fn new(value: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            value,
            sort_order_ranking: None,
            extra_stats_ranking: None,
        }
    }

    /// Create a stat owned by a ranking's sort order.
    pub fn sort_order(value: f64, ranking_key: impl Into<String>) -> Self {
        Self {
            sort_order_ranking: Some(ranking_key.into()),
            ..Self::new(value)
        }
    }

    /// Create a stat owned by a ranking's extra stats.
    pub fn extra_stat(value: f64, ranking_key: impl Into<String>) -> Self {
        Self {
            extra_stats_ranking: Some(ranking_key.into()),
            ..Self::new(value)
        }
    }

    /// The owning relation.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(owner))` - Exactly one relation is set
    /// * `Ok(None)` - The stat is orphaned
    /// * `Err(RelationError)` - Both relations are set
    pub fn owner(&self) -> Result<Option<RankingOwner>, RelationError> {
        self.validate_relations()?;
        Ok(match (&self.sort_order_ranking, &self.extra_stats_ranking) {
            (Some(key), None) => Some(RankingOwner::SortOrder(key.clone())),
            (None, Some(key)) => Some(RankingOwner::ExtraStats(key.clone())),
            _ => None,
        })
    }
}

impl ExclusiveRelations for EventRankingStat {
    fn entity_label(&self) -> String {
        format!("EventRankingStat({})", self.id)
    }

    fn relation_slots(&self) -> Vec<RelationSlot> {
        vec![
            RelationSlot::new("sort_order_ranking", self.sort_order_ranking.is_some()),
            RelationSlot::new("extra_stats_ranking", self.extra_stats_ranking.is_some()),
        ]
    }
}

impl From<RankingOwner> for RelationState {
    fn from(owner: RankingOwner) -> Self {
        match owner {
            RankingOwner::SortOrder(_) => RelationState::Linked("sort_order_ranking"),
            RankingOwner::ExtraStats(_) => RelationState::Linked("extra_stats_ranking"),
        }
    }
}
