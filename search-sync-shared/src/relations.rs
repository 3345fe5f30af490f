//! Exactly-one-of-N relation validation.
//!
//! Some stored entities must belong to exactly one of several mutually
//! exclusive relations. The store cannot express that constraint in its
//! schema, so entities describe their candidate relation slots and the store
//! runs `validate_relations` on every staged entity before a commit.
//!
//! - No slot set: the entity is orphaned and should be cleaned up.
//! - One slot set: valid.
//! - Several slots set: invalid; the commit must be rejected.

use thiserror::Error;

/// One candidate relation of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationSlot {
    /// Relation name, used in diagnostics.
    pub name: &'static str,
    /// Whether the relation is currently set.
    pub is_set: bool,
}

impl RelationSlot {
    pub fn new(name: &'static str, is_set: bool) -> Self {
        Self { name, is_set }
    }
}

/// Outcome of inspecting an entity's exclusive relation slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationState {
    /// No relation is set.
    Orphaned,
    /// Exactly one relation is set.
    Linked(&'static str),
    /// More than one relation is set.
    Conflicting(Vec<&'static str>),
}

impl RelationState {
    /// Classify a set of relation slots.
    pub fn from_slots(slots: &[RelationSlot]) -> Self {
        let set: Vec<&'static str> = slots
            .iter()
            .filter(|slot| slot.is_set)
            .map(|slot| slot.name)
            .collect();

        match set.len() {
            0 => Self::Orphaned,
            1 => Self::Linked(set[0]),
            _ => Self::Conflicting(set),
        }
    }
}

/// Errors raised by relation validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelationError {
    /// An entity has more than one of its exclusive relations set.
    #[error("{entity} must not be related to more than one of {slots:?}")]
    Conflicting {
        entity: String,
        slots: Vec<&'static str>,
    },
}

/// Entities constrained to exactly one of several relations.
pub trait ExclusiveRelations {
    /// Identifier used in diagnostics.
    fn entity_label(&self) -> String;

    /// The candidate relation slots, in a fixed order.
    fn relation_slots(&self) -> Vec<RelationSlot>;

    fn relation_state(&self) -> RelationState {
        RelationState::from_slots(&self.relation_slots())
    }

    /// `true` when none of the relations is set.
    fn is_orphaned(&self) -> bool {
        matches!(self.relation_state(), RelationState::Orphaned)
    }

    /// Reject entities with more than one relation set.
    ///
    /// Orphaned entities pass validation; callers decide how to clean them up.
    fn validate_relations(&self) -> Result<(), RelationError> {
        match self.relation_state() {
            RelationState::Conflicting(slots) => Err(RelationError::Conflicting {
                entity: self.entity_label(),
                slots,
            }),
            _ => Ok(()),
        }
    }
}
