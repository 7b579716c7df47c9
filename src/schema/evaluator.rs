//! Searchability evaluation for single instances and changed entities

use crate::store::EntitySnapshot;

use super::descriptor::EntityDescr;

/// Applies a descriptor's searchability rules. Holds no state of its own.
#[derive(Debug, Clone, Copy)]
pub struct SearchabilityEvaluator<'a> {
    descr: &'a EntityDescr,
}

impl<'a> SearchabilityEvaluator<'a> {
    #[must_use]
    pub fn new(descr: &'a EntityDescr) -> Self {
        Self { descr }
    }

    #[inline]
    #[must_use]
    pub fn has_predicate(&self) -> bool {
        self.descr.searchable_if().is_some()
    }

    /// Whether `entity` should be indexed. Always true without a predicate.
    #[must_use]
    pub fn evaluate(&self, entity: &EntitySnapshot) -> bool {
        self.descr
            .searchable_if()
            .is_none_or(|predicate| predicate(entity))
    }

    /// Entities to enqueue after `entity` changed `dirty_fields`.
    ///
    /// The entity itself is a candidate when one of the dirty fields is the
    /// root of a described property and the predicate accepts it. The
    /// post-filter hook, if any, then sees the candidate list even when it
    /// is empty, so it can pull in related entities.
    #[must_use]
    pub fn searchable_entities<S: AsRef<str>>(
        &self,
        entity: &EntitySnapshot,
        dirty_fields: &[S],
    ) -> Vec<EntitySnapshot> {
        let mut candidates = Vec::new();

        let touches_index = dirty_fields
            .iter()
            .any(|field| self.descr.owns_property(field.as_ref()));
        if touches_index && self.evaluate(entity) {
            candidates.push(entity.clone());
        }

        match self.descr.searchables() {
            Some(hook) => hook(entity, candidates),
            None => candidates,
        }
    }
}
