//! Non-repeating random selection over a set of question ids.

use std::collections::HashSet;

use rand::Rng;
use rand::seq::IndexedRandom;

use crate::model::QuestionId;

/// Ids already shown in the current cycle.
///
/// A cycle ends once every known id has been shown; the next pick starts a
/// fresh cycle in which any id may be returned again.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    shown: HashSet<QuestionId>,
}

impl ExclusionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick one id uniformly among those not shown yet and mark it as shown.
    ///
    /// Returns `None` only when `ids` is empty.
    pub fn pick<R: Rng + ?Sized>(&mut self, ids: &[QuestionId], rng: &mut R) -> Option<QuestionId> {
        if ids.is_empty() {
            return None;
        }

        if self.shown.len() >= ids.len() {
            self.shown.clear();
        }

        let mut unseen: Vec<QuestionId> = ids
            .iter()
            .copied()
            .filter(|id| !self.shown.contains(id))
            .collect();

        // Only reachable when `shown` holds ids the caller no longer lists.
        if unseen.is_empty() {
            self.shown.clear();
            unseen = ids.to_vec();
        }

        let id = *unseen.choose(rng)?;
        self.shown.insert(id);
        Some(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shown.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shown.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: QuestionId) -> bool {
        self.shown.contains(&id)
    }

    pub fn clear(&mut self) {
        self.shown.clear();
    }

    /// Un-mark an id whose record could not be delivered.
    pub fn release(&mut self, id: QuestionId) {
        self.shown.remove(&id);
    }
}
