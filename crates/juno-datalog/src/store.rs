//! Per-evaluation working database.
//!
//! Each relation is split into `stable` tuples, already used to derive
//! consequences, and `delta` tuples, derived in the previous round. The
//! store only ever grows.

use std::collections::{BTreeMap, HashSet};

use crate::term::{Constant, Fact};

/// A ground tuple of one relation.
pub type Tuple = Vec<Constant>;

#[derive(Debug, Clone, Default)]
struct Relation {
    stable: HashSet<Tuple>,
    delta: HashSet<Tuple>,
}

impl Relation {
    fn contains(&self, tuple: &Tuple) -> bool {
        self.stable.contains(tuple) || self.delta.contains(tuple)
    }

    fn len(&self) -> usize {
        self.stable.len() + self.delta.len()
    }
}

/// Facts derived during one round, not yet visible to joins.
#[derive(Debug, Clone, Default)]
pub struct Delta {
    tuples: BTreeMap<String, HashSet<Tuple>>,
    len: usize,
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fact; returns whether it was not already recorded.
    pub fn insert(&mut self, fact: Fact) -> bool {
        let inserted = self
            .tuples
            .entry(fact.predicate)
            .or_default()
            .insert(fact.args);
        if inserted {
            self.len += 1;
        }
        inserted
    }

    pub fn count(&self, predicate: &str) -> usize {
        self.tuples.get(predicate).map_or(0, HashSet::len)
    }

    pub fn predicates(&self) -> impl Iterator<Item = &str> {
        self.tuples.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// The mutable fact set owned by a single evaluation.
#[derive(Debug, Clone, Default)]
pub struct FactStore {
    relations: BTreeMap<String, Relation>,
    total: usize,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store whose initial delta is `facts`.
    pub fn seeded(facts: impl IntoIterator<Item = Fact>) -> Self {
        let mut store = Self::new();
        for fact in facts {
            store.assert(fact);
        }
        store
    }

    /// Add a fact to the current delta unless it is already known.
    pub fn assert(&mut self, fact: Fact) -> bool {
        let relation = self.relations.entry(fact.predicate).or_default();
        if relation.contains(&fact.args) {
            return false;
        }
        relation.delta.insert(fact.args);
        self.total += 1;
        true
    }

    pub fn contains(&self, fact: &Fact) -> bool {
        self.relations
            .get(&fact.predicate)
            .is_some_and(|relation| relation.contains(&fact.args))
    }

    /// Tuples derived in the previous round.
    pub fn delta_for(&self, predicate: &str) -> impl Iterator<Item = &Tuple> {
        self.relations
            .get(predicate)
            .into_iter()
            .flat_map(|relation| relation.delta.iter())
    }

    pub fn has_delta(&self, predicate: &str) -> bool {
        self.relations
            .get(predicate)
            .is_some_and(|relation| !relation.delta.is_empty())
    }

    /// Stable and delta tuples together.
    pub fn all(&self, predicate: &str) -> impl Iterator<Item = &Tuple> {
        self.relations
            .get(predicate)
            .into_iter()
            .flat_map(|relation| relation.stable.iter().chain(relation.delta.iter()))
    }

    /// Fold the current delta into stable and install `next` as the delta.
    ///
    /// Tuples of `next` that are already known are dropped. Returns how many
    /// tuples the new delta holds.
    pub fn advance(&mut self, next: Delta) -> usize {
        for relation in self.relations.values_mut() {
            let delta = std::mem::take(&mut relation.delta);
            relation.stable.extend(delta);
        }

        let mut installed = 0;
        for (predicate, tuples) in next.tuples {
            let relation = self.relations.entry(predicate).or_default();
            for tuple in tuples {
                if !relation.stable.contains(&tuple) && relation.delta.insert(tuple) {
                    installed += 1;
                }
            }
        }
        self.total += installed;
        installed
    }

    /// Total number of tuples across all relations.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn count(&self, predicate: &str) -> usize {
        self.relations.get(predicate).map_or(0, Relation::len)
    }

    /// The relation with the most tuples once `pending` is counted in, ties
    /// broken by name.
    pub fn largest_relation<'a>(&'a self, pending: &'a Delta) -> Option<(&'a str, usize)> {
        self.predicates()
            .chain(pending.predicates())
            .map(|predicate| (predicate, self.count(predicate) + pending.count(predicate)))
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
    }

    pub fn predicates(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    /// Every tuple of `predicate`, sorted.
    pub fn sorted_tuples(&self, predicate: &str) -> Vec<Tuple> {
        let mut tuples: Vec<Tuple> = self.all(predicate).cloned().collect();
        tuples.sort();
        tuples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(from: &str, to: &str) -> Fact {
        Fact::new("edge", vec![from.into(), to.into()])
    }

    #[test]
    fn test_assert_is_idempotent() {
        let mut store = FactStore::new();
        assert!(store.assert(edge("a", "b")));
        assert!(!store.assert(edge("a", "b")));
        assert_eq!(store.len(), 1);
        assert!(store.contains(&edge("a", "b")));
    }

    #[test]
    fn test_advance_moves_delta_to_stable() {
        let mut store = FactStore::seeded([edge("a", "b")]);
        assert_eq!(store.delta_for("edge").count(), 1);

        let mut next = Delta::new();
        next.insert(edge("b", "c"));
        next.insert(edge("a", "b"));
        assert_eq!(store.advance(next), 1);

        let delta: Vec<&Tuple> = store.delta_for("edge").collect();
        assert_eq!(delta, vec![&vec![Constant::from("b"), Constant::from("c")]]);
        assert_eq!(store.all("edge").count(), 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_empty_advance_clears_delta() {
        let mut store = FactStore::seeded([edge("a", "b")]);
        assert_eq!(store.advance(Delta::new()), 0);
        assert!(!store.has_delta("edge"));
        assert_eq!(store.all("edge").count(), 1);
    }

    #[test]
    fn test_unknown_predicate_is_empty() {
        let store = FactStore::seeded([edge("a", "b")]);
        assert_eq!(store.all("path").count(), 0);
        assert_eq!(store.delta_for("path").count(), 0);
        assert_eq!(store.count("path"), 0);
    }

    #[test]
    fn test_largest_relation() {
        let store = FactStore::seeded([
            edge("a", "b"),
            edge("b", "c"),
            Fact::new("node", vec!["a".into()]),
        ]);
        assert_eq!(store.largest_relation(&Delta::new()), Some(("edge", 2)));
        assert_eq!(FactStore::new().largest_relation(&Delta::new()), None);
    }

    #[test]
    fn test_largest_relation_counts_pending() {
        let store = FactStore::seeded([edge("a", "b"), edge("b", "c")]);
        let mut pending = Delta::new();
        for n in ["a", "b", "c"] {
            pending.insert(Fact::new("node", vec![n.into()]));
        }
        pending.insert(edge("c", "d"));
        assert_eq!(store.largest_relation(&pending), Some(("edge", 3)));

        pending.insert(Fact::new("node", vec!["d".into()]));
        assert_eq!(store.largest_relation(&pending), Some(("node", 4)));
    }

    #[test]
    fn test_sorted_tuples() {
        let store = FactStore::seeded([edge("b", "c"), edge("a", "b")]);
        let tuples = store.sorted_tuples("edge");
        assert_eq!(tuples[0], vec![Constant::from("a"), Constant::from("b")]);
        assert_eq!(tuples[1], vec![Constant::from("b"), Constant::from("c")]);
    }
}
