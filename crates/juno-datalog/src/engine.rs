//! Semi-naive bottom-up fixpoint evaluation.
//!
//! Each round joins every rule body so that at least one table atom draws
//! from the previous round's delta. A round that derives nothing new ends
//! the evaluation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DatalogError, ResourceBound};
use crate::program::{BodyAtom, Program, Rule};
use crate::store::{Delta, FactStore, Tuple};
use crate::substitution::{Substitution, apply, unify_args};
use crate::term::{Atom, Fact};

/// Bounds on a single evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineLimits {
    pub max_rounds: usize,
    pub max_tuples: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_rounds: 10_000,
            max_tuples: 1_000_000,
        }
    }
}

/// Cooperative cancellation observed at the top of every round.
///
/// Clones share the same flag, so a handle kept by the caller can stop an
/// evaluation running on another thread.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also trips once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::default(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Where an evaluation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixpointState {
    Seeded,
    Iterating,
    Saturated,
    ResourceExceeded,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationStats {
    /// Rounds run, including the final one that derived nothing.
    pub rounds: usize,
    /// Facts added by rules, excluding the seed facts.
    pub facts_derived: usize,
    /// Rule bodies fully matched, whether or not the head was new.
    pub rule_firings: usize,
}

/// A single fixpoint computation over its own fact store.
#[derive(Debug)]
pub struct Fixpoint<'p> {
    program: &'p Program,
    limits: EngineLimits,
    store: FactStore,
    state: FixpointState,
    stats: EvaluationStats,
}

impl<'p> Fixpoint<'p> {
    /// Seed a fresh store with the caller's facts.
    pub fn new(
        program: &'p Program,
        facts: impl IntoIterator<Item = Fact>,
        limits: EngineLimits,
    ) -> Self {
        Self {
            program,
            limits,
            store: FactStore::seeded(facts),
            state: FixpointState::Seeded,
            stats: EvaluationStats::default(),
        }
    }

    pub fn state(&self) -> FixpointState {
        self.state
    }

    pub fn stats(&self) -> EvaluationStats {
        self.stats
    }

    pub fn store(&self) -> &FactStore {
        &self.store
    }

    pub fn into_store(self) -> FactStore {
        self.store
    }

    /// Run rounds until saturation, a resource bound, or cancellation.
    pub fn run(&mut self, cancel: &Cancellation) -> Result<EvaluationStats, DatalogError> {
        self.check_tuples(&Delta::new())?;

        loop {
            if cancel.is_cancelled() {
                self.state = FixpointState::Cancelled;
                debug!(rounds = self.stats.rounds, "evaluation cancelled");
                return Err(DatalogError::Cancelled);
            }
            if self.stats.rounds >= self.limits.max_rounds {
                let limit = self.limits.max_rounds;
                return Err(self.exceeded(ResourceBound::Rounds, limit, &Delta::new()));
            }

            self.state = FixpointState::Iterating;
            self.stats.rounds += 1;

            let delta = self.round()?;
            let derived = self.store.advance(delta);
            self.stats.facts_derived += derived;

            debug!(
                round = self.stats.rounds,
                derived,
                total = self.store.len(),
                "fixpoint round complete"
            );

            if derived == 0 {
                self.state = FixpointState::Saturated;
                return Ok(self.stats);
            }
        }
    }

    /// Fire every rule once against the current delta.
    fn round(&mut self) -> Result<Delta, DatalogError> {
        let mut next = Delta::new();
        let first_round = self.stats.rounds == 1;
        let program = self.program;

        for rule in program.rules() {
            let positions: Vec<(usize, &Atom)> = rule.table_atoms().collect();

            if positions.is_empty() {
                if first_round {
                    self.fire(rule, None, &mut next)?;
                }
                continue;
            }

            for (position, atom) in positions {
                if self.store.has_delta(&atom.predicate) {
                    self.fire(rule, Some(position), &mut next)?;
                }
            }
        }

        Ok(next)
    }

    /// Match `rule`'s body with `delta_position` restricted to the delta and
    /// record each new head fact in `next`.
    fn fire(
        &mut self,
        rule: &Rule,
        delta_position: Option<usize>,
        next: &mut Delta,
    ) -> Result<(), DatalogError> {
        let matches = match_body(&self.store, &rule.body, delta_position)?;
        self.stats.rule_firings += matches.len();

        for subst in matches {
            let head = apply(&rule.head, &subst);
            let fact = head.to_fact().ok_or_else(|| {
                DatalogError::Internal(format!(
                    "rule `{}` derived non-ground {head}",
                    rule.label()
                ))
            })?;
            if !self.store.contains(&fact) && next.insert(fact) {
                self.check_tuples(next)?;
            }
        }
        Ok(())
    }

    fn check_tuples(&mut self, pending: &Delta) -> Result<(), DatalogError> {
        if self.store.len() + pending.len() > self.limits.max_tuples {
            let limit = self.limits.max_tuples;
            return Err(self.exceeded(ResourceBound::Tuples, limit, pending));
        }
        Ok(())
    }

    fn exceeded(&mut self, bound: ResourceBound, limit: usize, pending: &Delta) -> DatalogError {
        self.state = FixpointState::ResourceExceeded;

        let (predicate, count) = self.store.largest_relation(pending).unwrap_or(("", 0));

        debug!(%bound, limit, predicate, count, "resource limit exceeded");
        DatalogError::ResourceExceeded {
            bound,
            limit,
            predicate: predicate.to_string(),
            count,
        }
    }
}

/// Every substitution satisfying `body`, matched left to right.
///
/// The table atom at `delta_position` draws only from the delta; all other
/// table atoms draw from the full relation.
fn match_body(
    store: &FactStore,
    body: &[BodyAtom],
    delta_position: Option<usize>,
) -> Result<Vec<Substitution>, DatalogError> {
    let mut frontier = vec![Substitution::new()];

    for (position, atom) in body.iter().enumerate() {
        let mut next = Vec::new();
        for subst in &frontier {
            match atom {
                BodyAtom::Table(table) => {
                    if delta_position == Some(position) {
                        let candidates = store.delta_for(&table.predicate);
                        extend_matches(table, candidates, subst, &mut next);
                    } else {
                        let candidates = store.all(&table.predicate);
                        extend_matches(table, candidates, subst, &mut next);
                    }
                }
                BodyAtom::Builtin(builtin, args) => {
                    if let Some(extended) = builtin.evaluate(args, subst)? {
                        next.push(extended);
                    }
                }
            }
        }
        if next.is_empty() {
            return Ok(next);
        }
        frontier = next;
    }

    Ok(frontier)
}

fn extend_matches<'s>(
    atom: &Atom,
    candidates: impl Iterator<Item = &'s Tuple>,
    subst: &Substitution,
    out: &mut Vec<Substitution>,
) {
    out.extend(candidates.filter_map(|tuple| unify_args(&atom.args, tuple, subst)));
}
