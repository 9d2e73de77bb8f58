//! Datalog evaluation core for Juno.
//!
//! This crate provides:
//! - Terms, atoms, facts and unification
//! - Safety-checked rule compilation into an immutable [`Program`]
//! - Builtin comparison and arithmetic predicates
//! - Semi-naive bottom-up fixpoint evaluation over a per-call [`FactStore`]
//! - Goal answering against the saturated store
//!
//! Everything here is synchronous and free of I/O; callers that need
//! timeouts pass a [`Cancellation`] and run [`evaluate`] on a blocking
//! thread.

pub mod builtins;
pub mod dependency;
pub mod engine;
mod error;
pub mod program;
pub mod query;
pub mod store;
pub mod substitution;
pub mod term;

use tracing::debug;

pub use builtins::Builtin;
pub use dependency::PredicateDependencyGraph;
pub use engine::{Cancellation, EngineLimits, EvaluationStats, Fixpoint, FixpointState};
pub use error::{DatalogError, ResourceBound};
pub use program::{BodyAtom, Program, Rule};
pub use query::{Answer, answer};
pub use store::FactStore;
pub use substitution::Substitution;
pub use term::{Atom, Constant, Fact, Term};

/// Result of one successful evaluation.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// One answer per goal, in goal order.
    pub answers: Vec<Answer>,
    pub stats: EvaluationStats,
    /// The saturated store, for callers that report whole relations.
    pub store: FactStore,
}

/// Derive everything `goals` depend on from `facts`, then answer each goal
/// against the one saturated store.
///
/// Only rules whose heads some goal transitively depends on are run.
#[tracing::instrument(skip_all, fields(goals = goals.len(), rules = program.rule_count()))]
pub fn evaluate(
    program: &Program,
    facts: impl IntoIterator<Item = Fact>,
    goals: &[Atom],
    limits: EngineLimits,
    cancel: &Cancellation,
) -> Result<Evaluation, DatalogError> {
    let graph = PredicateDependencyGraph::from_program(program);
    let required = graph.get_required_predicates(goals.iter().map(|goal| goal.predicate.as_str()));
    let pruned = program.restrict(&required);

    let mut fixpoint = Fixpoint::new(&pruned, facts, limits);
    let stats = fixpoint.run(cancel)?;
    let store = fixpoint.into_store();
    let answers: Vec<Answer> = goals.iter().map(|goal| answer(goal, &store)).collect();

    debug!(
        rules_run = pruned.rule_count(),
        rounds = stats.rounds,
        facts_derived = stats.facts_derived,
        rows = answers.iter().map(|a| a.rows.len()).sum::<usize>(),
        "evaluation complete"
    );

    Ok(Evaluation {
        answers,
        stats,
        store,
    })
}
