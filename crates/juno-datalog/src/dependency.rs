//! Predicate dependency analysis for goal-directed pruning.
//!
//! A rule makes its head predicate depend on every table predicate in its
//! body. Only rules whose heads lie in the transitive closure of a goal's
//! predicate can contribute to that goal's answer.

use std::collections::{HashMap, HashSet};

use crate::program::Program;

/// Dependency graph for predicate relationships.
#[derive(Debug, Default)]
pub struct PredicateDependencyGraph {
    /// Predicate -> predicates it depends on (from rule bodies).
    dependencies: HashMap<String, HashSet<String>>,
}

impl PredicateDependencyGraph {
    /// Build a dependency graph from a compiled program.
    pub fn from_program(program: &Program) -> Self {
        let mut dependencies: HashMap<String, HashSet<String>> = HashMap::new();

        for rule in program.rules() {
            let deps = dependencies.entry(rule.head.predicate.clone()).or_default();
            for (_, atom) in rule.table_atoms() {
                deps.insert(atom.predicate.clone());
            }
        }

        Self { dependencies }
    }

    /// Get all predicates required to evaluate a set of root predicates.
    ///
    /// Computes the transitive closure of dependencies; the roots are
    /// included.
    pub fn get_required_predicates<'a>(
        &self,
        roots: impl IntoIterator<Item = &'a str>,
    ) -> HashSet<String> {
        let mut required = HashSet::new();
        let mut to_process: Vec<String> = roots.into_iter().map(str::to_string).collect();

        while let Some(pred) = to_process.pop() {
            if required.contains(&pred) {
                continue;
            }

            if let Some(deps) = self.dependencies.get(&pred) {
                for dep in deps {
                    if !required.contains(dep) {
                        to_process.push(dep.clone());
                    }
                }
            }

            required.insert(pred);
        }

        required
    }
}
