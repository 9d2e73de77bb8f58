//! Rules, safety checking, and the compiled program.
//!
//! A [`Program`] can only be obtained through [`Program::compile`], which
//! rejects any rule whose head or builtin inputs are not bound by the body.
//! Once compiled it is immutable and meant to be shared behind an `Arc`.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use tracing::debug;

use crate::builtins::Builtin;
use crate::error::DatalogError;
use crate::term::{Atom, Term};

/// One conjunct of a rule body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyAtom {
    /// Matched against a stored relation.
    Table(Atom),
    /// Computed by the builtin evaluator.
    Builtin(Builtin, Vec<Term>),
}

impl BodyAtom {
    /// Tag an atom as builtin if its predicate names one, else as a table atom.
    pub fn classify(atom: Atom) -> Self {
        match Builtin::from_name(&atom.predicate) {
            Some(builtin) => BodyAtom::Builtin(builtin, atom.args),
            None => BodyAtom::Table(atom),
        }
    }

    pub fn as_table(&self) -> Option<&Atom> {
        match self {
            BodyAtom::Table(atom) => Some(atom),
            BodyAtom::Builtin(..) => None,
        }
    }
}

impl fmt::Display for BodyAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyAtom::Table(atom) => write!(f, "{atom}"),
            BodyAtom::Builtin(builtin, args) => {
                write!(f, "{}", Atom::new(builtin.name(), args.clone()))
            }
        }
    }
}

/// A head atom derived from a conjunction of body atoms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Optional label used in diagnostics.
    pub name: Option<String>,
    pub head: Atom,
    pub body: Vec<BodyAtom>,
}

impl Rule {
    pub fn new(head: Atom, body: Vec<BodyAtom>) -> Self {
        Self {
            name: None,
            head,
            body,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Table atoms of the body, with their body positions.
    pub fn table_atoms(&self) -> impl Iterator<Item = (usize, &Atom)> {
        self.body
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.as_table().map(|a| (i, a)))
    }

    /// Check the rule can be evaluated left to right.
    ///
    /// Walks the body in order tracking which variables are bound. Table
    /// atoms bind every variable they mention; arithmetic builtins bind their
    /// output once their inputs are bound.
    pub fn check_safety(&self) -> Result<(), DatalogError> {
        let mut bound: HashSet<&str> = HashSet::new();

        for atom in &self.body {
            match atom {
                BodyAtom::Table(table) => {
                    for arg in &table.args {
                        if let Term::Variable(v) = arg {
                            bound.insert(v);
                        }
                    }
                }
                BodyAtom::Builtin(builtin, args) => {
                    if args.len() != builtin.arity() {
                        return Err(DatalogError::InvalidRule(format!(
                            "builtin {builtin} expects {} arguments, got {} in `{self}`",
                            builtin.arity(),
                            args.len()
                        )));
                    }
                    for position in builtin.input_positions() {
                        if let Term::Variable(v) = &args[position]
                            && !bound.contains(v.as_str())
                        {
                            return Err(self.unsafe_variable(v));
                        }
                    }
                    if let Some(position) = builtin.output_position()
                        && let Term::Variable(v) = &args[position]
                    {
                        bound.insert(v);
                    }
                }
            }
        }

        for var in self.head.variables() {
            if !bound.contains(var) {
                return Err(self.unsafe_variable(var));
            }
        }

        Ok(())
    }

    fn unsafe_variable(&self, variable: &str) -> DatalogError {
        DatalogError::UnsafeRule {
            rule: self.label(),
            variable: variable.to_string(),
        }
    }

    /// The rule's name if it has one, else its text.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head)?;
        if !self.body.is_empty() {
            write!(f, " :- ")?;
            for (i, atom) in self.body.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{atom}")?;
            }
        }
        Ok(())
    }
}

/// An immutable, safety-checked set of rules grouped by head predicate.
#[derive(Debug, Clone, Default)]
pub struct Program {
    rules_by_head: BTreeMap<String, Vec<Rule>>,
    rule_count: usize,
}

impl Program {
    /// Safety-check every rule and group them by head predicate.
    ///
    /// Fails on the first unsafe rule; nothing is partially compiled.
    pub fn compile(rules: impl IntoIterator<Item = Rule>) -> Result<Self, DatalogError> {
        let mut rules_by_head: BTreeMap<String, Vec<Rule>> = BTreeMap::new();
        let mut rule_count = 0;

        for rule in rules {
            if Builtin::from_name(&rule.head.predicate).is_some() {
                return Err(DatalogError::InvalidRule(format!(
                    "rule head cannot be the builtin {}",
                    rule.head.predicate
                )));
            }
            rule.check_safety()?;
            rules_by_head
                .entry(rule.head.predicate.clone())
                .or_default()
                .push(rule);
            rule_count += 1;
        }

        debug!(
            rules = rule_count,
            predicates = rules_by_head.len(),
            "compiled program"
        );

        Ok(Self {
            rules_by_head,
            rule_count,
        })
    }

    /// Compile `extra` together with the rules of this program.
    pub fn extend(&self, extra: impl IntoIterator<Item = Rule>) -> Result<Self, DatalogError> {
        Self::compile(self.rules().cloned().chain(extra))
    }

    /// Keep only the rules whose head predicate is in `heads`.
    ///
    /// Every kept rule was already checked, so this never fails.
    pub fn restrict(&self, heads: &HashSet<String>) -> Self {
        let rules_by_head: BTreeMap<String, Vec<Rule>> = self
            .rules_by_head
            .iter()
            .filter(|(head, _)| heads.contains(*head))
            .map(|(head, rules)| (head.clone(), rules.clone()))
            .collect();
        let rule_count = rules_by_head.values().map(Vec::len).sum();
        Self {
            rules_by_head,
            rule_count,
        }
    }

    pub fn rules_for(&self, predicate: &str) -> &[Rule] {
        self.rules_by_head
            .get(predicate)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules_by_head.values().flatten()
    }

    pub fn rule_count(&self) -> usize {
        self.rule_count
    }

    pub fn is_empty(&self) -> bool {
        self.rule_count == 0
    }
}
