//! Variable bindings and unification against ground facts.

use std::collections::HashMap;

use crate::term::{Atom, Constant, Fact, Term};

/// A mapping from variable name to the constant it is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Substitution {
    bindings: HashMap<String, Constant>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, var: &str) -> Option<&Constant> {
        self.bindings.get(var)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bind `var`, or check an existing binding agrees.
    ///
    /// Returns `false` on a conflicting binding. A binding to a constant of a
    /// different kind is a conflict like any other.
    pub fn bind(&mut self, var: &str, value: Constant) -> bool {
        match self.bindings.get(var) {
            Some(existing) => *existing == value,
            None => {
                self.bindings.insert(var.to_string(), value);
                true
            }
        }
    }

    /// Resolve a term to a constant, if it is one or is bound.
    pub fn resolve<'a>(&'a self, term: &'a Term) -> Option<&'a Constant> {
        match term {
            Term::Constant(c) => Some(c),
            Term::Variable(v) => self.bindings.get(v),
        }
    }
}

/// Match a pattern atom against a ground fact, extending `base`.
///
/// Fails on differing predicate names or arities, differing constants, or a
/// variable that would need two different values.
pub fn unify(pattern: &Atom, fact: &Fact, base: &Substitution) -> Option<Substitution> {
    if pattern.predicate != fact.predicate {
        return None;
    }
    unify_args(&pattern.args, &fact.args, base)
}

/// Match pattern arguments against a ground tuple of the same relation.
pub fn unify_args(
    pattern: &[Term],
    tuple: &[Constant],
    base: &Substitution,
) -> Option<Substitution> {
    if pattern.len() != tuple.len() {
        return None;
    }

    let mut subst = base.clone();
    for (term, value) in pattern.iter().zip(tuple) {
        match term {
            Term::Constant(c) => {
                if c != value {
                    return None;
                }
            }
            Term::Variable(v) => {
                if !subst.bind(v, value.clone()) {
                    return None;
                }
            }
        }
    }
    Some(subst)
}

/// Replace every bound variable in `atom`; unbound variables pass through.
pub fn apply(atom: &Atom, subst: &Substitution) -> Atom {
    Atom {
        predicate: atom.predicate.clone(),
        args: atom
            .args
            .iter()
            .map(|term| match term {
                Term::Variable(v) => subst
                    .get(v)
                    .cloned()
                    .map(Term::Constant)
                    .unwrap_or_else(|| term.clone()),
                Term::Constant(_) => term.clone(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(pred: &str, args: &[&str]) -> Fact {
        Fact::new(pred, args.iter().map(|a| Constant::from(*a)).collect())
    }

    #[test]
    fn test_unify_binds_variables() {
        let pattern = Atom::new("edge", vec![Term::var("X"), Term::var("Y")]);
        let subst = unify(&pattern, &fact("edge", &["a", "b"]), &Substitution::new()).unwrap();
        assert_eq!(subst.get("X"), Some(&Constant::from("a")));
        assert_eq!(subst.get("Y"), Some(&Constant::from("b")));
    }

    #[test]
    fn test_unify_constant_against_itself_does_not_extend() {
        let pattern = Atom::new("edge", vec![Term::str("a"), Term::str("b")]);
        let subst = unify(&pattern, &fact("edge", &["a", "b"]), &Substitution::new()).unwrap();
        assert!(subst.is_empty());
    }

    #[test]
    fn test_unify_constant_mismatch_fails() {
        let pattern = Atom::new("edge", vec![Term::str("a"), Term::var("Y")]);
        assert!(unify(&pattern, &fact("edge", &["c", "b"]), &Substitution::new()).is_none());
    }

    #[test]
    fn test_unify_repeated_variable_must_agree() {
        let pattern = Atom::new("edge", vec![Term::var("X"), Term::var("X")]);
        assert!(unify(&pattern, &fact("edge", &["a", "a"]), &Substitution::new()).is_some());
        assert!(unify(&pattern, &fact("edge", &["a", "b"]), &Substitution::new()).is_none());
    }

    #[test]
    fn test_unify_respects_base_bindings() {
        let pattern = Atom::new("edge", vec![Term::var("X"), Term::var("Y")]);
        let mut base = Substitution::new();
        base.bind("X", "z".into());
        assert!(unify(&pattern, &fact("edge", &["a", "b"]), &base).is_none());

        let mut base = Substitution::new();
        base.bind("X", "a".into());
        let subst = unify(&pattern, &fact("edge", &["a", "b"]), &base).unwrap();
        assert_eq!(subst.len(), 2);
    }

    #[test]
    fn test_unify_predicate_and_arity_must_match() {
        let pattern = Atom::new("edge", vec![Term::var("X")]);
        assert!(unify(&pattern, &fact("edge", &["a", "b"]), &Substitution::new()).is_none());
        assert!(unify(&pattern, &fact("node", &["a"]), &Substitution::new()).is_none());
    }

    #[test]
    fn test_unify_different_kinds_never_match() {
        let pattern = Atom::new("xp", vec![Term::int(120)]);
        let stringly = Fact::new("xp", vec![Constant::from("120")]);
        assert!(unify(&pattern, &stringly, &Substitution::new()).is_none());
    }

    #[test]
    fn test_apply_leaves_unbound_variables() {
        let atom = Atom::new("path", vec![Term::var("X"), Term::var("Z")]);
        let mut subst = Substitution::new();
        subst.bind("X", "a".into());
        let applied = apply(&atom, &subst);
        assert_eq!(
            applied,
            Atom::new("path", vec![Term::str("a"), Term::var("Z")])
        );
    }
}
