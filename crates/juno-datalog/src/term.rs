//! Terms, atoms and ground facts.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A ground value.
///
/// Ordering between different kinds exists only so rows can be sorted
/// deterministically; builtins never compare across kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Constant {
    Int(i64),
    Str(String),
    Bool(bool),
}

impl Constant {
    /// Name of this constant's kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Constant::Int(_) => "integer",
            Constant::Str(_) => "string",
            Constant::Bool(_) => "boolean",
        }
    }

    /// Whether two constants have the same kind.
    pub fn same_kind(&self, other: &Constant) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(i) => write!(f, "{i}"),
            Constant::Str(s) => write!(f, "{s:?}"),
            Constant::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<i64> for Constant {
    fn from(value: i64) -> Self {
        Constant::Int(value)
    }
}

impl From<&str> for Constant {
    fn from(value: &str) -> Self {
        Constant::Str(value.to_string())
    }
}

impl From<bool> for Constant {
    fn from(value: bool) -> Self {
        Constant::Bool(value)
    }
}

/// A rule or query argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Constant(Constant),
    Variable(String),
}

impl Term {
    pub fn var(name: &str) -> Self {
        Term::Variable(name.to_string())
    }

    pub fn int(value: i64) -> Self {
        Term::Constant(Constant::Int(value))
    }

    pub fn str(value: &str) -> Self {
        Term::Constant(Constant::Str(value.to_string()))
    }

    pub fn bool(value: bool) -> Self {
        Term::Constant(Constant::Bool(value))
    }

    /// The `index`th fresh variable of a rule or query; matched but never
    /// reported as an answer column.
    pub fn anonymous(index: usize) -> Self {
        Term::Variable(format!("{ANONYMOUS_PREFIX}{index}"))
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Term::Variable(name) if is_anonymous_name(name))
    }
}

const ANONYMOUS_PREFIX: &str = "_#";

pub(crate) fn is_anonymous_name(name: &str) -> bool {
    name.starts_with(ANONYMOUS_PREFIX)
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Constant(c) => write!(f, "{c}"),
            Term::Variable(v) => write!(f, "{v}"),
        }
    }
}

/// A predicate applied to terms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Atom {
    pub predicate: String,
    pub args: Vec<Term>,
}

impl Atom {
    pub fn new(predicate: &str, args: Vec<Term>) -> Self {
        Self {
            predicate: predicate.to_string(),
            args,
        }
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Variables in order of first appearance, without duplicates.
    pub fn variables(&self) -> Vec<&str> {
        let mut vars: Vec<&str> = Vec::new();
        for arg in &self.args {
            if let Term::Variable(v) = arg
                && !vars.contains(&v.as_str())
            {
                vars.push(v);
            }
        }
        vars
    }

    /// Convert to a fact if every argument is a constant.
    pub fn to_fact(&self) -> Option<Fact> {
        let args = self
            .args
            .iter()
            .map(|t| match t {
                Term::Constant(c) => Some(c.clone()),
                Term::Variable(_) => None,
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Fact {
            predicate: self.predicate.clone(),
            args,
        })
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.predicate)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

/// A ground atom.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fact {
    pub predicate: String,
    pub args: Vec<Constant>,
}

impl Fact {
    pub fn new(predicate: &str, args: Vec<Constant>) -> Self {
        Self {
            predicate: predicate.to_string(),
            args,
        }
    }

    pub fn to_atom(&self) -> Atom {
        Atom {
            predicate: self.predicate.clone(),
            args: self.args.iter().cloned().map(Term::Constant).collect(),
        }
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_atom())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atom_variables_first_appearance() {
        let atom = Atom::new(
            "p",
            vec![
                Term::var("Y"),
                Term::str("a"),
                Term::var("X"),
                Term::var("Y"),
            ],
        );
        assert_eq!(atom.variables(), vec!["Y", "X"]);
    }

    #[test]
    fn test_to_fact_requires_ground() {
        let ground = Atom::new("edge", vec![Term::str("a"), Term::int(1)]);
        assert_eq!(
            ground.to_fact(),
            Some(Fact::new("edge", vec!["a".into(), Constant::Int(1)]))
        );

        let open = Atom::new("edge", vec![Term::str("a"), Term::var("X")]);
        assert_eq!(open.to_fact(), None);
    }

    #[test]
    fn test_constant_kinds() {
        assert!(Constant::Int(1).same_kind(&Constant::Int(2)));
        assert!(!Constant::Int(1).same_kind(&Constant::Str("1".into())));
        assert_eq!(Constant::Bool(true).kind(), "boolean");
    }

    #[test]
    fn test_display() {
        let atom = Atom::new("p", vec![Term::var("X"), Term::str("a"), Term::int(3)]);
        assert_eq!(atom.to_string(), r#"p(X, "a", 3)"#);
    }

    #[test]
    fn test_constant_serializes_untagged() {
        let json = serde_json::to_string(&vec![
            Constant::Int(7),
            Constant::Str("u1".into()),
            Constant::Bool(false),
        ])
        .unwrap();
        assert_eq!(json, r#"[7,"u1",false]"#);
    }
}
