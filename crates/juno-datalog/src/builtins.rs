//! Builtin predicates evaluated functionally instead of by table lookup.
//!
//! - **Comparisons** (`eq`, `neq`, `lt`, `leq`, `gt`, `geq`): arity 2, filter
//!   the current substitution.
//! - **Arithmetic** (`add`, `sub`, `mul`, `div`, `mod`): arity 3, compute
//!   `args[2] = args[0] op args[1]`. An unbound output is bound; a bound
//!   output is checked.

use std::cmp::Ordering;

use crate::error::DatalogError;
use crate::substitution::Substitution;
use crate::term::{Constant, Term};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Eq,
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl Builtin {
    pub const ALL: [Builtin; 11] = [
        Builtin::Eq,
        Builtin::Neq,
        Builtin::Lt,
        Builtin::Leq,
        Builtin::Gt,
        Builtin::Geq,
        Builtin::Add,
        Builtin::Sub,
        Builtin::Mul,
        Builtin::Div,
        Builtin::Mod,
    ];

    /// Look up a builtin by predicate name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Eq => "eq",
            Builtin::Neq => "neq",
            Builtin::Lt => "lt",
            Builtin::Leq => "leq",
            Builtin::Gt => "gt",
            Builtin::Geq => "geq",
            Builtin::Add => "add",
            Builtin::Sub => "sub",
            Builtin::Mul => "mul",
            Builtin::Div => "div",
            Builtin::Mod => "mod",
        }
    }

    pub fn arity(self) -> usize {
        if self.is_arithmetic() { 3 } else { 2 }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Builtin::Add | Builtin::Sub | Builtin::Mul | Builtin::Div | Builtin::Mod
        )
    }

    /// Argument positions that must be bound before evaluation.
    pub fn input_positions(self) -> std::ops::Range<usize> {
        0..2
    }

    /// Argument position this builtin may bind, if any.
    pub fn output_position(self) -> Option<usize> {
        self.is_arithmetic().then_some(2)
    }

    /// Evaluate against a substitution.
    ///
    /// `Ok(None)` fails the current instantiation. Errors are reserved for
    /// type mismatches and unbound inputs.
    pub fn evaluate(
        self,
        args: &[Term],
        subst: &Substitution,
    ) -> Result<Option<Substitution>, DatalogError> {
        if args.len() != self.arity() {
            return Err(DatalogError::Internal(format!(
                "{} called with {} arguments",
                self.name(),
                args.len()
            )));
        }

        let left = self.bound_input(&args[0], subst)?;
        let right = self.bound_input(&args[1], subst)?;

        if !self.is_arithmetic() {
            let holds = self.compare(left, right)?;
            return Ok(holds.then(|| subst.clone()));
        }

        let Some(value) = self.compute(left, right)? else {
            return Ok(None);
        };

        let mut next = subst.clone();
        let bound = match &args[2] {
            Term::Constant(c) => *c == value,
            Term::Variable(v) => next.bind(v, value),
        };
        Ok(bound.then_some(next))
    }

    fn bound_input<'a>(
        self,
        term: &'a Term,
        subst: &'a Substitution,
    ) -> Result<&'a Constant, DatalogError> {
        subst.resolve(term).ok_or_else(|| {
            DatalogError::Internal(format!(
                "builtin {} evaluated with unbound argument {term}",
                self.name()
            ))
        })
    }

    fn compare(self, left: &Constant, right: &Constant) -> Result<bool, DatalogError> {
        match self {
            Builtin::Eq => self.identity(left, right),
            Builtin::Neq => self.identity(left, right).map(|same| !same),
            Builtin::Lt => Ok(self.order(left, right)? == Ordering::Less),
            Builtin::Leq => Ok(self.order(left, right)? != Ordering::Greater),
            Builtin::Gt => Ok(self.order(left, right)? == Ordering::Greater),
            Builtin::Geq => Ok(self.order(left, right)? != Ordering::Less),
            Builtin::Add | Builtin::Sub | Builtin::Mul | Builtin::Div | Builtin::Mod => Err(
                DatalogError::Internal(format!("{} is not a comparison", self.name())),
            ),
        }
    }

    /// Identity never coerces across kinds.
    fn identity(self, left: &Constant, right: &Constant) -> Result<bool, DatalogError> {
        if !left.same_kind(right) {
            return Err(self.mismatch(left, right));
        }
        Ok(left == right)
    }

    fn order(self, left: &Constant, right: &Constant) -> Result<Ordering, DatalogError> {
        match (left, right) {
            (Constant::Int(l), Constant::Int(r)) => Ok(l.cmp(r)),
            (Constant::Str(l), Constant::Str(r)) => Ok(l.cmp(r)),
            _ => Err(self.mismatch(left, right)),
        }
    }

    fn compute(self, left: &Constant, right: &Constant) -> Result<Option<Constant>, DatalogError> {
        let (Constant::Int(l), Constant::Int(r)) = (left, right) else {
            return Err(self.mismatch(left, right));
        };
        let result = match self {
            Builtin::Add => l.checked_add(*r),
            Builtin::Sub => l.checked_sub(*r),
            Builtin::Mul => l.checked_mul(*r),
            Builtin::Div => l.checked_div(*r),
            Builtin::Mod => l.checked_rem(*r),
            Builtin::Eq
            | Builtin::Neq
            | Builtin::Lt
            | Builtin::Leq
            | Builtin::Gt
            | Builtin::Geq => {
                return Err(DatalogError::Internal(format!(
                    "{} is not arithmetic",
                    self.name()
                )));
            }
        };
        Ok(result.map(Constant::Int))
    }

    fn mismatch(self, left: &Constant, right: &Constant) -> DatalogError {
        DatalogError::TypeMismatch {
            builtin: self.name().to_string(),
            left: left.clone(),
            right: right.clone(),
        }
    }
}

impl std::fmt::Display for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
