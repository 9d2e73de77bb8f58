//! Goal matching against a saturated fact store.

use serde::{Deserialize, Serialize};

use crate::store::FactStore;
use crate::substitution::{Substitution, unify_args};
use crate::term::{Atom, Constant, Term, is_anonymous_name};

/// Bindings for a goal's named variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub predicate: String,
    /// Named variables of the goal, in order of first appearance.
    pub columns: Vec<String>,
    /// One row per distinct binding of `columns`, sorted.
    pub rows: Vec<Vec<Constant>>,
}

impl Answer {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as column-name/value pairs.
    pub fn named_rows(&self) -> impl Iterator<Item = Vec<(&str, &Constant)>> {
        self.rows.iter().map(|row| {
            self.columns
                .iter()
                .map(String::as_str)
                .zip(row.iter())
                .collect()
        })
    }
}

/// Match `goal` against every tuple of its relation.
///
/// A ground goal yields one empty row when it holds. Unknown predicates
/// simply yield no rows.
pub fn answer(goal: &Atom, store: &FactStore) -> Answer {
    let columns: Vec<String> = goal
        .variables()
        .into_iter()
        .filter(|v| !is_anonymous_name(v))
        .map(str::to_string)
        .collect();

    let empty = Substitution::new();
    let mut rows: Vec<Vec<Constant>> = store
        .all(&goal.predicate)
        .filter_map(|tuple| unify_args(&goal.args, tuple, &empty))
        .filter_map(|subst| project(&columns, &subst))
        .collect();

    rows.sort();
    rows.dedup();

    Answer {
        predicate: goal.predicate.clone(),
        columns,
        rows,
    }
}

fn project(columns: &[String], subst: &Substitution) -> Option<Vec<Constant>> {
    columns
        .iter()
        .map(|column| subst.resolve(&Term::Variable(column.clone())).cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Fact;

    fn store() -> FactStore {
        FactStore::seeded([
            Fact::new("path", vec!["a".into(), "b".into()]),
            Fact::new("path", vec!["a".into(), "c".into()]),
            Fact::new("path", vec!["b".into(), "c".into()]),
            Fact::new("loop", vec!["a".into(), "a".into()]),
            Fact::new("loop", vec!["a".into(), "b".into()]),
        ])
    }

    #[test]
    fn test_bound_first_argument() {
        let goal = Atom::new("path", vec![Term::str("a"), Term::var("V")]);
        let answer = answer(&goal, &store());
        assert_eq!(answer.columns, vec!["V"]);
        assert_eq!(
            answer.rows,
            vec![vec![Constant::from("b")], vec![Constant::from("c")]]
        );
    }

    #[test]
    fn test_anonymous_variables_are_not_columns() {
        let goal = Atom::new("path", vec![Term::anonymous(0), Term::var("Y")]);
        let answer = answer(&goal, &store());
        assert_eq!(answer.columns, vec!["Y"]);
        // b appears once, c twice but is deduplicated.
        assert_eq!(
            answer.rows,
            vec![vec![Constant::from("b")], vec![Constant::from("c")]]
        );
    }

    #[test]
    fn test_underscore_named_variable_is_a_column() {
        let goal = Atom::new("path", vec![Term::var("_x"), Term::str("b")]);
        let answer = answer(&goal, &store());
        assert_eq!(answer.columns, vec!["_x"]);
        assert_eq!(answer.rows, vec![vec![Constant::from("a")]]);
    }

    #[test]
    fn test_repeated_variable_must_agree() {
        let goal = Atom::new("loop", vec![Term::var("X"), Term::var("X")]);
        let answer = answer(&goal, &store());
        assert_eq!(answer.rows, vec![vec![Constant::from("a")]]);
    }

    #[test]
    fn test_ground_goal() {
        let present = Atom::new("path", vec![Term::str("a"), Term::str("c")]);
        let answer_present = answer(&present, &store());
        assert!(answer_present.columns.is_empty());
        assert_eq!(answer_present.rows, vec![Vec::<Constant>::new()]);

        let absent = Atom::new("path", vec![Term::str("c"), Term::str("a")]);
        assert!(answer(&absent, &store()).is_empty());
    }

    #[test]
    fn test_unknown_predicate_yields_no_rows() {
        let goal = Atom::new("missing", vec![Term::var("X")]);
        let answer = answer(&goal, &store());
        assert_eq!(answer.columns, vec!["X"]);
        assert!(answer.is_empty());
    }

    #[test]
    fn test_named_rows() {
        let goal = Atom::new("path", vec![Term::var("X"), Term::var("Y")]);
        let answer = answer(&goal, &store());
        let first = answer.named_rows().next().unwrap();
        assert_eq!(
            first,
            vec![("X", &Constant::from("a")), ("Y", &Constant::from("b"))]
        );
    }
}
