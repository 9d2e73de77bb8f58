//! Conversion between the JSON wire shapes and the datalog model.
//!
//! Arguments are plain JSON scalars. A string starting with `_` is a
//! variable (`"_S"` is `S`); a bare `"_"` is a fresh anonymous variable.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use juno_datalog::{Atom, BodyAtom, Builtin, Constant, DatalogError, Fact, Rule, Term};

fn predicate_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z_][a-zA-Z0-9_]*$").expect("predicate pattern compiles"))
}

/// `{"pred": "edge", "args": ["a", "_X", 3]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonAtom {
    pub pred: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// `{"name": "reach", "head": {...}, "body": [{...}, ...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub head: JsonAtom,
    #[serde(default)]
    pub body: Vec<JsonAtom>,
}

/// Converts wire atoms, numbering anonymous variables as it goes.
///
/// Use one converter per rule or goal so that every `_` stays distinct
/// within it.
#[derive(Debug, Default)]
pub struct Converter {
    anonymous: usize,
}

impl Converter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn term(&mut self, value: &Value) -> Result<Term, DatalogError> {
        match value {
            Value::String(s) if s == "_" => {
                let term = Term::anonymous(self.anonymous);
                self.anonymous += 1;
                Ok(term)
            }
            Value::String(s) => match s.strip_prefix('_') {
                Some(name) => Ok(Term::Variable(name.to_string())),
                None => Ok(Term::Constant(Constant::Str(s.clone()))),
            },
            other => constant(other).map(Term::Constant),
        }
    }

    pub fn atom(&mut self, atom: &JsonAtom) -> Result<Atom, DatalogError> {
        check_predicate(&atom.pred)?;
        let args = atom
            .args
            .iter()
            .map(|arg| self.term(arg))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Atom::new(&atom.pred, args))
    }

    pub fn rule(&mut self, rule: &JsonRule) -> Result<Rule, DatalogError> {
        let head = self.atom(&rule.head)?;
        let body = rule
            .body
            .iter()
            .map(|atom| self.atom(atom).map(BodyAtom::classify))
            .collect::<Result<Vec<_>, _>>()?;
        let compiled = Rule::new(head, body);
        Ok(match &rule.name {
            Some(name) => compiled.named(name),
            None => compiled,
        })
    }
}

/// A ground JSON scalar as a constant.
pub fn constant(value: &Value) -> Result<Constant, DatalogError> {
    match value {
        Value::Number(n) => n.as_i64().map(Constant::Int).ok_or_else(|| {
            DatalogError::Parse(format!("only 64-bit integers are supported, got {n}"))
        }),
        Value::Bool(b) => Ok(Constant::Bool(*b)),
        Value::String(s) => Ok(Constant::Str(s.clone())),
        Value::Null | Value::Array(_) | Value::Object(_) => Err(DatalogError::Parse(format!(
            "arguments must be integers, strings or booleans, got {value}"
        ))),
    }
}

/// Ground facts; any variable is rejected.
pub fn facts(atoms: &[JsonAtom]) -> Result<Vec<Fact>, DatalogError> {
    atoms
        .iter()
        .map(|json| {
            if Builtin::from_name(&json.pred).is_some() {
                return Err(DatalogError::Parse(format!(
                    "`{}` is a builtin and cannot be asserted as a fact",
                    json.pred
                )));
            }
            let atom = Converter::new().atom(json)?;
            atom.to_fact()
                .ok_or_else(|| DatalogError::Parse(format!("fact {atom} is not ground")))
        })
        .collect()
}

pub fn rules(rules: &[JsonRule]) -> Result<Vec<Rule>, DatalogError> {
    rules
        .iter()
        .map(|json| Converter::new().rule(json))
        .collect()
}

pub fn goal(atom: &JsonAtom) -> Result<Atom, DatalogError> {
    if Builtin::from_name(&atom.pred).is_some() {
        return Err(DatalogError::Parse(format!(
            "`{}` is a builtin and cannot be queried",
            atom.pred
        )));
    }
    Converter::new().atom(atom)
}

/// A constant as a JSON scalar.
pub fn value(constant: &Constant) -> Value {
    match constant {
        Constant::Int(i) => Value::from(*i),
        Constant::Str(s) => Value::from(s.as_str()),
        Constant::Bool(b) => Value::from(*b),
    }
}

fn check_predicate(name: &str) -> Result<(), DatalogError> {
    if predicate_regex().is_match(name) {
        Ok(())
    } else {
        Err(DatalogError::Parse(format!("invalid predicate name `{name}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn json_atom(value: Value) -> JsonAtom {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_underscore_prefix_is_variable() {
        let atom = goal(&json_atom(json!({"pred": "edge", "args": ["a", "_S"]}))).unwrap();
        assert_eq!(atom, Atom::new("edge", vec![Term::str("a"), Term::var("S")]));
    }

    #[test]
    fn test_bare_underscores_are_distinct() {
        let atom = goal(&json_atom(json!({"pred": "edge", "args": ["_", "_"]}))).unwrap();
        assert!(atom.args.iter().all(Term::is_anonymous));
        assert_ne!(atom.args[0], atom.args[1]);
    }

    #[test]
    fn test_double_underscore_is_named_variable() {
        let atom = goal(&json_atom(json!({"pred": "edge", "args": ["__x", "_"]}))).unwrap();
        assert_eq!(atom.args[0], Term::var("_x"));
        assert!(!atom.args[0].is_anonymous());
        assert!(atom.args[1].is_anonymous());
    }

    #[test]
    fn test_scalar_kinds() {
        let fact = facts(&[json_atom(json!({"pred": "user", "args": ["u1", 120, true]}))])
            .unwrap()
            .remove(0);
        assert_eq!(
            fact.args,
            vec![Constant::from("u1"), Constant::Int(120), Constant::Bool(true)]
        );
    }

    #[test]
    fn test_rejects_floats_and_structures() {
        for arg in [json!(1.5), json!(null), json!([1]), json!({"a": 1})] {
            let atom = json_atom(json!({"pred": "p", "args": [arg]}));
            assert!(matches!(goal(&atom), Err(DatalogError::Parse(_))));
        }
    }

    #[test]
    fn test_rejects_bad_predicate_names() {
        for pred in ["Edge", "1edge", "ed-ge", ""] {
            let atom = json_atom(json!({"pred": pred, "args": []}));
            assert!(matches!(goal(&atom), Err(DatalogError::Parse(_))), "{pred}");
        }
    }

    #[test]
    fn test_fact_must_be_ground() {
        let atom = json_atom(json!({"pred": "edge", "args": ["a", "_X"]}));
        assert!(matches!(facts(&[atom]), Err(DatalogError::Parse(_))));
    }

    #[test]
    fn test_builtin_fact_is_rejected() {
        let atom = json_atom(json!({"pred": "geq", "args": [1, 2]}));
        assert!(matches!(facts(&[atom]), Err(DatalogError::Parse(_))));
    }

    #[test]
    fn test_rule_body_builtins_are_classified() {
        let rule: JsonRule = serde_json::from_value(json!({
            "name": "allow",
            "head": {"pred": "allow", "args": ["_U", "_M"]},
            "body": [
                {"pred": "userXP", "args": ["_U", "_X"]},
                {"pred": "moduleReq", "args": ["_M", "_R"]},
                {"pred": "geq", "args": ["_X", "_R"]}
            ]
        }))
        .unwrap();
        let rule = rules(&[rule]).unwrap().remove(0);
        assert_eq!(rule.name.as_deref(), Some("allow"));
        assert!(matches!(rule.body[2], BodyAtom::Builtin(Builtin::Geq, _)));
        assert!(matches!(rule.body[0], BodyAtom::Table(_)));
    }

    #[test]
    fn test_value_round_trips_scalars() {
        assert_eq!(value(&Constant::Int(-4)), json!(-4));
        assert_eq!(value(&Constant::from("mA")), json!("mA"));
        assert_eq!(value(&Constant::Bool(false)), json!(false));
    }
}
