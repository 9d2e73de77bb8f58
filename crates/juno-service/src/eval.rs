//! The `/eval` request pipeline.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use juno_datalog::{
    Answer, Atom, Cancellation, DatalogError, EngineLimits, Evaluation, EvaluationStats, Program,
};

use crate::ServiceError;
use crate::convert::{self, JsonAtom, JsonRule};
use crate::registry::ProgramRegistry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalRequest {
    /// Replaces the loaded program for this request only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<Vec<JsonRule>>,
    /// Added to the loaded (or replacement) program for this request only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<JsonRule>,
    #[serde(default)]
    pub facts: Vec<JsonAtom>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<JsonAtom>,
    /// Further goals answered against the same saturated store.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub queries: Vec<JsonAtom>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl EvalRequest {
    /// `query` first, then `queries`.
    fn goals(&self) -> Result<Vec<Atom>, DatalogError> {
        if self.query.is_none() && self.queries.is_empty() {
            return Err(DatalogError::Parse(
                "request needs a `query` or at least one entry in `queries`".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for goal in &self.queries {
            if !seen.insert(goal.pred.as_str()) {
                return Err(DatalogError::Parse(format!(
                    "predicate `{}` appears more than once in `queries`",
                    goal.pred
                )));
            }
        }

        self.query
            .iter()
            .chain(&self.queries)
            .map(convert::goal)
            .collect()
    }
}

/// Answer rows for one goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    /// One object per answer, keyed by column name.
    pub rows: Vec<Map<String, Value>>,
}

impl QueryResult {
    fn from_answer(answer: &Answer) -> Self {
        let rows = answer
            .named_rows()
            .map(|row| {
                row.into_iter()
                    .map(|(column, constant)| (column.to_string(), convert::value(constant)))
                    .collect()
            })
            .collect();
        Self {
            columns: answer.columns.clone(),
            rows,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalResponse {
    pub ok: bool,
    /// The first goal: `query` when given, otherwise the first of `queries`.
    pub predicate: String,
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
    /// One entry per element of `queries`, keyed by predicate.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub results: BTreeMap<String, QueryResult>,
    /// Every relation in the saturated store, tuples sorted.
    pub tables: BTreeMap<String, Vec<Vec<Value>>>,
    pub stats: EvaluationStats,
}

impl EvalResponse {
    fn from_evaluation(evaluation: &Evaluation, queries: usize) -> Result<Self, DatalogError> {
        let first = evaluation
            .answers
            .first()
            .ok_or_else(|| DatalogError::Internal("evaluation produced no answers".to_string()))?;
        let primary = QueryResult::from_answer(first);

        let skip = evaluation.answers.len() - queries;
        let results: BTreeMap<String, QueryResult> = evaluation.answers[skip..]
            .iter()
            .map(|answer| (answer.predicate.clone(), QueryResult::from_answer(answer)))
            .collect();

        let tables: BTreeMap<String, Vec<Vec<Value>>> = evaluation
            .store
            .predicates()
            .map(|predicate| {
                let tuples: Vec<Vec<Value>> = evaluation
                    .store
                    .sorted_tuples(predicate)
                    .iter()
                    .map(|tuple| tuple.iter().map(convert::value).collect())
                    .collect();
                (predicate.to_string(), tuples)
            })
            .collect();

        Ok(Self {
            ok: true,
            predicate: first.predicate.clone(),
            columns: primary.columns,
            rows: primary.rows,
            results,
            tables,
            stats: evaluation.stats,
        })
    }
}

/// Convert, compile and evaluate one request on the blocking pool.
///
/// The evaluation is cancelled once `timeout_ms` (or `default_timeout`)
/// elapses; the engine notices at the start of its next round.
pub async fn evaluate_request(
    registry: &ProgramRegistry,
    limits: EngineLimits,
    default_timeout: Duration,
    request: EvalRequest,
) -> Result<EvalResponse, ServiceError> {
    let program = request_program(registry, &request)?;
    let facts = convert::facts(&request.facts)?;
    let goals = request.goals()?;
    let queries = request.queries.len();

    let timeout = request
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(default_timeout);
    let cancel = Cancellation::with_timeout(timeout);

    debug!(
        goals = goals.len(),
        facts = facts.len(),
        rules = program.rule_count(),
        timeout_ms = timeout.as_millis() as u64,
        "evaluating request"
    );

    let task_cancel = cancel.clone();
    let task = tokio::task::spawn_blocking(move || {
        juno_datalog::evaluate(&program, facts, &goals, limits, &task_cancel)
    });

    let result = match tokio::time::timeout(timeout, task).await {
        Ok(joined) => joined?,
        Err(_) => {
            cancel.cancel();
            Err(DatalogError::Cancelled)
        }
    };

    match result {
        Ok(evaluation) => Ok(EvalResponse::from_evaluation(&evaluation, queries)?),
        Err(e) => {
            warn!(error = %e, "evaluation failed");
            Err(e.into())
        }
    }
}

/// The program for one request: the override or the published program,
/// extended with any request rules.
fn request_program(
    registry: &ProgramRegistry,
    request: &EvalRequest,
) -> Result<Arc<Program>, DatalogError> {
    let base = match &request.program {
        Some(rules) => Arc::new(Program::compile(convert::rules(rules)?)?),
        None => registry.program(),
    };

    if request.rules.is_empty() {
        return Ok(base);
    }
    let extra = convert::rules(&request.rules)?;
    Ok(Arc::new(base.extend(extra)?))
}
