//! Commands that run without the HTTP server.

use std::path::Path;
use std::time::Duration;

use miette::Result;
use tracing::info;

use juno_datalog::EngineLimits;
use juno_service::{EvalRequest, EvalResponse, ProgramRegistry, RulesInfo, evaluate_request};

/// Compile every rule file in `rules_dir` and print a summary.
pub fn check(rules_dir: &Path) -> Result<()> {
    let rules = load_rules(rules_dir)?;
    println!("{}", summary(&rules));
    for file in &rules.files {
        println!("  {}", file);
    }
    Ok(())
}

/// Evaluate the request stored at `request_path` and print the JSON response.
pub async fn eval(
    request_path: &Path,
    rules_dir: Option<&Path>,
    limits: EngineLimits,
    default_timeout: Duration,
) -> Result<()> {
    let response = eval_file(request_path, rules_dir, limits, default_timeout).await?;
    let rendered =
        serde_json::to_string_pretty(&response).map_err(|e| miette::miette!("{}", e))?;
    println!("{}", rendered);
    Ok(())
}

fn load_rules(rules_dir: &Path) -> Result<RulesInfo> {
    let registry = ProgramRegistry::load(rules_dir).map_err(|e| miette::miette!("{}", e))?;
    let rules = registry.info();
    info!(count = rules.count, hash = %rules.hash, "rules compiled");
    Ok(rules)
}

fn summary(rules: &RulesInfo) -> String {
    format!(
        "{} rules from {} files (hash {})",
        rules.count,
        rules.files.len(),
        rules.hash
    )
}

async fn eval_file(
    request_path: &Path,
    rules_dir: Option<&Path>,
    limits: EngineLimits,
    default_timeout: Duration,
) -> Result<EvalResponse> {
    let content = std::fs::read_to_string(request_path)
        .map_err(|e| miette::miette!("Failed to read {}: {}", request_path.display(), e))?;
    let request: EvalRequest = serde_json::from_str(&content)
        .map_err(|e| miette::miette!("Invalid request {}: {}", request_path.display(), e))?;

    let registry = match rules_dir {
        Some(dir) => ProgramRegistry::load(dir).map_err(|e| miette::miette!("{}", e))?,
        None => ProgramRegistry::empty(),
    };

    evaluate_request(&registry, limits, default_timeout, request)
        .await
        .map_err(|e| miette::miette!("{}", e))
}
