//! The process-wide program and the rule files it is built from.
//!
//! Readers take an `Arc<Program>` snapshot and evaluate without holding any
//! lock. A reload compiles a brand-new program and swaps the `Arc`; a failed
//! reload leaves the published program untouched.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use juno_datalog::{Program, Rule};

use crate::ServiceError;
use crate::convert::{self, JsonRule};

/// Summary of the currently loaded rules.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RulesInfo {
    /// File names in load order.
    pub files: Vec<String>,
    /// First 16 hex digits of the SHA-256 over the loaded files' contents.
    pub hash: String,
    pub count: usize,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Loaded {
    program: Arc<Program>,
    info: RulesInfo,
}

/// Holds the published program and knows how to rebuild it.
#[derive(Debug)]
pub struct ProgramRegistry {
    rules_dir: Option<PathBuf>,
    current: RwLock<Arc<Loaded>>,
}

impl ProgramRegistry {
    /// A registry with no rules and nothing to reload from.
    pub fn empty() -> Self {
        Self::from_program(Program::default())
    }

    /// Publish an already compiled program.
    pub fn from_program(program: Program) -> Self {
        let info = RulesInfo {
            files: Vec::new(),
            hash: short_hash(Sha256::new()),
            count: program.rule_count(),
            loaded_at: Utc::now(),
        };
        Self {
            rules_dir: None,
            current: RwLock::new(Arc::new(Loaded {
                program: Arc::new(program),
                info,
            })),
        }
    }

    /// Load every `*.json` rule file in `rules_dir`.
    pub fn load(rules_dir: impl Into<PathBuf>) -> Result<Self, ServiceError> {
        let rules_dir = rules_dir.into();
        let loaded = load_dir(&rules_dir)?;
        Ok(Self {
            rules_dir: Some(rules_dir),
            current: RwLock::new(Arc::new(loaded)),
        })
    }

    pub fn rules_dir(&self) -> Option<&Path> {
        self.rules_dir.as_deref()
    }

    /// Snapshot of the published program.
    pub fn program(&self) -> Arc<Program> {
        Arc::clone(&self.snapshot().program)
    }

    pub fn info(&self) -> RulesInfo {
        self.snapshot().info.clone()
    }

    /// Rebuild from the rules directory and publish the result.
    ///
    /// Without a rules directory this just reports the current rules.
    pub fn reload(&self) -> Result<RulesInfo, ServiceError> {
        let Some(dir) = &self.rules_dir else {
            return Ok(self.info());
        };

        let loaded = match load_dir(dir) {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(error = %e, dir = %dir.display(), "reload failed, keeping previous rules");
                return Err(e);
            }
        };
        let info = loaded.info.clone();

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(loaded);
        info!(count = info.count, hash = %info.hash, "rules reloaded");
        Ok(info)
    }

    fn snapshot(&self) -> Arc<Loaded> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }
}

fn load_dir(dir: &Path) -> Result<Loaded, ServiceError> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut hasher = Sha256::new();
    let mut files = Vec::new();
    let mut rules: Vec<Rule> = Vec::new();

    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(file = %name, error = %e, "skipping unreadable rule file");
                continue;
            }
        };
        let parsed = serde_json::from_str::<Vec<JsonRule>>(&contents)
            .map_err(|e| e.to_string())
            .and_then(|json| convert::rules(&json).map_err(|e| e.to_string()));
        let file_rules = match parsed {
            Ok(file_rules) => file_rules,
            Err(e) => {
                warn!(file = %name, error = %e, "skipping malformed rule file");
                continue;
            }
        };

        hasher.update(contents.as_bytes());
        rules.extend(file_rules);
        files.push(name);
    }

    let program = Program::compile(rules)?;
    let info = RulesInfo {
        files,
        hash: short_hash(hasher),
        count: program.rule_count(),
        loaded_at: Utc::now(),
    };
    info!(
        dir = %dir.display(),
        files = info.files.len(),
        count = info.count,
        hash = %info.hash,
        "rules loaded"
    );

    Ok(Loaded {
        program: Arc::new(program),
        info,
    })
}

fn short_hash(hasher: Sha256) -> String {
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(16);
    hex
}
