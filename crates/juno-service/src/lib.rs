//! HTTP boundary for the Juno rule engine.
//!
//! This crate provides:
//! - Conversion from the JSON wire shapes to the datalog model
//! - A program registry loaded from rule files, with atomic reload
//! - The `/eval` pipeline with per-request deadlines
//! - The axum router (`/eval`, `/health`, `/version`, `/info`, `/reload`)

pub mod config;
pub mod convert;
mod error;
pub mod eval;
pub mod registry;
mod routes;

pub use config::ServiceConfig;
pub use error::ServiceError;
pub use eval::{EvalRequest, EvalResponse, QueryResult, evaluate_request};
pub use registry::{ProgramRegistry, RulesInfo};
pub use routes::{AppState, create_router};
