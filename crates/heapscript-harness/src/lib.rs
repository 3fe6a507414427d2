//! Driver for heap allocator test scripts.
//!
//! This crate provides:
//! - Run configuration: seed and log path from flags or the environment
//! - Driver modes: translate a trace, generate a pattern, validate a script
//! - Structured JSONL logging of every run

#![forbid(unsafe_code)]

pub mod config;
pub mod runner;
pub mod structured_log;

pub use config::RunConfig;
pub use runner::{GenerateReport, ParseReport, RunError, run_generate, run_parse, run_validate};
