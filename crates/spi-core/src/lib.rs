//! # spi-core
//!
//! Workflow state for the SPI Agent CLI.
//!
//! This crate provides:
//! - The per-service [`Tracker`] and the [`Workflow`] contract each workflow implements
//! - Line parsers that turn tool output into tracker updates
//! - Post-run reducers: coverage grading, CVE extraction, status JSON recovery and report panels
//! - Configuration, embedded prompts, run logs and the workflow result store
//!
//! Nothing here touches a terminal or spawns a process.

pub mod config;
pub mod coverage;
pub mod cve;
mod matching;
mod parser;
pub mod prompts;
mod report;
pub mod result_store;
mod run_log;
pub mod status_json;
mod tracker;
mod workflow;
pub mod workflows;

pub use config::{AgentConfig, CONFIG_FILE, ConfigError, SERVICES, ServiceListError, parse_services};
pub use matching::{mentioned_services, mentions};
pub use parser::{LineParser, Marker, clip};
pub use prompts::{PromptBuilder, PromptNotFound};
pub use report::ReportPanel;
pub use result_store::{ResultStore, RunStatus, WorkflowResult};
pub use run_log::RunLog;
pub use tracker::{ServiceRecord, StatusRow, Summary, Tracker};
pub use workflow::{DEFAULT_ICON, StatusKind, Tone, Workflow};
