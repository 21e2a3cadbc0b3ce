//! # spi-adapters
//!
//! Everything that talks to the outside world on behalf of a workflow:
//! - [`CliBackend`] builds the AI CLI command line
//! - [`ProcessDriver`] streams a child process with merged output and cancellation
//! - [`fan_out`] runs bounded per-service async work
//! - [`GithubClient`] and [`CopilotAgent`] sit behind the [`ForgeClient`] and [`Agent`] traits
//! - [`maven`] regenerates coverage reports

pub mod agent;
pub mod cli_backend;
pub mod fan_out;
pub mod github;
pub mod maven;
pub mod process_driver;

pub use agent::{Agent, AgentError, CopilotAgent};
pub use cli_backend::{CliBackend, PromptMode};
pub use fan_out::{FanOutResult, fan_out};
pub use github::{ClientError, ForgeClient, GithubClient};
pub use process_driver::{
    DriverError, INTERRUPTED_EXIT, OutputBuffer, OutputHandler, ProcessDriver, RunCapture, RunOutcome,
};
