//! One-shot agent calls that return the whole response text.

use crate::cli_backend::CliBackend;
use crate::process_driver::clean_line;
use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("'{0}' is not installed or not on PATH")]
    ToolMissing(String),

    #[error("Agent exited with code {code}: {message}")]
    Failed { code: i32, message: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[async_trait]
pub trait Agent: Send + Sync {
    async fn run(&self, prompt: &str) -> Result<String, AgentError>;
}

/// Runs the copilot CLI once per prompt, prefixed by a system prompt.
///
/// The child is killed when the returned future is dropped, so aborting the
/// calling task stops the scan.
#[derive(Debug, Clone)]
pub struct CopilotAgent {
    backend: CliBackend,
    system_prompt: String,
    cwd: Option<PathBuf>,
}

impl CopilotAgent {
    pub fn new(backend: CliBackend, system_prompt: impl Into<String>) -> Self {
        Self {
            backend,
            system_prompt: system_prompt.into(),
            cwd: None,
        }
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    fn full_prompt(&self, prompt: &str) -> String {
        if self.system_prompt.trim().is_empty() {
            prompt.to_string()
        } else {
            format!("{}\n\n{prompt}", self.system_prompt.trim_end())
        }
    }
}

#[async_trait]
impl Agent for CopilotAgent {
    async fn run(&self, prompt: &str) -> Result<String, AgentError> {
        let (command, args) = self.backend.build_command(&self.full_prompt(prompt));
        let mut cmd = Command::new(&command);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                AgentError::ToolMissing(command.clone())
            } else {
                AgentError::Io(e)
            }
        })?;

        let text = output
            .stdout
            .split(|b| *b == b'\n')
            .map(clean_line)
            .collect::<Vec<_>>()
            .join("\n");
        let code = output.status.code().unwrap_or(1);
        debug!(command = %command, code, bytes = output.stdout.len(), "Agent call finished");

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr.lines().last().unwrap_or("").chars().take(200).collect();
            return Err(AgentError::Failed { code, message });
        }
        info!(chars = text.len(), "Agent response received");
        Ok(text.trim_end().to_string())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::cli_backend::PromptMode;

    fn shell(script: &str) -> CliBackend {
        CliBackend {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string(), "sh".to_string()],
            trailing_args: Vec::new(),
            prompt_mode: PromptMode::Positional,
            prompt_flag: None,
        }
    }

    #[tokio::test]
    async fn returns_cleaned_stdout() {
        let agent = CopilotAgent::new(shell("printf '\\033[1mFound 1 critical\\033[0m\\nsecond line\\n'"), "");
        let text = agent.run("scan").await.unwrap();
        assert_eq!(text, "Found 1 critical\nsecond line");
    }

    #[tokio::test]
    async fn prompt_carries_system_prefix() {
        // $1 is the prompt argument.
        let agent = CopilotAgent::new(shell("printf '%s' \"$1\""), "SYSTEM");
        let text = agent.run("USER").await.unwrap();
        assert_eq!(text, "SYSTEM\n\nUSER");
    }

    #[tokio::test]
    async fn nonzero_exit_is_failed() {
        let agent = CopilotAgent::new(shell("echo boom >&2; exit 4"), "");
        let err = agent.run("scan").await.unwrap_err();
        assert!(matches!(err, AgentError::Failed { code: 4, ref message } if message == "boom"));
    }

    #[tokio::test]
    async fn missing_tool_is_reported() {
        let backend = CliBackend::copilot("definitely-not-a-real-tool-xyz", None);
        let err = CopilotAgent::new(backend, "").run("scan").await.unwrap_err();
        assert!(matches!(err, AgentError::ToolMissing(_)));
    }
}
