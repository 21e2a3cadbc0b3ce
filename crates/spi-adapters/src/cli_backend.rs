//! Command line for the AI coding CLI that executes workflow prompts.

use spi_core::AgentConfig;

/// How the prompt reaches the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// Passed as an argument after `prompt_flag`.
    Arg,
    /// Passed as the final positional argument.
    Positional,
}

/// A CLI backend configuration for executing prompts.
#[derive(Debug, Clone)]
pub struct CliBackend {
    /// The command to execute.
    pub command: String,
    /// Arguments placed before the prompt.
    pub args: Vec<String>,
    /// Arguments placed after the prompt.
    pub trailing_args: Vec<String>,
    pub prompt_mode: PromptMode,
    pub prompt_flag: Option<String>,
}

impl CliBackend {
    /// Copilot in unattended mode: `copilot [--model M] -p <prompt> --allow-all-tools`.
    pub fn copilot(command: impl Into<String>, model: Option<&str>) -> Self {
        let mut args = Vec::new();
        if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
            args.push("--model".to_string());
            args.push(model.to_string());
        }
        Self {
            command: command.into(),
            args,
            trailing_args: vec!["--allow-all-tools".to_string()],
            prompt_mode: PromptMode::Arg,
            prompt_flag: Some("-p".to_string()),
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::copilot(config.copilot_command.clone(), config.copilot_model.as_deref())
    }

    /// Builds `(command, args)` for one prompt.
    pub fn build_command(&self, prompt: &str) -> (String, Vec<String>) {
        let mut args = self.args.clone();
        if self.prompt_mode == PromptMode::Arg
            && let Some(ref flag) = self.prompt_flag
        {
            args.push(flag.clone());
        }
        args.push(prompt.to_string());
        args.extend(self.trailing_args.iter().cloned());

        tracing::debug!(
            command = %self.command,
            args_count = args.len(),
            prompt_len = prompt.len(),
            "Built CLI command"
        );
        tracing::trace!(prompt = %prompt, "Full prompt content");

        (self.command.clone(), args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copilot_backend_with_model() {
        let backend = CliBackend::copilot("copilot", Some("claude-sonnet-4.5"));
        let (cmd, args) = backend.build_command("test prompt");

        assert_eq!(cmd, "copilot");
        assert_eq!(
            args,
            vec![
                "--model",
                "claude-sonnet-4.5",
                "-p",
                "test prompt",
                "--allow-all-tools"
            ]
        );
    }

    #[test]
    fn test_copilot_backend_without_model() {
        let backend = CliBackend::copilot("copilot", None);
        let (_, args) = backend.build_command("p");
        assert_eq!(args, vec!["-p", "p", "--allow-all-tools"]);

        let backend = CliBackend::copilot("copilot", Some("  "));
        let (_, args) = backend.build_command("p");
        assert_eq!(args, vec!["-p", "p", "--allow-all-tools"]);
    }

    #[test]
    fn test_from_config_uses_configured_command() {
        let config = AgentConfig {
            copilot_command: "/opt/bin/copilot".to_string(),
            copilot_model: None,
            ..AgentConfig::default()
        };
        let (cmd, _) = CliBackend::from_config(&config).build_command("p");
        assert_eq!(cmd, "/opt/bin/copilot");
    }

    #[test]
    fn test_positional_prompt() {
        let backend = CliBackend {
            command: "echo".to_string(),
            args: vec!["-n".to_string()],
            trailing_args: Vec::new(),
            prompt_mode: PromptMode::Positional,
            prompt_flag: Some("-p".to_string()),
        };
        let (_, args) = backend.build_command("hello");
        assert_eq!(args, vec!["-n", "hello"]);
    }
}
