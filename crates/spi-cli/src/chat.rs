//! `spi-agent chat`: an interactive loop over the agent and the workflows.
//!
//! Slash-commands run the same runners as the subcommands. Everything else
//! goes to the agent, prefixed with the recent workflow results and the
//! last few exchanges of the session.

use crate::display::{self, print_error, print_markdown, print_note};
use crate::runners::vulns::TriageOptions;
use crate::runners::{Request, RunContext, execute, tool_missing};
use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use spi_adapters::{Agent, AgentError};
use spi_core::{AgentConfig, SERVICES, parse_services};
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::io::Write as _;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

/// Workflow results injected ahead of each question.
pub const CONTEXT_RESULTS: usize = 3;
/// Question and answer pairs replayed to the agent.
pub const HISTORY_TURNS: usize = 6;

const CONTEXT_INSTRUCTION: &str = "**IMPORTANT INSTRUCTION:**
When the user asks about recent workflow results (tests, vulns, status, fork),
YOU MUST reference the workflow results shown above. DO NOT call GitHub tools
to fetch information that is already available in these results.
Always check this context FIRST before calling any tools.";

const HELP: &str = "\
**Questions** go to the agent, for example:

- List open issues in partition
- What was the coverage grade for legal?
- Which CVEs need attention first?

**Slash commands:**

- `/fork <services> [--branch <name>]` - initialize service forks
- `/status <services> [--api]` - issues, pull requests and workflow runs
- `/test <services> [--provider <profiles>]` - Maven tests and coverage (default `core,core-plus,azure`)
- `/vulns <services> [--severity critical,high] [--create-issue]` - dependency triage
- `/context [N]` - the last N workflow results
- `/help` - this help

Type `exit`, `quit` or press Ctrl+D to leave.";

#[derive(Parser, Debug)]
#[command(name = "chat", no_binary_name = true, disable_help_subcommand = true)]
struct SlashLine {
    #[command(subcommand)]
    command: SlashCommand,
}

#[derive(Subcommand, Debug)]
enum SlashCommand {
    /// Initialize service forks
    Fork {
        services: String,
        #[arg(long)]
        branch: Option<String>,
    },
    /// Issues, pull requests and workflow runs
    Status {
        services: String,
        #[arg(long)]
        api: bool,
    },
    /// Maven tests and coverage
    Test {
        services: String,
        #[arg(long, default_value = "core,core-plus,azure")]
        provider: String,
    },
    /// Dependency and vulnerability triage
    Vulns {
        services: String,
        #[arg(long, default_value = "critical,high")]
        severity: String,
        #[arg(long)]
        create_issue: bool,
    },
    /// Recent workflow results
    Context {
        #[arg(default_value_t = CONTEXT_RESULTS)]
        limit: usize,
    },
}

/// One line typed at the chat prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Empty,
    Exit,
    Help,
    Context(usize),
    Workflow { services: String, request: Request },
    Query(String),
    /// A malformed slash-command, with the message to show.
    Invalid(String),
}

fn parse_input(line: &str, config: &AgentConfig) -> Input {
    let line = line.trim();
    match line.to_lowercase().as_str() {
        "" => return Input::Empty,
        "exit" | "quit" | "q" => return Input::Exit,
        "help" | "/help" => return Input::Help,
        _ => {}
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Query(line.to_string());
    };

    let parsed = match SlashLine::try_parse_from(command.split_whitespace()) {
        Ok(parsed) => parsed,
        Err(e) => return Input::Invalid(e.to_string().trim_end().to_string()),
    };
    let (services, request) = match parsed.command {
        SlashCommand::Fork { services, branch } => {
            let branch = branch.unwrap_or_else(|| config.default_branch.clone());
            (services, Request::Fork { branch })
        }
        SlashCommand::Status { services, api } => (services, Request::Status { api }),
        SlashCommand::Test { services, provider } => (services, Request::Test { provider }),
        SlashCommand::Vulns {
            services,
            severity,
            create_issue,
        } => (
            services,
            Request::Vulns {
                options: TriageOptions::new(&severity, create_issue),
                stream: false,
            },
        ),
        SlashCommand::Context { limit } => return Input::Context(limit),
    };
    Input::Workflow { services, request }
}

/// Questions and answers of the current session, oldest first.
#[derive(Debug, Default)]
struct Conversation {
    turns: VecDeque<(String, String)>,
}

impl Conversation {
    fn remember(&mut self, question: &str, answer: &str) {
        if self.turns.len() == HISTORY_TURNS {
            self.turns.pop_front();
        }
        self.turns.push_back((question.to_string(), answer.to_string()));
    }

    /// The full prompt for `query`: workflow context, history, then the query.
    fn compose(&self, context: &str, query: &str) -> String {
        let mut prompt = String::new();
        if !context.trim().is_empty() {
            let _ = write!(prompt, "{}\n\n{CONTEXT_INSTRUCTION}\n\n", context.trim_end());
        }
        if !self.turns.is_empty() {
            prompt.push_str("Conversation so far:\n");
            for (question, answer) in &self.turns {
                let _ = write!(prompt, "User: {question}\nAssistant: {answer}\n");
            }
            prompt.push('\n');
        }
        let _ = write!(prompt, "User: {query}");
        prompt
    }
}

/// Reads lines from `input` until `exit`, end of input or Ctrl-C at the prompt.
pub async fn run<R>(ctx: &RunContext, agent: &dyn Agent, input: R) -> Result<i32>
where
    R: AsyncBufRead + Unpin,
{
    print_banner(ctx);
    let mut lines = input.lines();
    let mut conversation = Conversation::default();

    loop {
        ctx.interrupt.reset();
        show_prompt(ctx.use_colors);
        let mut interrupt = ctx.interrupt.subscribe();
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read chat input")?,
            _ = interrupt.wait_for(|set| *set) => {
                println!("\n\nInterrupted. Goodbye!");
                break;
            }
        };
        let Some(line) = line else {
            println!("\nGoodbye!");
            break;
        };

        match parse_input(&line, &ctx.config) {
            Input::Empty => {}
            Input::Exit => {
                println!("\nGoodbye!");
                break;
            }
            Input::Help => print_markdown(HELP, ctx.use_colors),
            Input::Invalid(message) => print_error(&message, ctx.use_colors),
            Input::Context(limit) => {
                let summary = ctx.store.get_context_summary(limit);
                if summary.is_empty() {
                    print_note("No recent workflow results.", ctx.use_colors);
                } else {
                    print!("{summary}");
                }
            }
            Input::Workflow { services, request } => {
                run_workflow(ctx, agent, &mut conversation, &services, &request).await;
            }
            Input::Query(query) => ask(ctx, agent, &mut conversation, &query).await,
        }
    }
    Ok(0)
}

async fn run_workflow(
    ctx: &RunContext,
    agent: &dyn Agent,
    conversation: &mut Conversation,
    services: &str,
    request: &Request,
) {
    let services = match parse_services(services) {
        Ok(services) => services,
        Err(e) => {
            print_error(&e.to_string(), ctx.use_colors);
            return;
        }
    };
    let names = services.join(", ");
    print_note(&format!("\nRunning {} workflow for: {names}\n", request.name()), ctx.use_colors);

    let code = match execute(ctx, &services, request).await {
        Ok(code) => code,
        Err(e) => {
            print_error(&format!("{e:#}"), ctx.use_colors);
            return;
        }
    };
    info!(workflow = request.name(), exit_code = code, "Chat workflow finished");
    if ctx.interrupt.is_set() {
        return;
    }

    let follow_up = format!(
        "The {} workflow just completed for {names} (exit code {code}). \
         Acknowledge briefly and offer to help with next steps.",
        request.name()
    );
    ask(ctx, agent, conversation, &follow_up).await;
}

async fn ask(ctx: &RunContext, agent: &dyn Agent, conversation: &mut Conversation, query: &str) {
    let context = ctx.store.get_context_summary(CONTEXT_RESULTS);
    if context.is_empty() {
        debug!("No workflow results to inject");
    } else {
        info!(chars = context.len(), "Injected workflow context");
    }
    let prompt = conversation.compose(&context, query);

    print_note("Thinking...", ctx.use_colors);
    let mut interrupt = ctx.interrupt.subscribe();
    let answer = tokio::select! {
        answer = agent.run(&prompt) => answer,
        _ = interrupt.wait_for(|set| *set) => {
            display::print_interrupted(ctx.use_colors);
            return;
        }
    };

    match answer {
        Ok(text) => {
            println!();
            print_markdown(&text, ctx.use_colors);
            println!();
            conversation.remember(query, &text);
        }
        Err(AgentError::ToolMissing(command)) => print_error(&tool_missing(&command), ctx.use_colors),
        Err(e) => print_error(&e.to_string(), ctx.use_colors),
    }
}

fn print_banner(ctx: &RunContext) {
    let model = ctx.config.copilot_model.as_deref().unwrap_or("default");
    let text = format!(
        "**SPI Agent - Interactive Mode**\n\n\
         - Organization: `{}`\n\
         - Model: `{model}`\n\
         - Services: {} known\n\n\
         Type `exit`, `quit` or press Ctrl+D to end the session, `/help` for commands.",
        ctx.config.organization,
        SERVICES.len(),
    );
    print_markdown(&text, ctx.use_colors);
    println!();
}

fn show_prompt(use_colors: bool) {
    use display::colors::{BOLD, CYAN, RESET};

    if use_colors {
        print!("{CYAN}{BOLD}You:{RESET} ");
    } else {
        print!("You: ");
    }
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::Interrupt;
    use crate::session::UiMode;
    use async_trait::async_trait;
    use spi_core::workflows::test_run::{TestPatch, TestRun, TestStatus};
    use spi_core::{ResultStore, Tracker, WorkflowResult};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records every prompt and answers with its position.
    #[derive(Default)]
    struct RecordingAgent {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Agent for RecordingAgent {
        async fn run(&self, prompt: &str) -> Result<String, AgentError> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            Ok(format!("Answer {}", prompts.len()))
        }
    }

    fn context(temp: &TempDir) -> RunContext {
        RunContext {
            config: AgentConfig::default(),
            root: temp.path().to_path_buf(),
            store: ResultStore::new(),
            interrupt: Interrupt::new(),
            ui: UiMode::Plain,
            use_colors: false,
        }
    }

    #[test]
    fn slash_commands_map_to_workflows() {
        let config = AgentConfig::default();
        assert_eq!(
            parse_input("/fork partition,legal --branch dev", &config),
            Input::Workflow {
                services: "partition,legal".to_string(),
                request: Request::Fork {
                    branch: "dev".to_string()
                },
            }
        );
        assert_eq!(
            parse_input("/fork partition", &config),
            Input::Workflow {
                services: "partition".to_string(),
                request: Request::Fork {
                    branch: "main".to_string()
                },
            }
        );
        assert_eq!(
            parse_input("/test partition", &config),
            Input::Workflow {
                services: "partition".to_string(),
                request: Request::Test {
                    provider: "core,core-plus,azure".to_string()
                },
            }
        );
        assert_eq!(
            parse_input("/vulns legal --severity CRITICAL --create-issue", &config),
            Input::Workflow {
                services: "legal".to_string(),
                request: Request::Vulns {
                    options: TriageOptions::new("critical", true),
                    stream: false,
                },
            }
        );
        assert_eq!(parse_input("/context", &config), Input::Context(CONTEXT_RESULTS));
    }

    #[test]
    fn plain_lines_and_keywords() {
        let config = AgentConfig::default();
        assert_eq!(parse_input("   ", &config), Input::Empty);
        assert_eq!(parse_input("Quit", &config), Input::Exit);
        assert_eq!(parse_input("/help", &config), Input::Help);
        assert_eq!(
            parse_input("list issues in partition", &config),
            Input::Query("list issues in partition".to_string())
        );
        assert!(matches!(parse_input("/deploy partition", &config), Input::Invalid(_)));
        assert!(matches!(parse_input("/fork", &config), Input::Invalid(_)));
    }

    #[test]
    fn history_is_bounded() {
        let mut conversation = Conversation::default();
        for i in 0..(HISTORY_TURNS + 2) {
            conversation.remember(&format!("q{i}"), &format!("a{i}"));
        }
        let prompt = conversation.compose("", "next");
        assert!(!prompt.contains("User: q1\n"));
        assert!(prompt.contains("User: q2\nAssistant: a2\n"));
        assert!(prompt.ends_with("\n\nUser: next"));
    }

    #[tokio::test]
    async fn questions_carry_recent_results_and_history() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        let mut tracker: Tracker<TestRun> = Tracker::new(["partition"]);
        tracker.update_with(
            "partition",
            TestStatus::TestSuccess,
            "Complete",
            TestPatch {
                tests_run: Some(42),
                tests_failed: Some(2),
                ..TestPatch::default()
            },
        );
        ctx.store.store(WorkflowResult::test(&tracker, "azure", 0));

        let agent = RecordingAgent::default();
        let input: &[u8] = b"help\n\nhow many tests failed?\n/fork billing\nand which ones?\nexit\nignored\n";
        let code = run(&ctx, &agent, tokio::io::BufReader::new(input)).await.unwrap();
        assert_eq!(code, 0);

        let prompts = agent.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2, "{prompts:?}");
        assert!(prompts[0].starts_with("Recent workflow results:"), "{}", prompts[0]);
        assert!(prompts[0].contains("partition: 40 passed, 2 failed"));
        assert!(prompts[0].contains("Always check this context FIRST"));
        assert!(prompts[0].ends_with("User: how many tests failed?"));
        assert!(prompts[1].contains("Conversation so far:\nUser: how many tests failed?\nAssistant: Answer 1\n"));
        assert!(prompts[1].ends_with("User: and which ones?"));
    }

    #[tokio::test]
    async fn without_results_the_question_is_sent_as_is() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        let agent = RecordingAgent::default();
        let input: &[u8] = b"list issues in legal";
        run(&ctx, &agent, tokio::io::BufReader::new(input)).await.unwrap();
        assert_eq!(*agent.prompts.lock().unwrap(), vec!["User: list issues in legal".to_string()]);
    }
}
