//! # spi-cli
//!
//! Binary entry point for the SPI Agent.
//!
//! This crate provides:
//! - CLI argument parsing using `clap`
//! - Configuration loading and logging initialization
//! - The fork, status, test and vulns workflow runners
//! - Recent workflow results via `spi-agent context`
//! - An interactive chat over the same workflows via `spi-agent chat`

mod chat;
mod display;
mod interrupt;
mod runners;
mod session;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use interrupt::Interrupt;
use runners::vulns::TriageOptions;
use runners::{Request, RunContext};
use session::UiMode;
use spi_adapters::CopilotAgent;
use spi_core::{AgentConfig, PromptBuilder, ResultStore, parse_services};
use std::io::{IsTerminal, stdin, stdout};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// File the tracing output goes to while the live view owns the terminal.
const DEBUG_LOG_FILE: &str = "spi-agent-debug.log";

/// Installs a panic hook that restores terminal state before printing panic info.
///
/// A panic inside the live view would otherwise leave raw mode and the
/// alternate screen active, hiding the panic message.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = crossterm::terminal::disable_raw_mode();
        let _ = crossterm::execute!(
            std::io::stdout(),
            crossterm::terminal::LeaveAlternateScreen,
            crossterm::cursor::Show
        );
        default_hook(panic_info);
    }));
}

/// Color output mode for terminal display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorMode {
    /// Automatically detect if stdout is a TTY
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl ColorMode {
    /// Returns true if colors should be used based on mode and terminal detection.
    fn should_use_colors(self) -> bool {
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => stdout().is_terminal(),
        }
    }
}

/// SPI Agent - workflow automation for the OSDU SPI service fleet
#[derive(Parser, Debug)]
#[command(name = "spi-agent", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./spi-agent.yml when present)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Color output mode (auto, always, never)
    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    color: ColorMode,

    /// Print progress line by line instead of the live split view
    #[arg(long, global = true)]
    no_tui: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize service forks from the template repository
    Fork {
        /// Comma-separated services, or `all`
        #[arg(short, long)]
        services: String,

        /// Branch to initialize (defaults to the configured default branch)
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// Report open issues, pull requests and workflow runs
    Status {
        /// Comma-separated services, or `all`
        #[arg(short, long)]
        services: String,

        /// Query the GitHub REST API directly instead of the AI CLI
        #[arg(long)]
        api: bool,
    },

    /// Build, test and grade coverage with Maven
    Test {
        /// Comma-separated services, or `all`
        #[arg(short, long)]
        services: String,

        /// Provider profile(s): `azure`, `azure,aws` or `all`
        #[arg(short, long, default_value = "azure")]
        provider: String,
    },

    /// Triage dependency vulnerabilities
    Vulns {
        /// Comma-separated services, or `all`
        #[arg(short, long)]
        services: String,

        /// Severities to report
        #[arg(long, default_value = "critical,high")]
        severity: String,

        /// Open a tracking issue per service with the findings
        #[arg(long)]
        create_issue: bool,

        /// Run one streamed agent session instead of one scan per service
        #[arg(long)]
        stream: bool,
    },

    /// Show recent workflow results
    Context {
        /// Number of results to show
        #[arg(short, long, default_value_t = 3)]
        limit: usize,
    },

    /// Ask the agent questions and run workflows as slash-commands
    Chat,
}

impl Commands {
    fn services(&self) -> Option<&str> {
        match self {
            Commands::Fork { services, .. }
            | Commands::Status { services, .. }
            | Commands::Test { services, .. }
            | Commands::Vulns { services, .. } => Some(services),
            Commands::Context { .. } | Commands::Chat => None,
        }
    }

    /// Commands that may hand the terminal to the live view.
    fn runs_workflows(&self) -> bool {
        self.services().is_some() || matches!(self, Commands::Chat)
    }

    fn request(self, config: &AgentConfig) -> Option<Request> {
        match self {
            Commands::Fork { branch, .. } => Some(Request::Fork {
                branch: branch.unwrap_or_else(|| config.default_branch.clone()),
            }),
            Commands::Status { api, .. } => Some(Request::Status { api }),
            Commands::Test { provider, .. } => Some(Request::Test { provider }),
            Commands::Vulns {
                severity,
                create_issue,
                stream,
                ..
            } => Some(Request::Vulns {
                options: TriageOptions::new(&severity, create_issue),
                stream,
            }),
            Commands::Context { .. } | Commands::Chat => None,
        }
    }
}

#[tokio::main]
async fn main() {
    install_panic_hook();
    let cli = Cli::parse();
    let use_colors = cli.color.should_use_colors();

    let code = match run(cli, use_colors).await {
        Ok(code) => code,
        Err(e) => {
            display::print_error(&format!("{e:#}"), use_colors);
            1
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli, use_colors: bool) -> Result<i32> {
    let config = AgentConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let root = std::env::current_dir().context("Failed to resolve working directory")?;
    let log_dir = runners::resolve(&root, &config.log_directory);

    let ui = if !cli.no_tui && stdin().is_terminal() && stdout().is_terminal() {
        UiMode::Live
    } else {
        UiMode::Plain
    };
    let live = ui == UiMode::Live && cli.command.runs_workflows();
    init_tracing(cli.verbose, live, &log_dir);
    debug!(organization = %config.organization, ?ui, "Configuration resolved");

    let services = match cli.command.services().map(parse_services).transpose() {
        Ok(services) => services.unwrap_or_default(),
        Err(e) => {
            display::print_error(&e.to_string(), use_colors);
            return Ok(1);
        }
    };

    let ctx = RunContext {
        store: ResultStore::open(&log_dir),
        config,
        root,
        interrupt: Interrupt::new(),
        ui,
        use_colors,
    };
    ctx.interrupt.listen_for_signals();

    let code = match cli.command {
        Commands::Context { limit } => {
            let summary = ctx.store.get_context_summary(limit);
            if summary.is_empty() {
                println!("No recent workflow results.");
            } else {
                print!("{summary}");
            }
            0
        }
        Commands::Chat => {
            let system = PromptBuilder::new("system", ctx.config.organization.as_str())?.build();
            let agent = CopilotAgent::new(ctx.backend(), system).current_dir(&ctx.root);
            let input = tokio::io::BufReader::new(tokio::io::stdin());
            chat::run(&ctx, &agent, input).await?
        }
        command => match command.request(&ctx.config) {
            Some(request) => runners::execute(&ctx, &services, &request).await?,
            None => 0,
        },
    };
    info!(exit_code = code, "spi-agent finished");
    Ok(code)
}

/// `RUST_LOG` wins over the `--verbose` level.
fn log_filter(rust_log: Option<&str>, verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { "info" };
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level))
}

/// Logs go to stderr, except while the live view owns the terminal: then
/// nothing is logged unless `SPI_AGENT_DEBUG_LOG=1` sends it to a file.
fn init_tracing(verbose: bool, live: bool, log_dir: &Path) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = log_filter(rust_log.as_deref(), verbose);

    if !live {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return;
    }

    if std::env::var("SPI_AGENT_DEBUG_LOG").is_ok_and(|v| v == "1")
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(file) = std::fs::File::create(log_dir.join(DEBUG_LOG_FILE))
    {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_workflow_subcommands() {
        let cli = Cli::try_parse_from(["spi-agent", "--no-tui", "test", "-s", "partition", "-p", "all"]).unwrap();
        assert!(cli.no_tui);
        match cli.command {
            Commands::Test { services, provider } => {
                assert_eq!(services, "partition");
                assert_eq!(provider, "all");
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from(["spi-agent", "vulns", "--services", "legal", "--create-issue"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Vulns {
                ref severity,
                create_issue: true,
                stream: false,
                ..
            } if severity == "critical,high"
        ));
    }

    #[test]
    fn services_are_required_for_workflows() {
        assert!(Cli::try_parse_from(["spi-agent", "fork"]).is_err());
        let cli = Cli::try_parse_from(["spi-agent", "context"]).unwrap();
        assert!(cli.command.services().is_none());
        assert!(!cli.command.runs_workflows());

        let cli = Cli::try_parse_from(["spi-agent", "chat"]).unwrap();
        assert!(cli.command.services().is_none());
        assert!(cli.command.runs_workflows());
    }

    #[test]
    fn fork_branch_defaults_to_configured_branch() {
        let config = AgentConfig {
            default_branch: "develop".to_string(),
            ..AgentConfig::default()
        };
        let cli = Cli::try_parse_from(["spi-agent", "fork", "-s", "legal"]).unwrap();
        assert_eq!(
            cli.command.request(&config),
            Some(Request::Fork {
                branch: "develop".to_string()
            })
        );
    }

    #[test]
    fn rust_log_overrides_verbosity() {
        assert_eq!(log_filter(None, false).to_string(), "info");
        assert_eq!(log_filter(None, true).to_string(), "debug");
        assert_eq!(log_filter(Some("spi_adapters=trace"), false).to_string(), "spi_adapters=trace");
        assert_eq!(log_filter(Some(""), true).to_string(), "debug");
    }

    #[test]
    fn color_mode_never_disables_colors() {
        assert!(!ColorMode::Never.should_use_colors());
        assert!(ColorMode::Always.should_use_colors());
    }
}
