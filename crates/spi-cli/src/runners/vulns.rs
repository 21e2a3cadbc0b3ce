//! `spi-agent vulns`: Maven dependency and vulnerability triage.
//!
//! Each service gets its own agent call, at most [`MAX_CONCURRENT_SCANS`] at
//! a time, and the full response is parsed once it returns. `--stream` runs
//! one streamed session over every service instead.

use super::{
    RunContext, TaskEvent, TaskHandler, conclude, fan_out_session, open_session, save_log, stream, tool_missing,
};
use crate::display::{print_error, print_panel};
use crate::session::{Session, Titles};
use anyhow::Result;
use spi_adapters::{Agent, AgentError, CopilotAgent, INTERRUPTED_EXIT};
use spi_core::prompts::triage_scan_prompt;
use spi_core::workflows::triage::{
    self, HEARTBEAT_SECS, MAX_CONCURRENT_SCANS, Triage, TriageParser, TriageStatus,
};
use spi_core::{PromptBuilder, RunLog, Tracker, WorkflowResult, clip};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const TITLES: Titles = Titles {
    status: "Triage Analysis Status",
    output: "Agent Activity",
};

/// Options shared by both triage paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriageOptions {
    pub severity: Vec<String>,
    pub create_issue: bool,
}

impl TriageOptions {
    /// `severity` is a comma-separated list such as `critical,high`.
    pub fn new(severity: &str, create_issue: bool) -> Self {
        Self {
            severity: severity
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            create_issue,
        }
    }
}

pub async fn run(ctx: &RunContext, services: &[String], options: &TriageOptions) -> Result<i32> {
    let system = PromptBuilder::new("system", ctx.config.organization.as_str())?.build();
    let agent = CopilotAgent::new(ctx.backend(), system).current_dir(&ctx.root);
    run_with_agent(ctx, services, options, Arc::new(agent)).await
}

pub async fn run_with_agent(
    ctx: &RunContext,
    services: &[String],
    options: &TriageOptions,
    agent: Arc<dyn Agent>,
) -> Result<i32> {
    info!(services = ?services, severity = ?options.severity, "Starting triage workflow");
    let mut session = open_session::<Triage>(ctx, services, TITLES)?;
    let mut scans = Scans::default();

    let severity = options.severity.clone();
    let create_issue = options.create_issue;
    let interrupted = fan_out_session(
        ctx,
        &mut session,
        MAX_CONCURRENT_SCANS,
        |service| {
            let agent = agent.clone();
            let prompt = triage_scan_prompt(&service, &severity, create_issue);
            async move { agent.run(&prompt).await }
        },
        &mut scans,
    )
    .await;
    if !interrupted {
        session.log("✓ Scans complete for all services");
    }
    session.close(None);

    if let Some(command) = &scans.missing_tool {
        print_error(&tool_missing(command), ctx.use_colors);
    }
    let exit_code = if interrupted {
        INTERRUPTED_EXIT
    } else if scans.missing_tool.is_some() {
        1
    } else {
        0
    };
    finish(ctx, services, options, &session.tracker, exit_code, &scans.output);
    Ok(conclude(ctx, exit_code, interrupted))
}

/// Streams one agent session that triages every service.
pub async fn run_streamed(ctx: &RunContext, services: &[String], options: &TriageOptions) -> Result<i32> {
    let prompt = PromptBuilder::new("vulns", ctx.config.organization.as_str())?
        .services(services)
        .arg("SEVERITY_FILTER", options.severity.join(","))
        .arg("CREATE_ISSUE", if options.create_issue { "True" } else { "False" })
        .build();
    info!(services = ?services, "Starting streamed triage workflow");

    let Some(mut run) = stream::<Triage, _>(ctx, services, TriageParser, TITLES, &prompt).await? else {
        return Ok(1);
    };
    if !run.interrupted && run.exit_code == 0 {
        for service in services {
            triage::settle(&mut run.tracker, service);
        }
    }

    finish(ctx, services, options, &run.tracker, run.exit_code, run.output.full());
    Ok(conclude(ctx, run.exit_code, run.interrupted))
}

fn finish(
    ctx: &RunContext,
    services: &[String],
    options: &TriageOptions,
    tracker: &Tracker<Triage>,
    exit_code: i32,
    output: &str,
) {
    print_panel(&triage::security_assessment(tracker), ctx.use_colors);
    print_panel(&triage::cve_report(tracker), ctx.use_colors);
    ctx.store
        .store(WorkflowResult::triage(tracker, &options.severity, exit_code));

    let log = RunLog::new("triage", "Maven Triage Analysis Log", services)
        .param("Severity Filter", options.severity.join(", "))
        .param("Create Issue", if options.create_issue { "True" } else { "False" });
    let body = format!("{}\n=== FULL OUTPUT ===\n\n{output}", triage::results_text(tracker));
    save_log(ctx, &log, exit_code, &body);
}

/// In-flight scan bookkeeping for the heartbeat and the run log.
#[derive(Default)]
struct Scans {
    /// Start and last heartbeat per running scan.
    running: HashMap<String, (Instant, Instant)>,
    output: String,
    missing_tool: Option<String>,
}

impl Scans {
    fn record_response(&mut self, session: &mut Session<Triage>, service: &str, response: &str) {
        session
            .tracker
            .update(service, TriageStatus::Reporting, "Processing scan results...");
        triage::parse_agent_response(&mut session.tracker, service, response);
        triage::settle(&mut session.tracker, service);
        session.log(format!("✓ Analysis complete for {service}"));

        self.output
            .push_str(&format!("=== {} SCAN RESULTS ===\n{response}\n\n", service.to_uppercase()));
    }

    fn record_failure(&mut self, session: &mut Session<Triage>, service: &str, error: &AgentError) {
        warn!(service, error = %error, "Triage scan failed");
        if let AgentError::ToolMissing(command) = error {
            self.missing_tool.get_or_insert_with(|| command.clone());
        }
        let message = error.to_string();
        session
            .tracker
            .update(service, TriageStatus::Error, format!("Failed: {}", clip(&message, 50)));
        session.log(format!("✗ {service}: {message}"));
        self.output
            .push_str(&format!("Error analyzing {service}: {message}\n\n"));
    }
}

impl TaskHandler<Triage, Result<String, AgentError>> for Scans {
    fn on_event(&mut self, session: &mut Session<Triage>, event: TaskEvent<Result<String, AgentError>>) {
        match event {
            TaskEvent::Started(service) => {
                session
                    .tracker
                    .update(&service, TriageStatus::Analyzing, "Starting triage analysis");
                session
                    .tracker
                    .update(&service, TriageStatus::Scanning, "Running vulnerability scan...");
                session.log(format!("Starting triage analysis for {service}..."));
                session.log("✓ Scan Java project");
                session.log(format!("   $ scan_java_project_tool workspace: ./repos/{service}"));
                session.log("   ↪ Running Trivy security scan...");
                self.output
                    .push_str(&format!("Starting triage analysis for {service}...\n"));
                let now = Instant::now();
                self.running.insert(service, (now, now));
            }
            TaskEvent::Finished(service, result) => {
                self.running.remove(&service);
                match result {
                    Ok(response) => self.record_response(session, &service, &response),
                    Err(e) => self.record_failure(session, &service, &e),
                }
            }
        }
    }

    fn on_tick(&mut self, session: &mut Session<Triage>) {
        let every = Duration::from_secs(HEARTBEAT_SECS);
        for (service, (started, last)) in &mut self.running {
            if last.elapsed() >= every {
                let message = triage::heartbeat_message(started.elapsed().as_secs());
                session.tracker.update(service, TriageStatus::Scanning, message);
                *last = Instant::now();
            }
        }
        let note = (!self.running.is_empty()).then(|| format!("{} scan(s) in flight", self.running.len()));
        session.set_note(note);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::Interrupt;
    use crate::session::UiMode;
    use async_trait::async_trait;
    use spi_core::{AgentConfig, ResultStore};
    use tempfile::TempDir;

    /// Answers from a fixed table keyed by the service named in the prompt.
    struct ScriptedAgent;

    #[async_trait]
    impl Agent for ScriptedAgent {
        async fn run(&self, prompt: &str) -> Result<String, AgentError> {
            if prompt.contains("the legal service") {
                Ok("Scan complete for legal.\n\
                    legal: 1 critical, 2 high, 0 medium\n\
                    1) CVE-2024-1111 (critical)\n   \
                    - Affected package: org.example:lib\n"
                    .to_string())
            } else if prompt.contains("the partition service") {
                Ok("No vulnerabilities found. 0 critical, 0 high, 0 medium".to_string())
            } else {
                Err(AgentError::Failed {
                    code: 2,
                    message: "model unavailable".to_string(),
                })
            }
        }
    }

    #[tokio::test]
    async fn each_service_is_scanned_and_reported() {
        let temp = TempDir::new().unwrap();
        let ctx = RunContext {
            config: AgentConfig::default(),
            root: temp.path().to_path_buf(),
            store: ResultStore::new(),
            interrupt: Interrupt::new(),
            ui: UiMode::Plain,
            use_colors: false,
        };
        let services: Vec<String> = ["partition", "legal", "schema"].map(String::from).to_vec();
        let options = TriageOptions {
            severity: vec!["critical".to_string(), "high".to_string()],
            create_issue: false,
        };

        let code = run_with_agent(&ctx, &services, &options, Arc::new(ScriptedAgent))
            .await
            .unwrap();
        assert_eq!(code, 0);
        assert_eq!(ctx.store.len(), 1);

        let logs: Vec<_> = std::fs::read_dir(temp.path().join("logs")).unwrap().collect();
        let log = std::fs::read_to_string(logs[0].as_ref().unwrap().path()).unwrap();
        assert!(log.contains("Maven Triage Analysis Log"));
        assert!(log.contains("Severity Filter: critical, high"));
        assert!(log.contains("legal:\n  Status: complete\n  Critical: 1\n  High: 2\n"));
        assert!(log.contains("schema:\n  Status: error\n"));
        assert!(log.contains("=== LEGAL SCAN RESULTS ==="));
    }

    #[test]
    fn severity_list_is_normalized() {
        let options = TriageOptions::new(" Critical, HIGH,,", true);
        assert_eq!(options.severity, vec!["critical", "high"]);
        assert!(options.create_issue);
    }

    #[test]
    fn heartbeat_updates_running_scans() {
        struct Quiet;
        impl spi_tui::Renderer for Quiet {
            fn render(&mut self, _view: &spi_tui::LiveView<'_>, _force: bool) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut session = Session::new(Tracker::<Triage>::new(["legal"]), Box::new(Quiet), TITLES);
        let mut scans = Scans::default();
        scans.on_event(&mut session, TaskEvent::Started("legal".to_string()));
        let long_ago = Instant::now() - Duration::from_secs(5);
        scans.running.insert("legal".to_string(), (long_ago, long_ago));

        scans.on_tick(&mut session);
        let record = session.tracker.get("legal").unwrap();
        assert_eq!(record.status, TriageStatus::Scanning);
        assert!(record.details.ends_with("(5s)"), "{}", record.details);
    }
}
