//! `spi-agent status`: open issues, pull requests and CI runs per service.
//!
//! The default path asks the AI CLI to gather the data and print it as JSON.
//! With `--api` the data comes straight from the GitHub REST API instead,
//! one bounded task per service.

use super::{RunContext, TaskEvent, TaskHandler, conclude, fan_out_session, open_session, save_log, stream};
use crate::display::{print_note, print_panel};
use crate::session::{Session, Titles};
use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{Map, Value};
use spi_adapters::{ClientError, ForgeClient, GithubClient, INTERRUPTED_EXIT};
use spi_core::workflows::status::{self, QueryStatus, RepoStatus, StatusCheck, StatusParser};
use spi_core::{PromptBuilder, RunLog, SERVICES, Tracker, WorkflowResult, clip, status_json};
use std::sync::Arc;
use tracing::{info, warn};

const TITLES: Titles = Titles {
    status: "GitHub Data Gathering Status",
    output: "Copilot Activity",
};

const API_TITLES: Titles = Titles {
    status: "GitHub Data Gathering Status",
    output: "API Activity",
};

/// Repositories queried at once on the API path.
const API_CONCURRENCY: usize = 4;

pub async fn run(ctx: &RunContext, services: &[String]) -> Result<i32> {
    let prompt = PromptBuilder::new("status", ctx.config.organization.as_str())?
        .services(services)
        .build();
    info!(services = ?services, "Starting status workflow");

    let Some(mut run) = stream::<StatusCheck, _>(ctx, services, StatusParser, TITLES, &prompt).await? else {
        return Ok(1);
    };

    let extracted = if run.interrupted {
        None
    } else {
        status_json::extract_json(run.output.full())
    };
    match &extracted {
        Some(data) => match status::status_data(data, SERVICES) {
            Some(entries) => status::apply_status(&mut run.tracker, entries),
            None => print_note("Warning: Status data had an unexpected structure", ctx.use_colors),
        },
        None if !run.interrupted => {
            print_note("Warning: Could not extract status JSON from output", ctx.use_colors);
        }
        None => {}
    }

    finish(ctx, services, &run.tracker, run.exit_code, run.output.full(), extracted.as_ref());
    Ok(conclude(ctx, run.exit_code, run.interrupted))
}

/// Gathers status through the GitHub REST API.
pub async fn run_api(ctx: &RunContext, services: &[String]) -> Result<i32> {
    let client = GithubClient::new(&ctx.config.github_api_url, ctx.config.github_token.as_deref())
        .context("Failed to create GitHub client")?;
    run_with_client(ctx, services, Arc::new(client)).await
}

pub async fn run_with_client(ctx: &RunContext, services: &[String], client: Arc<dyn ForgeClient>) -> Result<i32> {
    info!(services = ?services, api = %ctx.config.github_api_url, "Starting API status check");
    let mut session = open_session::<StatusCheck>(ctx, services, API_TITLES)?;
    let mut gather = Gather {
        org: ctx.config.organization.clone(),
        gathered: Map::new(),
    };

    let org = gather.org.clone();
    let interrupted = fan_out_session(
        ctx,
        &mut session,
        API_CONCURRENCY,
        |service| {
            let client = client.clone();
            let org = org.clone();
            async move { client.repo_status(&org, &service).await }
        },
        &mut gather,
    )
    .await;
    session.close(None);

    let exit_code = if interrupted { INTERRUPTED_EXIT } else { 0 };
    let extracted = (!gather.gathered.is_empty()).then(|| {
        let mut root = Map::new();
        root.insert("services".to_string(), Value::Object(gather.gathered));
        root
    });
    finish(ctx, services, &session.tracker, exit_code, session.activity.full(), extracted.as_ref());
    Ok(conclude(ctx, exit_code, interrupted))
}

/// Records each repository as its query returns.
struct Gather {
    org: String,
    /// Serialized per-service data, logged as the extracted JSON.
    gathered: Map<String, Value>,
}

impl TaskHandler<StatusCheck, Result<RepoStatus, ClientError>> for Gather {
    fn on_event(&mut self, session: &mut Session<StatusCheck>, event: TaskEvent<Result<RepoStatus, ClientError>>) {
        match event {
            TaskEvent::Started(service) => {
                session.tracker.update(&service, QueryStatus::Querying, "Querying GitHub API");
                session.log(format!("● Get {}/{service} issues, pull requests and workflows", self.org));
            }
            TaskEvent::Finished(service, Ok(repo)) => {
                let line = if repo.repo.exists {
                    format!(
                        "✓ {service}: {} issues, {} PRs",
                        repo.issues.count, repo.pull_requests.count
                    )
                } else {
                    format!("✗ {service}: repository not found")
                };
                match serde_json::to_value(&repo) {
                    Ok(value) => {
                        self.gathered.insert(service.clone(), value);
                    }
                    Err(e) => warn!(service = %service, error = %e, "Could not serialize repository status"),
                }
                status::apply_status(&mut session.tracker, vec![(service, repo)]);
                session.log(line);
            }
            TaskEvent::Finished(service, Err(e)) => {
                warn!(service = %service, error = %e, "Status query failed");
                let message = e.to_string();
                session
                    .tracker
                    .update(&service, QueryStatus::Error, format!("Failed: {}", clip(&message, 50)));
                session.log(format!("✗ {service}: {message}"));
            }
        }
    }
}

/// Prints the panels, stores the result and writes the run log.
fn finish(
    ctx: &RunContext,
    services: &[String],
    tracker: &Tracker<StatusCheck>,
    exit_code: i32,
    output: &str,
    extracted: Option<&Map<String, Value>>,
) {
    for panel in status::report(tracker, exit_code, Utc::now()) {
        print_panel(&panel, ctx.use_colors);
    }
    ctx.store.store(WorkflowResult::status(tracker, exit_code));

    let log = RunLog::new("status", "Copilot Status Check Log", services);
    save_log(ctx, &log, exit_code, &log_body(output, extracted));
}

fn log_body(output: &str, extracted: Option<&Map<String, Value>>) -> String {
    let json = extracted
        .and_then(|data| serde_json::to_string_pretty(data).ok())
        .unwrap_or_else(|| "None".to_string());
    format!("=== RAW OUTPUT ===\n\n{output}\n\n=== EXTRACTED JSON ===\n\n{json}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::Interrupt;
    use crate::session::UiMode;
    use serde_json::json;
    use spi_core::workflows::status::{IssueList, RepoInfo};
    use spi_core::{AgentConfig, ResultStore};
    use tempfile::TempDir;

    struct FakeForge;

    #[async_trait::async_trait]
    impl ForgeClient for FakeForge {
        async fn repo_status(&self, _org: &str, repo: &str) -> Result<RepoStatus, ClientError> {
            match repo {
                "partition" => Ok(RepoStatus {
                    repo: RepoInfo {
                        exists: true,
                        updated_at: None,
                    },
                    issues: IssueList {
                        count: 2,
                        items: Vec::new(),
                    },
                    ..RepoStatus::default()
                }),
                "legal" => Ok(RepoStatus::default()),
                _ => Err(ClientError::Api {
                    status: 500,
                    message: "boom".to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn api_status_records_each_repository() {
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

        let code = run_with_client(&ctx, &services, Arc::new(FakeForge)).await.unwrap();
        assert_eq!(code, 0);
        assert_eq!(ctx.store.len(), 1);

        let logs: Vec<_> = std::fs::read_dir(temp.path().join("logs")).unwrap().collect();
        assert_eq!(logs.len(), 1);
        let log = std::fs::read_to_string(logs[0].as_ref().unwrap().path()).unwrap();
        assert!(log.contains("Copilot Status Check Log"));
        assert!(log.contains("✓ partition: 2 issues, 0 PRs"));
        assert!(log.contains("✗ legal: repository not found"));
        assert!(log.contains("✗ schema: GitHub API error (500): boom"));
    }

    #[test]
    fn log_body_has_raw_and_json_sections() {
        let mut data = Map::new();
        data.insert("services".to_string(), json!({"legal": {"repo": {"exists": true}}}));
        let body = log_body("● Get legal issues", Some(&data));
        assert!(body.starts_with("=== RAW OUTPUT ===\n\n● Get legal issues\n"));
        assert!(body.contains("=== EXTRACTED JSON ===\n\n{\n  \"services\""));
    }

    #[test]
    fn log_body_without_json_says_none() {
        let body = log_body("", None);
        assert!(body.ends_with("=== EXTRACTED JSON ===\n\nNone\n"));
    }
}
