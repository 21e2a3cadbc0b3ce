//! GitHub REST access for the API-direct status check.

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use spi_core::workflows::status::{
    IssueItem, IssueList, PullItem, PullList, RepoInfo, RepoStatus, WorkflowList, WorkflowRun,
};
use std::time::Duration;
use tracing::debug;

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Workflow runs fetched per repository.
pub const RECENT_RUNS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Repository {0} not found")]
    NotFound(String),

    #[error("GitHub API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read access to repository state on a forge.
#[async_trait]
pub trait ForgeClient: Send + Sync {
    /// Issues, pull requests and recent runs for `org/repo`.
    ///
    /// A missing repository is not an error: it yields `exists == false`.
    async fn repo_status(&self, org: &str, repo: &str) -> Result<RepoStatus, ClientError>;
}

#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
}

impl GithubClient {
    pub fn new(api_base: &str, token: Option<&str>) -> Result<Self, ClientError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("spi-agent"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty())
            && let Ok(value) = reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
        {
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ClientError> {
        let url = format!("{}{path}", self.api_base);
        debug!(url = %url, "GitHub request");
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: api_message(&body),
            });
        }
        Ok(Some(serde_json::from_str(&body)?))
    }
}

#[async_trait]
impl ForgeClient for GithubClient {
    async fn repo_status(&self, org: &str, repo: &str) -> Result<RepoStatus, ClientError> {
        let base = format!("/repos/{org}/{repo}");
        let Some(info) = self.get_json::<ApiRepo>(&base).await? else {
            return Ok(RepoStatus::default());
        };

        let issues_path = format!("{base}/issues?state=open&per_page=100");
        let pulls_path = format!("{base}/pulls?state=open&per_page=100");
        let runs_path = format!("{base}/actions/runs?per_page={RECENT_RUNS}");
        let (issues, pulls, runs) = futures::try_join!(
            self.get_json::<Vec<ApiIssue>>(&issues_path),
            self.get_json::<Vec<ApiPull>>(&pulls_path),
            self.get_json::<ApiRuns>(&runs_path),
        )?;

        Ok(assemble(
            info,
            issues.unwrap_or_default(),
            pulls.unwrap_or_default(),
            runs.unwrap_or_default(),
        ))
    }
}

fn api_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ApiErrorBody {
        message: String,
    }
    serde_json::from_str::<ApiErrorBody>(body).map_or_else(
        |_| body.chars().take(200).collect(),
        |e| e.message,
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiRepo {
    updated_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiLabel {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiUser {
    login: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiIssue {
    number: u64,
    title: String,
    labels: Vec<ApiLabel>,
    assignees: Vec<ApiUser>,
    /// Present when the issue is a pull request.
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiHead {
    #[serde(rename = "ref")]
    branch: String,
    sha: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiPull {
    number: u64,
    title: String,
    state: String,
    draft: bool,
    user: ApiUser,
    head: ApiHead,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiRun {
    name: String,
    status: String,
    conclusion: Option<String>,
    head_sha: Option<String>,
    created_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiRuns {
    workflow_runs: Vec<ApiRun>,
}

fn assemble(info: ApiRepo, issues: Vec<ApiIssue>, pulls: Vec<ApiPull>, runs: ApiRuns) -> RepoStatus {
    let issues: Vec<IssueItem> = issues
        .into_iter()
        .filter(|i| i.pull_request.is_none())
        .map(|i| IssueItem {
            number: i.number,
            title: i.title,
            labels: i.labels.into_iter().map(|l| l.name).collect(),
            assignees: i.assignees.into_iter().map(|a| a.login).collect(),
        })
        .collect();
    let pulls: Vec<PullItem> = pulls
        .into_iter()
        .map(|p| {
            let is_release = p.title.to_lowercase().starts_with("release")
                || p.head.branch.starts_with("release");
            PullItem {
                number: p.number,
                title: p.title,
                state: p.state,
                is_draft: p.draft,
                is_release,
                author: p.user.login,
                branch: p.head.branch,
                head_sha: p.head.sha,
            }
        })
        .collect();

    RepoStatus {
        repo: RepoInfo {
            exists: true,
            updated_at: info.updated_at,
        },
        issues: IssueList {
            count: issues.len() as u32,
            items: issues,
        },
        pull_requests: PullList {
            count: pulls.len() as u32,
            items: pulls,
        },
        workflows: WorkflowList {
            recent: runs
                .workflow_runs
                .into_iter()
                .take(RECENT_RUNS)
                .map(|r| WorkflowRun {
                    name: r.name,
                    status: r.status,
                    conclusion: r.conclusion,
                    head_sha: r.head_sha,
                    created_at: r.created_at,
                })
                .collect(),
        },
    }
}
