//! Gitee issue client
//!
//! Creates a single issue through the v5 REST API using a token taken from
//! the credential store (or supplied by the caller).

use issue_core::Config;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Issue creation failures
#[derive(Error, Debug)]
pub enum IssueError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Issue tracker rejected the request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
}

/// An issue to be created
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewIssue {
    pub title: String,
    pub body: Option<String>,
    /// Comma-separated label names
    pub labels: Option<String>,
}

impl NewIssue {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_labels(mut self, labels: impl Into<String>) -> Self {
        self.labels = Some(labels.into());
        self
    }
}

/// Result of a successful creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedIssue {
    /// Numeric id from the response, `None` if it could not be read
    pub id: Option<u64>,
}

#[derive(Serialize)]
struct IssuePayload<'a> {
    access_token: &'a str,
    repo: &'a str,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<&'a str>,
}

/// Blocking client bound to one repository
pub struct IssueClient {
    http: reqwest::blocking::Client,
    base_url: String,
    owner: String,
    repo: String,
    token: String,
}

impl IssueClient {
    pub fn new(config: &Config, owner: &str, repo: &str, token: &str) -> Result<Self, IssueError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            token: token.to_string(),
        })
    }

    fn issues_url(&self) -> String {
        format!("{}/repos/{}/issues", self.base_url, self.owner)
    }

    /// Create an issue. Only HTTP 201 counts as success.
    pub fn create_issue(&self, issue: &NewIssue) -> Result<CreatedIssue, IssueError> {
        let payload = IssuePayload {
            access_token: &self.token,
            repo: &self.repo,
            title: &issue.title,
            body: non_empty(issue.body.as_deref()),
            labels: non_empty(issue.labels.as_deref()),
        };

        let url = self.issues_url();
        debug!(%url, repo = %self.repo, "creating issue");

        let response = self.http.post(&url).json(&payload).send()?;
        let status = response.status();
        let body = response.text()?;

        if status != reqwest::StatusCode::CREATED {
            return Err(IssueError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let created = CreatedIssue {
            id: extract_issue_id(&body),
        };
        info!(owner = %self.owner, repo = %self.repo, id = ?created.id, "created issue");
        Ok(created)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// First `"id": <number>` in a JSON response body
pub fn extract_issue_id(body: &str) -> Option<u64> {
    static ID_RE: OnceLock<Regex> = OnceLock::new();
    let re = ID_RE.get_or_init(|| Regex::new(r#""id"\s*:\s*(\d+)"#).expect("valid id pattern"));
    re.captures(body)?.get(1)?.as_str().parse().ok()
}
