//! Publishing a file through a tool host: branch, commit, pull request.

use std::time::Duration;

use chrono::{DateTime, Local};
use mcp::{Intent, IntentResolver, ToolSession};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Everything needed to land one file as a pull request.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub owner: String,
    pub repo: String,
    /// Path of the file inside the repository.
    pub path: String,
    pub content: String,
    pub base: String,
    pub head: String,
    pub title: String,
    pub body: String,
    pub message: String,
    pub draft: bool,
}

#[derive(Serialize)]
struct CreateBranchArgs<'a> {
    owner: &'a str,
    repo: &'a str,
    branch: &'a str,
    from_branch: &'a str,
}

#[derive(Serialize)]
struct WriteFileArgs<'a> {
    owner: &'a str,
    repo: &'a str,
    path: &'a str,
    content: &'a str,
    message: &'a str,
    branch: &'a str,
}

#[derive(Serialize)]
struct PullRequestArgs<'a> {
    owner: &'a str,
    repo: &'a str,
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
    draft: bool,
}

/// Unique head branch: `<prefix>-<YYYYMMDD-HHMMSS>-<suffix>`.
pub fn head_branch(prefix: &str, now: DateTime<Local>, suffix: &str) -> String {
    format!("{prefix}-{}-{suffix}", now.format("%Y%m%d-%H%M%S"))
}

/// Four hex characters for [`head_branch`].
pub fn random_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..4].to_string()
}

/// Create the head branch, write the file on it, and open the pull request.
///
/// Returns the host's pull-request result.
pub async fn publish<S: ToolSession>(
    session: &S,
    resolver: &IntentResolver,
    request: &PublishRequest,
    timeout: Duration,
) -> Result<Value> {
    let catalog = match session.list_tools().await {
        Ok(tools) => tools,
        Err(e) => {
            warn!(error = %e, "could not list tools, using default names");
            Vec::new()
        }
    };
    let create_branch = resolver.resolve(Intent::CreateBranch, &catalog);
    let write_file = resolver.resolve(Intent::WriteFile, &catalog);
    let create_pr = resolver.resolve(Intent::CreatePullRequest, &catalog);

    info!(tool = %create_branch, branch = %request.head, from = %request.base, "creating branch");
    let args = arguments(&CreateBranchArgs {
        owner: &request.owner,
        repo: &request.repo,
        branch: &request.head,
        from_branch: &request.base,
    })?;
    session.call_tool(&create_branch, args, timeout).await?;

    info!(tool = %write_file, path = %request.path, "writing file");
    let args = arguments(&WriteFileArgs {
        owner: &request.owner,
        repo: &request.repo,
        path: &request.path,
        content: &request.content,
        message: &request.message,
        branch: &request.head,
    })?;
    session.call_tool(&write_file, args, timeout).await?;

    info!(tool = %create_pr, head = %request.head, base = %request.base, "opening pull request");
    let args = arguments(&PullRequestArgs {
        owner: &request.owner,
        repo: &request.repo,
        title: &request.title,
        body: &request.body,
        head: &request.head,
        base: &request.base,
        draft: request.draft,
    })?;
    Ok(session.call_tool(&create_pr, args, timeout).await?)
}

fn arguments(args: &impl Serialize) -> Result<Map<String, Value>> {
    match serde_json::to_value(args)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidArguments(format!("expected an object, got {other}"))),
    }
}
