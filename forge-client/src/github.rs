//! GitHub REST implementation of the provider operations.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde_json::json;
use tracing::{debug, warn};

use crate::errors::{ForgeError, ForgeResult};
use crate::types::{
    CheckConclusion, InlineCommentPayload, RemoteChangedFile, RemoteComment, RemoteCommit,
    RemotePullRequest, RemoteUser,
};

const REQUEST_TIMEOUT_SECS: u64 = 120;
const MAX_RETRIES: usize = 3;
const PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub base_api: String,
    pub token: String,
    pub owner: String,
    pub repo: String,
    pub pr_number: i64,
    /// SHA the client is bound to; inline comments anchor here.
    pub head_sha: String,
}

#[derive(Debug, Clone)]
pub struct GithubClient {
    cfg: GithubConfig,
    http: reqwest::Client,
}

impl GithubClient {
    pub fn new(cfg: GithubConfig) -> ForgeResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", cfg.token))
                .map_err(|e| ForgeError::InvalidResponse(e.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("grepiku-review-bot"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { cfg, http })
    }

    /// Re-bind to a new head SHA after refreshing the PR.
    pub fn rebind_head(&mut self, head_sha: &str) {
        self.cfg.head_sha = head_sha.to_string();
    }

    fn url(&self, rest: &str) -> String {
        format!(
            "{}/repos/{}/{}/{rest}",
            self.cfg.base_api.trim_end_matches('/'),
            urlencoding::encode(&self.cfg.owner),
            urlencoding::encode(&self.cfg.repo)
        )
    }

    /// Send with retry on transient failures, mapping statuses to errors.
    async fn send(&self, build: impl Fn() -> reqwest::RequestBuilder) -> ForgeResult<String> {
        let mut last: Option<ForgeError> = None;
        for attempt in 1..=MAX_RETRIES {
            match build().send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    if status.is_success() {
                        return Ok(body);
                    }
                    let err = ForgeError::from_status(status.as_u16(), Some(&body));
                    if !err.is_transient() {
                        return Err(err);
                    }
                    last = Some(err);
                }
                Err(e) => {
                    let err = ForgeError::from(e);
                    if !err.is_transient() {
                        return Err(err);
                    }
                    last = Some(err);
                }
            }
            debug!(attempt, "github: transient failure, retrying");
        }
        Err(last.unwrap_or(ForgeError::Timeout))
    }

    async fn get_json(&self, url: &str) -> ForgeResult<serde_json::Value> {
        let body = self.send(|| self.http.get(url)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn fetch_pull_request(&self) -> ForgeResult<RemotePullRequest> {
        let v = self
            .get_json(&self.url(&format!("pulls/{}", self.cfg.pr_number)))
            .await?;
        Ok(RemotePullRequest {
            external_id: v["id"].to_string(),
            number: v["number"].as_i64().unwrap_or(self.cfg.pr_number),
            title: str_of(&v, "title"),
            body: str_of(&v, "body"),
            state: if v["merged"].as_bool().unwrap_or(false) {
                "merged".to_string()
            } else {
                str_of(&v, "state")
            },
            base_ref: str_of(&v["base"], "ref"),
            head_ref: str_of(&v["head"], "ref"),
            base_sha: str_of(&v["base"], "sha"),
            head_sha: str_of(&v["head"], "sha"),
            draft: v["draft"].as_bool().unwrap_or(false),
            author: RemoteUser {
                external_id: v["user"]["id"].to_string(),
                login: str_of(&v["user"], "login"),
            },
        })
    }

    pub async fn fetch_commit(&self, sha: &str) -> ForgeResult<RemoteCommit> {
        let v = self.get_json(&self.url(&format!("commits/{sha}"))).await?;
        Ok(RemoteCommit {
            sha: str_of(&v, "sha"),
            message: str_of(&v["commit"], "message"),
        })
    }

    /// Raw unified diff via the media-type endpoint. A 406 means the diff is
    /// too large for the API and surfaces as [`ForgeError::DiffTooLarge`].
    pub async fn fetch_diff_patch(&self) -> ForgeResult<String> {
        let url = self.url(&format!("pulls/{}", self.cfg.pr_number));
        self.send(|| {
            self.http
                .get(&url)
                .header(ACCEPT, "application/vnd.github.v3.diff")
        })
        .await
    }

    pub async fn list_changed_files(&self) -> ForgeResult<Vec<RemoteChangedFile>> {
        let mut out = Vec::new();
        for page in 1..=10 {
            let url = self.url(&format!(
                "pulls/{}/files?per_page={PAGE_SIZE}&page={page}",
                self.cfg.pr_number
            ));
            let v = self.get_json(&url).await?;
            let Some(items) = v.as_array() else { break };
            if items.is_empty() {
                break;
            }
            for item in items {
                out.push(RemoteChangedFile {
                    path: str_of(item, "filename"),
                    additions: item["additions"].as_u64().unwrap_or(0) as u32,
                    deletions: item["deletions"].as_u64().unwrap_or(0) as u32,
                    status: str_of(item, "status"),
                });
            }
            if items.len() < PAGE_SIZE {
                break;
            }
        }
        Ok(out)
    }

    pub async fn update_pull_request_body(&self, body: &str) -> ForgeResult<()> {
        let url = self.url(&format!("pulls/{}", self.cfg.pr_number));
        self.send(|| self.http.patch(&url).json(&json!({ "body": body })))
            .await?;
        Ok(())
    }

    pub async fn create_summary_comment(&self, body: &str) -> ForgeResult<RemoteComment> {
        let url = self.url(&format!("issues/{}/comments", self.cfg.pr_number));
        let raw = self
            .send(|| self.http.post(&url).json(&json!({ "body": body })))
            .await?;
        comment_from(&serde_json::from_str(&raw)?)
    }

    pub async fn update_summary_comment(&self, id: &str, body: &str) -> ForgeResult<()> {
        let url = self.url(&format!("issues/comments/{id}"));
        self.send(|| self.http.patch(&url).json(&json!({ "body": body })))
            .await?;
        Ok(())
    }

    pub async fn create_inline_comment(
        &self,
        payload: &InlineCommentPayload,
    ) -> ForgeResult<RemoteComment> {
        let url = self.url(&format!("pulls/{}/comments", self.cfg.pr_number));
        let raw = self
            .send(|| {
                self.http.post(&url).json(&json!({
                    "body": payload.body,
                    "commit_id": self.cfg.head_sha,
                    "path": payload.path,
                    "line": payload.line,
                    "side": payload.side,
                }))
            })
            .await?;
        comment_from(&serde_json::from_str(&raw)?)
    }

    pub async fn list_inline_comments(&self) -> ForgeResult<Vec<RemoteComment>> {
        let mut out = Vec::new();
        for page in 1..=10 {
            let url = self.url(&format!(
                "pulls/{}/comments?per_page={PAGE_SIZE}&page={page}",
                self.cfg.pr_number
            ));
            let v = self.get_json(&url).await?;
            let Some(items) = v.as_array() else { break };
            if items.is_empty() {
                break;
            }
            for item in items {
                out.push(comment_from(item)?);
            }
            if items.len() < PAGE_SIZE {
                break;
            }
        }
        Ok(out)
    }

    pub async fn update_inline_comment(&self, id: &str, body: &str) -> ForgeResult<()> {
        let url = self.url(&format!("pulls/comments/{id}"));
        self.send(|| self.http.patch(&url).json(&json!({ "body": body })))
            .await?;
        Ok(())
    }

    /// Thread resolution needs the GraphQL API; callers treat this as
    /// best-effort and swallow the failure.
    pub async fn resolve_inline_thread(&self, _comment_id: &str) -> ForgeResult<()> {
        Err(ForgeError::Unsupported)
    }

    pub async fn create_status_check(&self, name: &str) -> ForgeResult<String> {
        let url = self.url("check-runs");
        let raw = self
            .send(|| {
                self.http.post(&url).json(&json!({
                    "name": name,
                    "head_sha": self.cfg.head_sha,
                    "status": "in_progress",
                }))
            })
            .await?;
        let v: serde_json::Value = serde_json::from_str(&raw)?;
        Ok(v["id"].to_string())
    }

    pub async fn update_status_check(
        &self,
        check_id: &str,
        conclusion: CheckConclusion,
        summary: &str,
    ) -> ForgeResult<()> {
        let url = self.url(&format!("check-runs/{check_id}"));
        self.send(|| {
            self.http.patch(&url).json(&json!({
                "status": "completed",
                "conclusion": conclusion.as_str(),
                "output": { "title": "Review", "summary": summary },
            }))
        })
        .await?;
        Ok(())
    }

    pub async fn add_reaction(&self, comment_id: &str, content: &str) -> ForgeResult<()> {
        // Inline review comments and issue comments live under different
        // endpoints; try the review-comment one first.
        let url = self.url(&format!("pulls/comments/{comment_id}/reactions"));
        let res = self
            .send(|| self.http.post(&url).json(&json!({ "content": content })))
            .await;
        if res.is_ok() {
            return Ok(());
        }
        let url = self.url(&format!("issues/comments/{comment_id}/reactions"));
        self.send(|| self.http.post(&url).json(&json!({ "content": content })))
            .await?;
        Ok(())
    }

    pub async fn reply_to_comment(&self, comment_id: &str, body: &str) -> ForgeResult<RemoteComment> {
        let id: u64 = comment_id
            .parse()
            .map_err(|_| ForgeError::InvalidResponse(format!("bad comment id: {comment_id}")))?;
        let url = self.url(&format!("pulls/{}/comments/{id}/replies", self.cfg.pr_number));
        let raw = self
            .send(|| self.http.post(&url).json(&json!({ "body": body })))
            .await?;
        comment_from(&serde_json::from_str(&raw)?)
    }
}

fn str_of(v: &serde_json::Value, key: &str) -> String {
    v[key].as_str().unwrap_or_default().to_string()
}

fn comment_from(v: &serde_json::Value) -> ForgeResult<RemoteComment> {
    if v["id"].is_null() {
        warn!("github: comment payload without id");
        return Err(ForgeError::InvalidResponse("comment without id".into()));
    }
    Ok(RemoteComment {
        id: v["id"].to_string(),
        body: str_of(v, "body"),
        author_login: str_of(&v["user"], "login"),
        in_reply_to: v["in_reply_to_id"].as_u64().map(|i| i.to_string()),
        url: v["html_url"].as_str().map(String::from),
        path: v["path"].as_str().map(String::from),
        line: v["line"].as_u64().map(|l| l as u32),
    })
}
