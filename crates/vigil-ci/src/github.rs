//! Host platform API client.
//!
//! Only the three endpoints the notifier needs: user search by email, issue
//! search (for optional de-duplication) and issue creation.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use vigil_core::{IssueRequest, RepoSlug};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Errors talking to the host platform.
#[derive(Error, Debug)]
pub enum GitHubError {
    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-2xx reply
    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Reply body did not have the expected shape
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for GitHubError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GitHubError::Decode(err.to_string())
        } else {
            GitHubError::Http(err.to_string())
        }
    }
}

/// `GET /search/users` reply.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UserSearch {
    pub total_count: u64,
    #[serde(default)]
    pub items: Vec<UserItem>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UserItem {
    pub login: String,
}

impl UserSearch {
    /// The login when the search matched exactly one user.
    pub fn unique_login(&self) -> Option<&str> {
        match (self.total_count, self.items.as_slice()) {
            (1, [only]) => Some(only.login.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IssueSearch {
    #[serde(default)]
    items: Vec<IssueItem>,
}

#[derive(Debug, Deserialize)]
struct IssueItem {
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    html_url: String,
}

/// Issue tracking operations used by the notifier.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Search users by email address.
    async fn search_users(&self, email: &str) -> Result<UserSearch, GitHubError>;

    /// URL of an open issue in `repo` whose title contains `needle`.
    async fn find_open_issue(
        &self,
        repo: &RepoSlug,
        needle: &str,
    ) -> Result<Option<String>, GitHubError>;

    /// Create an issue and return its URL.
    async fn create_issue(
        &self,
        repo: &RepoSlug,
        issue: &IssueRequest,
    ) -> Result<String, GitHubError>;
}

/// REST client authenticated with a bearer token.
pub struct GitHubClient {
    api_url: String,
    token: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_url", &self.api_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl GitHubClient {
    pub fn new(api_url: &str, token: &str) -> Result<Self, GitHubError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            http,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.api_url, path))
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
    }

    async fn send<T: serde::de::DeserializeOwned>(
        builder: reqwest::RequestBuilder,
    ) -> Result<T, GitHubError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GitHubError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl IssueTracker for GitHubClient {
    async fn search_users(&self, email: &str) -> Result<UserSearch, GitHubError> {
        let builder = self
            .request(reqwest::Method::GET, "/search/users")
            .query(&[("q", email)]);
        Self::send(builder).await
    }

    async fn find_open_issue(
        &self,
        repo: &RepoSlug,
        needle: &str,
    ) -> Result<Option<String>, GitHubError> {
        let q = format!("{needle} repo:{repo} is:issue is:open in:title");
        let builder = self
            .request(reqwest::Method::GET, "/search/issues")
            .query(&[("q", q.as_str())]);
        let found: IssueSearch = Self::send(builder).await?;
        Ok(found.items.into_iter().next().map(|item| item.html_url))
    }

    async fn create_issue(
        &self,
        repo: &RepoSlug,
        issue: &IssueRequest,
    ) -> Result<String, GitHubError> {
        let path = format!("/repos/{}/{}/issues", repo.owner, repo.name);
        let builder = self.request(reqwest::Method::POST, &path).json(issue);
        let created: CreatedIssue = Self::send(builder).await?;
        Ok(created.html_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search(total: u64, logins: &[&str]) -> UserSearch {
        UserSearch {
            total_count: total,
            items: logins
                .iter()
                .map(|l| UserItem {
                    login: l.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_unique_login_requires_exactly_one() {
        assert_eq!(search(1, &["octocat"]).unique_login(), Some("octocat"));
        assert_eq!(search(0, &[]).unique_login(), None);
        assert_eq!(search(2, &["a", "b"]).unique_login(), None);
        // Paginated: two matches in total, one item on this page.
        assert_eq!(search(2, &["a"]).unique_login(), None);
    }

    #[test]
    fn test_user_search_deserializes() {
        let body = r#"{"total_count":1,"incomplete_results":false,"items":[{"login":"octocat"}]}"#;
        let parsed: UserSearch = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.unique_login(), Some("octocat"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = GitHubClient::new("https://api.example.com/", "s3cret").unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("https://api.example.com"));
    }
}
