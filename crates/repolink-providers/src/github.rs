//! GitHub adapter.

use crate::client::{ApiClient, Auth};
use crate::config::{ProviderSettings, GITHUB_API_URL};
use crate::error::{ProviderError, Result};
use crate::provider::GitProvider;
use crate::webhook::{PayloadShape, GITHUB_LIKE_SHAPE};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use repolink_types::{
    DeployKeyPair, DeployKeyRegistration, EventKind, ProviderKind, PullRequest, RepoCoordinates,
    RepositoryDescriptor, WebhookRegistration,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

const PAGE_SIZE: usize = 100;

const EVENTS: &[(&str, EventKind)] = &[
    ("push", EventKind::Push),
    ("pull_request", EventKind::PullRequest),
];

/// GitHub API response types
#[derive(Debug, Deserialize)]
struct GitHubRepo {
    id: u64,
    name: String,
    owner: GitHubUser,
    description: Option<String>,
    private: bool,
    ssh_url: Option<String>,
    clone_url: Option<String>,
    default_branch: Option<String>,
    #[serde(default)]
    permissions: GitHubPermissions,
    language: Option<String>,
    homepage: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GitHubPermissions {
    #[serde(default)]
    admin: bool,
    #[serde(default)]
    push: bool,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GitHubNamed {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GitHubCommit {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitHubPullRequest {
    number: u64,
    title: String,
    state: String,
    html_url: String,
    head: GitHubRef,
    base: GitHubRef,
    user: Option<GitHubUser>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GitHubRef {
    #[serde(rename = "ref")]
    ref_name: String,
    repo: Option<GitHubRefRepo>,
}

#[derive(Debug, Deserialize)]
struct GitHubRefRepo {
    ssh_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubHook {
    id: u64,
    active: bool,
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    events: Vec<String>,
    config: GitHubHookConfig,
}

#[derive(Debug, Deserialize)]
struct GitHubHookConfig {
    url: Option<String>,
    insecure_ssl: Option<Value>,
}

#[derive(Debug, Serialize)]
struct CreateHookRequest<'a> {
    name: &'a str,
    active: bool,
    events: [&'a str; 2],
    config: CreateHookConfig<'a>,
}

#[derive(Debug, Serialize)]
struct CreateHookConfig<'a> {
    url: &'a str,
    content_type: &'a str,
    secret: &'a str,
    insecure_ssl: &'a str,
}

#[derive(Debug, Deserialize)]
struct GitHubKey {
    id: u64,
    title: String,
    #[serde(default)]
    verified: bool,
    created_at: Option<DateTime<Utc>>,
    url: String,
    read_only: bool,
}

#[derive(Debug, Serialize)]
struct CreateKeyRequest<'a> {
    title: &'a str,
    key: &'a str,
    read_only: bool,
}

/// `insecure_ssl` is `"0"`/`"1"` in current responses and a number in
/// older ones.
fn is_insecure(value: Option<&Value>) -> bool {
    match value {
        Some(Value::String(s)) => s == "1",
        Some(Value::Number(n)) => n.as_u64() == Some(1),
        Some(Value::Bool(b)) => *b,
        _ => false,
    }
}

impl From<GitHubHook> for WebhookRegistration {
    fn from(hook: GitHubHook) -> Self {
        Self {
            id: hook.id.to_string(),
            active: hook.active,
            created_at: hook.created_at,
            url: hook.config.url.unwrap_or_default(),
            insecure: is_insecure(hook.config.insecure_ssl.as_ref()),
            events: hook.events.into_iter().collect(),
        }
    }
}

/// Adapter for GitHub and GitHub Enterprise.
pub struct GithubProvider {
    client: Option<ApiClient>,
    deploy_key_title: String,
    webhook_secret: Option<String>,
}

impl GithubProvider {
    /// Create the adapter; it is disabled when no token is configured.
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        let client = match &settings.github.token {
            Some(token) => {
                let base_url = settings.github.base_url.as_deref().unwrap_or(GITHUB_API_URL);
                info!(provider = "github", %base_url, "GitHub enabled");
                Some(ApiClient::new(
                    ProviderKind::Github,
                    base_url,
                    Auth::Bearer(token.clone()),
                    "application/vnd.github+json",
                    &settings.http,
                )?)
            }
            None => {
                info!(provider = "github", "GitHub disabled: no GITHUB_PERSONAL_ACCESS_TOKEN set");
                None
            }
        };

        Ok(Self {
            client,
            deploy_key_title: settings.deploy_key_title.clone(),
            webhook_secret: settings.webhook_secret.clone(),
        })
    }

    fn api(&self) -> Result<&ApiClient> {
        self.client
            .as_ref()
            .ok_or(ProviderError::Disabled(ProviderKind::Github))
    }

    async fn names(&self, path: &str) -> Result<Vec<String>> {
        let items: Vec<GitHubNamed> = self.api()?.get_pages(path, "per_page", PAGE_SIZE).await?;
        Ok(items.into_iter().map(|i| i.name).collect())
    }
}

#[async_trait]
impl GitProvider for GithubProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Github
    }

    fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    fn deploy_key_title(&self) -> &str {
        &self.deploy_key_title
    }

    fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret.as_deref()
    }

    fn event_table(&self) -> &'static [(&'static str, EventKind)] {
        EVENTS
    }

    fn payload_shape(&self) -> &PayloadShape {
        &GITHUB_LIKE_SHAPE
    }

    async fn fetch_repository(&self, repo: &RepoCoordinates) -> Result<RepositoryDescriptor> {
        let gh: GitHubRepo = self.api()?.get(&format!("/repos/{repo}")).await?;
        Ok(RepositoryDescriptor {
            id: Some(gh.id.to_string()),
            owner: gh.owner.login,
            name: gh.name,
            description: gh.description,
            private: gh.private,
            ssh_url: gh.ssh_url,
            clone_url: gh.clone_url,
            default_branch: gh.default_branch,
            admin: gh.permissions.admin,
            push: gh.permissions.push,
            language: gh.language,
            homepage: gh.homepage.filter(|h| !h.is_empty()),
        })
    }

    async fn fetch_repos(&self) -> Result<Vec<String>> {
        let repos: Vec<GitHubRepo> = self
            .api()?
            .get_pages("/user/repos", "per_page", PAGE_SIZE)
            .await?;
        Ok(repos.into_iter().filter_map(|r| r.ssh_url).collect())
    }

    async fn fetch_branches(&self, repo: &RepoCoordinates) -> Result<Vec<String>> {
        self.names(&format!("/repos/{repo}/branches")).await
    }

    async fn fetch_tags(&self, repo: &RepoCoordinates) -> Result<Vec<String>> {
        self.names(&format!("/repos/{repo}/tags")).await
    }

    async fn fetch_commits(&self, repo: &RepoCoordinates) -> Result<Vec<String>> {
        let commits: Vec<GitHubCommit> = self
            .api()?
            .get(&format!("/repos/{repo}/commits?per_page={PAGE_SIZE}"))
            .await?;
        Ok(commits.into_iter().map(|c| c.sha).collect())
    }

    async fn fetch_pull_requests(&self, repo: &RepoCoordinates) -> Result<Vec<PullRequest>> {
        let pulls: Vec<GitHubPullRequest> = self
            .api()?
            .get_pages(&format!("/repos/{repo}/pulls?state=open"), "per_page", PAGE_SIZE)
            .await?;

        Ok(pulls
            .into_iter()
            .map(|pr| PullRequest {
                number: pr.number,
                title: pr.title,
                state: pr.state,
                url: pr.html_url,
                source_branch: pr.head.ref_name,
                target_branch: pr.base.ref_name,
                author: pr.user.map(|u| u.login),
                ssh_url: pr.head.repo.and_then(|r| r.ssh_url),
                created_at: pr.created_at,
                updated_at: pr.updated_at,
            })
            .collect())
    }

    async fn list_webhooks(&self, owner: &str, repo: &str) -> Result<Vec<WebhookRegistration>> {
        let hooks: Vec<GitHubHook> = self
            .api()?
            .get_pages(&format!("/repos/{owner}/{repo}/hooks"), "per_page", PAGE_SIZE)
            .await?;
        Ok(hooks.into_iter().map(Into::into).collect())
    }

    async fn create_webhook(
        &self,
        owner: &str,
        repo: &str,
        url: &str,
        secret: &str,
    ) -> Result<WebhookRegistration> {
        let request = CreateHookRequest {
            name: "web",
            active: true,
            events: ["push", "pull_request"],
            config: CreateHookConfig {
                url,
                content_type: "json",
                secret,
                insecure_ssl: "0",
            },
        };
        let hook: GitHubHook = self
            .api()?
            .post(&format!("/repos/{owner}/{repo}/hooks"), &request)
            .await?;
        Ok(hook.into())
    }

    async fn remove_webhook(&self, owner: &str, repo: &str, id: &str) -> Result<()> {
        self.api()?
            .delete(&format!("/repos/{owner}/{repo}/hooks/{id}"))
            .await
    }

    async fn register_deploy_key(
        &self,
        owner: &str,
        repo: &str,
        keys: DeployKeyPair,
    ) -> Result<DeployKeyRegistration> {
        let request = CreateKeyRequest {
            title: &self.deploy_key_title,
            key: &keys.public_key,
            read_only: true,
        };
        let key: GitHubKey = self
            .api()?
            .post(&format!("/repos/{owner}/{repo}/keys"), &request)
            .await?;

        Ok(DeployKeyRegistration {
            id: key.id.to_string(),
            title: key.title,
            verified: key.verified,
            created_at: key.created_at,
            url: key.url,
            read_only: key.read_only,
            keys,
        })
    }

    async fn remove_deploy_key(&self, owner: &str, repo: &str, id: &str) -> Result<()> {
        self.api()?
            .delete(&format!("/repos/{owner}/{repo}/keys/{id}"))
            .await
    }
}
