//! Gitea adapter.
//!
//! Gitea's REST API and webhook payloads follow GitHub's closely; the
//! differences are the `/api/v1` prefix, `limit` paging, the `token`
//! authorization scheme and the hook `type` field.

use crate::client::{ApiClient, Auth};
use crate::config::ProviderSettings;
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
use std::collections::BTreeMap;
use tracing::info;

const PAGE_SIZE: usize = 50;

const EVENTS: &[(&str, EventKind)] = &[
    ("push", EventKind::Push),
    ("pull_request", EventKind::PullRequest),
];

#[derive(Debug, Deserialize)]
struct GiteaRepo {
    id: u64,
    name: String,
    owner: GiteaUser,
    description: Option<String>,
    #[serde(default)]
    private: bool,
    ssh_url: Option<String>,
    clone_url: Option<String>,
    default_branch: Option<String>,
    #[serde(default)]
    permissions: GiteaPermissions,
    language: Option<String>,
    website: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GiteaPermissions {
    #[serde(default)]
    admin: bool,
    #[serde(default)]
    push: bool,
}

#[derive(Debug, Deserialize)]
struct GiteaUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GiteaNamed {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GiteaCommit {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GiteaPullRequest {
    number: u64,
    title: String,
    state: String,
    html_url: String,
    head: GiteaBranch,
    base: GiteaBranch,
    user: Option<GiteaUser>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GiteaBranch {
    #[serde(rename = "ref")]
    ref_name: String,
    repo: Option<GiteaBranchRepo>,
}

#[derive(Debug, Deserialize)]
struct GiteaBranchRepo {
    ssh_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GiteaHook {
    id: u64,
    active: bool,
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    events: Vec<String>,
    #[serde(default)]
    config: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct CreateHookRequest<'a> {
    #[serde(rename = "type")]
    hook_type: &'a str,
    active: bool,
    events: [&'a str; 2],
    config: BTreeMap<&'a str, &'a str>,
}

#[derive(Debug, Deserialize)]
struct GiteaKey {
    id: u64,
    title: String,
    created_at: Option<DateTime<Utc>>,
    url: String,
    #[serde(default)]
    read_only: bool,
}

#[derive(Debug, Serialize)]
struct CreateKeyRequest<'a> {
    title: &'a str,
    key: &'a str,
    read_only: bool,
}

impl From<GiteaHook> for WebhookRegistration {
    fn from(mut hook: GiteaHook) -> Self {
        Self {
            id: hook.id.to_string(),
            active: hook.active,
            created_at: hook.created_at,
            url: hook.config.remove("url").unwrap_or_default(),
            insecure: false,
            events: hook.events.into_iter().collect(),
        }
    }
}

/// Adapter for self-hosted Gitea instances.
pub struct GiteaProvider {
    client: Option<ApiClient>,
    deploy_key_title: String,
    webhook_secret: Option<String>,
}

impl GiteaProvider {
    /// Create the adapter; it is disabled without both a token and an
    /// instance URL.
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        let client = match (&settings.gitea.token, &settings.gitea.base_url) {
            (Some(token), Some(base_url)) => {
                info!(provider = "gitea", %base_url, "Gitea enabled");
                let api_url = format!("{}/api/v1", base_url.trim_end_matches('/'));
                Some(ApiClient::new(
                    ProviderKind::Gitea,
                    api_url,
                    Auth::Token(token.clone()),
                    "application/json",
                    &settings.http,
                )?)
            }
            (None, _) => {
                info!(provider = "gitea", "Gitea disabled: no GITEA_PERSONAL_ACCESS_TOKEN set");
                None
            }
            (_, None) => {
                info!(provider = "gitea", "Gitea disabled: no GITEA_BASEURL set");
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
            .ok_or(ProviderError::Disabled(ProviderKind::Gitea))
    }

    async fn names(&self, path: &str) -> Result<Vec<String>> {
        let items: Vec<GiteaNamed> = self.api()?.get_pages(path, "limit", PAGE_SIZE).await?;
        Ok(items.into_iter().map(|i| i.name).collect())
    }
}

#[async_trait]
impl GitProvider for GiteaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gitea
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
        let gt: GiteaRepo = self.api()?.get(&format!("/repos/{repo}")).await?;
        Ok(RepositoryDescriptor {
            id: Some(gt.id.to_string()),
            owner: gt.owner.login,
            name: gt.name,
            description: gt.description.filter(|d| !d.is_empty()),
            private: gt.private,
            ssh_url: gt.ssh_url,
            clone_url: gt.clone_url,
            default_branch: gt.default_branch,
            admin: gt.permissions.admin,
            push: gt.permissions.push,
            language: gt.language.filter(|l| !l.is_empty()),
            homepage: gt.website.filter(|w| !w.is_empty()),
        })
    }

    async fn fetch_repos(&self) -> Result<Vec<String>> {
        let repos: Vec<GiteaRepo> = self.api()?.get_pages("/user/repos", "limit", PAGE_SIZE).await?;
        Ok(repos.into_iter().filter_map(|r| r.ssh_url).collect())
    }

    async fn fetch_branches(&self, repo: &RepoCoordinates) -> Result<Vec<String>> {
        self.names(&format!("/repos/{repo}/branches")).await
    }

    async fn fetch_tags(&self, repo: &RepoCoordinates) -> Result<Vec<String>> {
        self.names(&format!("/repos/{repo}/tags")).await
    }

    async fn fetch_commits(&self, repo: &RepoCoordinates) -> Result<Vec<String>> {
        let commits: Vec<GiteaCommit> = self
            .api()?
            .get(&format!("/repos/{repo}/commits?limit={PAGE_SIZE}"))
            .await?;
        Ok(commits.into_iter().map(|c| c.sha).collect())
    }

    async fn fetch_pull_requests(&self, repo: &RepoCoordinates) -> Result<Vec<PullRequest>> {
        let pulls: Vec<GiteaPullRequest> = self
            .api()?
            .get_pages(&format!("/repos/{repo}/pulls?state=open"), "limit", PAGE_SIZE)
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
        let hooks: Vec<GiteaHook> = self
            .api()?
            .get_pages(&format!("/repos/{owner}/{repo}/hooks"), "limit", PAGE_SIZE)
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
            hook_type: "gitea",
            active: true,
            events: ["push", "pull_request"],
            config: BTreeMap::from([("url", url), ("content_type", "json"), ("secret", secret)]),
        };
        let hook: GiteaHook = self
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
        let key: GiteaKey = self
            .api()?
            .post(&format!("/repos/{owner}/{repo}/keys"), &request)
            .await?;

        // Gitea does not report verification; an accepted key is usable.
        Ok(DeployKeyRegistration {
            id: key.id.to_string(),
            title: key.title,
            verified: true,
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
