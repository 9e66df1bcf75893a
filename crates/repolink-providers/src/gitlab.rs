//! GitLab adapter.

use crate::client::{ApiClient, Auth};
use crate::config::{ProviderSettings, GITLAB_URL};
use crate::error::{ProviderError, Result};
use crate::provider::GitProvider;
use crate::webhook::PayloadShape;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use repolink_types::{
    DeployKeyPair, DeployKeyRegistration, EventKind, ProviderKind, PullRequest, RepoCoordinates,
    RepositoryDescriptor, WebhookRegistration,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

const PAGE_SIZE: usize = 100;

/// Maintainer access level.
const MAINTAINER: u32 = 40;
/// Developer access level.
const DEVELOPER: u32 = 30;

const EVENTS: &[(&str, EventKind)] = &[
    ("Push Hook", EventKind::Push),
    ("Merge Request Hook", EventKind::PullRequest),
];

const SHAPE: PayloadShape = PayloadShape {
    git_ref: "ref",
    repo_ssh_url: "project.git_ssh_url",
    pull_request: "object_attributes",
    pr_branch: "object_attributes.source_branch",
    pr_ssh_url: "object_attributes.source.git_ssh_url",
    action: "object_attributes.action",
    native: None,
};

/// GitLab API response types
#[derive(Debug, Deserialize)]
struct GitLabProject {
    id: u64,
    path: String,
    namespace: GitLabNamespace,
    description: Option<String>,
    #[serde(default)]
    visibility: String,
    ssh_url_to_repo: Option<String>,
    http_url_to_repo: Option<String>,
    default_branch: Option<String>,
    #[serde(default)]
    permissions: GitLabPermissions,
    web_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitLabNamespace {
    full_path: String,
}

#[derive(Debug, Default, Deserialize)]
struct GitLabPermissions {
    project_access: Option<GitLabAccess>,
    group_access: Option<GitLabAccess>,
}

#[derive(Debug, Deserialize)]
struct GitLabAccess {
    access_level: u32,
}

impl GitLabPermissions {
    fn access_level(&self) -> u32 {
        let project = self.project_access.as_ref().map_or(0, |a| a.access_level);
        let group = self.group_access.as_ref().map_or(0, |a| a.access_level);
        project.max(group)
    }
}

#[derive(Debug, Deserialize)]
struct GitLabNamed {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GitLabCommit {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GitLabMergeRequest {
    iid: u64,
    title: String,
    state: String,
    web_url: String,
    source_branch: String,
    target_branch: String,
    author: Option<GitLabUser>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GitLabUser {
    username: String,
}

#[derive(Debug, Deserialize)]
struct GitLabHook {
    id: u64,
    url: String,
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    push_events: bool,
    #[serde(default)]
    merge_requests_events: bool,
    #[serde(default = "default_true")]
    enable_ssl_verification: bool,
    alert_status: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct CreateHookRequest<'a> {
    url: &'a str,
    token: &'a str,
    push_events: bool,
    merge_requests_events: bool,
    enable_ssl_verification: bool,
}

#[derive(Debug, Deserialize)]
struct GitLabDeployKey {
    id: u64,
    title: String,
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    can_push: bool,
}

#[derive(Debug, Serialize)]
struct CreateDeployKeyRequest<'a> {
    title: &'a str,
    key: &'a str,
    can_push: bool,
}

impl From<GitLabHook> for WebhookRegistration {
    fn from(hook: GitLabHook) -> Self {
        let mut events = BTreeSet::new();
        if hook.push_events {
            events.insert("push_events".to_string());
        }
        if hook.merge_requests_events {
            events.insert("merge_requests_events".to_string());
        }

        Self {
            id: hook.id.to_string(),
            // Hooks GitLab auto-disabled after repeated failures.
            active: hook.alert_status.as_deref() != Some("disabled"),
            created_at: hook.created_at,
            url: hook.url,
            insecure: !hook.enable_ssl_verification,
            events,
        }
    }
}

/// URL-encoded `owner/name`, GitLab's path form of a project id.
fn project_id(owner: &str, name: &str) -> String {
    url::form_urlencoded::byte_serialize(format!("{owner}/{name}").as_bytes()).collect()
}

/// Adapter for gitlab.com and self-managed GitLab.
pub struct GitlabProvider {
    client: Option<ApiClient>,
    deploy_key_title: String,
    webhook_secret: Option<String>,
}

impl GitlabProvider {
    /// Create the adapter; it is disabled when no token is configured.
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        let client = match &settings.gitlab.token {
            Some(token) => {
                let base_url = settings.gitlab.base_url.as_deref().unwrap_or(GITLAB_URL);
                info!(provider = "gitlab", %base_url, "GitLab enabled");
                Some(ApiClient::new(
                    ProviderKind::Gitlab,
                    format!("{}/api/v4", base_url.trim_end_matches('/')),
                    Auth::PrivateToken(token.clone()),
                    "application/json",
                    &settings.http,
                )?)
            }
            None => {
                info!(provider = "gitlab", "GitLab disabled: no GITLAB_PERSONAL_ACCESS_TOKEN set");
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
            .ok_or(ProviderError::Disabled(ProviderKind::Gitlab))
    }

    async fn names(&self, path: &str) -> Result<Vec<String>> {
        let items: Vec<GitLabNamed> = self.api()?.get_pages(path, "per_page", PAGE_SIZE).await?;
        Ok(items.into_iter().map(|i| i.name).collect())
    }
}

#[async_trait]
impl GitProvider for GitlabProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gitlab
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
        &SHAPE
    }

    async fn fetch_repository(&self, repo: &RepoCoordinates) -> Result<RepositoryDescriptor> {
        let id = project_id(&repo.owner, &repo.name);
        let project: GitLabProject = self.api()?.get(&format!("/projects/{id}")).await?;
        let access = project.permissions.access_level();

        Ok(RepositoryDescriptor {
            id: Some(project.id.to_string()),
            owner: project.namespace.full_path,
            name: project.path,
            description: project.description.filter(|d| !d.is_empty()),
            private: project.visibility == "private",
            ssh_url: project.ssh_url_to_repo,
            clone_url: project.http_url_to_repo,
            default_branch: project.default_branch,
            admin: access >= MAINTAINER,
            push: access >= DEVELOPER,
            language: None,
            homepage: project.web_url,
        })
    }

    async fn fetch_repos(&self) -> Result<Vec<String>> {
        let projects: Vec<GitLabProject> = self
            .api()?
            .get_pages("/projects?membership=true&simple=false", "per_page", PAGE_SIZE)
            .await?;
        Ok(projects.into_iter().filter_map(|p| p.ssh_url_to_repo).collect())
    }

    async fn fetch_branches(&self, repo: &RepoCoordinates) -> Result<Vec<String>> {
        let id = project_id(&repo.owner, &repo.name);
        self.names(&format!("/projects/{id}/repository/branches")).await
    }

    async fn fetch_tags(&self, repo: &RepoCoordinates) -> Result<Vec<String>> {
        let id = project_id(&repo.owner, &repo.name);
        self.names(&format!("/projects/{id}/repository/tags")).await
    }

    async fn fetch_commits(&self, repo: &RepoCoordinates) -> Result<Vec<String>> {
        let id = project_id(&repo.owner, &repo.name);
        let commits: Vec<GitLabCommit> = self
            .api()?
            .get(&format!("/projects/{id}/repository/commits?per_page={PAGE_SIZE}"))
            .await?;
        Ok(commits.into_iter().map(|c| c.id).collect())
    }

    async fn fetch_pull_requests(&self, repo: &RepoCoordinates) -> Result<Vec<PullRequest>> {
        let id = project_id(&repo.owner, &repo.name);
        let merge_requests: Vec<GitLabMergeRequest> = self
            .api()?
            .get_pages(
                &format!("/projects/{id}/merge_requests?state=opened"),
                "per_page",
                PAGE_SIZE,
            )
            .await?;

        Ok(merge_requests
            .into_iter()
            .map(|mr| PullRequest {
                number: mr.iid,
                title: mr.title,
                state: mr.state,
                url: mr.web_url,
                source_branch: mr.source_branch,
                target_branch: mr.target_branch,
                author: mr.author.map(|a| a.username),
                ssh_url: None,
                created_at: mr.created_at,
                updated_at: mr.updated_at,
            })
            .collect())
    }

    async fn list_webhooks(&self, owner: &str, repo: &str) -> Result<Vec<WebhookRegistration>> {
        let id = project_id(owner, repo);
        let hooks: Vec<GitLabHook> = self
            .api()?
            .get_pages(&format!("/projects/{id}/hooks"), "per_page", PAGE_SIZE)
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
        let id = project_id(owner, repo);
        let request = CreateHookRequest {
            url,
            token: secret,
            push_events: true,
            merge_requests_events: true,
            enable_ssl_verification: true,
        };
        let hook: GitLabHook = self
            .api()?
            .post(&format!("/projects/{id}/hooks"), &request)
            .await?;
        Ok(hook.into())
    }

    async fn remove_webhook(&self, owner: &str, repo: &str, id: &str) -> Result<()> {
        let project = project_id(owner, repo);
        self.api()?
            .delete(&format!("/projects/{project}/hooks/{id}"))
            .await
    }

    async fn register_deploy_key(
        &self,
        owner: &str,
        repo: &str,
        keys: DeployKeyPair,
    ) -> Result<DeployKeyRegistration> {
        let api = self.api()?;
        let id = project_id(owner, repo);
        let request = CreateDeployKeyRequest {
            title: &self.deploy_key_title,
            key: &keys.public_key,
            can_push: false,
        };
        let key: GitLabDeployKey = api
            .post(&format!("/projects/{id}/deploy_keys"), &request)
            .await?;

        Ok(DeployKeyRegistration {
            url: format!("{}/projects/{id}/deploy_keys/{}", api.base_url(), key.id),
            id: key.id.to_string(),
            title: key.title,
            verified: true,
            created_at: key.created_at,
            read_only: !key.can_push,
            keys,
        })
    }

    async fn remove_deploy_key(&self, owner: &str, repo: &str, id: &str) -> Result<()> {
        let project = project_id(owner, repo);
        self.api()?
            .delete(&format!("/projects/{project}/deploy_keys/{id}"))
            .await
    }
}
