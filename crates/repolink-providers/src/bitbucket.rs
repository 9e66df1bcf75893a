//! Bitbucket Cloud adapter.
//!
//! Bitbucket authenticates with a username and app password, paginates by
//! `next` links and does not sign webhook deliveries: every delivery is
//! reported as verified. Callers that need authenticity must restrict the
//! callback URL by other means.

use crate::client::{ApiClient, Auth};
use crate::config::{ProviderSettings, BITBUCKET_API_URL};
use crate::error::{ProviderError, Result};
use crate::provider::GitProvider;
use crate::webhook::{lookup, lookup_str, Extracted, PayloadShape, GITHUB_LIKE_SHAPE};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use repolink_types::{
    DeployKeyPair, DeployKeyRegistration, EventKind, ProviderKind, PullRequest, RepoCoordinates,
    RepositoryDescriptor, WebhookRegistration, DEFAULT_BRANCH,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

const PAGE_SIZE: usize = 100;

const EVENTS: &[(&str, EventKind)] = &[
    ("repo:push", EventKind::Push),
    ("pullrequest:created", EventKind::PullRequest),
];

/// GitHub-shaped payloads first, then Bitbucket's own push and pull
/// request objects.
const SHAPE: PayloadShape = PayloadShape {
    native: Some(native_payload),
    ..GITHUB_LIKE_SHAPE
};

/// Bitbucket API response types
#[derive(Debug, Deserialize)]
struct BitbucketRepo {
    uuid: Option<String>,
    slug: Option<String>,
    name: String,
    full_name: String,
    description: Option<String>,
    #[serde(default)]
    is_private: bool,
    mainbranch: Option<BitbucketNamed>,
    links: BitbucketLinks,
    language: Option<String>,
    website: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BitbucketNamed {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct BitbucketLinks {
    #[serde(default)]
    clone: Vec<BitbucketCloneLink>,
    html: Option<BitbucketHref>,
    #[serde(rename = "self")]
    self_link: Option<BitbucketHref>,
}

#[derive(Debug, Deserialize)]
struct BitbucketCloneLink {
    href: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct BitbucketHref {
    href: String,
}

impl BitbucketRepo {
    fn clone_link(&self, name: &str) -> Option<String> {
        self.links
            .clone
            .iter()
            .find(|link| link.name == name)
            .map(|link| link.href.clone())
    }
}

#[derive(Debug, Deserialize)]
struct BitbucketCommitPage {
    #[serde(default)]
    values: Vec<BitbucketCommit>,
}

#[derive(Debug, Deserialize)]
struct BitbucketCommit {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct BitbucketPullRequest {
    id: u64,
    title: String,
    state: String,
    source: BitbucketEndpoint,
    destination: BitbucketEndpoint,
    author: Option<BitbucketUser>,
    #[serde(default)]
    links: BitbucketLinks,
    created_on: Option<DateTime<Utc>>,
    updated_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct BitbucketEndpoint {
    branch: BitbucketNamed,
    repository: Option<BitbucketFullName>,
}

#[derive(Debug, Deserialize)]
struct BitbucketFullName {
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct BitbucketUser {
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct BitbucketHook {
    uuid: String,
    url: String,
    #[serde(default)]
    active: bool,
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    events: Vec<String>,
    #[serde(default)]
    skip_cert_verification: bool,
}

#[derive(Debug, Serialize)]
struct CreateHookRequest<'a> {
    description: &'a str,
    url: &'a str,
    active: bool,
    events: [&'a str; 2],
    skip_cert_verification: bool,
}

#[derive(Debug, Deserialize)]
struct BitbucketDeployKey {
    id: u64,
    label: String,
    created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    links: BitbucketLinks,
}

#[derive(Debug, Serialize)]
struct CreateDeployKeyRequest<'a> {
    key: &'a str,
    label: &'a str,
}

impl From<BitbucketHook> for WebhookRegistration {
    fn from(hook: BitbucketHook) -> Self {
        Self {
            id: hook.uuid,
            active: hook.active,
            created_at: hook.created_at,
            url: hook.url,
            insecure: hook.skip_cert_verification,
            events: hook.events.into_iter().collect(),
        }
    }
}

/// SSH clone URL of a Bitbucket Cloud repository.
fn ssh_url(full_name: &str) -> String {
    format!("git@bitbucket.org:{full_name}.git")
}

/// Read Bitbucket's own `push.changes` and `pullrequest` payloads.
fn native_payload(event: &str, body: &Value) -> Option<Extracted> {
    let repository = lookup_str(body, "repository.full_name").map(ssh_url);

    if let Some(branch) = lookup_str(body, "push.changes.0.new.name") {
        return Some(Extracted {
            branch: branch.to_string(),
            action: None,
            ssh_url: repository,
        });
    }

    if lookup(body, "pullrequest").is_some_and(Value::is_object) {
        return Some(Extracted {
            branch: lookup_str(body, "pullrequest.source.branch.name")
                .unwrap_or(DEFAULT_BRANCH)
                .to_string(),
            action: event.split_once(':').map(|(_, action)| action.to_string()),
            ssh_url: lookup_str(body, "pullrequest.source.repository.full_name")
                .map(ssh_url)
                .or(repository),
        });
    }

    None
}

/// URL-safe form of a `{uuid}` path segment.
fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}

/// Adapter for Bitbucket Cloud.
pub struct BitbucketProvider {
    client: Option<ApiClient>,
    deploy_key_title: String,
}

impl BitbucketProvider {
    /// Create the adapter; it is disabled without a username and app
    /// password.
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        let bitbucket = &settings.bitbucket;
        let client = match (&bitbucket.username, &bitbucket.app_password) {
            (Some(username), Some(password)) => {
                let base_url = bitbucket.base_url.as_deref().unwrap_or(BITBUCKET_API_URL);
                info!(provider = "bitbucket", %base_url, %username, "Bitbucket enabled");
                Some(ApiClient::new(
                    ProviderKind::Bitbucket,
                    base_url,
                    Auth::Basic {
                        username: username.clone(),
                        password: password.clone(),
                    },
                    "application/json",
                    &settings.http,
                )?)
            }
            _ => {
                info!(
                    provider = "bitbucket",
                    "Bitbucket disabled: BITBUCKET_USERNAME and BITBUCKET_APP_PASSWORD required"
                );
                None
            }
        };

        Ok(Self {
            client,
            deploy_key_title: settings.deploy_key_title.clone(),
        })
    }

    fn api(&self) -> Result<&ApiClient> {
        self.client
            .as_ref()
            .ok_or(ProviderError::Disabled(ProviderKind::Bitbucket))
    }

    async fn names(&self, path: &str) -> Result<Vec<String>> {
        let items: Vec<BitbucketNamed> = self.api()?.get_linked_pages(path).await?;
        Ok(items.into_iter().map(|i| i.name).collect())
    }
}

#[async_trait]
impl GitProvider for BitbucketProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Bitbucket
    }

    fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    fn deploy_key_title(&self) -> &str {
        &self.deploy_key_title
    }

    fn webhook_secret(&self) -> Option<&str> {
        None
    }

    fn event_table(&self) -> &'static [(&'static str, EventKind)] {
        EVENTS
    }

    fn payload_shape(&self) -> &PayloadShape {
        &SHAPE
    }

    async fn fetch_repository(&self, repo: &RepoCoordinates) -> Result<RepositoryDescriptor> {
        let bb: BitbucketRepo = self.api()?.get(&format!("/repositories/{repo}")).await?;
        let owner = bb
            .full_name
            .split_once('/')
            .map_or_else(|| repo.owner.clone(), |(owner, _)| owner.to_string());

        // Only repositories the credentials own are listed, so access is
        // assumed.
        Ok(RepositoryDescriptor {
            id: bb.uuid.clone(),
            owner,
            name: bb.slug.clone().unwrap_or_else(|| bb.name.clone()),
            description: bb.description.clone().filter(|d| !d.is_empty()),
            private: bb.is_private,
            ssh_url: bb.clone_link("ssh"),
            clone_url: bb.clone_link("https"),
            default_branch: bb.mainbranch.as_ref().map(|b| b.name.clone()),
            admin: true,
            push: true,
            language: bb.language.clone().filter(|l| !l.is_empty()),
            homepage: bb.website.clone().filter(|w| !w.is_empty()),
        })
    }

    async fn fetch_repos(&self) -> Result<Vec<String>> {
        let repos: Vec<BitbucketRepo> = self
            .api()?
            .get_linked_pages(&format!("/repositories?role=member&pagelen={PAGE_SIZE}"))
            .await?;
        Ok(repos.iter().filter_map(|r| r.clone_link("ssh")).collect())
    }

    async fn fetch_branches(&self, repo: &RepoCoordinates) -> Result<Vec<String>> {
        self.names(&format!("/repositories/{repo}/refs/branches?pagelen={PAGE_SIZE}"))
            .await
    }

    async fn fetch_tags(&self, repo: &RepoCoordinates) -> Result<Vec<String>> {
        self.names(&format!("/repositories/{repo}/refs/tags?pagelen={PAGE_SIZE}"))
            .await
    }

    async fn fetch_commits(&self, repo: &RepoCoordinates) -> Result<Vec<String>> {
        let page: BitbucketCommitPage = self
            .api()?
            .get(&format!("/repositories/{repo}/commits?pagelen={PAGE_SIZE}"))
            .await?;
        Ok(page.values.into_iter().map(|c| c.hash).collect())
    }

    async fn fetch_pull_requests(&self, repo: &RepoCoordinates) -> Result<Vec<PullRequest>> {
        let pulls: Vec<BitbucketPullRequest> = self
            .api()?
            .get_linked_pages(&format!(
                "/repositories/{repo}/pullrequests?state=OPEN&pagelen=50"
            ))
            .await?;

        Ok(pulls
            .into_iter()
            .map(|pr| PullRequest {
                number: pr.id,
                title: pr.title,
                state: pr.state,
                url: pr.links.html.map(|l| l.href).unwrap_or_default(),
                ssh_url: pr.source.repository.map(|r| ssh_url(&r.full_name)),
                source_branch: pr.source.branch.name,
                target_branch: pr.destination.branch.name,
                author: pr.author.map(|a| a.display_name),
                created_at: pr.created_on,
                updated_at: pr.updated_on,
            })
            .collect())
    }

    async fn list_webhooks(&self, owner: &str, repo: &str) -> Result<Vec<WebhookRegistration>> {
        let hooks: Vec<BitbucketHook> = self
            .api()?
            .get_linked_pages(&format!("/repositories/{owner}/{repo}/hooks"))
            .await?;
        Ok(hooks.into_iter().map(Into::into).collect())
    }

    async fn create_webhook(
        &self,
        owner: &str,
        repo: &str,
        url: &str,
        _secret: &str,
    ) -> Result<WebhookRegistration> {
        let request = CreateHookRequest {
            description: "repolink webhook",
            url,
            active: true,
            events: ["repo:push", "pullrequest:created"],
            skip_cert_verification: false,
        };
        let hook: BitbucketHook = self
            .api()?
            .post(&format!("/repositories/{owner}/{repo}/hooks"), &request)
            .await?;
        Ok(hook.into())
    }

    async fn remove_webhook(&self, owner: &str, repo: &str, id: &str) -> Result<()> {
        self.api()?
            .delete(&format!(
                "/repositories/{owner}/{repo}/hooks/{}",
                encode_segment(id)
            ))
            .await
    }

    async fn register_deploy_key(
        &self,
        owner: &str,
        repo: &str,
        keys: DeployKeyPair,
    ) -> Result<DeployKeyRegistration> {
        let request = CreateDeployKeyRequest {
            key: &keys.public_key,
            label: &self.deploy_key_title,
        };
        let key: BitbucketDeployKey = self
            .api()?
            .post(&format!("/repositories/{owner}/{repo}/deploy-keys"), &request)
            .await?;

        // Bitbucket deploy keys are always read-only.
        Ok(DeployKeyRegistration {
            id: key.id.to_string(),
            title: key.label,
            verified: true,
            created_at: key.created_on,
            url: key.links.self_link.map(|l| l.href).unwrap_or_default(),
            read_only: true,
            keys,
        })
    }

    async fn remove_deploy_key(&self, owner: &str, repo: &str, id: &str) -> Result<()> {
        self.api()?
            .delete(&format!("/repositories/{owner}/{repo}/deploy-keys/{id}"))
            .await
    }
}
