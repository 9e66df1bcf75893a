//! The contract every git hosting adapter implements.

use crate::error::{NormalizeError, ProviderError, Result};
use crate::keys::generate_deploy_key;
use crate::webhook::{self, PayloadShape, SignatureScheme};
use async_trait::async_trait;
use repolink_types::{
    parse_repo, DeployKeyPair, DeployKeyRegistration, EventKind, ProviderKind, PullRequest,
    ReferenceKind, ReferenceList, RegistrationStatus, RepoCoordinates, RepositoryDescriptor,
    RepositoryLookup, WebhookDelivery, WebhookEvent, WebhookOutcome, WebhookRegistration,
};
use tracing::{info, warn};

/// A git hosting platform.
///
/// Adapters implement the `fetch_*`, webhook and deploy key primitives,
/// which report failures as [`ProviderError`]. The provided methods layer
/// the onboarding semantics on top: lookups that always resolve, listings
/// that degrade to empty, idempotent webhook registration and key
/// generation.
#[async_trait]
pub trait GitProvider: Send + Sync {
    /// Platform this adapter talks to.
    fn kind(&self) -> ProviderKind;

    /// Whether credentials were configured.
    fn is_enabled(&self) -> bool;

    /// Label registered deploy keys carry.
    fn deploy_key_title(&self) -> &str;

    /// Secret inbound deliveries are authenticated with.
    fn webhook_secret(&self) -> Option<&str>;

    /// Provider-native event names and their canonical kinds.
    fn event_table(&self) -> &'static [(&'static str, EventKind)];

    /// Where the provider's payloads keep branch and repository.
    fn payload_shape(&self) -> &PayloadShape;

    /// Fetch one repository.
    async fn fetch_repository(&self, repo: &RepoCoordinates) -> Result<RepositoryDescriptor>;

    /// SSH URLs of the repositories visible to the credentials.
    async fn fetch_repos(&self) -> Result<Vec<String>>;

    /// Branch names.
    async fn fetch_branches(&self, repo: &RepoCoordinates) -> Result<Vec<String>>;

    /// Tag names.
    async fn fetch_tags(&self, repo: &RepoCoordinates) -> Result<Vec<String>>;

    /// Commit hashes of the default branch, newest first.
    async fn fetch_commits(&self, repo: &RepoCoordinates) -> Result<Vec<String>>;

    /// Open pull requests.
    async fn fetch_pull_requests(&self, repo: &RepoCoordinates) -> Result<Vec<PullRequest>>;

    /// Webhooks registered on a repository.
    async fn list_webhooks(&self, owner: &str, repo: &str) -> Result<Vec<WebhookRegistration>>;

    /// Create a webhook delivering push and pull request events to `url`.
    async fn create_webhook(
        &self,
        owner: &str,
        repo: &str,
        url: &str,
        secret: &str,
    ) -> Result<WebhookRegistration>;

    /// Delete a webhook.
    async fn remove_webhook(&self, owner: &str, repo: &str, id: &str) -> Result<()>;

    /// Register the public half of `keys` as a read-only deploy key.
    async fn register_deploy_key(
        &self,
        owner: &str,
        repo: &str,
        keys: DeployKeyPair,
    ) -> Result<DeployKeyRegistration>;

    /// Delete a deploy key.
    async fn remove_deploy_key(&self, owner: &str, repo: &str, id: &str) -> Result<()>;

    /// Look up the repository behind `url`.
    ///
    /// Never fails: unreachable repositories come back with no access
    /// rights and a failure status.
    async fn get_repository(&self, url: &str) -> RepositoryLookup {
        let coords = match parse_repo(url) {
            Ok(coords) => coords,
            Err(e) => {
                warn!(provider = %self.kind(), %url, "Malformed repository url");
                let err = ProviderError::from(e);
                return RepositoryLookup::failed(
                    err.status(),
                    err.status_text(),
                    RepositoryDescriptor::default(),
                );
            }
        };

        match self.fetch_repository(&coords).await {
            Ok(descriptor) => RepositoryLookup::found(descriptor),
            Err(e) => {
                warn!(
                    provider = %self.kind(),
                    repo = %coords,
                    error = %e,
                    "Repository lookup failed"
                );
                RepositoryLookup::failed(
                    e.status(),
                    e.status_text(),
                    RepositoryDescriptor::unreachable(coords.owner, coords.name),
                )
            }
        }
    }

    /// Register a webhook for `url` unless one already targets it.
    ///
    /// Callback URLs match when they are equal after dropping trailing
    /// slashes, so `https://ci/hook/` and `https://ci/hook` are the same hook.
    /// Deliveries to a hook created here must be checked with the same
    /// `secret` (see [`GitProvider::get_webhook`]).
    async fn add_webhook(
        &self,
        owner: &str,
        repo: &str,
        url: &str,
        secret: &str,
    ) -> Result<WebhookOutcome> {
        let existing = self.list_webhooks(owner, repo).await?;
        if let Some(webhook) = existing
            .into_iter()
            .find(|w| same_callback_url(&w.url, url))
        {
            info!(
                provider = %self.kind(),
                %owner,
                %repo,
                id = %webhook.id,
                "Webhook already registered"
            );
            return Ok(WebhookOutcome {
                status: RegistrationStatus::AlreadyExists,
                webhook,
            });
        }

        let webhook = self.create_webhook(owner, repo, url, secret).await?;
        info!(provider = %self.kind(), %owner, %repo, id = %webhook.id, "Webhook created");
        Ok(WebhookOutcome {
            status: RegistrationStatus::Created,
            webhook,
        })
    }

    /// Generate a key pair and register it as a read-only deploy key.
    async fn add_deploy_key(&self, owner: &str, repo: &str) -> Result<DeployKeyRegistration> {
        if !self.is_enabled() {
            return Err(ProviderError::Disabled(self.kind()));
        }

        let keys = generate_deploy_key(self.deploy_key_title());
        let registration = self.register_deploy_key(owner, repo, keys).await?;
        info!(
            provider = %self.kind(),
            %owner,
            %repo,
            id = %registration.id,
            fingerprint = %registration.keys.fingerprint,
            "Deploy key registered"
        );
        Ok(registration)
    }

    /// Normalize an inbound delivery.
    ///
    /// `secret` is the one the hook was registered with; `None` falls back
    /// to the configured webhook secret.
    fn get_webhook(
        &self,
        delivery: &WebhookDelivery,
        secret: Option<&str>,
    ) -> std::result::Result<WebhookEvent, NormalizeError> {
        let verified = SignatureScheme::for_provider(self.kind()).verify(
            secret.or_else(|| self.webhook_secret()),
            delivery.body.as_bytes(),
            delivery.signature.as_deref(),
        );
        if !verified {
            warn!(
                provider = %self.kind(),
                delivery = %delivery.delivery_id,
                "Webhook delivery failed verification"
            );
        }
        webhook::normalize(
            self.kind(),
            self.event_table(),
            self.payload_shape(),
            delivery,
            verified,
        )
    }

    /// SSH URLs of the repositories visible to the credentials, or empty.
    async fn list_repos(&self) -> Vec<String> {
        match self.fetch_repos().await {
            Ok(repos) => repos,
            Err(e) => {
                warn!(provider = %self.kind(), error = %e, "Listing repositories failed");
                Vec::new()
            }
        }
    }

    /// Branch names of the repository behind `url`, or empty.
    async fn get_branches(&self, url: &str) -> Vec<String> {
        let result = match parse_repo(url) {
            Ok(coords) => self.fetch_branches(&coords).await,
            Err(e) => Err(e.into()),
        };
        result.unwrap_or_else(|e| {
            warn!(provider = %self.kind(), %url, error = %e, "Listing branches failed");
            Vec::new()
        })
    }

    /// Branches, tags and commits of the repository behind `url`.
    ///
    /// Each listing is fetched on its own; a failed one is recorded and the
    /// others are still returned.
    async fn get_references(&self, url: &str) -> ReferenceList {
        let mut references = ReferenceList::new();
        let coords = match parse_repo(url) {
            Ok(coords) => coords,
            Err(e) => {
                warn!(provider = %self.kind(), %url, "Malformed repository url");
                for kind in [ReferenceKind::Branch, ReferenceKind::Tag, ReferenceKind::Commit] {
                    references.record_failure(kind, e.to_string());
                }
                return references;
            }
        };

        for kind in [ReferenceKind::Branch, ReferenceKind::Tag, ReferenceKind::Commit] {
            let listing = match kind {
                ReferenceKind::Branch => self.fetch_branches(&coords).await,
                ReferenceKind::Tag => self.fetch_tags(&coords).await,
                ReferenceKind::Commit => self.fetch_commits(&coords).await,
            };
            match listing {
                Ok(names) => references.extend(kind, names),
                Err(e) => {
                    warn!(
                        provider = %self.kind(),
                        repo = %coords,
                        %kind,
                        error = %e,
                        "Listing references failed"
                    );
                    references.record_failure(kind, e.to_string());
                }
            }
        }
        references
    }

    /// Open pull requests of the repository behind `url`, or empty.
    async fn get_pull_requests(&self, url: &str) -> Vec<PullRequest> {
        let result = match parse_repo(url) {
            Ok(coords) => self.fetch_pull_requests(&coords).await,
            Err(e) => Err(e.into()),
        };
        result.unwrap_or_else(|e| {
            warn!(provider = %self.kind(), %url, error = %e, "Listing pull requests failed");
            Vec::new()
        })
    }
}

/// Whether two callback URLs name the same hook endpoint.
fn same_callback_url(registered: &str, requested: &str) -> bool {
    registered.trim_end_matches('/') == requested.trim_end_matches('/')
}
