//! Common types used throughout `repolink`.
//!
//! This crate holds the provider-agnostic vocabulary shared by every git
//! hosting adapter: the provider tag, repository descriptors, webhook and
//! deploy key registrations, the canonical webhook event, and the repository
//! URL parser.

mod provider;
mod registration;
mod repository;
mod repo_url;
mod webhook;

pub use provider::{EventKind, ProviderKind, UnknownProvider};
pub use registration::{
    DeployKeyPair, DeployKeyRegistration, RegistrationStatus, WebhookOutcome, WebhookRegistration,
};
pub use repository::{
    PullRequest, Reference, ReferenceFailure, ReferenceKind, ReferenceList, RepoCoordinates,
    RepositoryDescriptor, RepositoryLookup,
};
pub use repo_url::{parse_repo, MalformedUrl};
pub use webhook::{WebhookDelivery, WebhookEvent, WebhookRepository};

/// Branch reported for deliveries that carry neither a ref nor a pull request.
pub const DEFAULT_BRANCH: &str = "main";
