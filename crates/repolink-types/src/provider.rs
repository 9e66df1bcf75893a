//! Provider and event tags.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// The git hosting platform an adapter talks to.
///
/// Every adapter carries its tag explicitly; it is set at construction and
/// never derived from the adapter's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// github.com or GitHub Enterprise.
    Github,
    /// gitlab.com or a self-managed GitLab.
    Gitlab,
    /// A self-hosted Gitea instance.
    Gitea,
    /// Bitbucket Cloud.
    Bitbucket,
}

impl ProviderKind {
    /// All supported providers.
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Github,
        ProviderKind::Gitlab,
        ProviderKind::Gitea,
        ProviderKind::Bitbucket,
    ];

    /// Lowercase name used in configuration and canonical events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Gitlab => "gitlab",
            Self::Gitea => "gitea",
            Self::Bitbucket => "bitbucket",
        }
    }

    /// HTTP header carrying the provider-native event name of a delivery.
    pub fn event_header(&self) -> &'static str {
        match self {
            Self::Github => "X-GitHub-Event",
            Self::Gitlab => "X-Gitlab-Event",
            Self::Gitea => "X-Gitea-Event",
            Self::Bitbucket => "X-Event-Key",
        }
    }

    /// HTTP header carrying the delivery correlation id.
    pub fn delivery_header(&self) -> &'static str {
        match self {
            Self::Github => "X-GitHub-Delivery",
            Self::Gitlab => "X-Gitlab-Event-UUID",
            Self::Gitea => "X-Gitea-Delivery",
            Self::Bitbucket => "X-Request-UUID",
        }
    }

    /// HTTP header carrying the delivery signature or token, if the
    /// platform sends one.
    pub fn signature_header(&self) -> Option<&'static str> {
        match self {
            Self::Github => Some("X-Hub-Signature-256"),
            Self::Gitlab => Some("X-Gitlab-Token"),
            Self::Gitea => Some("X-Gitea-Signature"),
            Self::Bitbucket => None,
        }
    }

    /// Whether deliveries from this platform can be authenticated.
    pub fn supports_signatures(&self) -> bool {
        self.signature_header().is_some()
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown provider name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown git provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "github" => Ok(Self::Github),
            "gitlab" => Ok(Self::Gitlab),
            "gitea" => Ok(Self::Gitea),
            "bitbucket" => Ok(Self::Bitbucket),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

/// Canonical kind of a webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Code pushed to a branch.
    Push,
    /// Pull (or merge) request opened.
    PullRequest,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Push => write!(f, "push"),
            EventKind::PullRequest => write!(f, "pull_request"),
        }
    }
}
