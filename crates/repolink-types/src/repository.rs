//! Repository descriptors, references and pull requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Owner and name of a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoCoordinates {
    /// Account, workspace or group path that owns the repository.
    pub owner: String,
    /// Repository name (slug).
    pub name: String,
}

impl RepoCoordinates {
    /// Creates coordinates from an owner and a name.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Returns `owner/name`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl std::fmt::Display for RepoCoordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A repository as reported by its hosting provider.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    /// Provider-assigned identifier (numeric id or UUID, stringified).
    pub id: Option<String>,
    /// Owner of the repository.
    pub owner: String,
    /// Repository name.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Whether the repository is private.
    pub private: bool,
    /// SSH clone URL.
    pub ssh_url: Option<String>,
    /// HTTPS clone URL.
    pub clone_url: Option<String>,
    /// Default branch name.
    pub default_branch: Option<String>,
    /// Whether the configured credentials administer the repository.
    pub admin: bool,
    /// Whether the configured credentials may push.
    pub push: bool,
    /// Primary language, when the provider reports one.
    pub language: Option<String>,
    /// Project homepage or website.
    pub homepage: Option<String>,
}

impl RepositoryDescriptor {
    /// Descriptor for a repository that could not be reached.
    ///
    /// Carries the requested owner and name with no access rights.
    pub fn unreachable(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Result of a repository lookup.
///
/// Lookups always resolve: failures are reported through `status` and
/// `status_text`, with a descriptor that grants no access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryLookup {
    /// HTTP-like status code of the lookup.
    pub status: u16,
    /// Short human-readable status (`found`, `not found`, ...).
    pub status_text: String,
    /// The repository, or an unreachable placeholder.
    pub data: RepositoryDescriptor,
}

impl RepositoryLookup {
    /// A successful lookup.
    pub fn found(data: RepositoryDescriptor) -> Self {
        Self {
            status: 200,
            status_text: "found".into(),
            data,
        }
    }

    /// A failed lookup with the given status.
    pub fn failed(
        status: u16,
        status_text: impl Into<String>,
        data: RepositoryDescriptor,
    ) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            data,
        }
    }

    /// Whether the repository was found.
    pub fn is_found(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// What a reference name points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    /// A branch head.
    Branch,
    /// A tag.
    Tag,
    /// A commit hash.
    Commit,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Branch => write!(f, "branch"),
            Self::Tag => write!(f, "tag"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

/// A named pointer into repository history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Branch name, tag name or commit hash.
    pub name: String,
    /// What the name refers to.
    pub kind: ReferenceKind,
}

/// A reference listing that could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceFailure {
    /// Which listing failed.
    pub kind: ReferenceKind,
    /// Error description.
    pub message: String,
}

/// Branches, tags and commits of a repository, in that order.
///
/// Each constituent listing is fetched independently; failures are kept
/// next to whatever did succeed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceList {
    entries: Vec<Reference>,
    failures: Vec<ReferenceFailure>,
}

impl ReferenceList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends names of one kind.
    pub fn extend<I>(&mut self, kind: ReferenceKind, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.entries
            .extend(names.into_iter().map(|name| Reference { name, kind }));
    }

    /// Records that the listing for `kind` failed.
    pub fn record_failure(&mut self, kind: ReferenceKind, message: impl Into<String>) {
        self.failures.push(ReferenceFailure {
            kind,
            message: message.into(),
        });
    }

    /// All references with their provenance.
    pub fn entries(&self) -> &[Reference] {
        &self.entries
    }

    /// Listings that failed.
    pub fn failures(&self) -> &[ReferenceFailure] {
        &self.failures
    }

    /// Names of the references of one kind.
    pub fn of_kind(&self, kind: ReferenceKind) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(move |r| r.kind == kind)
            .map(|r| r.name.as_str())
    }

    /// Flat list of names: branches, then tags, then commits.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|r| r.name.clone()).collect()
    }

    /// Number of references.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no reference was collected.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether at least one listing failed.
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// An open pull (or merge) request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Provider-assigned number (GitLab `iid`).
    pub number: u64,
    /// Title.
    pub title: String,
    /// Provider-reported state.
    pub state: String,
    /// Web URL.
    pub url: String,
    /// Branch the changes come from.
    pub source_branch: String,
    /// Branch the changes target.
    pub target_branch: String,
    /// Author login or display name.
    pub author: Option<String>,
    /// SSH URL of the source repository, when reported.
    pub ssh_url: Option<String>,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    pub updated_at: Option<DateTime<Utc>>,
}
