//! # Repolink Providers
//!
//! Git hosting adapters used to onboard a repository into a deployment
//! pipeline: register a webhook, provision a read-only deploy key, and turn
//! each platform's webhook deliveries into one canonical event.
//!
//! ## Features
//!
//! - **GitHub**, **GitLab**, **Gitea** and **Bitbucket Cloud** adapters
//!   behind one [`GitProvider`] contract
//! - **Idempotent webhook registration**: an existing hook for the same
//!   callback URL is returned instead of a duplicate
//! - **Deploy keys**: Ed25519 pairs in OpenSSH encoding
//! - **Webhook normalization** with signature verification where the
//!   platform signs deliveries
//!
//! ## Example
//!
//! ```rust,ignore
//! use repolink_providers::{GitProvider, ProviderRegistry, ProviderSettings};
//! use repolink_types::ProviderKind;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = ProviderSettings::from_env()?;
//!     let registry = ProviderRegistry::from_settings(&settings)?;
//!
//!     let github = registry.get(ProviderKind::Github).expect("registered");
//!     let outcome = github
//!         .add_webhook("acme", "app", "https://ci.example.com/hooks/github", "s3cret")
//!         .await?;
//!     println!("{}: {}", outcome.status.status_text(), outcome.webhook.id);
//!
//!     let key = github.add_deploy_key("acme", "app").await?;
//!     println!("{}", key.keys.fingerprint);
//!     Ok(())
//! }
//! ```

pub mod bitbucket;
pub mod client;
pub mod config;
pub mod error;
pub mod gitea;
pub mod github;
pub mod gitlab;
pub mod keys;
pub mod provider;
pub mod registry;
pub mod webhook;

// Re-export main types
pub use bitbucket::BitbucketProvider;
pub use config::ProviderSettings;
pub use error::{NormalizeError, ProviderError, Result};
pub use gitea::GiteaProvider;
pub use github::GithubProvider;
pub use gitlab::GitlabProvider;
pub use keys::generate_deploy_key;
pub use provider::GitProvider;
pub use registry::ProviderRegistry;

/// Version of the provider adapters.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
