//! Provider credentials and endpoint configuration.
//!
//! Settings are read from the process environment and, optionally, a TOML
//! file using the same flat key names in lowercase:
//!
//! | Variable | Used by |
//! |----------|---------|
//! | `GITHUB_PERSONAL_ACCESS_TOKEN`, `GITHUB_BASEURL` | GitHub |
//! | `GITLAB_PERSONAL_ACCESS_TOKEN`, `GITLAB_BASEURL` | GitLab |
//! | `GITEA_PERSONAL_ACCESS_TOKEN`, `GITEA_BASEURL` | Gitea |
//! | `BITBUCKET_USERNAME`, `BITBUCKET_APP_PASSWORD`, `BITBUCKET_BASEURL` | Bitbucket |
//! | `REPOLINK_WEBHOOK_SECRET`, `REPOLINK_DEPLOY_KEY_TITLE` | all adapters |
//! | `REPOLINK_HTTP_TIMEOUT_SECS`, `REPOLINK_HTTP_MAX_ATTEMPTS` | HTTP client |
//!
//! Missing credentials are not an error: the matching adapter is built
//! disabled.

use crate::error::{ProviderError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default GitHub API endpoint.
pub const GITHUB_API_URL: &str = "https://api.github.com";
/// Default GitLab instance.
pub const GITLAB_URL: &str = "https://gitlab.com";
/// Default Bitbucket Cloud API endpoint.
pub const BITBUCKET_API_URL: &str = "https://api.bitbucket.org/2.0";
/// Default label for registered deploy keys.
pub const DEFAULT_DEPLOY_KEY_TITLE: &str = "bot@repolink";

/// Flat view of the configuration sources.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    github_personal_access_token: Option<String>,
    github_baseurl: Option<String>,
    gitlab_personal_access_token: Option<String>,
    gitlab_baseurl: Option<String>,
    gitea_personal_access_token: Option<String>,
    gitea_baseurl: Option<String>,
    bitbucket_username: Option<String>,
    bitbucket_app_password: Option<String>,
    bitbucket_baseurl: Option<String>,
    repolink_webhook_secret: Option<String>,
    repolink_deploy_key_title: Option<String>,
    repolink_http_timeout_secs: Option<u64>,
    repolink_http_max_attempts: Option<u32>,
}

/// Token-authenticated provider settings (GitHub, GitLab, Gitea).
#[derive(Clone, Default)]
pub struct TokenSettings {
    /// Personal access token.
    pub token: Option<String>,
    /// API (GitHub) or instance (GitLab, Gitea) base URL.
    pub base_url: Option<String>,
}

impl std::fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSettings")
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Bitbucket settings (username + app password).
#[derive(Clone, Default)]
pub struct BitbucketSettings {
    /// Bitbucket username.
    pub username: Option<String>,
    /// Bitbucket app password.
    pub app_password: Option<String>,
    /// API base URL.
    pub base_url: Option<String>,
}

impl std::fmt::Debug for BitbucketSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitbucketSettings")
            .field("username", &self.username)
            .field("app_password", &self.app_password.as_ref().map(|_| "<REDACTED>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// HTTP client behaviour shared by every adapter.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Attempts for idempotent requests, including the first one.
    pub max_attempts: u32,
    /// Base delay between attempts; multiplied by the attempt number.
    pub retry_backoff: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            retry_backoff: Duration::from_millis(250),
        }
    }
}

/// Settings for every provider adapter.
#[derive(Clone)]
pub struct ProviderSettings {
    /// GitHub.
    pub github: TokenSettings,
    /// GitLab.
    pub gitlab: TokenSettings,
    /// Gitea.
    pub gitea: TokenSettings,
    /// Bitbucket.
    pub bitbucket: BitbucketSettings,
    /// Secret used to authenticate inbound deliveries.
    pub webhook_secret: Option<String>,
    /// Label of registered deploy keys.
    pub deploy_key_title: String,
    /// HTTP client behaviour.
    pub http: HttpSettings,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            github: TokenSettings::default(),
            gitlab: TokenSettings::default(),
            gitea: TokenSettings::default(),
            bitbucket: BitbucketSettings::default(),
            webhook_secret: None,
            deploy_key_title: DEFAULT_DEPLOY_KEY_TITLE.to_string(),
            http: HttpSettings::default(),
        }
    }
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("github", &self.github)
            .field("gitlab", &self.gitlab)
            .field("gitea", &self.gitea)
            .field("bitbucket", &self.bitbucket)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "<REDACTED>"))
            .field("deploy_key_title", &self.deploy_key_title)
            .field("http", &self.http)
            .finish()
    }
}

impl ProviderSettings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load settings from an optional TOML file, overridden by the
    /// process environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(config::Environment::default().ignore_empty(true));
        Self::build(builder)
    }

    /// Load settings from an explicit set of variables instead of the
    /// process environment.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut source = config::Map::new();
        for (key, value) in vars {
            source.insert(key.into(), value.into());
        }

        let builder = config::Config::builder().add_source(
            config::Environment::default()
                .ignore_empty(true)
                .source(Some(source)),
        );
        Self::build(builder)
    }

    fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let raw: RawSettings = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ProviderError::InvalidConfig(e.to_string()))?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: RawSettings) -> Self {
        let defaults = HttpSettings::default();
        Self {
            github: TokenSettings {
                token: raw.github_personal_access_token,
                base_url: raw.github_baseurl,
            },
            gitlab: TokenSettings {
                token: raw.gitlab_personal_access_token,
                base_url: raw.gitlab_baseurl,
            },
            gitea: TokenSettings {
                token: raw.gitea_personal_access_token,
                base_url: raw.gitea_baseurl,
            },
            bitbucket: BitbucketSettings {
                username: raw.bitbucket_username,
                app_password: raw.bitbucket_app_password,
                base_url: raw.bitbucket_baseurl,
            },
            webhook_secret: raw.repolink_webhook_secret,
            deploy_key_title: raw
                .repolink_deploy_key_title
                .unwrap_or_else(|| DEFAULT_DEPLOY_KEY_TITLE.to_string()),
            http: HttpSettings {
                timeout: raw
                    .repolink_http_timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.timeout),
                max_attempts: raw
                    .repolink_http_max_attempts
                    .unwrap_or(defaults.max_attempts)
                    .max(1),
                retry_backoff: defaults.retry_backoff,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sources_give_defaults() {
        let settings = ProviderSettings::from_vars(Vec::<(String, String)>::new()).unwrap();
        assert!(settings.github.token.is_none());
        assert!(settings.bitbucket.username.is_none());
        assert_eq!(settings.deploy_key_title, DEFAULT_DEPLOY_KEY_TITLE);
        assert_eq!(settings.http.max_attempts, 3);
    }

    #[test]
    fn test_reads_provider_variables() {
        let settings = ProviderSettings::from_vars([
            ("GITHUB_PERSONAL_ACCESS_TOKEN", "ghp_test"),
            ("GITEA_BASEURL", "https://gitea.example.com"),
            ("GITEA_PERSONAL_ACCESS_TOKEN", "gitea_test"),
            ("BITBUCKET_USERNAME", "bot"),
            ("BITBUCKET_APP_PASSWORD", "app-pass"),
            ("REPOLINK_WEBHOOK_SECRET", "s3cret"),
            ("REPOLINK_DEPLOY_KEY_TITLE", "bot@example"),
            ("REPOLINK_HTTP_TIMEOUT_SECS", "5"),
            ("REPOLINK_HTTP_MAX_ATTEMPTS", "0"),
        ])
        .unwrap();

        assert_eq!(settings.github.token.as_deref(), Some("ghp_test"));
        assert_eq!(
            settings.gitea.base_url.as_deref(),
            Some("https://gitea.example.com")
        );
        assert_eq!(settings.bitbucket.app_password.as_deref(), Some("app-pass"));
        assert_eq!(settings.webhook_secret.as_deref(), Some("s3cret"));
        assert_eq!(settings.deploy_key_title, "bot@example");
        assert_eq!(settings.http.timeout, Duration::from_secs(5));
        assert_eq!(settings.http.max_attempts, 1);
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let settings = ProviderSettings::from_vars([("GITLAB_PERSONAL_ACCESS_TOKEN", "")]).unwrap();
        assert!(settings.gitlab.token.is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let settings = ProviderSettings {
            github: TokenSettings {
                token: Some("ghp_secret".into()),
                base_url: None,
            },
            webhook_secret: Some("hook_secret".into()),
            ..ProviderSettings::default()
        };
        let debug = format!("{settings:?}");
        assert!(!debug.contains("ghp_secret"));
        assert!(!debug.contains("hook_secret"));
        assert!(debug.contains("REDACTED"));
    }
}
