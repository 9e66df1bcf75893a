//! Shared helpers for adapter tests against a mock provider API.

#![allow(dead_code)]

use repolink_providers::config::{BitbucketSettings, TokenSettings};
use repolink_providers::ProviderSettings;
use std::time::Duration;

pub const TOKEN: &str = "test-token";
pub const BITBUCKET_USER: &str = "bot";
pub const BITBUCKET_PASSWORD: &str = "pass";
pub const WEBHOOK_SECRET: &str = "s3cret";
pub const CALLBACK_URL: &str = "https://ci.example.com/api/repo/webhooks";

fn token(base_url: &str) -> TokenSettings {
    TokenSettings {
        token: Some(TOKEN.to_string()),
        base_url: Some(base_url.to_string()),
    }
}

/// Settings with every adapter pointed at `base_url` and a fast retry.
pub fn settings(base_url: &str) -> ProviderSettings {
    let mut settings = ProviderSettings {
        github: token(base_url),
        gitlab: token(base_url),
        gitea: token(base_url),
        bitbucket: BitbucketSettings {
            username: Some(BITBUCKET_USER.to_string()),
            app_password: Some(BITBUCKET_PASSWORD.to_string()),
            base_url: Some(base_url.to_string()),
        },
        webhook_secret: Some(WEBHOOK_SECRET.to_string()),
        ..ProviderSettings::default()
    };
    settings.http.retry_backoff = Duration::from_millis(1);
    settings.http.timeout = Duration::from_secs(5);
    settings
}
