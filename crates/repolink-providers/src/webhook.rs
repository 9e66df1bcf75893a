//! Webhook normalization shared by every adapter.
//!
//! Each adapter describes its payload with a [`PayloadShape`] and an event
//! table; [`normalize`] turns a raw [`WebhookDelivery`] into the canonical
//! [`WebhookEvent`]. Field paths are dot-separated and may index arrays
//! (`push.changes.0.new.name`).

use crate::error::NormalizeError;
use hmac::{Hmac, Mac};
use repolink_types::{
    EventKind, ProviderKind, WebhookDelivery, WebhookEvent, WebhookRepository, DEFAULT_BRANCH,
};
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

/// Branch, action and source repository read from a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Branch the delivery refers to.
    pub branch: String,
    /// Pull request action, if any.
    pub action: Option<String>,
    /// SSH URL of the source repository.
    pub ssh_url: Option<String>,
}

/// Provider-specific reader for payloads the generic paths do not cover.
pub type NativeExtractor = fn(event: &str, body: &Value) -> Option<Extracted>;

/// Where a provider's payload keeps the fields the normalizer needs.
#[derive(Debug, Clone, Copy)]
pub struct PayloadShape {
    /// Git ref of a push (`refs/heads/<branch>`).
    pub git_ref: &'static str,
    /// SSH URL of the repository the hook belongs to.
    pub repo_ssh_url: &'static str,
    /// Pull request object; its presence selects the pull request reading.
    pub pull_request: &'static str,
    /// Pull request source branch.
    pub pr_branch: &'static str,
    /// SSH URL of the pull request source repository.
    pub pr_ssh_url: &'static str,
    /// Pull request action.
    pub action: &'static str,
    /// Tried after the ref and pull request readings, before the
    /// top-level fallback.
    pub native: Option<NativeExtractor>,
}

/// Shape shared by GitHub and Gitea, whose payloads match field for field.
pub const GITHUB_LIKE_SHAPE: PayloadShape = PayloadShape {
    git_ref: "ref",
    repo_ssh_url: "repository.ssh_url",
    pull_request: "pull_request",
    pr_branch: "pull_request.head.ref",
    pr_ssh_url: "pull_request.head.repo.ssh_url",
    action: "action",
    native: None,
};

/// Look up a value by dot-separated path.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, key| match current {
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => current.get(key),
    })
}

/// Look up a non-empty string by dot-separated path.
pub fn lookup_str<'a>(value: &'a Value, path: &str) -> Option<&'a str> {
    lookup(value, path)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Branch name of a git ref: its last path segment.
pub fn branch_from_ref(git_ref: &str) -> String {
    match git_ref.rsplit('/').next() {
        Some(segment) if !segment.is_empty() => segment.to_string(),
        _ => DEFAULT_BRANCH.to_string(),
    }
}

/// Read branch, action and source repository from a parsed payload.
pub fn extract(shape: &PayloadShape, event: &str, body: &Value) -> Extracted {
    if let Some(git_ref) = lookup_str(body, shape.git_ref) {
        return Extracted {
            branch: branch_from_ref(git_ref),
            action: None,
            ssh_url: lookup_str(body, shape.repo_ssh_url).map(str::to_string),
        };
    }

    if lookup(body, shape.pull_request).is_some_and(Value::is_object) {
        return Extracted {
            branch: lookup_str(body, shape.pr_branch)
                .unwrap_or(DEFAULT_BRANCH)
                .to_string(),
            action: lookup_str(body, shape.action).map(str::to_string),
            ssh_url: lookup_str(body, shape.pr_ssh_url)
                .or_else(|| lookup_str(body, shape.repo_ssh_url))
                .map(str::to_string),
        };
    }

    if let Some(extracted) = shape.native.and_then(|native| native(event, body)) {
        return extracted;
    }

    Extracted {
        branch: DEFAULT_BRANCH.to_string(),
        action: None,
        ssh_url: lookup_str(body, shape.repo_ssh_url).map(str::to_string),
    }
}

/// Translate a provider-native event name through `table`.
pub fn event_kind(table: &[(&str, EventKind)], event: &str) -> Option<EventKind> {
    table
        .iter()
        .find(|(name, _)| *name == event)
        .map(|(_, kind)| *kind)
}

/// Normalize a delivery into the canonical event.
///
/// `verified` is the adapter's authentication verdict for the delivery.
pub fn normalize(
    provider: ProviderKind,
    table: &[(&str, EventKind)],
    shape: &PayloadShape,
    delivery: &WebhookDelivery,
    verified: bool,
) -> Result<WebhookEvent, NormalizeError> {
    let Some(event) = event_kind(table, &delivery.event) else {
        warn!(
            %provider,
            event = %delivery.event,
            delivery = %delivery.delivery_id,
            "Unsupported webhook event"
        );
        return Err(NormalizeError::UnsupportedEvent {
            provider,
            event: delivery.event.clone(),
        });
    };

    let body: Value = serde_json::from_str(&delivery.body).map_err(|e| {
        warn!(%provider, delivery = %delivery.delivery_id, error = %e, "Webhook body is not JSON");
        NormalizeError::MalformedPayload {
            provider,
            reason: format!("invalid JSON: {e}"),
        }
    })?;

    let extracted = extract(shape, &delivery.event, &body);
    let Some(ssh_url) = extracted.ssh_url else {
        warn!(%provider, delivery = %delivery.delivery_id, "Webhook payload names no repository");
        return Err(NormalizeError::MalformedPayload {
            provider,
            reason: "no repository ssh url in payload".to_string(),
        });
    };

    debug!(%provider, %event, branch = %extracted.branch, verified, "Normalized webhook");

    Ok(WebhookEvent {
        provider,
        action: extracted.action,
        event,
        delivery: delivery.delivery_id.clone(),
        body,
        branch: extracted.branch,
        verified,
        repo: WebhookRepository { ssh_url },
    })
}

/// How a platform authenticates its deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    /// Hex HMAC-SHA256 of the body, optionally prefixed with `sha256=`.
    HmacSha256,
    /// The shared secret echoed verbatim in a header.
    Token,
    /// The platform does not authenticate deliveries.
    Unsigned,
}

impl SignatureScheme {
    /// Scheme used by `provider`.
    pub fn for_provider(provider: ProviderKind) -> Self {
        match provider {
            ProviderKind::Github | ProviderKind::Gitea => Self::HmacSha256,
            ProviderKind::Gitlab => Self::Token,
            ProviderKind::Bitbucket => Self::Unsigned,
        }
    }

    /// Check a delivery against the configured secret.
    ///
    /// Unsigned platforms always pass. Signing platforms fail when no
    /// secret is configured or the header is missing.
    pub fn verify(&self, secret: Option<&str>, body: &[u8], signature: Option<&str>) -> bool {
        if *self == Self::Unsigned {
            return true;
        }
        let (Some(secret), Some(signature)) = (secret, signature) else {
            return false;
        };

        match self {
            Self::HmacSha256 => {
                let hex_sig = signature.strip_prefix("sha256=").unwrap_or(signature);
                let Ok(sig_bytes) = hex::decode(hex_sig.trim()) else {
                    return false;
                };
                let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
                    return false;
                };
                mac.update(body);
                mac.verify_slice(&sig_bytes).is_ok()
            }
            Self::Token => constant_time_eq(signature.as_bytes(), secret.as_bytes()),
            Self::Unsigned => true,
        }
    }
}

/// Compute the `sha256=<hex>` signature GitHub sends for `body`.
pub fn sign_sha256(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}
