//! Inbound webhook deliveries and the canonical event.

use crate::{EventKind, ProviderKind};
use serde::{Deserialize, Serialize};

/// A raw webhook delivery as received from a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookDelivery {
    /// Provider-native event name (from [`ProviderKind::event_header`]).
    pub event: String,
    /// Delivery correlation id.
    pub delivery_id: String,
    /// Raw request body.
    pub body: String,
    /// Signature or token header value, if present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl WebhookDelivery {
    /// Creates an unsigned delivery.
    pub fn new(
        event: impl Into<String>,
        delivery_id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            event: event.into(),
            delivery_id: delivery_id.into(),
            body: body.into(),
            signature: None,
        }
    }

    /// Attaches the signature or token header value.
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }
}

/// Source repository of a canonical event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookRepository {
    /// SSH clone URL.
    pub ssh_url: String,
}

/// Provider-agnostic webhook event consumed by the build trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Platform the delivery came from.
    #[serde(rename = "repoprovider")]
    pub provider: ProviderKind,
    /// Pull request action, when the payload carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Canonical event kind.
    pub event: EventKind,
    /// Delivery correlation id.
    pub delivery: String,
    /// Parsed payload.
    pub body: serde_json::Value,
    /// Branch the event refers to.
    pub branch: String,
    /// Whether the delivery was authenticated, or the platform cannot sign.
    pub verified: bool,
    /// Source repository.
    pub repo: WebhookRepository,
}
