#![no_main]

use libfuzzer_sys::fuzz_target;
use repolink_providers::{ProviderRegistry, ProviderSettings};
use repolink_types::{ProviderKind, WebhookDelivery};

const EVENTS: [&str; 6] = [
    "push",
    "pull_request",
    "Push Hook",
    "Merge Request Hook",
    "repo:push",
    "pullrequest:created",
];

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let Ok(registry) = ProviderRegistry::from_settings(&ProviderSettings::default()) else {
        return;
    };
    let kind = ProviderKind::ALL[usize::from(data[0]) % ProviderKind::ALL.len()];
    let event = EVENTS[usize::from(data[1]) % EVENTS.len()];
    let body = String::from_utf8_lossy(&data[2..]);

    let Some(provider) = registry.get(kind) else {
        return;
    };

    // Normalization must reject bad payloads without panicking
    let delivery = WebhookDelivery::new(event, "fuzz", body);
    if let Ok(normalized) = provider.get_webhook(&delivery, None) {
        assert_eq!(normalized.provider, kind);
        assert!(serde_json::to_string(&normalized).is_ok());
    }
});
