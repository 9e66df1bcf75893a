//! GitHub adapter against a mock API.

mod common;

use common::{settings, CALLBACK_URL, TOKEN, WEBHOOK_SECRET};
use repolink_providers::webhook::sign_sha256;
use repolink_providers::{GitProvider, GithubProvider, ProviderError, ProviderSettings};
use repolink_types::{EventKind, ReferenceKind, RegistrationStatus, WebhookDelivery};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn hook_json(id: u64, url: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": "web",
        "active": true,
        "events": ["push", "pull_request"],
        "config": {"url": url, "content_type": "json", "insecure_ssl": "0"},
        "created_at": "2024-01-15T09:30:00Z"
    })
}

async fn provider(server: &MockServer) -> GithubProvider {
    GithubProvider::new(&settings(&server.uri())).unwrap()
}

#[tokio::test]
async fn test_add_webhook_returns_existing_hook() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/app/hooks"))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            hook_json(1, "https://other.example.com/hook"),
            hook_json(2, CALLBACK_URL),
        ])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/repos/acme/app/hooks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(hook_json(3, CALLBACK_URL)))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = provider(&server)
        .await
        .add_webhook("acme", "app", CALLBACK_URL, WEBHOOK_SECRET)
        .await
        .unwrap();

    assert_eq!(outcome.status, RegistrationStatus::AlreadyExists);
    assert_eq!(outcome.status.status_code(), 422);
    assert_eq!(outcome.webhook.id, "2");
    assert!(!outcome.webhook.insecure);
}

#[tokio::test]
async fn test_add_webhook_creates_missing_hook() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/app/hooks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/repos/acme/app/hooks"))
        .and(body_partial_json(json!({
            "events": ["push", "pull_request"],
            "config": {"url": CALLBACK_URL, "secret": WEBHOOK_SECRET, "content_type": "json"}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(hook_json(9, CALLBACK_URL)))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = provider(&server)
        .await
        .add_webhook("acme", "app", CALLBACK_URL, WEBHOOK_SECRET)
        .await
        .unwrap();

    assert_eq!(outcome.status, RegistrationStatus::Created);
    assert_eq!(outcome.webhook.id, "9");
    assert_eq!(outcome.webhook.url, CALLBACK_URL);
    assert!(outcome.webhook.events.contains("push"));
    assert!(outcome.webhook.created_at.is_some());
}

#[tokio::test]
async fn test_add_webhook_ignores_trailing_slash() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/app/hooks"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([hook_json(4, &format!("{CALLBACK_URL}/"))])),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/repos/acme/app/hooks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(hook_json(5, CALLBACK_URL)))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = provider(&server)
        .await
        .add_webhook("acme", "app", CALLBACK_URL, WEBHOOK_SECRET)
        .await
        .unwrap();

    assert_eq!(outcome.status, RegistrationStatus::AlreadyExists);
    assert_eq!(outcome.webhook.id, "4");
}

#[tokio::test]
async fn test_delivery_verifies_with_registration_secret() {
    let server = MockServer::start().await;
    let hook_secret = "per-repo-secret";
    assert_ne!(hook_secret, WEBHOOK_SECRET);

    Mock::given(method("GET"))
        .and(path("/repos/acme/app/hooks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/repos/acme/app/hooks"))
        .and(body_partial_json(json!({"config": {"secret": hook_secret}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(hook_json(9, CALLBACK_URL)))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server).await;
    let outcome = provider
        .add_webhook("acme", "app", CALLBACK_URL, hook_secret)
        .await
        .unwrap();
    assert_eq!(outcome.status, RegistrationStatus::Created);

    // The provider signs deliveries with the secret the hook was created with
    let body = json!({
        "ref": "refs/heads/main",
        "repository": {"ssh_url": "git@github.com:acme/app.git"}
    })
    .to_string();
    let signature = sign_sha256(hook_secret, body.as_bytes()).unwrap();
    let delivery = WebhookDelivery::new("push", "guid-9", body).with_signature(signature);

    let event = provider.get_webhook(&delivery, Some(hook_secret)).unwrap();
    assert_eq!(event.event, EventKind::Push);
    assert_eq!(event.branch, "main");
    assert!(event.verified);

    let event = provider.get_webhook(&delivery, None).unwrap();
    assert!(!event.verified);
}

#[tokio::test]
async fn test_get_repository_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/app"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1296269,
            "name": "app",
            "owner": {"login": "acme"},
            "description": "Deployable app",
            "private": true,
            "ssh_url": "git@github.com:acme/app.git",
            "clone_url": "https://github.com/acme/app.git",
            "default_branch": "main",
            "permissions": {"admin": true, "push": true, "pull": true},
            "language": "Rust",
            "homepage": ""
        })))
        .mount(&server)
        .await;

    let lookup = provider(&server)
        .await
        .get_repository("https://github.com/acme/app.git")
        .await;

    assert!(lookup.is_found());
    assert_eq!(lookup.status_text, "found");
    assert_eq!(lookup.data.id.as_deref(), Some("1296269"));
    assert!(lookup.data.admin);
    assert!(lookup.data.private);
    assert_eq!(lookup.data.homepage, None);
}

#[tokio::test]
async fn test_get_repository_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .mount(&server)
        .await;

    let lookup = provider(&server)
        .await
        .get_repository("git@github.com:acme/missing.git")
        .await;

    assert_eq!(lookup.status, 404);
    assert_eq!(lookup.status_text, "not found");
    assert_eq!(lookup.data.owner, "acme");
    assert_eq!(lookup.data.name, "missing");
    assert!(!lookup.data.admin);
    assert!(!lookup.data.push);
}

#[tokio::test]
async fn test_get_repository_malformed_url_makes_no_request() {
    let server = MockServer::start().await;

    let lookup = provider(&server).await.get_repository("not a url").await;

    assert_eq!(lookup.status, 400);
    assert!(!lookup.data.admin);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_references_survive_tag_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/app/branches"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"name": "main"}, {"name": "dev"}])),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/app/tags"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/app/commits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"sha": "abc123"}])))
        .mount(&server)
        .await;

    let references = provider(&server)
        .await
        .get_references("git@github.com:acme/app.git")
        .await;

    assert_eq!(references.names(), vec!["main", "dev", "abc123"]);
    assert!(references.is_partial());
    assert_eq!(references.failures().len(), 1);
    assert_eq!(references.failures()[0].kind, ReferenceKind::Tag);
    assert_eq!(
        references.of_kind(ReferenceKind::Commit).collect::<Vec<_>>(),
        vec!["abc123"]
    );
}

#[tokio::test]
async fn test_get_retries_transient_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/app/branches"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/app/branches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"name": "main"}])))
        .mount(&server)
        .await;

    let branches = provider(&server)
        .await
        .get_branches("https://github.com/acme/app")
        .await;

    assert_eq!(branches, vec!["main"]);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_post_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/app/hooks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/repos/acme/app/hooks"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = provider(&server)
        .await
        .add_webhook("acme", "app", CALLBACK_URL, WEBHOOK_SECRET)
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Api { status: 503, .. }));
}

#[tokio::test]
async fn test_rate_limit_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", "0"),
        )
        .mount(&server)
        .await;

    let err = provider(&server).await.fetch_repos().await.unwrap_err();
    assert!(matches!(err, ProviderError::RateLimitExceeded(0)));
}

#[tokio::test]
async fn test_list_repos_paginates_ssh_urls() {
    let server = MockServer::start().await;

    let full_page: Vec<_> = (0..100)
        .map(|i| {
            json!({
                "id": i,
                "name": format!("repo{i}"),
                "owner": {"login": "acme"},
                "private": false,
                "ssh_url": format!("git@github.com:acme/repo{i}.git")
            })
        })
        .collect();

    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(full_page))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 100,
            "name": "last",
            "owner": {"login": "acme"},
            "private": true,
            "ssh_url": "git@github.com:acme/last.git"
        }])))
        .mount(&server)
        .await;

    let repos = provider(&server).await.list_repos().await;
    assert_eq!(repos.len(), 101);
    assert_eq!(repos[0], "git@github.com:acme/repo0.git");
    assert_eq!(repos[100], "git@github.com:acme/last.git");
}

#[tokio::test]
async fn test_list_repos_disabled_is_empty() {
    let provider = GithubProvider::new(&ProviderSettings::default()).unwrap();
    assert!(provider.list_repos().await.is_empty());
    assert!(matches!(
        provider.fetch_repos().await,
        Err(ProviderError::Disabled(_))
    ));
    assert!(matches!(
        provider.add_deploy_key("acme", "app").await,
        Err(ProviderError::Disabled(_))
    ));
}

#[tokio::test]
async fn test_add_deploy_key_registers_public_half() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repos/acme/app/keys"))
        .and(body_partial_json(json!({"title": "bot@repolink", "read_only": true})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 42,
            "key": "ssh-ed25519 AAAA",
            "url": "https://api.github.com/repos/acme/app/keys/42",
            "title": "bot@repolink",
            "verified": true,
            "created_at": "2024-02-01T12:00:00Z",
            "read_only": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let registration = provider(&server)
        .await
        .add_deploy_key("acme", "app")
        .await
        .unwrap();

    assert_eq!(registration.id, "42");
    assert!(registration.read_only);
    assert!(registration.verified);
    assert!(registration.keys.public_key.starts_with("ssh-ed25519 "));
    assert!(registration.keys.public_key.ends_with(" bot@repolink"));

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["key"], registration.keys.public_key);
}

#[tokio::test]
async fn test_remove_webhook() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/repos/acme/app/hooks/9"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    provider(&server)
        .await
        .remove_webhook("acme", "app", "9")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_pull_requests() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/app/pulls"))
        .and(query_param("state", "open"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "number": 7,
            "title": "Add feature",
            "state": "open",
            "html_url": "https://github.com/acme/app/pull/7",
            "head": {"ref": "feature-x", "repo": {"ssh_url": "git@github.com:fork/app.git"}},
            "base": {"ref": "main", "repo": {"ssh_url": "git@github.com:acme/app.git"}},
            "user": {"login": "octocat"},
            "created_at": "2024-02-01T12:00:00Z",
            "updated_at": "2024-02-02T12:00:00Z"
        }])))
        .mount(&server)
        .await;

    let pulls = provider(&server)
        .await
        .get_pull_requests("git@github.com:acme/app.git")
        .await;

    assert_eq!(pulls.len(), 1);
    assert_eq!(pulls[0].number, 7);
    assert_eq!(pulls[0].source_branch, "feature-x");
    assert_eq!(pulls[0].target_branch, "main");
    assert_eq!(pulls[0].author.as_deref(), Some("octocat"));
    assert_eq!(pulls[0].ssh_url.as_deref(), Some("git@github.com:fork/app.git"));
}
