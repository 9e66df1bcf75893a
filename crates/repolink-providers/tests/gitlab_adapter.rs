//! GitLab adapter against a mock API.

mod common;

use common::{settings, CALLBACK_URL, TOKEN, WEBHOOK_SECRET};
use repolink_providers::{GitProvider, GitlabProvider, ProviderSettings};
use repolink_types::{ReferenceKind, RegistrationStatus};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn hook_json(id: u64, url: &str) -> serde_json::Value {
    json!({
        "id": id,
        "url": url,
        "project_id": 3,
        "push_events": true,
        "merge_requests_events": true,
        "enable_ssl_verification": true,
        "created_at": "2024-01-15T09:30:00.000Z"
    })
}

async fn provider(server: &MockServer) -> GitlabProvider {
    GitlabProvider::new(&settings(&server.uri())).unwrap()
}

#[tokio::test]
async fn test_add_webhook_is_idempotent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v4/projects/group%2Fapp/hooks"))
        .and(header("private-token", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([hook_json(5, CALLBACK_URL)])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v4/projects/group%2Fapp/hooks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(hook_json(6, CALLBACK_URL)))
        .expect(0)
        .mount(&server)
        .await;

    let provider = provider(&server).await;
    for _ in 0..2 {
        let outcome = provider
            .add_webhook("group", "app", CALLBACK_URL, WEBHOOK_SECRET)
            .await
            .unwrap();
        assert_eq!(outcome.status, RegistrationStatus::AlreadyExists);
        assert_eq!(outcome.webhook.id, "5");
    }
}

#[tokio::test]
async fn test_add_webhook_sends_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v4/projects/group%2Fapp/hooks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v4/projects/group%2Fapp/hooks"))
        .and(body_partial_json(json!({
            "url": CALLBACK_URL,
            "token": WEBHOOK_SECRET,
            "push_events": true,
            "merge_requests_events": true
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(hook_json(6, CALLBACK_URL)))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = provider(&server)
        .await
        .add_webhook("group", "app", CALLBACK_URL, WEBHOOK_SECRET)
        .await
        .unwrap();

    assert_eq!(outcome.status, RegistrationStatus::Created);
    assert_eq!(
        outcome.webhook.events.iter().collect::<Vec<_>>(),
        vec!["merge_requests_events", "push_events"]
    );
}

#[tokio::test]
async fn test_get_repository_access_levels() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v4/projects/group%2Fsub%2Fapp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 3,
            "name": "App",
            "path": "app",
            "namespace": {"full_path": "group/sub"},
            "description": null,
            "visibility": "private",
            "ssh_url_to_repo": "git@gitlab.com:group/sub/app.git",
            "http_url_to_repo": "https://gitlab.com/group/sub/app.git",
            "default_branch": "main",
            "web_url": "https://gitlab.com/group/sub/app",
            "permissions": {
                "project_access": {"access_level": 30},
                "group_access": null
            }
        })))
        .mount(&server)
        .await;

    let lookup = provider(&server)
        .await
        .get_repository("git@gitlab.com:group/sub/app.git")
        .await;

    assert!(lookup.is_found());
    assert_eq!(lookup.data.owner, "group/sub");
    assert_eq!(lookup.data.name, "app");
    assert!(lookup.data.private);
    assert!(lookup.data.push);
    assert!(!lookup.data.admin);
}

#[tokio::test]
async fn test_get_repository_unauthorized() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v4/projects/group%2Fapp"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "401 Unauthorized"})),
        )
        .mount(&server)
        .await;

    let lookup = provider(&server)
        .await
        .get_repository("https://gitlab.com/group/app")
        .await;

    assert_eq!(lookup.status, 401);
    assert_eq!(lookup.status_text, "unauthorized");
    assert!(!lookup.data.admin);
}

#[tokio::test]
async fn test_references_survive_tag_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v4/projects/group%2Fapp/repository/branches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"name": "main"}])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v4/projects/group%2Fapp/repository/tags"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v4/projects/group%2Fapp/repository/commits"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"id": "c1"}, {"id": "c2"}])),
        )
        .mount(&server)
        .await;

    let references = provider(&server)
        .await
        .get_references("git@gitlab.com:group/app.git")
        .await;

    assert_eq!(references.names(), vec!["main", "c1", "c2"]);
    assert_eq!(references.failures()[0].kind, ReferenceKind::Tag);
}

#[tokio::test]
async fn test_merge_requests() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v4/projects/group%2Fapp/merge_requests"))
        .and(query_param("state", "opened"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "iid": 12,
            "title": "Draft: speed up",
            "state": "opened",
            "web_url": "https://gitlab.com/group/app/-/merge_requests/12",
            "source_branch": "perf",
            "target_branch": "main",
            "author": {"username": "dev"},
            "created_at": "2024-03-01T10:00:00.000Z",
            "updated_at": "2024-03-02T10:00:00.000Z"
        }])))
        .mount(&server)
        .await;

    let pulls = provider(&server)
        .await
        .get_pull_requests("https://gitlab.com/group/app.git")
        .await;

    assert_eq!(pulls.len(), 1);
    assert_eq!(pulls[0].number, 12);
    assert_eq!(pulls[0].source_branch, "perf");
    assert_eq!(pulls[0].author.as_deref(), Some("dev"));
}

#[tokio::test]
async fn test_add_deploy_key_read_only() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v4/projects/group%2Fapp/deploy_keys"))
        .and(body_partial_json(json!({"title": "bot@repolink", "can_push": false})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 11,
            "title": "bot@repolink",
            "key": "ssh-ed25519 AAAA",
            "created_at": "2024-03-01T10:00:00.000Z",
            "can_push": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let registration = provider(&server)
        .await
        .add_deploy_key("group", "app")
        .await
        .unwrap();

    assert_eq!(registration.id, "11");
    assert!(registration.read_only);
    assert!(registration.url.ends_with("/api/v4/projects/group%2Fapp/deploy_keys/11"));
    assert!(registration.keys.private_key.contains("OPENSSH PRIVATE KEY"));
}

#[tokio::test]
async fn test_remove_deploy_key() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/v4/projects/group%2Fapp/deploy_keys/11"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    provider(&server)
        .await
        .remove_deploy_key("group", "app", "11")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_list_repos_disabled_is_empty() {
    let provider = GitlabProvider::new(&ProviderSettings::default()).unwrap();
    assert!(provider.list_repos().await.is_empty());
}
