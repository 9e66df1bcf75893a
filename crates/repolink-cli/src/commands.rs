//! CLI command implementations.

use repolink_providers::{
    generate_deploy_key, GitProvider, NormalizeError, ProviderError, ProviderRegistry,
    ProviderSettings,
};
use repolink_types::{parse_repo, MalformedUrl, ProviderKind, RepoCoordinates, WebhookDelivery};
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// CLI errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    MalformedUrl(#[from] MalformedUrl),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} provider is not registered")]
    NotRegistered(ProviderKind),

    #[error("no webhook secret: pass --secret or set REPOLINK_WEBHOOK_SECRET")]
    MissingSecret,
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Configured providers and the settings they were built from.
pub struct Context {
    settings: ProviderSettings,
    registry: ProviderRegistry,
}

impl Context {
    /// Load settings from `config` (if any) and the environment.
    pub fn load(config: Option<&Path>) -> Result<Self> {
        let settings = ProviderSettings::load(config)?;
        let registry = ProviderRegistry::from_settings(&settings)?;
        Ok(Self { settings, registry })
    }

    fn provider(&self, kind: ProviderKind) -> Result<Arc<dyn GitProvider>> {
        self.registry.get(kind).ok_or(CliError::NotRegistered(kind))
    }

    fn secret(&self, explicit: Option<&str>) -> Result<String> {
        explicit
            .map(str::to_string)
            .or_else(|| self.settings.webhook_secret.clone())
            .ok_or(CliError::MissingSecret)
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct ProviderStatus {
    provider: ProviderKind,
    enabled: bool,
}

/// Show which providers have credentials.
pub fn providers(ctx: &Context) -> Result<()> {
    let statuses: Vec<ProviderStatus> = ProviderKind::ALL
        .into_iter()
        .map(|provider| ProviderStatus {
            provider,
            enabled: ctx
                .registry
                .get(provider)
                .is_some_and(|p| p.is_enabled()),
        })
        .collect();
    print_json(&statuses)
}

/// Look up a repository.
pub async fn repository(ctx: &Context, kind: ProviderKind, url: &str) -> Result<()> {
    let lookup = ctx.provider(kind)?.get_repository(url).await;
    print_json(&lookup)
}

/// List repositories visible to the credentials.
pub async fn repos(ctx: &Context, kind: ProviderKind) -> Result<()> {
    let repos = ctx.provider(kind)?.fetch_repos().await?;
    print_json(&repos)
}

/// List branches.
pub async fn branches(ctx: &Context, kind: ProviderKind, url: &str) -> Result<()> {
    let coords = parse_repo(url)?;
    let branches = ctx.provider(kind)?.fetch_branches(&coords).await?;
    print_json(&branches)
}

/// List branches, tags and commits.
pub async fn references(ctx: &Context, kind: ProviderKind, url: &str) -> Result<()> {
    let references = ctx.provider(kind)?.get_references(url).await;
    for failure in references.failures() {
        tracing::warn!(kind = %failure.kind, error = %failure.message, "Listing failed");
    }
    print_json(&references)
}

/// List open pull requests.
pub async fn pull_requests(ctx: &Context, kind: ProviderKind, url: &str) -> Result<()> {
    let coords = parse_repo(url)?;
    let pulls = ctx.provider(kind)?.fetch_pull_requests(&coords).await?;
    print_json(&pulls)
}

/// Register a webhook unless one already targets `callback`.
pub async fn webhook_add(
    ctx: &Context,
    kind: ProviderKind,
    url: &str,
    callback: &str,
    secret: Option<&str>,
) -> Result<()> {
    let RepoCoordinates { owner, name } = parse_repo(url)?;
    let secret = ctx.secret(secret)?;
    let outcome = ctx
        .provider(kind)?
        .add_webhook(&owner, &name, callback, &secret)
        .await?;
    print_json(&outcome)
}

/// List registered webhooks.
pub async fn webhook_list(ctx: &Context, kind: ProviderKind, url: &str) -> Result<()> {
    let RepoCoordinates { owner, name } = parse_repo(url)?;
    let hooks = ctx.provider(kind)?.list_webhooks(&owner, &name).await?;
    print_json(&hooks)
}

/// Delete a webhook.
pub async fn webhook_remove(ctx: &Context, kind: ProviderKind, url: &str, id: &str) -> Result<()> {
    let RepoCoordinates { owner, name } = parse_repo(url)?;
    ctx.provider(kind)?.remove_webhook(&owner, &name, id).await?;
    println!("Removed webhook {id} from {owner}/{name}");
    Ok(())
}

/// Generate and register a deploy key.
///
/// The private key is written to `private_key_out` when given and is
/// never printed.
pub async fn deploy_key_add(
    ctx: &Context,
    kind: ProviderKind,
    url: &str,
    private_key_out: Option<&Path>,
) -> Result<()> {
    let RepoCoordinates { owner, name } = parse_repo(url)?;
    let registration = ctx.provider(kind)?.add_deploy_key(&owner, &name).await?;

    if let Some(path) = private_key_out {
        write_private_key(path, &registration.keys.private_key)?;
        eprintln!("Private key saved to: {}", path.display());
    }

    print_json(&serde_json::json!({
        "id": registration.id,
        "title": registration.title,
        "verified": registration.verified,
        "read_only": registration.read_only,
        "created_at": registration.created_at,
        "url": registration.url,
        "public_key": registration.keys.public_key,
        "fingerprint": registration.keys.fingerprint,
    }))
}

/// Delete a deploy key.
pub async fn deploy_key_remove(
    ctx: &Context,
    kind: ProviderKind,
    url: &str,
    id: &str,
) -> Result<()> {
    let RepoCoordinates { owner, name } = parse_repo(url)?;
    ctx.provider(kind)?.remove_deploy_key(&owner, &name, id).await?;
    println!("Removed deploy key {id} from {owner}/{name}");
    Ok(())
}

/// Register a webhook and a deploy key for a repository.
pub async fn onboard(
    ctx: &Context,
    kind: ProviderKind,
    url: &str,
    callback: &str,
    secret: Option<&str>,
    private_key_out: Option<&Path>,
) -> Result<()> {
    let provider = ctx.provider(kind)?;

    let lookup = provider.get_repository(url).await;
    if !lookup.is_found() {
        return Err(CliError::Provider(ProviderError::Api {
            status: lookup.status,
            message: format!("repository lookup failed: {}", lookup.status_text),
        }));
    }
    if !lookup.data.admin {
        tracing::warn!(%url, "Credentials lack admin rights; registration may be rejected");
    }

    webhook_add(ctx, kind, url, callback, secret).await?;
    deploy_key_add(ctx, kind, url, private_key_out).await
}

/// Normalize a webhook delivery read from `body_path` (`-` for stdin).
///
/// `secret` overrides the configured webhook secret for hooks registered
/// with their own.
pub fn normalize(
    ctx: &Context,
    kind: ProviderKind,
    event: &str,
    delivery_id: &str,
    signature: Option<&str>,
    secret: Option<&str>,
    body_path: &str,
) -> Result<()> {
    let body = read_body(body_path)?;
    let mut delivery = WebhookDelivery::new(event, delivery_id, body);
    if let Some(signature) = signature {
        delivery = delivery.with_signature(signature);
    }

    let event = ctx.provider(kind)?.get_webhook(&delivery, secret)?;
    print_json(&event)
}

/// Generate a key pair locally without registering it.
pub fn keygen(comment: &str, private_key_out: Option<&Path>) -> Result<()> {
    let keys = generate_deploy_key(comment);
    match private_key_out {
        Some(path) => {
            write_private_key(path, &keys.private_key)?;
            eprintln!("Private key saved to: {}", path.display());
        }
        None => print!("{}", keys.private_key),
    }
    println!("{}", keys.public_key);
    println!("{}", keys.fingerprint);
    Ok(())
}

fn read_body(path: &str) -> Result<String> {
    if path == "-" {
        let mut body = String::new();
        std::io::stdin().read_to_string(&mut body)?;
        Ok(body)
    } else {
        Ok(std::fs::read_to_string(path)?)
    }
}

fn write_private_key(path: &Path, private_key: &str) -> Result<()> {
    use std::io::Write;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(private_key.as_bytes())?;
    Ok(())
}
