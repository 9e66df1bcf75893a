//! Repolink CLI - onboard repositories from git hosting providers.

use clap::{Parser, Subcommand};
use repolink_types::ProviderKind;
use std::path::PathBuf;

mod commands;
mod logging;

use logging::LogFormat;

/// Repolink - deploy keys, webhooks and webhook normalization for GitHub,
/// GitLab, Gitea and Bitbucket
#[derive(Parser, Debug)]
#[command(name = "repolink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// TOML settings file; environment variables override it
    #[arg(short, long, global = true, env = "REPOLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show which providers have credentials
    Providers,

    /// Look up a repository
    Repo {
        /// Provider (github, gitlab, gitea, bitbucket)
        provider: ProviderKind,
        /// Repository URL (SSH or HTTPS)
        url: String,
    },

    /// List repositories visible to the credentials
    Repos {
        /// Provider
        provider: ProviderKind,
    },

    /// List branches
    Branches {
        /// Provider
        provider: ProviderKind,
        /// Repository URL
        url: String,
    },

    /// List branches, tags and commits
    Refs {
        /// Provider
        provider: ProviderKind,
        /// Repository URL
        url: String,
    },

    /// List open pull requests
    Pulls {
        /// Provider
        provider: ProviderKind,
        /// Repository URL
        url: String,
    },

    /// Manage webhooks
    Webhook {
        #[command(subcommand)]
        command: WebhookCommands,
    },

    /// Manage deploy keys
    DeployKey {
        #[command(subcommand)]
        command: DeployKeyCommands,
    },

    /// Register a webhook and a deploy key
    Onboard {
        /// Provider
        provider: ProviderKind,
        /// Repository URL
        url: String,
        /// Callback URL deliveries are sent to
        #[arg(long)]
        callback: String,
        /// Webhook secret (default: REPOLINK_WEBHOOK_SECRET)
        #[arg(long)]
        secret: Option<String>,
        /// Where to write the private key
        #[arg(long)]
        private_key_out: Option<PathBuf>,
    },

    /// Normalize a webhook delivery into the canonical event
    Normalize {
        /// Provider the delivery came from
        provider: ProviderKind,
        /// Provider-native event name (value of the event header)
        #[arg(long)]
        event: String,
        /// Delivery id (value of the delivery header)
        #[arg(long, default_value = "")]
        delivery: String,
        /// Signature or token header value
        #[arg(long)]
        signature: Option<String>,
        /// Secret the hook was registered with (default: REPOLINK_WEBHOOK_SECRET)
        #[arg(long)]
        secret: Option<String>,
        /// File holding the request body, `-` for stdin
        #[arg(default_value = "-")]
        body: String,
    },

    /// Generate a deploy key pair without registering it
    Keygen {
        /// Key comment
        #[arg(long, default_value = repolink_providers::config::DEFAULT_DEPLOY_KEY_TITLE)]
        comment: String,
        /// Where to write the private key (default: stdout)
        #[arg(long)]
        private_key_out: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum WebhookCommands {
    /// Register a webhook unless one already targets the callback URL
    Add {
        /// Provider
        provider: ProviderKind,
        /// Repository URL
        url: String,
        /// Callback URL deliveries are sent to
        #[arg(long)]
        callback: String,
        /// Webhook secret (default: REPOLINK_WEBHOOK_SECRET)
        #[arg(long)]
        secret: Option<String>,
    },

    /// List registered webhooks
    List {
        /// Provider
        provider: ProviderKind,
        /// Repository URL
        url: String,
    },

    /// Delete a webhook
    Remove {
        /// Provider
        provider: ProviderKind,
        /// Repository URL
        url: String,
        /// Webhook id
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum DeployKeyCommands {
    /// Generate and register a read-only deploy key
    Add {
        /// Provider
        provider: ProviderKind,
        /// Repository URL
        url: String,
        /// Where to write the private key
        #[arg(long)]
        private_key_out: Option<PathBuf>,
    },

    /// Delete a deploy key
    Remove {
        /// Provider
        provider: ProviderKind,
        /// Repository URL
        url: String,
        /// Deploy key id
        id: String,
    },
}

async fn run(cli: Cli) -> commands::Result<()> {
    if let Commands::Keygen {
        comment,
        private_key_out,
    } = &cli.command
    {
        return commands::keygen(comment, private_key_out.as_deref());
    }

    let ctx = commands::Context::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Providers => commands::providers(&ctx),
        Commands::Repo { provider, url } => commands::repository(&ctx, provider, &url).await,
        Commands::Repos { provider } => commands::repos(&ctx, provider).await,
        Commands::Branches { provider, url } => commands::branches(&ctx, provider, &url).await,
        Commands::Refs { provider, url } => commands::references(&ctx, provider, &url).await,
        Commands::Pulls { provider, url } => commands::pull_requests(&ctx, provider, &url).await,
        Commands::Webhook { command } => match command {
            WebhookCommands::Add {
                provider,
                url,
                callback,
                secret,
            } => commands::webhook_add(&ctx, provider, &url, &callback, secret.as_deref()).await,
            WebhookCommands::List { provider, url } => {
                commands::webhook_list(&ctx, provider, &url).await
            }
            WebhookCommands::Remove { provider, url, id } => {
                commands::webhook_remove(&ctx, provider, &url, &id).await
            }
        },
        Commands::DeployKey { command } => match command {
            DeployKeyCommands::Add {
                provider,
                url,
                private_key_out,
            } => commands::deploy_key_add(&ctx, provider, &url, private_key_out.as_deref()).await,
            DeployKeyCommands::Remove { provider, url, id } => {
                commands::deploy_key_remove(&ctx, provider, &url, &id).await
            }
        },
        Commands::Onboard {
            provider,
            url,
            callback,
            secret,
            private_key_out,
        } => {
            commands::onboard(
                &ctx,
                provider,
                &url,
                &callback,
                secret.as_deref(),
                private_key_out.as_deref(),
            )
            .await
        }
        Commands::Normalize {
            provider,
            event,
            delivery,
            signature,
            secret,
            body,
        } => commands::normalize(
            &ctx,
            provider,
            &event,
            &delivery,
            signature.as_deref(),
            secret.as_deref(),
            &body,
        ),
        Commands::Keygen { .. } => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::init_logging(logging::level_for(cli.verbose), cli.log_format);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
