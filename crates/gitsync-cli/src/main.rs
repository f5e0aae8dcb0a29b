mod commands;
mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gitsync::{
    AuditSink, Authorizer, Caller, ConnectionStore, GitRemote, SyncEngine, WorkspaceId,
    WorkspaceStore,
};
use gitsync_github::{GitHubClient, GitHubClientConfig};
use gitsync_store::SqliteStore;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "gitsync")]
#[command(about = "Keep workspaces in sync with a GitHub branch")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an empty workspace owned by the current user
    Init {
        workspace: String,
    },
    /// Replace a workspace's files with the contents of a directory
    Import {
        workspace: String,
        dir: PathBuf,
    },
    /// Write a workspace's files into a directory
    Export {
        workspace: String,
        dir: PathBuf,
    },
    /// Connect a workspace to a GitHub repository
    Connect {
        workspace: String,
        /// Repository as owner/repo
        repo: String,
        /// Branch to sync (defaults to the repository's default branch)
        #[arg(long)]
        branch: Option<String>,
        /// Personal access token (defaults to $GITHUB_TOKEN)
        #[arg(long)]
        token: Option<String>,
    },
    /// Forget a workspace's repository
    Disconnect {
        workspace: String,
    },
    /// Show the stored connection
    Show {
        workspace: String,
    },
    /// Compare the workspace with its branch without changing anything
    Status {
        workspace: String,
    },
    /// Commit the workspace's files to its branch
    Push {
        workspace: String,
        /// Commit message
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Bring branch changes into the workspace
    Pull {
        workspace: String,
    },
    /// List recent pushes and pulls
    History {
        workspace: String,
        /// Number of entries to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn db_path(config: &AppConfig) -> Result<PathBuf> {
    if let Some(path) = &config.database {
        return Ok(path.clone());
    }
    let base = dirs::data_dir().context("could not determine data directory")?;
    let dir = base.join("gitsync");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create data directory: {}", dir.display()))?;
    Ok(dir.join("gitsync.db"))
}

fn build_store(config: &AppConfig) -> Result<Arc<SqliteStore>> {
    let path = db_path(config)?;
    let store = SqliteStore::open(&path)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    Ok(Arc::new(store))
}

fn build_engine(config: &AppConfig, store: &Arc<SqliteStore>) -> SyncEngine {
    let remote = GitHubClient::new(GitHubClientConfig {
        api_base_url: config.api_base_url.clone(),
        user_agent: config.user_agent.clone(),
    });

    SyncEngine::new(
        Arc::new(remote) as Arc<dyn GitRemote>,
        Arc::clone(store) as Arc<dyn ConnectionStore>,
        Arc::clone(store) as Arc<dyn WorkspaceStore>,
        Arc::clone(store) as Arc<dyn Authorizer>,
    )
    .with_audit(Arc::clone(store) as Arc<dyn AuditSink>)
    .with_batch_size(config.batch_size)
}

fn current_caller() -> Caller {
    let name = std::env::var("GITSYNC_CALLER")
        .or_else(|_| std::env::var("USER"))
        .unwrap_or_else(|_| "local".to_owned());
    Caller::new(name)
}

fn github_token() -> Option<String> {
    std::env::var("GITHUB_TOKEN").ok()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = config::load_config();
    let store = build_store(&config)?;
    let caller = current_caller();
    let timeout = Duration::from_secs(config.timeout_secs.max(1));

    match cli.command {
        Command::Init { workspace } => {
            commands::files::init(&store, &WorkspaceId::new(workspace), &caller)
        }
        Command::Import { workspace, dir } => {
            commands::files::import(&store, &caller, &WorkspaceId::new(workspace), &dir).await
        }
        Command::Export { workspace, dir } => {
            commands::files::export(&store, &caller, &WorkspaceId::new(workspace), &dir).await
        }
        Command::Connect {
            workspace,
            repo,
            branch,
            token,
        } => {
            let engine = build_engine(&config, &store);
            let token = token
                .or_else(github_token)
                .context("no token given; pass --token or set GITHUB_TOKEN")?;
            commands::connect::run(
                &engine,
                &caller,
                &WorkspaceId::new(workspace),
                &repo,
                branch,
                token,
            )
            .await
        }
        Command::Disconnect { workspace } => {
            let engine = build_engine(&config, &store);
            commands::connect::disconnect(&engine, &caller, &WorkspaceId::new(workspace)).await
        }
        Command::Show { workspace } => {
            let engine = build_engine(&config, &store);
            commands::connect::show(&engine, &caller, &WorkspaceId::new(workspace)).await
        }
        Command::Status { workspace } => {
            let engine = build_engine(&config, &store);
            commands::status::run(&engine, &caller, &WorkspaceId::new(workspace)).await
        }
        Command::Push { workspace, message } => {
            let engine = build_engine(&config, &store);
            commands::sync::push(
                &engine,
                &store,
                &caller,
                &WorkspaceId::new(workspace),
                message.as_deref(),
                timeout,
            )
            .await
        }
        Command::Pull { workspace } => {
            let engine = build_engine(&config, &store);
            commands::sync::pull(&engine, &caller, &WorkspaceId::new(workspace), timeout).await
        }
        Command::History { workspace, limit } => {
            commands::history::run(&store, &caller, &WorkspaceId::new(workspace), limit).await
        }
    }
}
