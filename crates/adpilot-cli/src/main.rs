mod campaign_cmds;
mod config;
mod connection_cmds;

use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};

use adpilot_core::{Action, HttpPlatform, Workspace};
use adpilot_db::pool;

use campaign_cmds::DraftEdit;
use config::{AdpilotConfig, CliOverrides};

#[derive(Parser)]
#[command(name = "adpilot", about = "Review, approve and publish AI-drafted ad campaigns")]
struct Cli {
    /// Platform API root (overrides ADPILOT_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Platform access token (overrides ADPILOT_ACCESS_TOKEN)
    #[arg(long, global = true)]
    access_token: Option<String>,

    /// Local cache URL (overrides ADPILOT_CACHE_URL)
    #[arg(long, global = true)]
    cache_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn overrides(&self) -> CliOverrides<'_> {
        CliOverrides {
            api_url: self.api_url.as_deref(),
            access_token: self.access_token.as_deref(),
            cache_url: self.cache_url.as_deref(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write an adpilot config file from the global flags
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Show a campaign (omit the ID to list cached campaigns)
    Show {
        /// Campaign ID
        campaign_id: Option<String>,
        /// Print the campaign as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a campaign in planning
    Create {
        /// Campaign name
        name: String,
        /// Campaign objective (e.g. "phone calls")
        #[arg(long)]
        objective: Option<String>,
    },
    /// Request a generated draft (planning, review or error)
    Generate {
        campaign_id: String,
        /// Feedback for the generator when regenerating
        #[arg(long)]
        feedback: Option<String>,
    },
    /// Approve the draft and lock it against edits
    Approve { campaign_id: String },
    /// Unlock an approved draft and return it to review
    Unlock { campaign_id: String },
    /// Publish an approved draft to the advertising platform
    Publish {
        campaign_id: String,
        /// Comma-separated ad group indices (default: all)
        #[arg(long, value_delimiter = ',')]
        groups: Vec<usize>,
        /// Confirm publishing
        #[arg(long)]
        yes: bool,
    },
    /// Discard the draft and return to planning
    Discard {
        campaign_id: String,
        /// Confirm discarding
        #[arg(long)]
        yes: bool,
    },
    /// Set a draft field by dotted path (e.g. adGroups.0.name)
    Set {
        campaign_id: String,
        path: String,
        /// JSON value, or a plain string
        value: String,
        /// Edit the cached copy only
        #[arg(long)]
        local: bool,
    },
    /// Add an item to a draft list (case-insensitive dedupe)
    AddItem {
        campaign_id: String,
        path: String,
        value: String,
        /// Edit the cached copy only
        #[arg(long)]
        local: bool,
    },
    /// Remove an item from a draft list by index
    RemoveItem {
        campaign_id: String,
        path: String,
        index: usize,
        /// Edit the cached copy only
        #[arg(long)]
        local: bool,
    },
    /// Add an empty ad group
    AddGroup {
        campaign_id: String,
        name: String,
        /// Edit the cached copy only
        #[arg(long)]
        local: bool,
    },
    /// Remove an ad group by index
    RemoveGroup {
        campaign_id: String,
        index: usize,
        /// Edit the cached copy only
        #[arg(long)]
        local: bool,
    },
    /// Regenerate the ad copy of one ad group
    RegenCopy { campaign_id: String, index: usize },
    /// Push the cached copy of a campaign, including local edits
    Save { campaign_id: String },
    /// Enable or pause a published campaign (or one ad group)
    Toggle {
        campaign_id: String,
        /// Ad group index; omit for the campaign's master switch
        #[arg(long)]
        group: Option<usize>,
    },
    /// Re-read a campaign and its analytics from the platform
    Refresh { campaign_id: String },
    /// Connect to the advertising platform
    Connect,
    /// List linkable advertising accounts
    Accounts,
    /// Select the advertising account to publish to
    SelectAccount { account_id: String },
    /// Disconnect from the advertising platform
    Disconnect {
        /// Confirm disconnecting
        #[arg(long)]
        yes: bool,
        /// Pause every live campaign as part of the disconnect
        #[arg(long)]
        pause_all: bool,
    },
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Execute the `adpilot init` command: write config file.
fn cmd_init(cli: CliOverrides<'_>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let mut cfg = config::ConfigFile::default();
    if let Some(url) = cli.api_url {
        cfg.platform.api_url = url.to_string();
    }
    cfg.platform.access_token = cli.access_token.map(str::to_string);
    if let Some(url) = cli.cache_url {
        cfg.cache.url = url.to_string();
    }

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  platform.api_url = {}", cfg.platform.api_url);
    println!(
        "  platform.access_token = {}",
        if cfg.platform.access_token.is_some() { "(set)" } else { "(unset)" }
    );
    println!("  cache.url = {}", cfg.cache.url);
    println!();
    println!("Next: run `adpilot connect`.");

    Ok(())
}

/// Build the workspace for a command: platform client plus local cache.
async fn open_workspace(resolved: &AdpilotConfig) -> anyhow::Result<Workspace> {
    tracing::debug!(
        api_url = %resolved.platform.base_url,
        cache_url = %resolved.cache.database_url,
        "opening workspace"
    );
    let platform = HttpPlatform::new(resolved.platform.clone())
        .context("failed to create platform client")?;
    let cache = pool::open_cache(&resolved.cache).await?;
    Ok(Workspace::new(Arc::new(platform), Some(cache)))
}

async fn run(command: Commands, workspace: &Workspace) -> anyhow::Result<()> {
    match command {
        Commands::Show { campaign_id, json } => {
            campaign_cmds::run_show(workspace, campaign_id.as_deref(), json).await
        }
        Commands::Create { name, objective } => {
            campaign_cmds::run_create(workspace, &name, objective).await
        }
        Commands::Generate {
            campaign_id,
            feedback,
        } => campaign_cmds::run_generate(workspace, &campaign_id, feedback.as_deref()).await,
        Commands::Approve { campaign_id } => {
            campaign_cmds::run_transition(workspace, &campaign_id, Action::Approve, false).await
        }
        Commands::Unlock { campaign_id } => {
            campaign_cmds::run_transition(workspace, &campaign_id, Action::Unlock, false).await
        }
        Commands::Publish {
            campaign_id,
            groups,
            yes,
        } => campaign_cmds::run_publish(workspace, &campaign_id, &groups, yes).await,
        Commands::Discard { campaign_id, yes } => {
            campaign_cmds::run_transition(workspace, &campaign_id, Action::Discard, yes).await
        }
        Commands::Set {
            campaign_id,
            path,
            value,
            local,
        } => {
            let edit = DraftEdit::Set { path, value };
            campaign_cmds::run_edit(workspace, &campaign_id, edit, local).await
        }
        Commands::AddItem {
            campaign_id,
            path,
            value,
            local,
        } => {
            let edit = DraftEdit::AddItem { path, value };
            campaign_cmds::run_edit(workspace, &campaign_id, edit, local).await
        }
        Commands::RemoveItem {
            campaign_id,
            path,
            index,
            local,
        } => {
            let edit = DraftEdit::RemoveItem { path, index };
            campaign_cmds::run_edit(workspace, &campaign_id, edit, local).await
        }
        Commands::AddGroup {
            campaign_id,
            name,
            local,
        } => {
            let edit = DraftEdit::AddGroup { name };
            campaign_cmds::run_edit(workspace, &campaign_id, edit, local).await
        }
        Commands::RemoveGroup {
            campaign_id,
            index,
            local,
        } => {
            let edit = DraftEdit::RemoveGroup { index };
            campaign_cmds::run_edit(workspace, &campaign_id, edit, local).await
        }
        Commands::RegenCopy { campaign_id, index } => {
            campaign_cmds::run_regen_copy(workspace, &campaign_id, index).await
        }
        Commands::Save { campaign_id } => campaign_cmds::run_save(workspace, &campaign_id).await,
        Commands::Toggle { campaign_id, group } => {
            campaign_cmds::run_toggle(workspace, &campaign_id, group).await
        }
        Commands::Refresh { campaign_id } => {
            campaign_cmds::run_refresh(workspace, &campaign_id).await
        }
        Commands::Connect => connection_cmds::run_connect(workspace).await,
        Commands::Accounts => connection_cmds::run_accounts(workspace).await,
        Commands::SelectAccount { account_id } => {
            connection_cmds::run_select_account(workspace, &account_id).await
        }
        Commands::Disconnect { yes, pause_all } => {
            connection_cmds::run_disconnect(workspace, yes, pause_all).await
        }
        // Handled in `main` without a workspace.
        Commands::Init { .. } | Commands::Completions { .. } => Ok(()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            cmd_init(cli.overrides(), force)?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "adpilot", &mut std::io::stdout());
        }
        _ => {
            let resolved = AdpilotConfig::resolve(cli.overrides())?;
            let workspace = open_workspace(&resolved).await?;
            let result = run(cli.command, &workspace).await;
            if let Some(cache) = workspace.cache() {
                cache.close().await;
            }
            if let Err(e) = result {
                eprintln!("{e:#}");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
