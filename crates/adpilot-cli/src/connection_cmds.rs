//! Platform connection commands: `connect`, `accounts`, `select-account`
//! and `disconnect`.

use anyhow::{Context, Result, bail};

use adpilot_core::platform::LinkableAccount;
use adpilot_core::{DisconnectChoice, Workspace};

pub async fn run_connect(workspace: &Workspace) -> Result<()> {
    let state = workspace.connect().await?;
    println!("Platform: {state}");
    if !state.can_publish() {
        println!("Next: run `adpilot accounts` and `adpilot select-account <id>`.");
    }
    Ok(())
}

pub async fn run_accounts(workspace: &Workspace) -> Result<()> {
    let state = workspace.refresh_connection().await?;
    let accounts = workspace.list_accounts().await?;
    if accounts.is_empty() {
        println!("No linkable accounts.");
        return Ok(());
    }

    let selected = state.account().map(|(id, _)| id.to_string());
    for account in &accounts {
        let marker = if selected.as_deref() == Some(account.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{marker} {:<14} {}{}", account.id, account.name, blocked_suffix(account));
    }
    Ok(())
}

fn blocked_suffix(account: &LinkableAccount) -> String {
    if account.is_selectable {
        String::new()
    } else {
        format!(
            "  (not selectable: {})",
            account.block_reason.as_deref().unwrap_or("unknown reason")
        )
    }
}

pub async fn run_select_account(workspace: &Workspace, account_id: &str) -> Result<()> {
    workspace.refresh_connection().await?;
    let accounts = workspace.list_accounts().await?;
    let account = accounts
        .iter()
        .find(|a| a.id == account_id)
        .with_context(|| format!("account {account_id} is not linkable from this connection"))?;

    let state = workspace.select_account(account).await?;
    println!("Platform: {state}");
    Ok(())
}

/// Disconnect from the platform.
///
/// Needs `--yes`. While published campaigns are live, the only way out is
/// `--pause-all`, which pauses them and revokes the connection in one call.
pub async fn run_disconnect(workspace: &Workspace, yes: bool, pause_all: bool) -> Result<()> {
    workspace.refresh_connection().await?;
    let plan = workspace.plan_disconnect().await?;

    if plan.is_blocked() {
        println!("Live campaigns on this account:");
        for campaign in &plan.live_campaigns {
            println!("  {} {} ({})", campaign.id, campaign.name, campaign.status);
        }
        if !pause_all {
            bail!(
                "{} live campaign(s) would keep running; re-run with --pause-all --yes to pause them and disconnect",
                plan.live_campaigns.len()
            );
        }
    }
    if !yes {
        bail!("disconnect requires confirmation; re-run with --yes");
    }

    let choice = if pause_all {
        DisconnectChoice::PauseAllAndDisconnect
    } else {
        DisconnectChoice::Disconnect
    };
    workspace.disconnect(&plan, choice).await?;

    if plan.is_blocked() {
        println!("Paused {} campaign(s).", plan.live_campaigns.len());
    }
    println!("Disconnected.");
    Ok(())
}
