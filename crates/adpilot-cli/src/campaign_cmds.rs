//! Per-campaign commands: `show`, `create`, the lifecycle transitions,
//! draft edits, toggles and `refresh`.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use adpilot_core::draft::FieldPath;
use adpilot_core::sync::SyncOutcome;
use adpilot_core::{Action, CampaignError, CampaignView, Confirmation, ViewSnapshot, Workspace};
use adpilot_db::models::{Campaign, ExternalStatus};
use adpilot_db::queries::campaigns as cache_db;

/// A draft edit requested on the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftEdit {
    Set { path: String, value: String },
    AddItem { path: String, value: String },
    RemoveItem { path: String, index: usize },
    AddGroup { name: String },
    RemoveGroup { index: usize },
}

fn parse_campaign_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid campaign ID: {raw}"))
}

fn parse_path(raw: &str) -> Result<FieldPath> {
    raw.parse().with_context(|| format!("invalid field path: {raw}"))
}

/// Interpret a command-line value as JSON, falling back to a plain string
/// (`3` is a number, `Drains` a string, `"3"` a string).
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Add the flag hint to confirmation errors.
fn with_confirmation_hint(err: CampaignError) -> anyhow::Error {
    match err {
        CampaignError::ConfirmationRequired(action) => {
            anyhow::anyhow!("{action} requires confirmation; re-run with --yes")
        }
        other => other.into(),
    }
}

async fn open(workspace: &Workspace, id: &str) -> Result<Arc<CampaignView>> {
    let id = parse_campaign_id(id)?;
    let view = workspace
        .open_campaign(id)
        .await
        .with_context(|| format!("failed to open campaign {id}"))?;
    Ok(view)
}

// -----------------------------------------------------------------------
// show / create
// -----------------------------------------------------------------------

/// Show one campaign, or list the cached campaigns when `id` is `None`.
pub async fn run_show(workspace: &Workspace, id: Option<&str>, json: bool) -> Result<()> {
    let Some(id) = id else {
        let pool = workspace.cache().context("no local cache configured")?;
        return list_cached(pool).await;
    };

    let view = open(workspace, id).await?;
    let snapshot = view.snapshot().await;
    if json {
        let out = serde_json::to_string_pretty(&snapshot.campaign)
            .context("failed to serialize campaign")?;
        println!("{out}");
    } else {
        print_snapshot(&snapshot);
    }
    Ok(())
}

async fn list_cached(pool: &SqlitePool) -> Result<()> {
    let rows = cache_db::list_cached_campaigns(pool).await?;
    if rows.is_empty() {
        println!("No cached campaigns.");
        return Ok(());
    }

    println!("{:<36}  {:<10}  {:<19}  NAME", "ID", "STATUS", "CACHED");
    for row in &rows {
        println!(
            "{:<36}  {:<10}  {:<19}  {}",
            row.id,
            row.status,
            row.cached_at.format("%Y-%m-%d %H:%M:%S"),
            row.name
        );
    }
    Ok(())
}

pub async fn run_create(workspace: &Workspace, name: &str, objective: Option<String>) -> Result<()> {
    let mut campaign = Campaign::new(name);
    campaign.settings.objective = objective;
    let view = workspace
        .create_campaign(campaign)
        .await
        .context("failed to create campaign")?;
    println!("Campaign {} created: {}", view.id(), name);
    Ok(())
}

// -----------------------------------------------------------------------
// Lifecycle transitions
// -----------------------------------------------------------------------

pub async fn run_generate(workspace: &Workspace, id: &str, feedback: Option<&str>) -> Result<()> {
    let view = open(workspace, id).await?;
    view.request_generation(feedback).await?;
    let campaign = view.campaign().await;
    println!(
        "Draft generated: {} ad group(s), status {}.",
        campaign.ad_groups().len(),
        campaign.status
    );
    Ok(())
}

pub async fn run_transition(workspace: &Workspace, id: &str, action: Action, yes: bool) -> Result<()> {
    let view = open(workspace, id).await?;
    match action {
        Action::Approve => view.approve().await?,
        Action::Unlock => view.unlock().await?,
        Action::Discard => view
            .discard_draft(Confirmation::from_flag(yes))
            .await
            .map_err(with_confirmation_hint)?,
        Action::Save => view.save().await?,
        Action::Generate | Action::Publish => {
            bail!("{action} is not a plain transition")
        }
    }
    let campaign = view.campaign().await;
    println!(
        "Campaign {}: {} (draft {}).",
        campaign.id,
        campaign.status,
        if campaign.draft_lock { "locked" } else { "unlocked" }
    );
    Ok(())
}

/// Publish the ad groups at `groups`, or every group when empty.
pub async fn run_publish(workspace: &Workspace, id: &str, groups: &[usize], yes: bool) -> Result<()> {
    workspace.refresh_connection().await?;
    let view = open(workspace, id).await?;

    let targets = if groups.is_empty() {
        (0..view.campaign().await.ad_groups().len()).collect()
    } else {
        groups.to_vec()
    };
    view.publish(&targets, Confirmation::from_flag(yes))
        .await
        .map_err(with_confirmation_hint)?;

    let campaign = view.campaign().await;
    println!(
        "Published as {} ({}).",
        campaign.external_resource_id.as_deref().unwrap_or("-"),
        campaign.status
    );
    Ok(())
}

/// Push the locally cached copy of a campaign, including offline edits.
pub async fn run_save(workspace: &Workspace, id: &str) -> Result<()> {
    let campaign_id = parse_campaign_id(id)?;
    let view = workspace
        .open_cached(campaign_id)
        .await
        .with_context(|| format!("campaign {campaign_id} is not in the local cache"))?;
    view.save().await?;
    println!("Campaign {campaign_id} saved.");
    Ok(())
}

// -----------------------------------------------------------------------
// Draft edits
// -----------------------------------------------------------------------

/// Apply `edit` to a campaign's draft.
///
/// By default the campaign is fetched, edited and saved in one go. With
/// `local`, the edit is made to the cached copy only; `adpilot save`
/// pushes it later.
pub async fn run_edit(workspace: &Workspace, id: &str, edit: DraftEdit, local: bool) -> Result<()> {
    let view = if local {
        let campaign_id = parse_campaign_id(id)?;
        workspace
            .open_cached(campaign_id)
            .await
            .with_context(|| format!("campaign {campaign_id} is not in the local cache"))?
    } else {
        open(workspace, id).await?
    };

    match edit {
        DraftEdit::Set { path, value } => {
            let path = parse_path(&path)?;
            view.set_field(&path, parse_value(&value)).await?;
            println!("Set {path}.");
        }
        DraftEdit::AddItem { path, value } => {
            let path = parse_path(&path)?;
            if view.add_list_item(&path, &value).await? {
                println!("Added {value:?} to {path}.");
            } else {
                println!("{path} already contains {value:?}.");
            }
        }
        DraftEdit::RemoveItem { path, index } => {
            let path = parse_path(&path)?;
            let removed = view.remove_list_item(&path, index).await?;
            println!("Removed {removed} from {path}.");
        }
        DraftEdit::AddGroup { name } => {
            let index = view.add_ad_group(&name).await?;
            println!("Added ad group {index}: {name}.");
        }
        DraftEdit::RemoveGroup { index } => {
            view.remove_ad_group(index).await?;
            println!("Removed ad group {index}.");
        }
    }

    if local {
        println!("Edit kept locally; run `adpilot save {id}` to push it.");
    } else {
        view.save().await?;
    }
    Ok(())
}

pub async fn run_regen_copy(workspace: &Workspace, id: &str, index: usize) -> Result<()> {
    let view = open(workspace, id).await?;
    view.regenerate_ad_group_copy(index).await?;
    view.save().await?;

    let campaign = view.campaign().await;
    if let Some(group) = campaign.ad_groups().get(index) {
        println!(
            "Regenerated copy for {}: {} headline(s), {} description(s).",
            group.name,
            group.ad_copy.headlines.len(),
            group.ad_copy.descriptions.len()
        );
    }
    Ok(())
}

// -----------------------------------------------------------------------
// Toggles / refresh
// -----------------------------------------------------------------------

/// Flip the campaign's master switch, or one ad group's with `group`.
pub async fn run_toggle(workspace: &Workspace, id: &str, group: Option<usize>) -> Result<()> {
    let view = open(workspace, id).await?;
    let op = match group {
        Some(index) => view.toggle_ad_group(index).await?,
        None => view.toggle_campaign().await?,
    };

    match (op.outcome, op.settled) {
        (SyncOutcome::Committed, Some(status)) if status != op.requested => {
            println!("{}: platform kept it {status}.", op.target);
        }
        (_, Some(status)) => println!("{}: now {status}.", op.target),
        (_, None) => println!("{}: {}.", op.target, op.outcome),
    }
    Ok(())
}

pub async fn run_refresh(workspace: &Workspace, id: &str) -> Result<()> {
    let view = open(workspace, id).await?;
    let report = view.refresh().await?;
    if report.kept_local_draft {
        println!("Kept unsaved local draft edits.");
    }
    print_snapshot(&view.snapshot().await);
    Ok(())
}

// -----------------------------------------------------------------------
// Output
// -----------------------------------------------------------------------

fn status_label(status: Option<ExternalStatus>) -> String {
    status.map_or_else(|| "-".to_string(), |s| s.to_string())
}

fn print_snapshot(snapshot: &ViewSnapshot) {
    let campaign = &snapshot.campaign;
    println!("Campaign: {} ({})", campaign.name, campaign.id);
    println!("Status: {}", campaign.status);
    println!("Draft: {}", if campaign.draft_lock { "locked" } else { "unlocked" });
    if let Some(external_id) = &campaign.external_resource_id {
        println!(
            "Published: {external_id} [{}]",
            status_label(campaign.external_status)
        );
    }
    if snapshot.stale {
        println!("(showing cached copy; the platform could not be reached)");
    }
    if snapshot.dirty {
        println!("(unsaved local edits)");
    }
    println!("Updated: {}", campaign.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!();

    let groups = campaign.ad_groups();
    if campaign.structure_draft.is_none() {
        println!("No draft.");
    } else if groups.is_empty() {
        println!("Draft has no ad groups.");
    } else {
        println!("Ad groups:");
        for (index, group) in groups.iter().enumerate() {
            println!(
                "  [{index}] {} ({} exact, {} phrase, {} negative keywords; {} headlines) {}",
                group.name,
                group.exact_keywords.len(),
                group.phrase_keywords.len(),
                group.negative_keywords.len(),
                group.ad_copy.headlines.len(),
                status_label(group.ad_copy.status),
            );
        }
    }

    if let Some(analytics) = &snapshot.analytics {
        let overview = &analytics.overview;
        println!();
        println!(
            "Performance: {} impressions, {} clicks, {:.2} conversions, cost {:.2}",
            overview.impressions,
            overview.clicks,
            overview.conversions,
            overview.cost_micros as f64 / 1_000_000.0
        );
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use adpilot_db::models::CampaignStatus;
    use adpilot_test_utils::{StubCall, StubPlatform, create_test_cache, fixtures};

    use super::*;

    async fn workspace(stub: StubPlatform) -> (Arc<StubPlatform>, Workspace) {
        let stub = Arc::new(stub.with_connection(fixtures::connected_with_account()));
        let workspace = Workspace::new(stub.clone(), Some(create_test_cache().await));
        (stub, workspace)
    }

    #[test]
    fn values_parse_as_json_or_string() {
        assert_eq!(parse_value("3"), Value::from(3));
        assert_eq!(parse_value("true"), Value::Bool(true));
        assert_eq!(parse_value("Drains"), Value::String("Drains".into()));
        assert_eq!(parse_value("\"3\""), Value::String("3".into()));
        assert_eq!(parse_value("[\"a\"]"), serde_json::json!(["a"]));
    }

    #[test]
    fn invalid_campaign_id_is_reported() {
        let err = parse_campaign_id("not-a-uuid").unwrap_err();
        assert!(err.to_string().contains("invalid campaign ID"));
    }

    #[tokio::test]
    async fn publish_without_yes_is_refused() {
        let campaign = fixtures::approved_campaign();
        let (stub, workspace) = workspace(StubPlatform::new().with_campaign(campaign.clone())).await;

        let err = run_publish(&workspace, &campaign.id.to_string(), &[], false)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("--yes"), "unexpected error: {err}");
        assert_eq!(stub.call_count(StubCall::PublishDraft), 0);
    }

    #[tokio::test]
    async fn publish_defaults_to_every_group() {
        let campaign = fixtures::approved_campaign();
        let (stub, workspace) = workspace(StubPlatform::new().with_campaign(campaign.clone())).await;

        run_publish(&workspace, &campaign.id.to_string(), &[], true)
            .await
            .unwrap();

        assert_eq!(stub.calls_to(StubCall::PublishDraft), vec!["[0, 1]"]);
        assert_eq!(stub.stored_campaign(campaign.id).unwrap().status, CampaignStatus::Active);
    }

    #[tokio::test]
    async fn edit_fetches_edits_and_saves() {
        let campaign = fixtures::review_campaign();
        let (stub, workspace) = workspace(StubPlatform::new().with_campaign(campaign.clone())).await;
        let edit = DraftEdit::Set {
            path: "adGroups.0.name".into(),
            value: "Burst pipes".into(),
        };

        run_edit(&workspace, &campaign.id.to_string(), edit, false)
            .await
            .unwrap();

        let stored = stub.stored_campaign(campaign.id).unwrap();
        assert_eq!(stored.ad_groups()[0].name, "Burst pipes");
    }

    #[tokio::test]
    async fn local_edit_waits_for_save() {
        let campaign = fixtures::review_campaign();
        let (stub, workspace) = workspace(StubPlatform::new().with_campaign(campaign.clone())).await;
        let id = campaign.id.to_string();
        // Seed the cache.
        drop(open(&workspace, &id).await.unwrap());

        let edit = DraftEdit::AddItem {
            path: "adGroups.1.exactKeywords".into(),
            value: "clogged drain".into(),
        };
        run_edit(&workspace, &id, edit, true).await.unwrap();
        assert_eq!(stub.stored_campaign(campaign.id).unwrap(), campaign);

        run_save(&workspace, &id).await.unwrap();

        let stored = stub.stored_campaign(campaign.id).unwrap();
        assert_eq!(
            stored.ad_groups()[1].exact_keywords,
            vec!["drains".to_string(), "clogged drain".to_string()]
        );
    }

    #[tokio::test]
    async fn edits_on_a_locked_draft_are_rejected() {
        let campaign = fixtures::approved_campaign();
        let (stub, workspace) = workspace(StubPlatform::new().with_campaign(campaign.clone())).await;

        let err = run_edit(
            &workspace,
            &campaign.id.to_string(),
            DraftEdit::AddGroup { name: "Leaks".into() },
            false,
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("locked"), "unexpected error: {err}");
        assert_eq!(stub.call_count(StubCall::SaveCampaign), 0);
    }

    #[tokio::test]
    async fn discard_requires_yes() {
        let campaign = fixtures::review_campaign();
        let (_stub, workspace) = workspace(StubPlatform::new().with_campaign(campaign.clone())).await;
        let id = campaign.id.to_string();

        let err = run_transition(&workspace, &id, Action::Discard, false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--yes"));

        run_transition(&workspace, &id, Action::Discard, true).await.unwrap();
        let view = workspace.open_campaign(campaign.id).await.unwrap();
        assert_eq!(view.campaign().await.status, CampaignStatus::Planning);
    }

    #[tokio::test]
    async fn toggle_reports_the_platform_error() {
        let campaign = fixtures::active_campaign();
        let (stub, workspace) = workspace(StubPlatform::new().with_campaign(campaign.clone())).await;
        stub.fail(
            StubCall::SetCampaignEnabled,
            adpilot_core::PlatformError::rejected("Billing is not set up"),
        );

        let err = run_toggle(&workspace, &campaign.id.to_string(), None)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Billing is not set up");
    }
}
