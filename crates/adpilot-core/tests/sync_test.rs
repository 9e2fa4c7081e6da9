//! Integration tests for optimistic live toggles: commit, rollback, the
//! pending guard, and reconciliation around pending changes.

use std::sync::Arc;

use adpilot_core::platform::PlatformError;
use adpilot_core::sync::{SyncOutcome, SyncTarget};
use adpilot_core::{CampaignError, CampaignView, ConnectionManager};
use adpilot_db::models::{Campaign, CampaignStatus, ExternalStatus};
use adpilot_test_utils::{StubCall, StubPlatform, fixtures};

fn view_with(stub: StubPlatform, campaign: &Campaign) -> (Arc<StubPlatform>, Arc<CampaignView>) {
    let stub = Arc::new(stub.with_campaign(campaign.clone()));
    let manager = Arc::new(ConnectionManager::with_state(
        stub.clone(),
        fixtures::connected_with_account(),
    ));
    let view = CampaignView::new(campaign.clone(), stub.clone(), manager, None);
    (stub, Arc::new(view))
}

#[tokio::test]
async fn master_toggle_commits_and_pauses_campaign() {
    let campaign = fixtures::active_campaign();
    let (stub, view) = view_with(StubPlatform::new(), &campaign);

    let op = view.toggle_campaign().await.unwrap();

    assert_eq!(op.outcome, SyncOutcome::Committed);
    assert_eq!(op.settled, Some(ExternalStatus::Paused));
    assert_eq!(stub.calls_to(StubCall::SetCampaignEnabled), vec!["enabled=false"]);

    let after = view.campaign().await;
    assert_eq!(after.external_status, Some(ExternalStatus::Paused));
    assert_eq!(after.status, CampaignStatus::Paused);
    assert!(!view.is_pending(&SyncTarget::Campaign).await);

    view.toggle_campaign().await.unwrap();
    assert_eq!(view.campaign().await.status, CampaignStatus::Active);
}

#[tokio::test]
async fn failed_toggle_restores_exact_previous_state() {
    let campaign = fixtures::active_campaign();
    let (stub, view) = view_with(StubPlatform::new(), &campaign);
    stub.fail(StubCall::SetCampaignEnabled, PlatformError::Transport("connection reset".into()));

    let err = view.toggle_campaign().await.unwrap_err();

    assert!(matches!(err, CampaignError::Remote(PlatformError::Transport(_))));
    assert_eq!(view.campaign().await, campaign);
    assert!(!view.is_pending(&SyncTarget::Campaign).await);
}

#[tokio::test]
async fn unknown_status_reads_as_enabled() {
    let mut campaign = fixtures::active_campaign();
    campaign.external_status = None;
    let (stub, view) = view_with(StubPlatform::new(), &campaign);
    stub.fail(StubCall::SetCampaignEnabled, PlatformError::rejected("not now"));

    assert!(view.toggle_campaign().await.is_err());

    assert_eq!(stub.calls_to(StubCall::SetCampaignEnabled), vec!["enabled=false"]);
    assert_eq!(view.campaign().await.external_status, None);
}

#[tokio::test]
async fn second_press_while_pending_is_ignored() {
    let campaign = fixtures::active_campaign();
    let (stub, view) = view_with(StubPlatform::new(), &campaign);
    let gate = stub.gate(StubCall::SetCampaignEnabled);

    let first = {
        let view = Arc::clone(&view);
        tokio::spawn(async move { view.toggle_campaign().await })
    };
    gate.entered().await;

    // The optimistic value is visible while the request is in flight.
    assert_eq!(view.campaign().await.external_status, Some(ExternalStatus::Paused));
    assert!(view.is_pending(&SyncTarget::Campaign).await);

    let err = view.toggle_campaign().await.unwrap_err();
    assert!(matches!(err, CampaignError::TogglePending(SyncTarget::Campaign)));
    assert_eq!(stub.call_count(StubCall::SetCampaignEnabled), 1);

    gate.release();
    let op = first.await.unwrap().unwrap();
    assert_eq!(op.settled, Some(ExternalStatus::Paused));
    assert_eq!(stub.call_count(StubCall::SetCampaignEnabled), 1);
}

#[tokio::test]
async fn toggles_on_different_targets_run_independently() {
    let campaign = fixtures::active_campaign();
    let (stub, view) = view_with(StubPlatform::new(), &campaign);
    let gate = stub.gate(StubCall::SetCampaignEnabled);

    let master = {
        let view = Arc::clone(&view);
        tokio::spawn(async move { view.toggle_campaign().await })
    };
    gate.entered().await;

    view.toggle_ad_group(1).await.unwrap();
    assert_eq!(
        view.campaign().await.ad_groups()[1].ad_copy.status,
        Some(ExternalStatus::Paused)
    );

    gate.release();
    master.await.unwrap().unwrap();
}

#[tokio::test]
async fn unpublished_campaign_cannot_toggle() {
    let campaign = fixtures::approved_campaign();
    let (stub, view) = view_with(StubPlatform::new(), &campaign);

    assert!(matches!(view.toggle_campaign().await, Err(CampaignError::NotPublished)));
    assert!(matches!(view.toggle_ad_group(0).await, Err(CampaignError::NotPublished)));

    assert!(stub.calls().is_empty());
    assert_eq!(view.campaign().await, campaign);
}

#[tokio::test]
async fn ad_group_rollback_leaves_siblings_alone() {
    let campaign = fixtures::active_campaign();
    let (stub, view) = view_with(StubPlatform::new(), &campaign);
    stub.fail(StubCall::SetAdGroupEnabled, PlatformError::rejected("Ad group under review"));

    let err = view.toggle_ad_group(0).await.unwrap_err();

    assert_eq!(err.to_string(), "Ad group under review");
    let group_ref = campaign.ad_groups()[0].id.clone();
    assert_eq!(
        stub.calls_to(StubCall::SetAdGroupEnabled),
        vec![format!("{group_ref} enabled=false")]
    );
    assert_eq!(view.campaign().await, campaign);
}

#[tokio::test]
async fn toggles_are_allowed_while_draft_is_locked() {
    let campaign = fixtures::active_campaign();
    assert!(campaign.draft_lock);
    let (_stub, view) = view_with(StubPlatform::new(), &campaign);

    view.toggle_ad_group(0).await.unwrap();

    assert_eq!(
        view.campaign().await.ad_groups()[0].ad_copy.status,
        Some(ExternalStatus::Paused)
    );
}

#[tokio::test]
async fn platform_confirmed_value_wins() {
    let campaign = fixtures::active_campaign();
    let (_stub, view) = view_with(
        StubPlatform::new().confirm_toggles_as(ExternalStatus::Enabled),
        &campaign,
    );

    let op = view.toggle_campaign().await.unwrap();

    assert_eq!(op.requested, ExternalStatus::Paused);
    assert_eq!(op.settled, Some(ExternalStatus::Enabled));
    let after = view.campaign().await;
    assert_eq!(after.external_status, Some(ExternalStatus::Enabled));
    assert_eq!(after.status, CampaignStatus::Active);
}

#[tokio::test]
async fn refresh_during_pending_toggle_keeps_optimistic_value() {
    let campaign = fixtures::active_campaign();
    let (stub, view) = view_with(StubPlatform::new(), &campaign);
    let gate = stub.gate(StubCall::SetCampaignEnabled);

    let toggling = {
        let view = Arc::clone(&view);
        tokio::spawn(async move { view.toggle_campaign().await })
    };
    gate.entered().await;

    let mut server = stub.stored_campaign(campaign.id).unwrap();
    server.name = "Renamed on server".into();
    stub.insert_campaign(server);

    let report = view.refresh().await.unwrap();
    assert_eq!(report.preserved, vec![SyncTarget::Campaign]);
    let merged = view.campaign().await;
    assert_eq!(merged.name, "Renamed on server");
    assert_eq!(merged.external_status, Some(ExternalStatus::Paused));

    gate.release();
    toggling.await.unwrap().unwrap();
    let settled = view.campaign().await;
    assert_eq!(settled.external_status, Some(ExternalStatus::Paused));
    assert_eq!(settled.name, "Renamed on server");
}
