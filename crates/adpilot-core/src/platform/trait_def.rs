//! The `AdPlatform` trait -- the adapter interface for the advertising
//! platform backend.
//!
//! The trait is object-safe so the engine can share one
//! `Arc<dyn AdPlatform>` between the connection manager and every open
//! campaign view.

use async_trait::async_trait;
use uuid::Uuid;

use adpilot_db::models::{AdCopySet, AdGroup, Campaign, StructureDraft};

use super::error::PlatformResult;
use super::types::{
    Analytics, CampaignFilter, CampaignSummary, ConnectionState, LinkableAccount, PublishOutcome,
    ToggleOutcome,
};

/// Operations the engine consumes from the advertising platform.
///
/// Calls are the engine's only suspension points. None of them are assumed
/// idempotent: the engine never retries on its own, and a missing response
/// is reported as [`super::PlatformError::Transport`].
#[async_trait]
pub trait AdPlatform: Send + Sync {
    /// Human-readable name for logs (e.g. "http").
    fn name(&self) -> &str;

    /// Run the OAuth grant. On success the client is connected but has no
    /// account selected.
    async fn connect(&self) -> PlatformResult<()>;

    /// Current connection state as the platform records it.
    async fn fetch_connection(&self) -> PlatformResult<ConnectionState>;

    /// Accounts reachable through the current grant.
    async fn list_linkable_accounts(&self) -> PlatformResult<Vec<LinkableAccount>>;

    /// Persist the selected account.
    async fn select_account(&self, id: &str, name: &str) -> PlatformResult<()>;

    /// Revoke the connection. With `pause_campaigns`, the platform pauses
    /// every live campaign in the same call.
    async fn disconnect(&self, pause_campaigns: bool) -> PlatformResult<()>;

    async fn list_campaigns(&self, filter: &CampaignFilter) -> PlatformResult<Vec<CampaignSummary>>;

    /// Canonical campaign state.
    async fn fetch_campaign(&self, campaign_id: Uuid) -> PlatformResult<Campaign>;

    /// Store the client's campaign (draft edits, lock, lifecycle status).
    async fn save_campaign(&self, campaign: &Campaign) -> PlatformResult<()>;

    /// Generate a full structure draft, optionally steered by feedback.
    async fn generate_draft(
        &self,
        campaign_id: Uuid,
        feedback: Option<&str>,
    ) -> PlatformResult<StructureDraft>;

    /// Generate fresh ad copy for one ad group.
    async fn regenerate_ad_copy(
        &self,
        campaign_id: Uuid,
        ad_group: &AdGroup,
    ) -> PlatformResult<AdCopySet>;

    /// Publish the selected ad groups of the campaign's draft.
    async fn publish_draft(
        &self,
        campaign_id: Uuid,
        target_group_indices: &[usize],
    ) -> PlatformResult<PublishOutcome>;

    async fn set_campaign_enabled(
        &self,
        campaign_id: Uuid,
        enabled: bool,
    ) -> PlatformResult<ToggleOutcome>;

    async fn set_ad_group_enabled(
        &self,
        campaign_id: Uuid,
        ad_group_ref: &str,
        enabled: bool,
    ) -> PlatformResult<ToggleOutcome>;

    async fn fetch_analytics(&self, campaign_id: Uuid) -> PlatformResult<Analytics>;
}

// Compile-time assertion: AdPlatform must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn AdPlatform) {}
};
