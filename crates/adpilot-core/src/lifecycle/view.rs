//! The per-campaign view.
//!
//! A [`CampaignView`] owns the client's copy of one campaign and runs every
//! user-driven operation against it: lifecycle transitions, draft edits,
//! optimistic toggles, and reconciliation with the platform.
//!
//! State lives behind a `tokio::sync::RwLock` that is never held across a
//! platform call. Each operation takes the lock to validate and stage its
//! change, releases it for the remote round-trip, then re-takes it to
//! settle. Only one status-changing transition runs at a time per view;
//! toggles are tracked per target in [`PendingSyncs`].

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use adpilot_db::models::{Campaign, CampaignStatus, ExternalStatus};
use adpilot_db::queries::campaigns as cache_db;

use crate::connection::ConnectionManager;
use crate::draft::{self, FieldPath};
use crate::platform::{AdPlatform, Analytics, PlatformError};
use crate::reconcile::{self, MergeReport};
use crate::sync::{PendingSyncs, SyncOperation, SyncTarget};

use super::{Action, CampaignError, CampaignStateMachine, Confirmation};

#[derive(Debug)]
struct ViewState {
    campaign: Campaign,
    analytics: Option<Analytics>,
    /// The status-changing transition awaiting the platform, if any.
    in_flight: Option<Action>,
    pending: PendingSyncs,
    /// Local draft edits not yet saved to the platform.
    dirty: bool,
    /// Seeded from the cache because the platform could not be reached.
    stale: bool,
}

/// Point-in-time copy of a view, for rendering.
#[derive(Debug, Clone)]
pub struct ViewSnapshot {
    pub campaign: Campaign,
    pub analytics: Option<Analytics>,
    pub in_flight: Option<Action>,
    pub pending: Vec<SyncOperation>,
    pub dirty: bool,
    pub stale: bool,
}

/// Client-side state and operations for one campaign.
pub struct CampaignView {
    id: Uuid,
    platform: Arc<dyn AdPlatform>,
    connection: Arc<ConnectionManager>,
    cache: Option<SqlitePool>,
    state: RwLock<ViewState>,
}

impl CampaignView {
    /// Wrap an already-loaded campaign.
    pub fn new(
        campaign: Campaign,
        platform: Arc<dyn AdPlatform>,
        connection: Arc<ConnectionManager>,
        cache: Option<SqlitePool>,
    ) -> Self {
        Self {
            id: campaign.id,
            platform,
            connection,
            cache,
            state: RwLock::new(ViewState {
                campaign,
                analytics: None,
                in_flight: None,
                pending: PendingSyncs::new(),
                dirty: false,
                stale: false,
            }),
        }
    }

    /// Wrap a campaign read from the local cache without contacting the
    /// platform. The view is stale, and dirty so that its draft is pushed
    /// by [`CampaignView::save`] and kept by [`CampaignView::refresh`].
    pub fn from_cache(
        campaign: Campaign,
        platform: Arc<dyn AdPlatform>,
        connection: Arc<ConnectionManager>,
        cache: Option<SqlitePool>,
    ) -> Self {
        let mut view = Self::new(campaign, platform, connection, cache);
        let state = view.state.get_mut();
        state.stale = true;
        state.dirty = true;
        view
    }

    /// Load campaign `id`.
    ///
    /// The platform's copy wins whenever it can be fetched. The local cache
    /// is only a fallback: when the fetch fails and a cached copy exists,
    /// the view opens on it and is marked stale.
    pub async fn open(
        id: Uuid,
        platform: Arc<dyn AdPlatform>,
        connection: Arc<ConnectionManager>,
        cache: Option<SqlitePool>,
    ) -> Result<Self, CampaignError> {
        let seed = match &cache {
            Some(pool) => cache_db::get_campaign(pool, id).await.unwrap_or_else(|e| {
                warn!(campaign_id = %id, error = %e, "failed to read campaign cache");
                None
            }),
            None => None,
        };

        match platform.fetch_campaign(id).await {
            Ok(campaign) => {
                let view = Self::new(campaign, platform, connection, cache);
                let snapshot = view.campaign().await;
                view.write_cache(&snapshot).await;
                Ok(view)
            }
            Err(err) => {
                let Some(seed) = seed else {
                    warn!(campaign_id = %id, error = %err, "failed to load campaign");
                    return Err(err.into());
                };
                warn!(
                    campaign_id = %id,
                    error = %err,
                    transport = err.is_transport(),
                    "platform unavailable; opening cached campaign"
                );
                let view = Self::new(seed, platform, connection, cache);
                view.state.write().await.stale = true;
                Ok(view)
            }
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn campaign(&self) -> Campaign {
        self.state.read().await.campaign.clone()
    }

    pub async fn snapshot(&self) -> ViewSnapshot {
        let state = self.state.read().await;
        ViewSnapshot {
            campaign: state.campaign.clone(),
            analytics: state.analytics.clone(),
            in_flight: state.in_flight,
            pending: state
                .pending
                .targets()
                .filter_map(|t| state.pending.get(t).cloned())
                .collect(),
            dirty: state.dirty,
            stale: state.stale,
        }
    }

    pub async fn is_pending(&self, target: &SyncTarget) -> bool {
        self.state.read().await.pending.is_pending(target)
    }

    pub async fn is_dirty(&self) -> bool {
        self.state.read().await.dirty
    }

    // -----------------------------------------------------------------------
    // Lifecycle transitions
    // -----------------------------------------------------------------------

    /// Ask the platform for a new structure draft, optionally steered by
    /// `feedback`. On success the draft is replaced and the campaign moves
    /// to `review`.
    pub async fn request_generation(&self, feedback: Option<&str>) -> Result<(), CampaignError> {
        self.begin(Action::Generate).await?;
        info!(campaign_id = %self.id, has_feedback = feedback.is_some(), "requesting draft generation");

        let result = self.platform.generate_draft(self.id, feedback).await;

        let mut state = self.state.write().await;
        state.in_flight = None;
        let mut draft = result.map_err(|e| self.remote_failure(Action::Generate, e))?;
        draft::assign_missing_ids(&mut draft);
        state.campaign.structure_draft = Some(draft);
        state.campaign.status = CampaignStatus::Review;
        state.dirty = false;
        let snapshot = state.campaign.clone();
        drop(state);

        info!(campaign_id = %self.id, ad_groups = snapshot.ad_groups().len(), "draft generated");
        self.write_cache(&snapshot).await;
        Ok(())
    }

    /// Lock the draft and move `review -> approved`.
    pub async fn approve(&self) -> Result<(), CampaignError> {
        self.persist_transition(Action::Approve, |c| {
            c.draft_lock = true;
            c.status = CampaignStatus::Approved;
        })
        .await
    }

    /// Release the lock and return to `review`. Allowed from `approved`,
    /// `active` and `paused`; a published campaign keeps running.
    pub async fn unlock(&self) -> Result<(), CampaignError> {
        self.persist_transition(Action::Unlock, |c| {
            c.draft_lock = false;
            c.status = CampaignStatus::Review;
        })
        .await
    }

    /// Throw the draft away and return to `planning`.
    pub async fn discard_draft(&self, confirmation: Confirmation) -> Result<(), CampaignError> {
        if confirmation != Confirmation::Confirmed {
            return Err(CampaignError::ConfirmationRequired(Action::Discard));
        }
        self.persist_transition(Action::Discard, |c| {
            c.structure_draft = None;
            c.draft_lock = false;
            c.status = CampaignStatus::Planning;
        })
        .await
    }

    /// Push the local campaign, including unsaved draft edits.
    pub async fn save(&self) -> Result<(), CampaignError> {
        self.persist_transition(Action::Save, |_| {}).await
    }

    /// Publish the ad groups at `targets` to the platform.
    ///
    /// Requires an approved (locked) draft, a selected account and an
    /// explicit confirmation. Targets must be distinct, in range and not
    /// empty. On success the campaign is `active` with an external id, and
    /// the view is refreshed from the platform.
    pub async fn publish(
        &self,
        targets: &[usize],
        confirmation: Confirmation,
    ) -> Result<(), CampaignError> {
        if confirmation != Confirmation::Confirmed {
            return Err(CampaignError::ConfirmationRequired(Action::Publish));
        }

        {
            let mut state = self.state.write().await;
            if let Some(current) = state.in_flight {
                return Err(CampaignError::TransitionInFlight(current));
            }
            CampaignStateMachine::check(Action::Publish, &state.campaign, &self.connection.state())?;
            validate_targets(targets, state.campaign.ad_groups().len())?;
            state.in_flight = Some(Action::Publish);
        }

        info!(campaign_id = %self.id, targets = ?targets, "publishing campaign");
        let result = self.platform.publish_draft(self.id, targets).await;

        let mut state = self.state.write().await;
        state.in_flight = None;
        let outcome = result.map_err(|e| self.remote_failure(Action::Publish, e))?;

        let campaign = &mut state.campaign;
        campaign.external_resource_id = Some(outcome.external_resource_id.clone());
        campaign.external_status = Some(outcome.external_status.unwrap_or(ExternalStatus::Enabled));
        campaign.status = CampaignStatus::Active;
        if let Some(mut normalized) = outcome.normalized_structure {
            draft::assign_missing_ids(&mut normalized);
            campaign.structure_draft = Some(normalized);
            state.dirty = false;
        }
        let snapshot = state.campaign.clone();
        drop(state);

        info!(
            campaign_id = %self.id,
            external_resource_id = %outcome.external_resource_id,
            "campaign published"
        );
        self.write_cache(&snapshot).await;
        self.refresh_quietly("publish").await;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Draft edits
    // -----------------------------------------------------------------------

    /// Assign `value` at `path` in the draft.
    pub async fn set_field(&self, path: &FieldPath, value: Value) -> Result<(), CampaignError> {
        self.edit(|c| draft::set_field(c, path, value)).await
    }

    /// Append `value` to the list at `path`. Returns whether it was inserted
    /// (case-insensitive duplicates are skipped).
    pub async fn add_list_item(&self, path: &FieldPath, value: &str) -> Result<bool, CampaignError> {
        self.edit(|c| draft::add_list_item(c, path, value)).await
    }

    pub async fn remove_list_item(&self, path: &FieldPath, index: usize) -> Result<Value, CampaignError> {
        self.edit(|c| draft::remove_list_item(c, path, index)).await
    }

    /// Add an empty ad group. Returns its index.
    pub async fn add_ad_group(&self, name: &str) -> Result<usize, CampaignError> {
        self.edit(|c| draft::add_ad_group(c, name)).await
    }

    pub async fn remove_ad_group(&self, index: usize) -> Result<(), CampaignError> {
        self.edit(|c| draft::remove_ad_group(c, index).map(|_| ())).await
    }

    /// Replace the ad copy of the group at `index` with freshly generated
    /// copy. Keywords and sibling groups are untouched; on failure the
    /// previous copy is kept.
    pub async fn regenerate_ad_group_copy(&self, index: usize) -> Result<(), CampaignError> {
        let group = {
            let state = self.state.read().await;
            draft::ensure_editable(&state.campaign)?;
            draft::ad_group(&state.campaign, index)?.clone()
        };

        info!(campaign_id = %self.id, ad_group = %group.id, "regenerating ad copy");
        let copy = self
            .platform
            .regenerate_ad_copy(self.id, &group)
            .await
            .map_err(|e| {
                warn!(
                    campaign_id = %self.id,
                    ad_group = %group.id,
                    error = %e,
                    transport = e.is_transport(),
                    "ad copy regeneration failed"
                );
                CampaignError::from(e)
            })?;

        self.edit(|c| draft::replace_ad_copy(c, &group.id, copy)).await
    }

    /// Apply a synchronous draft edit, mark the view dirty and cache it.
    async fn edit<T>(
        &self,
        apply: impl FnOnce(&mut Campaign) -> Result<T, draft::DraftError>,
    ) -> Result<T, CampaignError> {
        let mut state = self.state.write().await;
        let output = apply(&mut state.campaign)?;
        state.dirty = true;
        let snapshot = state.campaign.clone();
        drop(state);

        self.write_cache(&snapshot).await;
        Ok(output)
    }

    // -----------------------------------------------------------------------
    // Live toggles
    // -----------------------------------------------------------------------

    /// Flip the campaign's master switch.
    ///
    /// The new value is shown immediately and confirmed or rolled back when
    /// the platform answers. A second press while one is pending is refused
    /// with [`CampaignError::TogglePending`]. On commit the lifecycle status
    /// follows the switch (`active` / `paused`).
    pub async fn toggle_campaign(&self) -> Result<SyncOperation, CampaignError> {
        self.toggle(None).await
    }

    /// Flip the enablement of the ad group at `index`.
    pub async fn toggle_ad_group(&self, index: usize) -> Result<SyncOperation, CampaignError> {
        self.toggle(Some(index)).await
    }

    async fn toggle(&self, group_index: Option<usize>) -> Result<SyncOperation, CampaignError> {
        let op = {
            let mut state = self.state.write().await;
            if !state.campaign.is_published() {
                return Err(CampaignError::NotPublished);
            }
            let (target, previous) = match group_index {
                None => (SyncTarget::Campaign, state.campaign.external_status),
                Some(index) => {
                    let group = draft::ad_group(&state.campaign, index)?;
                    (SyncTarget::AdGroup(group.id.clone()), group.ad_copy.status)
                }
            };
            if state.pending.is_pending(&target) {
                return Err(CampaignError::TogglePending(target));
            }
            let op = SyncOperation::begin(target, previous);
            apply_toggle_value(&mut state.campaign, &op.target, Some(op.requested));
            state.pending.try_register(op.clone());
            op
        };

        info!(
            campaign_id = %self.id,
            target = %op.target,
            requested = %op.requested,
            "toggle requested"
        );

        let enabled = op.requested.is_enabled();
        let result = match &op.target {
            SyncTarget::Campaign => self.platform.set_campaign_enabled(self.id, enabled).await,
            SyncTarget::AdGroup(group_ref) => {
                self.platform
                    .set_ad_group_enabled(self.id, group_ref, enabled)
                    .await
            }
        };

        let settled = {
            let mut state = self.state.write().await;
            state.pending.settle(&op.target);
            match result {
                Ok(outcome) => {
                    let committed = op.commit(outcome.confirmed_status);
                    apply_toggle_value(&mut state.campaign, &committed.target, committed.settled);
                    if committed.target == SyncTarget::Campaign {
                        follow_master_switch(&mut state.campaign, committed.settled);
                    }
                    info!(
                        campaign_id = %self.id,
                        target = %committed.target,
                        settled = ?committed.settled,
                        "toggle committed"
                    );
                    Ok(committed)
                }
                Err(err) => {
                    let rolled_back = op.roll_back();
                    apply_toggle_value(&mut state.campaign, &rolled_back.target, rolled_back.settled);
                    warn!(
                        campaign_id = %self.id,
                        target = %rolled_back.target,
                        error = %err,
                        transport = err.is_transport(),
                        "toggle rolled back"
                    );
                    Err(err)
                }
            }
        };

        if settled.is_ok() {
            let snapshot = self.campaign().await;
            self.write_cache(&snapshot).await;
        }
        self.refresh_quietly("toggle").await;
        settled.map_err(CampaignError::from)
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    /// Re-read the campaign (and analytics, when published) from the
    /// platform and merge it in.
    ///
    /// Fields with a pending toggle keep their optimistic value, and
    /// unsaved draft edits are kept. An analytics failure is logged and
    /// the previous analytics retained.
    pub async fn refresh(&self) -> Result<MergeReport, CampaignError> {
        let remote = self.platform.fetch_campaign(self.id).await.map_err(|e| {
            warn!(campaign_id = %self.id, error = %e, transport = e.is_transport(), "refresh failed");
            CampaignError::from(e)
        })?;

        let analytics = if remote.is_published() {
            match self.platform.fetch_analytics(self.id).await {
                Ok(analytics) => Some(analytics),
                Err(e) => {
                    warn!(campaign_id = %self.id, error = %e, "failed to load analytics");
                    None
                }
            }
        } else {
            None
        };

        let (report, snapshot) = {
            let mut state = self.state.write().await;
            let keep_local_draft = state.dirty;
            let ViewState {
                campaign, pending, ..
            } = &mut *state;
            let report = reconcile::merge_campaign(campaign, remote, pending, keep_local_draft);
            if let Some(analytics) = analytics {
                state.analytics = Some(analytics);
            }
            state.stale = false;
            (report, state.campaign.clone())
        };

        debug!(
            campaign_id = %self.id,
            preserved = report.preserved.len(),
            kept_local_draft = report.kept_local_draft,
            "campaign reconciled"
        );
        self.write_cache(&snapshot).await;
        Ok(report)
    }

    /// Reconcile after a settled change; failures are only logged.
    async fn refresh_quietly(&self, after: &str) {
        if let Err(e) = self.refresh().await {
            warn!(campaign_id = %self.id, after, error = %e, "follow-up refresh failed");
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Claim the transition slot for `action` after validating it.
    async fn begin(&self, action: Action) -> Result<(), CampaignError> {
        let mut state = self.state.write().await;
        if let Some(current) = state.in_flight {
            return Err(CampaignError::TransitionInFlight(current));
        }
        CampaignStateMachine::check(action, &state.campaign, &self.connection.state())?;
        state.in_flight = Some(action);
        Ok(())
    }

    /// Run a transition that is persisted by saving the whole campaign.
    ///
    /// The change is computed on a copy and applied locally only once the
    /// platform accepts it, so a failure leaves the view as it was.
    async fn persist_transition(
        &self,
        action: Action,
        apply: impl FnOnce(&mut Campaign),
    ) -> Result<(), CampaignError> {
        let proposed = {
            let mut state = self.state.write().await;
            if let Some(current) = state.in_flight {
                return Err(CampaignError::TransitionInFlight(current));
            }
            CampaignStateMachine::check(action, &state.campaign, &self.connection.state())?;
            let mut proposed = state.campaign.clone();
            apply(&mut proposed);
            state.in_flight = Some(action);
            proposed
        };

        debug!(campaign_id = %self.id, action = %action, status = %proposed.status, "saving campaign");
        let result = self.platform.save_campaign(&proposed).await;

        let mut state = self.state.write().await;
        state.in_flight = None;
        result.map_err(|e| self.remote_failure(action, e))?;

        let campaign = &mut state.campaign;
        campaign.status = proposed.status;
        campaign.draft_lock = proposed.draft_lock;
        if proposed.structure_draft.is_none() {
            campaign.structure_draft = None;
        }
        // Edits made during the round-trip are still unsaved.
        if campaign.structure_draft == proposed.structure_draft {
            state.dirty = false;
        }
        let snapshot = state.campaign.clone();
        drop(state);

        info!(campaign_id = %self.id, action = %action, status = %snapshot.status, "campaign updated");
        self.write_cache(&snapshot).await;
        Ok(())
    }

    fn remote_failure(&self, action: Action, err: PlatformError) -> CampaignError {
        warn!(
            campaign_id = %self.id,
            action = %action,
            error = %err,
            transport = err.is_transport(),
            "platform request failed"
        );
        CampaignError::Remote(err)
    }

    /// Best-effort cache write; failures are logged, never surfaced.
    async fn write_cache(&self, campaign: &Campaign) {
        let Some(pool) = &self.cache else {
            return;
        };
        if let Err(e) = cache_db::upsert_campaign(pool, campaign).await {
            warn!(campaign_id = %campaign.id, error = %e, "failed to update campaign cache");
        }
    }
}

impl std::fmt::Debug for CampaignView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CampaignView")
            .field("id", &self.id)
            .field("platform", &self.platform.name())
            .finish_non_exhaustive()
    }
}

fn validate_targets(targets: &[usize], group_count: usize) -> Result<(), CampaignError> {
    if targets.is_empty() {
        return Err(CampaignError::InvalidTargets(
            "select at least one ad group".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for &index in targets {
        if index >= group_count {
            return Err(CampaignError::InvalidTargets(format!(
                "ad group {index} does not exist (draft has {group_count})"
            )));
        }
        if !seen.insert(index) {
            return Err(CampaignError::InvalidTargets(format!(
                "ad group {index} selected twice"
            )));
        }
    }
    Ok(())
}

/// Write a toggle value onto its target. A group that no longer exists is
/// ignored.
fn apply_toggle_value(campaign: &mut Campaign, target: &SyncTarget, value: Option<ExternalStatus>) {
    match target {
        SyncTarget::Campaign => campaign.external_status = value,
        SyncTarget::AdGroup(group_ref) => {
            let group = campaign
                .structure_draft
                .as_mut()
                .and_then(|d| d.ad_groups.iter_mut().find(|g| &g.id == group_ref));
            if let Some(group) = group {
                group.ad_copy.status = value;
            }
        }
    }
}

/// Keep `active` / `paused` in step with a committed master switch.
fn follow_master_switch(campaign: &mut Campaign, settled: Option<ExternalStatus>) {
    let next = match (campaign.status, settled) {
        (CampaignStatus::Active, Some(ExternalStatus::Paused)) => CampaignStatus::Paused,
        (CampaignStatus::Paused, Some(ExternalStatus::Enabled)) => CampaignStatus::Active,
        _ => return,
    };
    campaign.status = next;
}
