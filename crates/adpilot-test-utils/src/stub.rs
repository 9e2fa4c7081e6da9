use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;
use uuid::Uuid;

use adpilot_core::platform::{
    AdPlatform, Analytics, CampaignFilter, CampaignSummary, ConnectionState, LinkableAccount,
    PlatformError, PlatformResult, PublishOutcome, ToggleOutcome,
};
use adpilot_db::models::{
    AdCopySet, AdGroup, Campaign, CampaignStatus, ExternalStatus, StructureDraft,
};

use crate::fixtures;

/// Identifies one [`AdPlatform`] operation for scripting and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StubCall {
    Connect,
    FetchConnection,
    ListAccounts,
    SelectAccount,
    Disconnect,
    ListCampaigns,
    FetchCampaign,
    SaveCampaign,
    GenerateDraft,
    RegenerateAdCopy,
    PublishDraft,
    SetCampaignEnabled,
    SetAdGroupEnabled,
    FetchAnalytics,
}

/// One call the stub received, with its arguments rendered as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub call: StubCall,
    pub detail: String,
}

/// Holds the next call of one kind in flight until released.
#[derive(Clone, Default)]
pub struct Gate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl Gate {
    /// Wait until the gated call has reached the stub.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the gated call proceed.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Gate")
    }
}

#[derive(Default)]
struct StubState {
    connection: ConnectionState,
    accounts: Vec<LinkableAccount>,
    campaigns: HashMap<Uuid, Campaign>,
    generated_draft: Option<StructureDraft>,
    ad_copy: Option<AdCopySet>,
    normalized_structure: Option<StructureDraft>,
    confirmed_status: Option<ExternalStatus>,
    analytics: Analytics,
    failures: HashMap<StubCall, PlatformError>,
    gates: HashMap<StubCall, Gate>,
    calls: Vec<RecordedCall>,
}

/// In-memory [`AdPlatform`] that behaves like a cooperative server.
///
/// Campaigns saved, published or toggled through the stub are stored, so
/// `fetch_campaign` returns the server-side view of every change.
#[derive(Default)]
pub struct StubPlatform {
    state: Mutex<StubState>,
}

impl StubPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    // -- builders ----------------------------------------------------------

    pub fn with_connection(self, connection: ConnectionState) -> Self {
        self.state().connection = connection;
        self
    }

    pub fn with_accounts(self, accounts: Vec<LinkableAccount>) -> Self {
        self.state().accounts = accounts;
        self
    }

    pub fn with_campaign(self, campaign: Campaign) -> Self {
        self.insert_campaign(campaign);
        self
    }

    /// Draft returned by `generate_draft` (default: two fixture groups).
    pub fn with_generated_draft(self, draft: StructureDraft) -> Self {
        self.state().generated_draft = Some(draft);
        self
    }

    /// Copy returned by `regenerate_ad_copy`.
    pub fn with_ad_copy(self, copy: AdCopySet) -> Self {
        self.state().ad_copy = Some(copy);
        self
    }

    /// Structure the platform reports back from `publish_draft`.
    pub fn with_normalized_structure(self, draft: StructureDraft) -> Self {
        self.state().normalized_structure = Some(draft);
        self
    }

    /// Status every toggle confirms, regardless of what was requested.
    pub fn confirm_toggles_as(self, status: ExternalStatus) -> Self {
        self.state().confirmed_status = Some(status);
        self
    }

    pub fn with_analytics(self, analytics: Analytics) -> Self {
        self.state().analytics = analytics;
        self
    }

    // -- runtime control ---------------------------------------------------

    pub fn insert_campaign(&self, campaign: Campaign) {
        self.state().campaigns.insert(campaign.id, campaign);
    }

    /// The server-side copy of campaign `id`.
    pub fn stored_campaign(&self, id: Uuid) -> Option<Campaign> {
        self.state().campaigns.get(&id).cloned()
    }

    pub fn connection(&self) -> ConnectionState {
        self.state().connection.clone()
    }

    /// Fail every `call` with `err` until [`Self::clear_failure`].
    pub fn fail(&self, call: StubCall, err: PlatformError) {
        self.state().failures.insert(call, err);
    }

    pub fn clear_failure(&self, call: StubCall) {
        self.state().failures.remove(&call);
    }

    /// Gate the next `call`: it is recorded, then waits for
    /// [`Gate::release`] before answering.
    pub fn gate(&self, call: StubCall) -> Gate {
        let gate = Gate::default();
        self.state().gates.insert(call, gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    /// Argument details of every recorded `call`, in order.
    pub fn calls_to(&self, call: StubCall) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.call == call)
            .map(|c| c.detail.clone())
            .collect()
    }

    pub fn call_count(&self, call: StubCall) -> usize {
        self.state().calls.iter().filter(|c| c.call == call).count()
    }

    fn state(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().expect("stub state poisoned")
    }

    /// Record the call, wait on its gate if one is set, then apply any
    /// injected failure.
    async fn enter(&self, call: StubCall, detail: String) -> PlatformResult<()> {
        let gate = {
            let mut state = self.state();
            state.calls.push(RecordedCall { call, detail });
            state.gates.remove(&call)
        };
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        match self.state().failures.get(&call) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn with_stored<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Campaign) -> T,
    ) -> PlatformResult<T> {
        let mut state = self.state();
        let campaign = state.campaigns.get_mut(&id).ok_or(PlatformError::Rejected {
            status: Some(404),
            message: Some(format!("campaign {id} not found")),
        })?;
        Ok(f(campaign))
    }
}

#[async_trait]
impl AdPlatform for StubPlatform {
    fn name(&self) -> &str {
        "stub"
    }

    async fn connect(&self) -> PlatformResult<()> {
        self.enter(StubCall::Connect, String::new()).await?;
        self.state().connection = ConnectionState::ConnectedNoAccount;
        Ok(())
    }

    async fn fetch_connection(&self) -> PlatformResult<ConnectionState> {
        self.enter(StubCall::FetchConnection, String::new()).await?;
        Ok(self.connection())
    }

    async fn list_linkable_accounts(&self) -> PlatformResult<Vec<LinkableAccount>> {
        self.enter(StubCall::ListAccounts, String::new()).await?;
        Ok(self.state().accounts.clone())
    }

    async fn select_account(&self, id: &str, name: &str) -> PlatformResult<()> {
        self.enter(StubCall::SelectAccount, id.to_string()).await?;
        self.state().connection = ConnectionState::ConnectedWithAccount {
            account_id: id.to_string(),
            account_name: name.to_string(),
        };
        Ok(())
    }

    async fn disconnect(&self, pause_campaigns: bool) -> PlatformResult<()> {
        self.enter(StubCall::Disconnect, format!("pause_campaigns={pause_campaigns}"))
            .await?;
        let mut state = self.state();
        if pause_campaigns {
            for campaign in state.campaigns.values_mut() {
                if !CampaignSummary::from(&*campaign).is_live() {
                    continue;
                }
                campaign.external_status = Some(ExternalStatus::Paused);
                if campaign.status == CampaignStatus::Active {
                    campaign.status = CampaignStatus::Paused;
                }
            }
        }
        state.connection = ConnectionState::None;
        Ok(())
    }

    async fn list_campaigns(&self, filter: &CampaignFilter) -> PlatformResult<Vec<CampaignSummary>> {
        self.enter(StubCall::ListCampaigns, format!("{:?}", filter.query_pairs()))
            .await?;
        let state = self.state();
        let mut summaries: Vec<_> = state
            .campaigns
            .values()
            .filter(|c| filter.statuses.is_empty() || filter.statuses.contains(&c.status))
            .filter(|c| !filter.published_only || c.is_published())
            .map(CampaignSummary::from)
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    async fn fetch_campaign(&self, campaign_id: Uuid) -> PlatformResult<Campaign> {
        self.enter(StubCall::FetchCampaign, campaign_id.to_string()).await?;
        self.with_stored(campaign_id, |c| c.clone())
    }

    async fn save_campaign(&self, campaign: &Campaign) -> PlatformResult<()> {
        self.enter(StubCall::SaveCampaign, format!("{} status={}", campaign.id, campaign.status))
            .await?;
        self.insert_campaign(campaign.clone());
        Ok(())
    }

    async fn generate_draft(
        &self,
        campaign_id: Uuid,
        feedback: Option<&str>,
    ) -> PlatformResult<StructureDraft> {
        self.enter(StubCall::GenerateDraft, feedback.unwrap_or_default().to_string())
            .await?;
        let draft = self
            .state()
            .generated_draft
            .clone()
            .unwrap_or_else(|| fixtures::draft_with_groups(&["Emergency", "Drains"]));
        let stored = draft.clone();
        // Generation is accepted for campaigns the stub has never seen.
        let _ = self.with_stored(campaign_id, move |c| {
            c.structure_draft = Some(stored);
            c.status = CampaignStatus::Review;
        });
        Ok(draft)
    }

    async fn regenerate_ad_copy(
        &self,
        _campaign_id: Uuid,
        ad_group: &AdGroup,
    ) -> PlatformResult<AdCopySet> {
        self.enter(StubCall::RegenerateAdCopy, ad_group.id.clone()).await?;
        let scripted = self.state().ad_copy.clone();
        Ok(scripted.unwrap_or_else(|| AdCopySet {
            headlines: vec![format!("Fresh copy for {}", ad_group.name)],
            descriptions: vec!["Book today.".to_string()],
            ..Default::default()
        }))
    }

    async fn publish_draft(
        &self,
        campaign_id: Uuid,
        target_group_indices: &[usize],
    ) -> PlatformResult<PublishOutcome> {
        self.enter(StubCall::PublishDraft, format!("{target_group_indices:?}"))
            .await?;
        let normalized = self.state().normalized_structure.clone();
        let external_resource_id = format!("customers/1/campaigns/{campaign_id}");

        let resource_id = external_resource_id.clone();
        let stored_structure = normalized.clone();
        let targets = target_group_indices.to_vec();
        self.with_stored(campaign_id, move |c| {
            c.external_resource_id = Some(resource_id);
            c.external_status = Some(ExternalStatus::Enabled);
            c.status = CampaignStatus::Active;
            if let Some(structure) = stored_structure {
                c.structure_draft = Some(structure);
            }
            if let Some(draft) = c.structure_draft.as_mut() {
                for index in targets {
                    if let Some(group) = draft.ad_groups.get_mut(index) {
                        group.ad_copy.status = Some(ExternalStatus::Enabled);
                    }
                }
            }
        })?;

        Ok(PublishOutcome {
            external_resource_id,
            external_status: Some(ExternalStatus::Enabled),
            normalized_structure: normalized,
        })
    }

    async fn set_campaign_enabled(
        &self,
        campaign_id: Uuid,
        enabled: bool,
    ) -> PlatformResult<ToggleOutcome> {
        self.enter(StubCall::SetCampaignEnabled, format!("enabled={enabled}"))
            .await?;
        let confirmed = self
            .state()
            .confirmed_status
            .unwrap_or(ExternalStatus::from_enabled(enabled));
        self.with_stored(campaign_id, |c| {
            c.external_status = Some(confirmed);
            c.status = match (c.status, confirmed) {
                (CampaignStatus::Active, ExternalStatus::Paused) => CampaignStatus::Paused,
                (CampaignStatus::Paused, ExternalStatus::Enabled) => CampaignStatus::Active,
                (status, _) => status,
            };
        })?;
        Ok(ToggleOutcome {
            confirmed_status: Some(confirmed),
        })
    }

    async fn set_ad_group_enabled(
        &self,
        campaign_id: Uuid,
        ad_group_ref: &str,
        enabled: bool,
    ) -> PlatformResult<ToggleOutcome> {
        self.enter(
            StubCall::SetAdGroupEnabled,
            format!("{ad_group_ref} enabled={enabled}"),
        )
        .await?;
        let confirmed = self
            .state()
            .confirmed_status
            .unwrap_or(ExternalStatus::from_enabled(enabled));
        self.with_stored(campaign_id, |c| {
            let group = c
                .structure_draft
                .as_mut()
                .and_then(|d| d.ad_groups.iter_mut().find(|g| g.id == ad_group_ref));
            if let Some(group) = group {
                group.ad_copy.status = Some(confirmed);
            }
        })?;
        Ok(ToggleOutcome {
            confirmed_status: Some(confirmed),
        })
    }

    async fn fetch_analytics(&self, campaign_id: Uuid) -> PlatformResult<Analytics> {
        self.enter(StubCall::FetchAnalytics, campaign_id.to_string()).await?;
        Ok(self.state().analytics.clone())
    }
}
