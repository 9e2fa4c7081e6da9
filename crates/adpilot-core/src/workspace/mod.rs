//! The workspace: one connection manager shared by every open campaign view.
//!
//! Connection mutations (connect, account selection, disconnect, silent
//! demotion) go through the workspace, which reconciles every open view
//! after the change so no view keeps acting on a stale account identity.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use futures::future::join_all;
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use adpilot_db::models::Campaign;

use crate::connection::{ConnectionError, ConnectionManager, DisconnectChoice, DisconnectPlan};
use crate::lifecycle::{CampaignError, CampaignView};
use crate::platform::{AdPlatform, ConnectionState, LinkableAccount};

pub struct Workspace {
    platform: Arc<dyn AdPlatform>,
    connection: Arc<ConnectionManager>,
    cache: Option<SqlitePool>,
    views: RwLock<HashMap<Uuid, Weak<CampaignView>>>,
}

impl Workspace {
    pub fn new(platform: Arc<dyn AdPlatform>, cache: Option<SqlitePool>) -> Self {
        let connection = Arc::new(ConnectionManager::new(Arc::clone(&platform)));
        Self {
            platform,
            connection,
            cache,
            views: RwLock::new(HashMap::new()),
        }
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn platform(&self) -> &Arc<dyn AdPlatform> {
        &self.platform
    }

    pub fn cache(&self) -> Option<&SqlitePool> {
        self.cache.as_ref()
    }

    /// Open campaign `id`, reusing a view that is still alive.
    pub async fn open_campaign(&self, id: Uuid) -> Result<Arc<CampaignView>, CampaignError> {
        if let Some(view) = self.views.read().await.get(&id).and_then(Weak::upgrade) {
            return Ok(view);
        }

        let view = Arc::new(
            CampaignView::open(
                id,
                Arc::clone(&self.platform),
                Arc::clone(&self.connection),
                self.cache.clone(),
            )
            .await?,
        );
        Ok(self.track(view).await)
    }

    /// Open campaign `id` from the local cache only. Returns `None` when it
    /// is not cached or the cache cannot be read.
    pub async fn open_cached(&self, id: Uuid) -> Option<Arc<CampaignView>> {
        if let Some(view) = self.views.read().await.get(&id).and_then(Weak::upgrade) {
            return Some(view);
        }

        let pool = self.cache.as_ref()?;
        let campaign = match adpilot_db::queries::campaigns::get_campaign(pool, id).await {
            Ok(campaign) => campaign?,
            Err(e) => {
                warn!(campaign_id = %id, error = %e, "failed to read campaign cache");
                return None;
            }
        };

        let view = Arc::new(CampaignView::from_cache(
            campaign,
            Arc::clone(&self.platform),
            Arc::clone(&self.connection),
            self.cache.clone(),
        ));
        Some(self.track(view).await)
    }

    /// Create `campaign` on the platform and open a view on it.
    pub async fn create_campaign(&self, campaign: Campaign) -> Result<Arc<CampaignView>, CampaignError> {
        self.platform.save_campaign(&campaign).await.map_err(|e| {
            warn!(campaign_id = %campaign.id, error = %e, "failed to create campaign");
            CampaignError::from(e)
        })?;
        info!(campaign_id = %campaign.id, name = %campaign.name, "campaign created");

        let view = Arc::new(CampaignView::new(
            campaign,
            Arc::clone(&self.platform),
            Arc::clone(&self.connection),
            self.cache.clone(),
        ));
        let snapshot = view.campaign().await;
        if let Some(pool) = &self.cache {
            if let Err(e) = adpilot_db::queries::campaigns::upsert_campaign(pool, &snapshot).await {
                warn!(campaign_id = %snapshot.id, error = %e, "failed to update campaign cache");
            }
        }
        Ok(self.track(view).await)
    }

    /// Register `view`; if another live view for the same campaign won a
    /// race, that one is returned instead.
    async fn track(&self, view: Arc<CampaignView>) -> Arc<CampaignView> {
        let mut views = self.views.write().await;
        if let Some(existing) = views.get(&view.id()).and_then(Weak::upgrade) {
            return existing;
        }
        views.insert(view.id(), Arc::downgrade(&view));
        view
    }

    /// Every view still held by a caller. Dropped views are forgotten.
    pub async fn open_views(&self) -> Vec<Arc<CampaignView>> {
        let mut views = self.views.write().await;
        views.retain(|_, weak| weak.strong_count() > 0);
        views.values().filter_map(Weak::upgrade).collect()
    }

    /// Refresh every open view from the platform. Returns how many
    /// refreshed successfully; failures are logged.
    pub async fn reconcile_open_views(&self) -> usize {
        let views = self.open_views().await;
        let results = join_all(views.iter().map(|view| view.refresh())).await;

        let mut refreshed = 0;
        for (view, result) in views.iter().zip(results) {
            match result {
                Ok(_) => refreshed += 1,
                Err(e) => warn!(campaign_id = %view.id(), error = %e, "failed to reconcile view"),
            }
        }
        debug!(views = views.len(), refreshed, "reconciled open views");
        refreshed
    }

    // -----------------------------------------------------------------------
    // Connection mutations
    // -----------------------------------------------------------------------

    pub async fn refresh_connection(&self) -> Result<ConnectionState, ConnectionError> {
        self.after_connection_change(self.connection.refresh().await).await
    }

    pub async fn connect(&self) -> Result<ConnectionState, ConnectionError> {
        self.after_connection_change(self.connection.connect().await).await
    }

    /// List linkable accounts. A rejected grant demotes the connection and
    /// reconciles open views before the error is returned.
    pub async fn list_accounts(&self) -> Result<Vec<LinkableAccount>, ConnectionError> {
        let result = self.connection.list_accounts().await;
        if matches!(result, Err(ConnectionError::ReconnectRequired)) {
            self.reconcile_open_views().await;
        }
        result
    }

    pub async fn select_account(
        &self,
        account: &LinkableAccount,
    ) -> Result<ConnectionState, ConnectionError> {
        self.after_connection_change(self.connection.select_account(account).await)
            .await
    }

    pub async fn plan_disconnect(&self) -> Result<DisconnectPlan, ConnectionError> {
        self.connection.plan_disconnect().await
    }

    pub async fn disconnect(
        &self,
        plan: &DisconnectPlan,
        choice: DisconnectChoice,
    ) -> Result<(), ConnectionError> {
        self.after_connection_change(self.connection.disconnect(plan, choice).await)
            .await
    }

    async fn after_connection_change<T>(
        &self,
        result: Result<T, ConnectionError>,
    ) -> Result<T, ConnectionError> {
        if result.is_ok() || matches!(result, Err(ConnectionError::ReconnectRequired)) {
            self.reconcile_open_views().await;
        }
        result
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("platform", &self.platform.name())
            .field("connection", &self.connection)
            .field("cached", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}
