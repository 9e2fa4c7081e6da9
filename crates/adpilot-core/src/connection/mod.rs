//! Platform connection manager.
//!
//! Owns the process-wide [`ConnectionState`]:
//!
//! ```text
//! none --connect--> connected_no_account --select_account--> connected_with_account
//!   ^                        |                                        |
//!   +-------- disconnect ----+----------------------------------------+
//!   +-------- authorization failure (silent demotion) ----------------+
//! ```
//!
//! Every change is published on a `watch` channel so all open campaign
//! views observe the same account identity.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{info, warn};

use crate::platform::{
    AdPlatform, CampaignFilter, CampaignSummary, ConnectionState, LinkableAccount, PlatformError,
};

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("not connected to the advertising platform")]
    NotConnected,

    /// The grant was rejected; the connection was reset to `none`.
    #[error("the platform connection has expired; reconnect to continue")]
    ReconnectRequired,

    #[error("account {id} cannot be selected ({})", .reason.as_deref().unwrap_or("no reason given"))]
    AccountNotSelectable { id: String, reason: Option<String> },

    /// Live campaigns exist; only a pause-all disconnect may proceed.
    #[error("{} live campaign(s) must be paused before disconnecting", .campaigns.len())]
    DisconnectBlocked { campaigns: Vec<CampaignSummary> },

    #[error("{}", .0.user_message())]
    Remote(#[from] PlatformError),
}

/// Result of enumerating what a disconnect would leave running.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisconnectPlan {
    /// Published campaigns that may be spending.
    pub live_campaigns: Vec<CampaignSummary>,
}

impl DisconnectPlan {
    /// Whether a plain disconnect is refused.
    pub fn is_blocked(&self) -> bool {
        !self.live_campaigns.is_empty()
    }
}

/// The user's answer to a disconnect prompt. Cancelling is simply not
/// calling [`ConnectionManager::disconnect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectChoice {
    /// Pause every live campaign and revoke the connection in one call.
    PauseAllAndDisconnect,
    /// Revoke the connection; only allowed when nothing is live.
    Disconnect,
}

/// Process-wide connection state and the operations that change it.
pub struct ConnectionManager {
    platform: Arc<dyn AdPlatform>,
    state: watch::Sender<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(platform: Arc<dyn AdPlatform>) -> Self {
        Self::with_state(platform, ConnectionState::None)
    }

    /// Start from a known state (e.g. restored at startup).
    pub fn with_state(platform: Arc<dyn AdPlatform>, initial: ConnectionState) -> Self {
        let (state, _) = watch::channel(initial);
        Self { platform, state }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Stream of states, starting with the current one.
    pub fn updates(&self) -> WatchStream<ConnectionState> {
        WatchStream::new(self.subscribe())
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next.clone());
        if previous != next {
            info!(from = %previous, to = %next, "connection state changed");
        }
    }

    /// Map an authorization failure to a silent demotion.
    fn demote_on_unauthorized(&self, err: PlatformError) -> ConnectionError {
        if err.is_unauthorized() {
            warn!(error = %err, "platform grant rejected; demoting connection to none");
            self.set_state(ConnectionState::None);
            ConnectionError::ReconnectRequired
        } else {
            warn!(error = %err, transport = err.is_transport(), "connection request failed");
            ConnectionError::Remote(err)
        }
    }

    fn ensure_connected(&self) -> Result<(), ConnectionError> {
        if self.state.borrow().is_connected() {
            Ok(())
        } else {
            Err(ConnectionError::NotConnected)
        }
    }

    /// Re-read the connection state from the platform.
    pub async fn refresh(&self) -> Result<ConnectionState, ConnectionError> {
        let remote = self
            .platform
            .fetch_connection()
            .await
            .map_err(|e| self.demote_on_unauthorized(e))?;
        self.set_state(remote.clone());
        Ok(remote)
    }

    /// Run the OAuth grant. The result is connected without an account.
    pub async fn connect(&self) -> Result<ConnectionState, ConnectionError> {
        self.platform.connect().await.map_err(|e| {
            warn!(error = %e, transport = e.is_transport(), "platform connect failed");
            ConnectionError::Remote(e)
        })?;
        self.set_state(ConnectionState::ConnectedNoAccount);
        Ok(ConnectionState::ConnectedNoAccount)
    }

    /// Accounts reachable through the current grant, selectable or not.
    ///
    /// An authorization failure resets the connection to `none` and is
    /// reported as [`ConnectionError::ReconnectRequired`]; the stale grant
    /// is not retried.
    pub async fn list_accounts(&self) -> Result<Vec<LinkableAccount>, ConnectionError> {
        self.ensure_connected()?;
        self.platform
            .list_linkable_accounts()
            .await
            .map_err(|e| self.demote_on_unauthorized(e))
    }

    /// Select `account`, persist the choice, and return the new state.
    ///
    /// Non-selectable accounts are refused without contacting the
    /// platform. The new state is applied before the remote call and
    /// reverted if it fails.
    pub async fn select_account(
        &self,
        account: &LinkableAccount,
    ) -> Result<ConnectionState, ConnectionError> {
        self.ensure_connected()?;
        if !account.is_selectable {
            return Err(ConnectionError::AccountNotSelectable {
                id: account.id.clone(),
                reason: account.block_reason.clone(),
            });
        }

        let previous = self.state();
        let next = ConnectionState::ConnectedWithAccount {
            account_id: account.id.clone(),
            account_name: account.name.clone(),
        };
        self.set_state(next.clone());

        if let Err(err) = self.platform.select_account(&account.id, &account.name).await {
            self.set_state(previous);
            return Err(self.demote_on_unauthorized(err));
        }

        info!(account_id = %account.id, "advertising account selected");
        Ok(next)
    }

    /// Enumerate published campaigns a disconnect would leave spending.
    pub async fn plan_disconnect(&self) -> Result<DisconnectPlan, ConnectionError> {
        self.ensure_connected()?;
        let campaigns = self
            .platform
            .list_campaigns(&CampaignFilter::live())
            .await
            .map_err(|e| {
                warn!(error = %e, transport = e.is_transport(), "failed to list live campaigns");
                ConnectionError::Remote(e)
            })?;

        let live_campaigns: Vec<_> = campaigns.into_iter().filter(|c| c.is_live()).collect();
        Ok(DisconnectPlan { live_campaigns })
    }

    /// Disconnect according to the user's `choice` on `plan`.
    ///
    /// A plain [`DisconnectChoice::Disconnect`] is refused while the plan
    /// lists live campaigns, and re-checked against a fresh enumeration so
    /// a campaign published after planning still blocks it. Pausing and
    /// revoking happen in a single platform call.
    pub async fn disconnect(
        &self,
        plan: &DisconnectPlan,
        choice: DisconnectChoice,
    ) -> Result<(), ConnectionError> {
        self.ensure_connected()?;

        let pause_campaigns = match choice {
            DisconnectChoice::PauseAllAndDisconnect => true,
            DisconnectChoice::Disconnect => {
                if plan.is_blocked() {
                    return Err(ConnectionError::DisconnectBlocked {
                        campaigns: plan.live_campaigns.clone(),
                    });
                }
                let fresh = self.plan_disconnect().await?;
                if fresh.is_blocked() {
                    return Err(ConnectionError::DisconnectBlocked {
                        campaigns: fresh.live_campaigns,
                    });
                }
                false
            }
        };

        self.platform.disconnect(pause_campaigns).await.map_err(|e| {
            warn!(error = %e, transport = e.is_transport(), "platform disconnect failed");
            ConnectionError::Remote(e)
        })?;

        info!(
            paused = pause_campaigns,
            campaigns = plan.live_campaigns.len(),
            "disconnected from advertising platform"
        );
        self.set_state(ConnectionState::None);
        Ok(())
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("platform", &self.platform.name())
            .field("state", &*self.state.borrow())
            .finish()
    }
}
