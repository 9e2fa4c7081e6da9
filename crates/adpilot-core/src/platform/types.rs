//! Wire types exchanged with the advertising platform.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use adpilot_db::models::{Campaign, CampaignStatus, ExternalStatus, StructureDraft};

/// Link between this client and an external advertising account.
///
/// Process-wide: account identity gates publishing for every campaign.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ConnectionState {
    #[default]
    None,
    ConnectedNoAccount,
    ConnectedWithAccount {
        account_id: String,
        account_name: String,
    },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Publishing is only possible once an account is selected.
    pub fn can_publish(&self) -> bool {
        matches!(self, Self::ConnectedWithAccount { .. })
    }

    /// `(id, name)` of the selected account.
    pub fn account(&self) -> Option<(&str, &str)> {
        match self {
            Self::ConnectedWithAccount {
                account_id,
                account_name,
            } => Some((account_id, account_name)),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("not connected"),
            Self::ConnectedNoAccount => f.write_str("connected, no account selected"),
            Self::ConnectedWithAccount {
                account_id,
                account_name,
            } => write!(f, "connected to {account_name} ({account_id})"),
        }
    }
}

/// An external account the user may link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkableAccount {
    pub id: String,
    pub name: String,
    pub is_selectable: bool,
    /// Reason code when not selectable (e.g. `SUSPENDED`).
    #[serde(default)]
    pub block_reason: Option<String>,
}

/// Campaign listing row used for the disconnect precondition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSummary {
    pub id: Uuid,
    pub name: String,
    pub status: CampaignStatus,
    #[serde(default)]
    pub external_resource_id: Option<String>,
    #[serde(default)]
    pub external_status: Option<ExternalStatus>,
}

impl CampaignSummary {
    /// Published on the platform and able to spend: `active`, or reported
    /// enabled by the platform.
    pub fn is_live(&self) -> bool {
        self.external_resource_id.is_some()
            && (self.status == CampaignStatus::Active
                || self.external_status == Some(ExternalStatus::Enabled))
    }
}

impl From<&Campaign> for CampaignSummary {
    fn from(campaign: &Campaign) -> Self {
        Self {
            id: campaign.id,
            name: campaign.name.clone(),
            status: campaign.status,
            external_resource_id: campaign.external_resource_id.clone(),
            external_status: campaign.external_status,
        }
    }
}

/// Server-side filter for `list_campaigns`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignFilter {
    /// Restrict to these statuses; empty means any.
    pub statuses: Vec<CampaignStatus>,
    /// Only campaigns that carry an external resource id.
    pub published_only: bool,
}

impl CampaignFilter {
    /// Every published campaign. The lifecycle status says nothing about
    /// spend (an unlocked campaign sits in `review` while still enabled), so
    /// callers narrow the result with [`CampaignSummary::is_live`].
    pub fn live() -> Self {
        Self {
            statuses: Vec::new(),
            published_only: true,
        }
    }

    /// Query-string pairs for the REST binding.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if !self.statuses.is_empty() {
            let joined = self
                .statuses
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("status", joined));
        }
        if self.published_only {
            pairs.push(("published", "true".to_string()));
        }
        pairs
    }
}

/// Result of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub external_resource_id: String,
    #[serde(default)]
    pub external_status: Option<ExternalStatus>,
    /// The structure as the platform stored it, when it normalized ours.
    #[serde(default)]
    pub normalized_structure: Option<StructureDraft>,
}

/// Result of an enable/disable request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleOutcome {
    /// Canonical status after the change; may differ from what was asked.
    #[serde(default)]
    pub confirmed_status: Option<ExternalStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricsSnapshot {
    pub impressions: u64,
    pub clicks: u64,
    pub cost_micros: i64,
    pub conversions: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdGroupMetrics {
    pub ad_group_ref: String,
    #[serde(flatten)]
    pub metrics: MetricsSnapshot,
}

/// Performance numbers for a published campaign.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Analytics {
    pub overview: MetricsSnapshot,
    pub per_ad_group: Vec<AdGroupMetrics>,
}
