use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Lifecycle status of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Planning,
    DraftGenerated,
    Review,
    Approved,
    Active,
    Paused,
    Archived,
    Error,
}

impl CampaignStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [CampaignStatus; 8] = [
        Self::Planning,
        Self::DraftGenerated,
        Self::Review,
        Self::Approved,
        Self::Active,
        Self::Paused,
        Self::Archived,
        Self::Error,
    ];
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Planning => "planning",
            Self::DraftGenerated => "draft_generated",
            Self::Review => "review",
            Self::Approved => "approved",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Archived => "archived",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

impl FromStr for CampaignStatus {
    type Err = CampaignStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planning" => Ok(Self::Planning),
            "draft_generated" => Ok(Self::DraftGenerated),
            "review" => Ok(Self::Review),
            "approved" => Ok(Self::Approved),
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "archived" => Ok(Self::Archived),
            "error" => Ok(Self::Error),
            other => Err(CampaignStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`CampaignStatus`] string.
#[derive(Debug, Clone)]
pub struct CampaignStatusParseError(pub String);

impl fmt::Display for CampaignStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid campaign status: {:?}", self.0)
    }
}

impl std::error::Error for CampaignStatusParseError {}

// ---------------------------------------------------------------------------

/// Enabled/paused state as reported by the advertising platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalStatus {
    Enabled,
    Paused,
}

impl ExternalStatus {
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled { Self::Enabled } else { Self::Paused }
    }

    pub fn is_enabled(self) -> bool {
        self == Self::Enabled
    }

    /// The opposite state.
    pub fn toggled(self) -> Self {
        match self {
            Self::Enabled => Self::Paused,
            Self::Paused => Self::Enabled,
        }
    }
}

impl fmt::Display for ExternalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Enabled => "enabled",
            Self::Paused => "paused",
        };
        f.write_str(s)
    }
}

impl FromStr for ExternalStatus {
    type Err = ExternalStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enabled" => Ok(Self::Enabled),
            "paused" => Ok(Self::Paused),
            other => Err(ExternalStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`ExternalStatus`] string.
#[derive(Debug, Clone)]
pub struct ExternalStatusParseError(pub String);

impl fmt::Display for ExternalStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid external status: {:?}", self.0)
    }
}

impl std::error::Error for ExternalStatusParseError {}

// ---------------------------------------------------------------------------

/// Budget pacing period for the draft budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPeriod {
    #[default]
    Daily,
    Monthly,
}

// ---------------------------------------------------------------------------
// Draft structure
// ---------------------------------------------------------------------------
//
// Draft types reject unknown fields: path-addressed edits are validated by
// deserializing the edited document back into these types.

/// The generated, editable campaign structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct StructureDraft {
    pub settings: DraftSettings,
    pub ad_groups: Vec<AdGroup>,
}

/// Campaign-level ad settings inside a draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct DraftSettings {
    pub name: String,
    pub goal: Option<String>,
    pub landing_url: Option<String>,
    pub geography: Option<Geography>,
    pub language: Option<String>,
    pub budget: Option<Budget>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct Geography {
    pub locations: Vec<String>,
    pub radius_km: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct Budget {
    pub amount_micros: i64,
    pub period: BudgetPeriod,
}

/// A themed subdivision of a campaign: keywords plus one ad-copy set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct AdGroup {
    /// Stable identity, also used as the platform-side ad group reference.
    pub id: String,
    pub name: String,
    pub theme: String,
    pub exact_keywords: Vec<String>,
    pub phrase_keywords: Vec<String>,
    pub negative_keywords: Vec<String>,
    pub ad_copy: AdCopySet,
}

impl AdGroup {
    /// Create an empty ad group with a fresh identity.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Interchangeable headline/description strings the platform assembles
/// into rendered ads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct AdCopySet {
    pub headlines: Vec<String>,
    pub descriptions: Vec<String>,
    pub path1: Option<String>,
    pub path2: Option<String>,
    pub final_url: Option<String>,
    /// Ad group enablement, mirrored from the platform.
    pub status: Option<ExternalStatus>,
}

// ---------------------------------------------------------------------------
// Campaign
// ---------------------------------------------------------------------------

/// Campaign-wide objective, budget and targeting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CampaignSettings {
    pub objective: Option<String>,
    pub daily_budget_micros: Option<i64>,
    pub locations: Vec<String>,
}

/// The canonical campaign entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub status: CampaignStatus,
    #[serde(default)]
    pub settings: CampaignSettings,
    #[serde(default)]
    pub structure_draft: Option<StructureDraft>,
    #[serde(default)]
    pub draft_lock: bool,
    #[serde(default)]
    pub external_resource_id: Option<String>,
    /// Only meaningful while `external_resource_id` is set.
    #[serde(default)]
    pub external_status: Option<ExternalStatus>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// A fresh campaign in `planning` with no draft.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: CampaignStatus::Planning,
            settings: CampaignSettings::default(),
            structure_draft: None,
            draft_lock: false,
            external_resource_id: None,
            external_status: None,
            updated_at: Utc::now(),
        }
    }

    /// Whether the campaign exists on the advertising platform.
    pub fn is_published(&self) -> bool {
        self.external_resource_id.is_some()
    }

    /// The draft's ad groups, or an empty slice when there is no draft.
    pub fn ad_groups(&self) -> &[AdGroup] {
        self.structure_draft
            .as_ref()
            .map(|d| d.ad_groups.as_slice())
            .unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// Cache rows
// ---------------------------------------------------------------------------

/// A row of the `campaigns` cache table.
#[derive(Debug, Clone, FromRow)]
pub struct CachedCampaign {
    pub id: String,
    pub name: String,
    pub status: String,
    pub payload: String,
    pub cached_at: DateTime<Utc>,
}

impl CachedCampaign {
    /// Decode the cached campaign payload.
    pub fn campaign(&self) -> Result<Campaign, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }

    pub fn status(&self) -> Result<CampaignStatus, CampaignStatusParseError> {
        self.status.parse()
    }
}
