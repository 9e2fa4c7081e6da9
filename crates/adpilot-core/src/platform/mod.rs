//! Advertising-platform collaborator interface.
//!
//! Every remote effect the engine has goes through the [`AdPlatform`]
//! trait. [`HttpPlatform`] binds it to the platform's REST surface; tests
//! substitute a scripted stub.
//!
//! ```text
//! CampaignView / ConnectionManager
//!     |
//!     v
//! Arc<dyn AdPlatform> --generate_draft / publish_draft / set_*_enabled-->
//!     |                 --list_linkable_accounts / select_account / disconnect-->
//!     |                 --fetch_campaign / fetch_analytics / list_campaigns-->
//!     v
//! PlatformResult<T>  (Rejected | Unauthorized | Transport | Decode)
//! ```

pub mod error;
pub mod http;
pub mod trait_def;
pub mod types;

pub use error::{PlatformError, PlatformResult};
pub use http::{HttpPlatform, HttpPlatformConfig};
pub use trait_def::AdPlatform;
pub use types::{
    AdGroupMetrics, Analytics, CampaignFilter, CampaignSummary, ConnectionState, LinkableAccount,
    MetricsSnapshot, PublishOutcome, ToggleOutcome,
};
