//! Campaign lifecycle engine.
//!
//! ```text
//! Workspace
//!   |-- ConnectionManager (process-wide, watch channel)
//!   |-- CampaignView (one per open campaign)
//!   |      |-- lifecycle: generate / approve / unlock / publish / discard
//!   |      |-- draft: path-addressed edits, list ops, copy regeneration
//!   |      |-- sync: optimistic toggles with rollback
//!   |      `-- reconcile: merge remote state around pending toggles
//!   `-- dyn AdPlatform (REST collaborator)
//! ```

pub mod connection;
pub mod draft;
pub mod lifecycle;
pub mod platform;
pub mod reconcile;
pub mod sync;
pub mod workspace;

pub use connection::{ConnectionError, ConnectionManager, DisconnectChoice, DisconnectPlan};
pub use lifecycle::{Action, CampaignError, CampaignView, Confirmation, ViewSnapshot};
pub use platform::{AdPlatform, HttpPlatform, PlatformError};
pub use workspace::Workspace;
