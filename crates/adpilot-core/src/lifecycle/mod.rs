//! Campaign lifecycle: the status graph, user-driven actions, and the
//! per-campaign view that executes them.

pub mod view;

use std::fmt;

use thiserror::Error;

use adpilot_db::models::{Campaign, CampaignStatus};

use crate::draft::DraftError;
use crate::platform::{ConnectionState, PlatformError};
use crate::sync::SyncTarget;

pub use view::{CampaignView, ViewSnapshot};

/// A user-initiated lifecycle action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Generate,
    Approve,
    Unlock,
    Publish,
    Discard,
    Save,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Generate => "generate",
            Self::Approve => "approve",
            Self::Unlock => "unlock",
            Self::Publish => "publish",
            Self::Discard => "discard",
            Self::Save => "save",
        };
        f.write_str(s)
    }
}

/// Explicit answer to a confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Cancelled,
}

impl Confirmation {
    pub fn from_flag(confirmed: bool) -> Self {
        if confirmed { Self::Confirmed } else { Self::Cancelled }
    }
}

#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("the draft is locked; unlock it before editing")]
    EditBlocked,

    #[error("cannot {action} a campaign in status {status}")]
    InvalidTransition {
        action: Action,
        status: CampaignStatus,
    },

    #[error("a {0} request is already in flight for this campaign")]
    TransitionInFlight(Action),

    #[error("{0} requires explicit confirmation")]
    ConfirmationRequired(Action),

    #[error("publishing requires a connected advertising account")]
    AccountRequired,

    #[error("campaign is not published; live controls are unavailable")]
    NotPublished,

    #[error("a change to the {0} is already pending")]
    TogglePending(SyncTarget),

    #[error("invalid publish targets: {0}")]
    InvalidTargets(String),

    #[error(transparent)]
    Draft(DraftError),

    #[error("{}", .0.user_message())]
    Remote(#[from] PlatformError),
}

impl CampaignError {
    /// Rejected locally, before any remote call was made.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Remote(_))
    }

    pub fn is_edit_blocked(&self) -> bool {
        matches!(self, Self::EditBlocked)
    }
}

impl From<DraftError> for CampaignError {
    fn from(err: DraftError) -> Self {
        match err {
            DraftError::EditBlocked => Self::EditBlocked,
            other => Self::Draft(other),
        }
    }
}

/// The campaign status graph.
///
/// ```text
/// planning        -> review            (generate)
/// draft_generated -> review            (generate)
/// review          -> review            (regenerate)
/// error           -> review            (generate)
/// review          -> approved          (approve)
/// approved        -> review            (unlock)
/// active|paused   -> review            (unlock)
/// approved        -> active            (publish)
/// active|paused   -> active            (republish)
/// active          <-> paused           (master toggle)
/// !active         -> planning          (discard)
/// planning        -> draft_generated   (server)
/// draft_generated -> review            (server)
/// any             -> archived | error  (server)
/// ```
pub struct CampaignStateMachine;

impl CampaignStateMachine {
    /// Check whether `from -> to` is an edge of the status graph.
    pub fn is_valid_transition(from: CampaignStatus, to: CampaignStatus) -> bool {
        use CampaignStatus::*;
        matches!(
            (from, to),
            (Planning | DraftGenerated | Review | Error, Review)
                | (Planning, DraftGenerated)
                | (Review, Approved)
                | (Approved | Active | Paused, Review)
                | (Approved | Active | Paused, Active)
                | (Active, Paused)
                | (Planning | DraftGenerated | Review | Approved | Paused | Archived | Error, Planning)
                | (_, Archived)
                | (_, Error)
        )
    }

    /// Check that `action` may be requested on `campaign` given the
    /// current connection.
    pub fn check(
        action: Action,
        campaign: &Campaign,
        connection: &ConnectionState,
    ) -> Result<(), CampaignError> {
        use CampaignStatus::*;
        let status = campaign.status;
        let invalid = || CampaignError::InvalidTransition { action, status };

        match action {
            Action::Generate => {
                if campaign.draft_lock {
                    return Err(CampaignError::EditBlocked);
                }
                // Approved and live campaigns go through `unlock` first.
                if !matches!(status, Planning | DraftGenerated | Review | Error) {
                    return Err(invalid());
                }
            }
            Action::Approve => {
                if status != Review {
                    return Err(invalid());
                }
                if campaign.structure_draft.is_none() {
                    return Err(DraftError::NoDraft.into());
                }
            }
            Action::Unlock => {
                if !matches!(status, Approved | Active | Paused) {
                    return Err(invalid());
                }
            }
            Action::Publish => {
                if !campaign.draft_lock || !Self::is_valid_transition(status, Active) {
                    return Err(invalid());
                }
                if campaign.structure_draft.is_none() {
                    return Err(DraftError::NoDraft.into());
                }
                if !connection.can_publish() {
                    return Err(CampaignError::AccountRequired);
                }
            }
            Action::Discard => {
                if !Self::is_valid_transition(status, Planning) {
                    return Err(invalid());
                }
            }
            Action::Save => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adpilot_db::models::StructureDraft;

    fn account() -> ConnectionState {
        ConnectionState::ConnectedWithAccount {
            account_id: "123-456-7890".into(),
            account_name: "Acme".into(),
        }
    }

    fn in_status(status: CampaignStatus, locked: bool) -> Campaign {
        let mut campaign = Campaign::new("Spring");
        campaign.status = status;
        campaign.draft_lock = locked;
        campaign.structure_draft = Some(StructureDraft::default());
        campaign
    }

    #[test]
    fn valid_edges() {
        use CampaignStatus::*;
        assert!(CampaignStateMachine::is_valid_transition(Planning, Review));
        assert!(CampaignStateMachine::is_valid_transition(Review, Approved));
        assert!(CampaignStateMachine::is_valid_transition(Approved, Active));
        assert!(CampaignStateMachine::is_valid_transition(Active, Paused));
        assert!(CampaignStateMachine::is_valid_transition(Paused, Active));
        assert!(CampaignStateMachine::is_valid_transition(Paused, Review));
        assert!(CampaignStateMachine::is_valid_transition(Active, Error));
    }

    #[test]
    fn invalid_edges() {
        use CampaignStatus::*;
        assert!(!CampaignStateMachine::is_valid_transition(Planning, Approved));
        assert!(!CampaignStateMachine::is_valid_transition(Review, Active));
        assert!(!CampaignStateMachine::is_valid_transition(Active, Planning));
        assert!(!CampaignStateMachine::is_valid_transition(Planning, Active));
        assert!(!CampaignStateMachine::is_valid_transition(Archived, Review));
    }

    #[test]
    fn generation_is_blocked_by_lock() {
        let campaign = in_status(CampaignStatus::Approved, true);
        let err = CampaignStateMachine::check(Action::Generate, &campaign, &account()).unwrap_err();
        assert!(err.is_edit_blocked());
    }

    #[test]
    fn generation_needs_an_unlocked_editing_status() {
        for status in [CampaignStatus::Approved, CampaignStatus::Active, CampaignStatus::Paused] {
            let campaign = in_status(status, false);
            let err = CampaignStateMachine::check(Action::Generate, &campaign, &account()).unwrap_err();
            assert!(
                matches!(err, CampaignError::InvalidTransition { action: Action::Generate, .. }),
                "{status}: {err:?}"
            );
        }
        for status in [CampaignStatus::Planning, CampaignStatus::Review, CampaignStatus::Error] {
            let campaign = in_status(status, false);
            assert!(CampaignStateMachine::check(Action::Generate, &campaign, &account()).is_ok());
        }
    }

    #[test]
    fn approve_requires_review_and_draft() {
        let campaign = in_status(CampaignStatus::Planning, false);
        let err = CampaignStateMachine::check(Action::Approve, &campaign, &account()).unwrap_err();
        assert!(matches!(err, CampaignError::InvalidTransition { action: Action::Approve, .. }));

        let mut campaign = in_status(CampaignStatus::Review, false);
        campaign.structure_draft = None;
        let err = CampaignStateMachine::check(Action::Approve, &campaign, &account()).unwrap_err();
        assert!(matches!(err, CampaignError::Draft(DraftError::NoDraft)));
    }

    #[test]
    fn publish_requires_lock_and_account() {
        let unlocked = in_status(CampaignStatus::Review, false);
        assert!(CampaignStateMachine::check(Action::Publish, &unlocked, &account()).is_err());

        let approved = in_status(CampaignStatus::Approved, true);
        let err = CampaignStateMachine::check(
            Action::Publish,
            &approved,
            &ConnectionState::ConnectedNoAccount,
        )
        .unwrap_err();
        assert!(matches!(err, CampaignError::AccountRequired));

        assert!(CampaignStateMachine::check(Action::Publish, &approved, &account()).is_ok());
    }

    #[test]
    fn discard_refused_while_active() {
        let active = in_status(CampaignStatus::Active, true);
        assert!(CampaignStateMachine::check(Action::Discard, &active, &account()).is_err());
        let paused = in_status(CampaignStatus::Paused, true);
        assert!(CampaignStateMachine::check(Action::Discard, &paused, &account()).is_ok());
    }

    #[test]
    fn draft_lock_error_maps_to_edit_blocked() {
        let err: CampaignError = DraftError::EditBlocked.into();
        assert!(err.is_edit_blocked());
        assert!(err.is_validation());
        let remote: CampaignError = PlatformError::rejected("nope").into();
        assert!(!remote.is_validation());
        assert_eq!(remote.to_string(), "nope");
    }
}
