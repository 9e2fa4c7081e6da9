//! Optimistic sync bookkeeping.
//!
//! A [`SyncOperation`] records one in-flight toggle: what it targets, the
//! value before the press, and the value requested. While an operation is
//! registered in [`PendingSyncs`], its target is "pending": further presses
//! on it are refused and reconciliation leaves the target's field alone.
//!
//! ```text
//! press --> begin (pending) --remote ok--> commit (committed)
//!                            \--remote err--> roll_back (rolled_back)
//! ```

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use adpilot_db::models::ExternalStatus;

/// The entity a toggle acts on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ref", rename_all = "snake_case")]
pub enum SyncTarget {
    /// The campaign's master switch.
    Campaign,
    /// One ad group, by its platform reference.
    AdGroup(String),
}

impl fmt::Display for SyncTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Campaign => f.write_str("campaign"),
            Self::AdGroup(id) => write!(f, "ad group {id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Pending,
    Committed,
    RolledBack,
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
        };
        f.write_str(s)
    }
}

/// One optimistic toggle, from press to settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOperation {
    pub id: Uuid,
    pub target: SyncTarget,
    /// Exact value before the press, restored on rollback.
    pub previous: Option<ExternalStatus>,
    pub requested: ExternalStatus,
    /// Value in effect after settlement: the platform's canonical value on
    /// commit, `previous` on rollback.
    pub settled: Option<ExternalStatus>,
    pub outcome: SyncOutcome,
    pub started_at: DateTime<Utc>,
}

impl SyncOperation {
    /// Start a toggle away from `previous`. An unknown previous value reads
    /// as enabled, so the request is to pause.
    pub fn begin(target: SyncTarget, previous: Option<ExternalStatus>) -> Self {
        let current = previous.unwrap_or(ExternalStatus::Enabled);
        Self {
            id: Uuid::new_v4(),
            target,
            previous,
            requested: current.toggled(),
            settled: None,
            outcome: SyncOutcome::Pending,
            started_at: Utc::now(),
        }
    }

    /// Settle successfully, adopting the platform's value when it sent one.
    pub fn commit(mut self, confirmed: Option<ExternalStatus>) -> Self {
        self.settled = Some(confirmed.unwrap_or(self.requested));
        self.outcome = SyncOutcome::Committed;
        self
    }

    /// Settle as failed; the effective value returns to `previous`.
    pub fn roll_back(mut self) -> Self {
        self.settled = self.previous;
        self.outcome = SyncOutcome::RolledBack;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.outcome == SyncOutcome::Pending
    }
}

/// In-flight operations of one campaign view, at most one per target.
#[derive(Debug, Clone, Default)]
pub struct PendingSyncs {
    ops: HashMap<SyncTarget, SyncOperation>,
}

impl PendingSyncs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `op` unless its target already has one in flight.
    /// Returns `false` (and drops `op`) when the target is busy.
    pub fn try_register(&mut self, op: SyncOperation) -> bool {
        if self.ops.contains_key(&op.target) {
            return false;
        }
        self.ops.insert(op.target.clone(), op);
        true
    }

    /// Remove the in-flight operation for `target`.
    pub fn settle(&mut self, target: &SyncTarget) -> Option<SyncOperation> {
        self.ops.remove(target)
    }

    pub fn is_pending(&self, target: &SyncTarget) -> bool {
        self.ops.contains_key(target)
    }

    pub fn get(&self, target: &SyncTarget) -> Option<&SyncOperation> {
        self.ops.get(target)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn targets(&self) -> impl Iterator<Item = &SyncTarget> {
        self.ops.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_negates_current_value() {
        let op = SyncOperation::begin(SyncTarget::Campaign, Some(ExternalStatus::Paused));
        assert_eq!(op.requested, ExternalStatus::Enabled);
        assert!(op.is_pending());

        let unknown = SyncOperation::begin(SyncTarget::Campaign, None);
        assert_eq!(unknown.requested, ExternalStatus::Paused);
    }

    #[test]
    fn commit_prefers_platform_value() {
        let op = SyncOperation::begin(SyncTarget::Campaign, Some(ExternalStatus::Enabled));
        let committed = op.clone().commit(None);
        assert_eq!(committed.settled, Some(ExternalStatus::Paused));
        assert_eq!(committed.outcome, SyncOutcome::Committed);

        let overridden = op.commit(Some(ExternalStatus::Enabled));
        assert_eq!(overridden.settled, Some(ExternalStatus::Enabled));
    }

    #[test]
    fn roll_back_restores_exact_previous() {
        let op = SyncOperation::begin(SyncTarget::AdGroup("g1".into()), None);
        let rolled = op.roll_back();
        assert_eq!(rolled.settled, None);
        assert_eq!(rolled.outcome, SyncOutcome::RolledBack);
    }

    #[test]
    fn one_operation_per_target() {
        let mut pending = PendingSyncs::new();
        assert!(pending.try_register(SyncOperation::begin(SyncTarget::Campaign, None)));
        assert!(!pending.try_register(SyncOperation::begin(SyncTarget::Campaign, None)));
        assert!(pending.try_register(SyncOperation::begin(
            SyncTarget::AdGroup("g1".into()),
            None
        )));
        assert_eq!(pending.len(), 2);

        assert!(pending.settle(&SyncTarget::Campaign).is_some());
        assert!(!pending.is_pending(&SyncTarget::Campaign));
        assert!(pending.is_pending(&SyncTarget::AdGroup("g1".into())));
    }
}
