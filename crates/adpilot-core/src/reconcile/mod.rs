//! Merging server-authoritative campaign state into a local view.
//!
//! The remote campaign replaces the local one wholesale, except for fields
//! that still have an unsettled local change:
//!
//! - the campaign's `external_status` while its master toggle is pending,
//! - an ad group's `ad_copy.status` while that group's toggle is pending,
//! - the whole `structure_draft` while the view holds unsaved edits.

use adpilot_db::models::{Campaign, ExternalStatus};

use crate::sync::{PendingSyncs, SyncTarget};

/// What a merge kept from the local side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Toggle targets whose local value survived the merge.
    pub preserved: Vec<SyncTarget>,
    /// Whether unsaved local draft edits were kept.
    pub kept_local_draft: bool,
}

impl MergeReport {
    pub fn is_clean(&self) -> bool {
        self.preserved.is_empty() && !self.kept_local_draft
    }
}

/// Merge `remote` into `local` around the unsettled changes in `pending`.
///
/// With `keep_local_draft`, the local draft is kept as-is.
pub fn merge_campaign(
    local: &mut Campaign,
    remote: Campaign,
    pending: &PendingSyncs,
    keep_local_draft: bool,
) -> MergeReport {
    let mut merged = remote;
    let mut report = MergeReport::default();

    if keep_local_draft {
        merged.structure_draft = local.structure_draft.clone();
        report.kept_local_draft = true;
    }

    if pending.is_pending(&SyncTarget::Campaign) {
        merged.external_status = local.external_status;
        report.preserved.push(SyncTarget::Campaign);
    }

    for target in pending.targets() {
        let SyncTarget::AdGroup(group_ref) = target else {
            continue;
        };
        let local_status = local_group_status(local, group_ref);
        let remote_group = merged
            .structure_draft
            .as_mut()
            .and_then(|d| d.ad_groups.iter_mut().find(|g| &g.id == group_ref));
        if let Some(group) = remote_group {
            group.ad_copy.status = local_status;
            report.preserved.push(target.clone());
        }
    }

    if merged.external_resource_id.is_none() {
        merged.external_status = None;
    }

    *local = merged;
    report
}

fn local_group_status(local: &Campaign, group_ref: &str) -> Option<ExternalStatus> {
    local
        .ad_groups()
        .iter()
        .find(|g| g.id == group_ref)
        .and_then(|g| g.ad_copy.status)
}
