//! Draft structure editing.
//!
//! Pure, synchronous edits of a campaign's [`StructureDraft`]. Every
//! operation is refused with [`DraftError::EditBlocked`] while the draft is
//! locked, and every failed operation leaves the campaign untouched: edits
//! are applied to a JSON copy of the draft, which must deserialize back
//! into a `StructureDraft` before it replaces the original.

pub mod path;

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use adpilot_db::models::{AdCopySet, AdGroup, Campaign, ExternalStatus, StructureDraft};

pub use path::{FieldPath, PathSegment};

/// Rejected draft edit. The draft is unchanged whenever one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("the draft is locked; unlock it before editing")]
    EditBlocked,

    #[error("campaign has no structure draft")]
    NoDraft,

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("edit at {path:?} does not fit the draft schema: {reason}")]
    TypeMismatch { path: String, reason: String },

    #[error("index {index} out of range at {path:?} (length {len})")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("{path:?} is not a list")]
    NotAList { path: String },

    #[error("list items must not be empty")]
    EmptyValue,

    #[error("{value:?} is already in the list at {path:?}")]
    DuplicateItem { path: String, value: String },

    #[error("{path:?} is managed by the platform: {reason}")]
    ReadOnly { path: String, reason: String },
}

/// Refuse edits while the draft is locked.
pub fn ensure_editable(campaign: &Campaign) -> Result<(), DraftError> {
    if campaign.draft_lock {
        Err(DraftError::EditBlocked)
    } else {
        Ok(())
    }
}

/// Assign `value` at `path`, creating intermediate objects and list slots.
///
/// A numeric segment may address an existing element or the position just
/// past the end (append). Unknown fields and wrongly typed values are
/// rejected by the draft schema. Ad group ids and ad copy statuses belong
/// to the platform and cannot be assigned. A string written into a list
/// must not repeat another entry ignoring case, and an assigned list must
/// not repeat itself.
pub fn set_field(campaign: &mut Campaign, path: &FieldPath, value: Value) -> Result<(), DraftError> {
    ensure_editable(campaign)?;
    if path.is_root() {
        return Err(DraftError::InvalidPath {
            path: path.to_string(),
            reason: "cannot assign the whole draft".to_string(),
        });
    }
    if is_platform_owned(path) {
        return Err(DraftError::ReadOnly {
            path: path.to_string(),
            reason: "set by the platform".to_string(),
        });
    }
    edit_document(campaign, path, |doc| {
        let slot = resolve_or_create(doc, path)?;
        *slot = value;
        if let Some(list) = slot.as_array() {
            if let Some(value) = (0..list.len()).find_map(|i| duplicated_item(list, i)) {
                return Err(duplicate(path, value));
            }
        }

        if let Some((parent, PathSegment::Index(index))) = path.split_last() {
            if let Some(list) = resolve_existing(doc, &parent)?.as_array() {
                if let Some(value) = duplicated_item(list, *index) {
                    return Err(duplicate(path, value));
                }
            }
        }
        Ok(())
    })
}

/// Append a string to the list at `path`.
///
/// The value is trimmed; insertion is skipped when the list already holds
/// the same value ignoring case. Returns whether the value was inserted.
pub fn add_list_item(campaign: &mut Campaign, path: &FieldPath, value: &str) -> Result<bool, DraftError> {
    ensure_editable(campaign)?;
    let value = value.trim();
    if value.is_empty() {
        return Err(DraftError::EmptyValue);
    }
    let needle = value.to_lowercase();

    edit_document(campaign, path, |doc| {
        let slot = resolve_or_create(doc, path)?;
        if slot.is_null() {
            *slot = Value::Array(Vec::new());
        }
        let list = slot.as_array_mut().ok_or_else(|| DraftError::NotAList {
            path: path.to_string(),
        })?;
        let duplicate = list
            .iter()
            .filter_map(Value::as_str)
            .any(|existing| existing.to_lowercase() == needle);
        if duplicate {
            return Ok(false);
        }
        list.push(Value::String(value.to_string()));
        Ok(true)
    })
}

/// Remove the element at `index` from the list at `path`, returning it.
pub fn remove_list_item(campaign: &mut Campaign, path: &FieldPath, index: usize) -> Result<Value, DraftError> {
    edit_document(campaign, path, |doc| {
        let slot = resolve_existing(doc, path)?;
        let list = slot.as_array_mut().ok_or_else(|| DraftError::NotAList {
            path: path.to_string(),
        })?;
        if index >= list.len() {
            return Err(DraftError::IndexOutOfRange {
                path: path.to_string(),
                index,
                len: list.len(),
            });
        }
        Ok(list.remove(index))
    })
}

/// Append an empty ad group with a fresh identity. Returns its index.
pub fn add_ad_group(campaign: &mut Campaign, name: &str) -> Result<usize, DraftError> {
    let draft = editable_draft(campaign)?;
    draft.ad_groups.push(AdGroup::new(name));
    Ok(draft.ad_groups.len() - 1)
}

/// Remove the ad group at `index`. Removing the last group is allowed.
pub fn remove_ad_group(campaign: &mut Campaign, index: usize) -> Result<AdGroup, DraftError> {
    let draft = editable_draft(campaign)?;
    let len = draft.ad_groups.len();
    if index >= len {
        return Err(DraftError::IndexOutOfRange {
            path: "adGroups".to_string(),
            index,
            len,
        });
    }
    Ok(draft.ad_groups.remove(index))
}

/// The ad group at `index`.
pub fn ad_group(campaign: &Campaign, index: usize) -> Result<&AdGroup, DraftError> {
    let draft = campaign
        .structure_draft
        .as_ref()
        .ok_or(DraftError::NoDraft)?;
    draft
        .ad_groups
        .get(index)
        .ok_or_else(|| DraftError::IndexOutOfRange {
            path: "adGroups".to_string(),
            index,
            len: draft.ad_groups.len(),
        })
}

/// Replace only the ad copy of the group identified by `group_id`,
/// keeping its platform-mirrored status.
///
/// Looks the group up by identity rather than index so that edits made
/// while the copy was being generated cannot redirect the result to a
/// sibling.
pub fn replace_ad_copy(campaign: &mut Campaign, group_id: &str, copy: AdCopySet) -> Result<(), DraftError> {
    let draft = editable_draft(campaign)?;
    let group = draft
        .ad_groups
        .iter_mut()
        .find(|g| g.id == group_id)
        .ok_or_else(|| DraftError::InvalidPath {
            path: format!("adGroups[id={group_id}]"),
            reason: "ad group no longer exists".to_string(),
        })?;
    let status = group.ad_copy.status;
    group.ad_copy = AdCopySet { status, ..copy };
    Ok(())
}

/// Give every ad group without an identity a fresh one.
pub fn assign_missing_ids(draft: &mut StructureDraft) {
    for group in draft.ad_groups.iter_mut().filter(|g| g.id.is_empty()) {
        group.id = Uuid::new_v4().to_string();
    }
}

/// `adGroups.N.id` and `adGroups.N.adCopy.status`.
fn is_platform_owned(path: &FieldPath) -> bool {
    use PathSegment::{Index, Key};
    match path.segments() {
        [Key(groups), Index(_), Key(field)] => groups == "adGroups" && field == "id",
        [Key(groups), Index(_), Key(copy), Key(field)] => {
            groups == "adGroups" && copy == "adCopy" && field == "status"
        }
        _ => false,
    }
}

/// The string at `index` when another entry of `list` equals it ignoring case.
fn duplicated_item(list: &[Value], index: usize) -> Option<&str> {
    let item = list.get(index)?.as_str()?;
    let needle = item.to_lowercase();
    list.iter()
        .enumerate()
        .any(|(i, other)| i != index && other.as_str().is_some_and(|o| o.to_lowercase() == needle))
        .then_some(item)
}

fn duplicate(path: &FieldPath, value: &str) -> DraftError {
    DraftError::DuplicateItem {
        path: path.to_string(),
        value: value.to_string(),
    }
}

/// Carry platform-owned group state across an edit of the JSON document.
///
/// Each group keeps the ad copy status recorded for its id (none for a new
/// id); two groups may not share an id.
fn keep_platform_fields(before: &StructureDraft, after: &mut StructureDraft) -> Result<(), DraftError> {
    let statuses: HashMap<&str, Option<ExternalStatus>> = before
        .ad_groups
        .iter()
        .map(|g| (g.id.as_str(), g.ad_copy.status))
        .collect();

    let mut seen = HashSet::new();
    for (index, group) in after.ad_groups.iter_mut().enumerate() {
        if !seen.insert(group.id.clone()) {
            return Err(DraftError::ReadOnly {
                path: format!("adGroups.{index}.id"),
                reason: format!("ad group id {} is already in use", group.id),
            });
        }
        group.ad_copy.status = statuses.get(group.id.as_str()).copied().flatten();
    }
    Ok(())
}

fn editable_draft(campaign: &mut Campaign) -> Result<&mut StructureDraft, DraftError> {
    ensure_editable(campaign)?;
    campaign.structure_draft.as_mut().ok_or(DraftError::NoDraft)
}

/// Run `edit` against a JSON copy of the draft and commit it only if the
/// result still satisfies the draft schema.
fn edit_document<T>(
    campaign: &mut Campaign,
    path: &FieldPath,
    edit: impl FnOnce(&mut Value) -> Result<T, DraftError>,
) -> Result<T, DraftError> {
    ensure_editable(campaign)?;
    let draft = campaign
        .structure_draft
        .as_ref()
        .ok_or(DraftError::NoDraft)?;

    let mismatch = |e: serde_json::Error| DraftError::TypeMismatch {
        path: path.to_string(),
        reason: e.to_string(),
    };

    let mut doc = serde_json::to_value(draft).map_err(mismatch)?;
    let output = edit(&mut doc)?;
    let mut updated: StructureDraft = serde_json::from_value(doc).map_err(mismatch)?;
    assign_missing_ids(&mut updated);
    keep_platform_fields(draft, &mut updated)?;

    campaign.structure_draft = Some(updated);
    Ok(output)
}

fn resolve_or_create<'a>(root: &'a mut Value, path: &FieldPath) -> Result<&'a mut Value, DraftError> {
    let mut current = root;
    for segment in path.segments() {
        if current.is_null() {
            *current = match segment {
                PathSegment::Key(_) => Value::Object(Map::new()),
                PathSegment::Index(_) => Value::Array(Vec::new()),
            };
        }
        current = match segment {
            PathSegment::Key(key) => {
                let object = current
                    .as_object_mut()
                    .ok_or_else(|| DraftError::InvalidPath {
                        path: path.to_string(),
                        reason: format!("cannot address field {key:?} inside a non-object"),
                    })?;
                object.entry(key.clone()).or_insert(Value::Null)
            }
            PathSegment::Index(index) => {
                let list = current.as_array_mut().ok_or_else(|| DraftError::NotAList {
                    path: path.to_string(),
                })?;
                if *index > list.len() {
                    return Err(DraftError::IndexOutOfRange {
                        path: path.to_string(),
                        index: *index,
                        len: list.len(),
                    });
                }
                if *index == list.len() {
                    list.push(Value::Null);
                }
                &mut list[*index]
            }
        };
    }
    Ok(current)
}

fn resolve_existing<'a>(root: &'a mut Value, path: &FieldPath) -> Result<&'a mut Value, DraftError> {
    let mut current = root;
    for segment in path.segments() {
        let next = match segment {
            PathSegment::Key(key) => current.as_object_mut().and_then(|o| o.get_mut(key)),
            PathSegment::Index(index) => current.as_array_mut().and_then(|a| a.get_mut(*index)),
        };
        current = next.ok_or_else(|| DraftError::InvalidPath {
            path: path.to_string(),
            reason: format!("nothing at segment {segment}"),
        })?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn campaign_with_groups(n: usize) -> Campaign {
        let mut campaign = Campaign::new("Spring");
        let ad_groups = (0..n).map(|i| AdGroup::new(format!("group {i}"))).collect();
        campaign.structure_draft = Some(StructureDraft {
            ad_groups,
            ..Default::default()
        });
        campaign
    }

    fn p(s: &str) -> FieldPath {
        s.parse().unwrap()
    }

    #[test]
    fn set_field_updates_nested_value() {
        let mut campaign = campaign_with_groups(2);
        set_field(&mut campaign, &p("adGroups.1.name"), json!("Emergency")).unwrap();
        assert_eq!(campaign.ad_groups()[1].name, "Emergency");
        assert_eq!(campaign.ad_groups()[0].name, "group 0");
    }

    #[test]
    fn set_field_creates_intermediate_containers() {
        let mut campaign = campaign_with_groups(0);
        set_field(&mut campaign, &p("settings.budget.amountMicros"), json!(25_000_000)).unwrap();
        set_field(&mut campaign, &p("settings.geography.locations.0"), json!("Denver")).unwrap();

        let settings = &campaign.structure_draft.as_ref().unwrap().settings;
        assert_eq!(settings.budget.as_ref().unwrap().amount_micros, 25_000_000);
        assert_eq!(settings.geography.as_ref().unwrap().locations, vec!["Denver"]);
    }

    #[test]
    fn set_field_appends_group_with_identity() {
        let mut campaign = campaign_with_groups(1);
        set_field(&mut campaign, &p("adGroups.1.name"), json!("Drains")).unwrap();
        let groups = campaign.ad_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].name, "Drains");
        assert!(!groups[1].id.is_empty());
    }

    #[test]
    fn set_field_rejects_gaps() {
        let mut campaign = campaign_with_groups(1);
        let before = campaign.clone();
        let err = set_field(&mut campaign, &p("adGroups.3.name"), json!("x")).unwrap_err();
        assert!(matches!(err, DraftError::IndexOutOfRange { index: 3, len: 1, .. }));
        assert_eq!(campaign, before);
    }

    #[test]
    fn set_field_rejects_unknown_fields_and_bad_types() {
        let mut campaign = campaign_with_groups(1);
        let before = campaign.clone();

        let err = set_field(&mut campaign, &p("adGroups.0.nmae"), json!("x")).unwrap_err();
        assert!(matches!(err, DraftError::TypeMismatch { .. }));

        let err = set_field(&mut campaign, &p("adGroups.0.exactKeywords"), json!(42)).unwrap_err();
        assert!(matches!(err, DraftError::TypeMismatch { .. }));

        let err = set_field(&mut campaign, &p("settings.name.first"), json!("x")).unwrap_err();
        assert!(matches!(err, DraftError::InvalidPath { .. }));

        assert_eq!(campaign, before);
    }

    #[test]
    fn set_field_refuses_platform_owned_fields() {
        let mut campaign = campaign_with_groups(2);
        campaign.structure_draft.as_mut().unwrap().ad_groups[0].ad_copy.status =
            Some(ExternalStatus::Enabled);
        let before = campaign.clone();
        let first_id = before.ad_groups()[0].id.clone();

        let err = set_field(&mut campaign, &p("adGroups.0.adCopy.status"), json!("paused")).unwrap_err();
        assert!(matches!(err, DraftError::ReadOnly { .. }));

        let err = set_field(&mut campaign, &p("adGroups.1.id"), json!(first_id)).unwrap_err();
        assert!(matches!(err, DraftError::ReadOnly { .. }));

        assert_eq!(campaign, before);
    }

    #[test]
    fn whole_object_writes_keep_platform_fields() {
        let mut campaign = campaign_with_groups(2);
        campaign.structure_draft.as_mut().unwrap().ad_groups[0].ad_copy.status =
            Some(ExternalStatus::Enabled);
        let first_id = campaign.ad_groups()[0].id.clone();

        set_field(
            &mut campaign,
            &p("adGroups.0.adCopy"),
            json!({ "headlines": ["Fast Plumber"], "status": "paused" }),
        )
        .unwrap();
        let group = &campaign.ad_groups()[0];
        assert_eq!(group.ad_copy.headlines, vec!["Fast Plumber"]);
        assert_eq!(group.ad_copy.status, Some(ExternalStatus::Enabled));

        let before = campaign.clone();
        let err = set_field(&mut campaign, &p("adGroups.1"), json!({ "id": first_id, "name": "Clone" }))
            .unwrap_err();
        assert!(matches!(err, DraftError::ReadOnly { ref path, .. } if path == "adGroups.1.id"));
        assert_eq!(campaign, before);
    }

    #[test]
    fn set_field_into_a_list_is_deduplicated() {
        let mut campaign = campaign_with_groups(1);
        add_list_item(&mut campaign, &p("adGroups.0.exactKeywords"), "Plumber").unwrap();
        let before = campaign.clone();

        let err = set_field(&mut campaign, &p("adGroups.0.exactKeywords.1"), json!("plumber")).unwrap_err();
        assert!(matches!(err, DraftError::DuplicateItem { ref value, .. } if value == "plumber"));

        let err = set_field(
            &mut campaign,
            &p("adGroups.0.phraseKeywords"),
            json!(["drain cleaning", "Drain Cleaning"]),
        )
        .unwrap_err();
        assert!(matches!(err, DraftError::DuplicateItem { .. }));
        assert_eq!(campaign, before);

        set_field(&mut campaign, &p("adGroups.0.exactKeywords.0"), json!("PLUMBER")).unwrap();
        set_field(&mut campaign, &p("adGroups.0.exactKeywords.1"), json!("drains")).unwrap();
        assert_eq!(campaign.ad_groups()[0].exact_keywords, vec!["PLUMBER", "drains"]);
    }

    #[test]
    fn set_field_without_draft() {
        let mut campaign = Campaign::new("empty");
        let err = set_field(&mut campaign, &p("settings.name"), json!("x")).unwrap_err();
        assert_eq!(err, DraftError::NoDraft);
    }

    #[test]
    fn list_insert_is_case_insensitive() {
        let mut campaign = campaign_with_groups(1);
        let path = p("adGroups.0.exactKeywords");
        assert!(add_list_item(&mut campaign, &path, "Plumber").unwrap());
        assert!(!add_list_item(&mut campaign, &path, "plumber").unwrap());
        assert!(!add_list_item(&mut campaign, &path, "  PLUMBER ").unwrap());
        assert_eq!(campaign.ad_groups()[0].exact_keywords, vec!["Plumber"]);

        let headlines = p("adGroups.0.adCopy.headlines");
        add_list_item(&mut campaign, &headlines, "Fast Plumber").unwrap();
        add_list_item(&mut campaign, &headlines, "fast plumber").unwrap();
        assert_eq!(campaign.ad_groups()[0].ad_copy.headlines.len(), 1);
    }

    #[test]
    fn list_insert_rejects_empty_and_non_lists() {
        let mut campaign = campaign_with_groups(1);
        assert_eq!(
            add_list_item(&mut campaign, &p("adGroups.0.exactKeywords"), "   ").unwrap_err(),
            DraftError::EmptyValue
        );
        let err = add_list_item(&mut campaign, &p("adGroups.0.name"), "x").unwrap_err();
        assert!(matches!(err, DraftError::NotAList { .. }));
    }

    #[test]
    fn list_insert_creates_missing_optional_list() {
        let mut campaign = campaign_with_groups(0);
        add_list_item(&mut campaign, &p("settings.geography.locations"), "Boulder").unwrap();
        let geo = campaign.structure_draft.unwrap().settings.geography.unwrap();
        assert_eq!(geo.locations, vec!["Boulder"]);
    }

    #[test]
    fn remove_list_item_by_index() {
        let mut campaign = campaign_with_groups(1);
        let path = p("adGroups.0.negativeKeywords");
        add_list_item(&mut campaign, &path, "free").unwrap();
        add_list_item(&mut campaign, &path, "diy").unwrap();

        let removed = remove_list_item(&mut campaign, &path, 0).unwrap();
        assert_eq!(removed, json!("free"));
        assert_eq!(campaign.ad_groups()[0].negative_keywords, vec!["diy"]);

        let err = remove_list_item(&mut campaign, &path, 5).unwrap_err();
        assert!(matches!(err, DraftError::IndexOutOfRange { index: 5, len: 1, .. }));
    }

    #[test]
    fn ad_group_list_operations() {
        let mut campaign = campaign_with_groups(1);
        let index = add_ad_group(&mut campaign, "Water heaters").unwrap();
        assert_eq!(index, 1);
        assert_eq!(campaign.ad_groups()[1].name, "Water heaters");

        remove_ad_group(&mut campaign, 0).unwrap();
        remove_ad_group(&mut campaign, 0).unwrap();
        assert!(campaign.ad_groups().is_empty(), "empty group list is legal");

        let err = remove_ad_group(&mut campaign, 0).unwrap_err();
        assert!(matches!(err, DraftError::IndexOutOfRange { .. }));
    }

    #[test]
    fn every_edit_is_blocked_while_locked() {
        let mut campaign = campaign_with_groups(2);
        campaign.draft_lock = true;
        let before = campaign.clone();

        let blocked = [
            set_field(&mut campaign, &p("adGroups.0.name"), json!("X")).map(|_| ()),
            set_field(&mut campaign, &FieldPath::root(), json!({})).map(|_| ()),
            add_list_item(&mut campaign, &p("adGroups.0.exactKeywords"), "x").map(|_| ()),
            remove_list_item(&mut campaign, &p("adGroups.0.exactKeywords"), 0).map(|_| ()),
            add_ad_group(&mut campaign, "x").map(|_| ()),
            remove_ad_group(&mut campaign, 0).map(|_| ()),
            replace_ad_copy(&mut campaign, &before.ad_groups()[0].id, AdCopySet::default()),
        ];

        for result in blocked {
            assert_eq!(result.unwrap_err(), DraftError::EditBlocked);
        }
        assert_eq!(campaign, before);
    }

    #[test]
    fn replace_ad_copy_touches_only_copy() {
        let mut campaign = campaign_with_groups(2);
        let path = p("adGroups.0.exactKeywords");
        add_list_item(&mut campaign, &path, "plumber").unwrap();
        campaign.structure_draft.as_mut().unwrap().ad_groups[0].ad_copy.status =
            Some(ExternalStatus::Enabled);
        let sibling = campaign.ad_groups()[1].clone();
        let id = campaign.ad_groups()[0].id.clone();

        let copy = AdCopySet {
            headlines: vec!["24/7 Plumbing".into()],
            ..Default::default()
        };
        replace_ad_copy(&mut campaign, &id, copy).unwrap();

        let group = &campaign.ad_groups()[0];
        assert_eq!(group.ad_copy.headlines, vec!["24/7 Plumbing"]);
        assert_eq!(group.exact_keywords, vec!["plumber"]);
        assert_eq!(group.ad_copy.status, Some(ExternalStatus::Enabled));
        assert_eq!(campaign.ad_groups()[1], sibling);
    }
}
