//! Campaigns and accounts in common lifecycle positions.

use adpilot_core::platform::{ConnectionState, LinkableAccount};
use adpilot_db::models::{
    AdCopySet, AdGroup, Campaign, CampaignStatus, DraftSettings, ExternalStatus, StructureDraft,
};

pub const ACCOUNT_ID: &str = "123-456-7890";
pub const ACCOUNT_NAME: &str = "Acme Plumbing";

/// A draft with one ad group per name.
pub fn draft_with_groups(names: &[&str]) -> StructureDraft {
    StructureDraft {
        settings: DraftSettings {
            name: "Spring plumbing".to_string(),
            landing_url: Some("https://acme.example/plumbing".to_string()),
            ..Default::default()
        },
        ad_groups: names
            .iter()
            .map(|name| AdGroup {
                theme: format!("{name} services"),
                exact_keywords: vec![name.to_lowercase()],
                ad_copy: AdCopySet {
                    headlines: vec![format!("{name} you can trust")],
                    descriptions: vec!["Licensed and insured.".to_string()],
                    ..Default::default()
                },
                ..AdGroup::new(*name)
            })
            .collect(),
    }
}

/// A campaign in `planning` with no draft.
pub fn planning_campaign() -> Campaign {
    Campaign::new("Spring plumbing")
}

/// A campaign in `review` with two ad groups.
pub fn review_campaign() -> Campaign {
    let mut campaign = planning_campaign();
    campaign.status = CampaignStatus::Review;
    campaign.structure_draft = Some(draft_with_groups(&["Emergency", "Drains"]));
    campaign
}

/// A campaign approved and locked, ready to publish.
pub fn approved_campaign() -> Campaign {
    let mut campaign = review_campaign();
    campaign.status = CampaignStatus::Approved;
    campaign.draft_lock = true;
    campaign
}

/// A published, running campaign with both ad groups enabled.
pub fn active_campaign() -> Campaign {
    let mut campaign = approved_campaign();
    campaign.status = CampaignStatus::Active;
    campaign.external_resource_id = Some(format!("customers/1/campaigns/{}", campaign.id));
    campaign.external_status = Some(ExternalStatus::Enabled);
    if let Some(draft) = campaign.structure_draft.as_mut() {
        for group in &mut draft.ad_groups {
            group.ad_copy.status = Some(ExternalStatus::Enabled);
        }
    }
    campaign
}

pub fn connected_with_account() -> ConnectionState {
    ConnectionState::ConnectedWithAccount {
        account_id: ACCOUNT_ID.to_string(),
        account_name: ACCOUNT_NAME.to_string(),
    }
}

/// One selectable account and one suspended account.
pub fn linkable_accounts() -> Vec<LinkableAccount> {
    vec![
        LinkableAccount {
            id: ACCOUNT_ID.to_string(),
            name: ACCOUNT_NAME.to_string(),
            is_selectable: true,
            block_reason: None,
        },
        LinkableAccount {
            id: "999-000-1111".to_string(),
            name: "Old Acme".to_string(),
            is_selectable: false,
            block_reason: Some("SUSPENDED".to_string()),
        },
    ]
}
