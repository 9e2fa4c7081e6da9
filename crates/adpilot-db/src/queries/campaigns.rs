//! Query functions for the `campaigns` cache table.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{CachedCampaign, Campaign};

/// Insert or replace the cached copy of a campaign.
pub async fn upsert_campaign(pool: &SqlitePool, campaign: &Campaign) -> Result<()> {
    let payload = serde_json::to_string(campaign)
        .with_context(|| format!("failed to serialize campaign {}", campaign.id))?;

    sqlx::query(
        "INSERT INTO campaigns (id, name, status, payload, cached_at) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (id) DO UPDATE SET \
             name = excluded.name, \
             status = excluded.status, \
             payload = excluded.payload, \
             cached_at = excluded.cached_at",
    )
    .bind(campaign.id.to_string())
    .bind(&campaign.name)
    .bind(campaign.status.to_string())
    .bind(payload)
    .bind(Utc::now())
    .execute(pool)
    .await
    .with_context(|| format!("failed to cache campaign {}", campaign.id))?;

    Ok(())
}

/// Fetch the cached row for a campaign.
pub async fn get_cached_campaign(pool: &SqlitePool, id: Uuid) -> Result<Option<CachedCampaign>> {
    let row = sqlx::query_as::<_, CachedCampaign>("SELECT * FROM campaigns WHERE id = $1")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await
        .context("failed to fetch cached campaign")?;

    Ok(row)
}

/// Fetch and decode a cached campaign.
pub async fn get_campaign(pool: &SqlitePool, id: Uuid) -> Result<Option<Campaign>> {
    let Some(row) = get_cached_campaign(pool, id).await? else {
        return Ok(None);
    };
    let campaign = row
        .campaign()
        .with_context(|| format!("corrupt cache payload for campaign {id}"))?;
    Ok(Some(campaign))
}

/// List all cached campaigns, ordered by name.
pub async fn list_cached_campaigns(pool: &SqlitePool) -> Result<Vec<CachedCampaign>> {
    let rows = sqlx::query_as::<_, CachedCampaign>("SELECT * FROM campaigns ORDER BY name ASC")
        .fetch_all(pool)
        .await
        .context("failed to list cached campaigns")?;

    Ok(rows)
}

/// Remove a campaign from the cache. Returns whether a row was deleted.
pub async fn delete_campaign(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM campaigns WHERE id = $1")
        .bind(id.to_string())
        .execute(pool)
        .await
        .context("failed to delete cached campaign")?;

    Ok(result.rows_affected() > 0)
}
