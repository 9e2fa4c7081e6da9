//! REST-over-HTTPS binding of [`AdPlatform`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use adpilot_db::models::{AdCopySet, AdGroup, Campaign, StructureDraft};

use super::error::{PlatformError, PlatformResult};
use super::trait_def::AdPlatform;
use super::types::{
    Analytics, CampaignFilter, CampaignSummary, ConnectionState, LinkableAccount, PublishOutcome,
    ToggleOutcome,
};

/// Connection settings for [`HttpPlatform`].
#[derive(Debug, Clone)]
pub struct HttpPlatformConfig {
    /// API root, e.g. `https://api.example.com/v1`.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub access_token: Option<String>,
    /// Per-request timeout. Expiry is reported as a transport failure.
    pub timeout: Duration,
}

impl HttpPlatformConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: None,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

/// Error payload shape: `{"message": "..."}` or `{"error": "..."}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    feedback: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegenerateCopyRequest<'a> {
    ad_group: &'a AdGroup,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishRequest<'a> {
    ad_group_indices: &'a [usize],
}

#[derive(Serialize)]
struct EnableRequest {
    enabled: bool,
}

#[derive(Serialize)]
struct SelectAccountRequest<'a> {
    id: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DisconnectRequest {
    pause_campaigns: bool,
}

/// [`AdPlatform`] over the platform's REST API.
pub struct HttpPlatform {
    config: HttpPlatformConfig,
    client: Client,
}

impl HttpPlatform {
    pub fn new(config: HttpPlatformConfig) -> PlatformResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PlatformError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &HttpPlatformConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.config.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Map a non-2xx response onto the error taxonomy.
    async fn check(response: Response) -> PlatformResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message.or(b.error));

        debug!(status = status.as_u16(), ?message, "platform returned an error status");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(PlatformError::Unauthorized(
                message.unwrap_or_else(|| status.to_string()),
            ));
        }

        Err(PlatformError::Rejected {
            status: Some(status.as_u16()),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> PlatformResult<T> {
        let response = Self::check(request.send().await?).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send_empty(request: RequestBuilder) -> PlatformResult<()> {
        Self::check(request.send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl AdPlatform for HttpPlatform {
    fn name(&self) -> &str {
        "http"
    }

    async fn connect(&self) -> PlatformResult<()> {
        Self::send_empty(self.request(Method::POST, "/connection")).await
    }

    async fn fetch_connection(&self) -> PlatformResult<ConnectionState> {
        Self::send_json(self.request(Method::GET, "/connection")).await
    }

    async fn list_linkable_accounts(&self) -> PlatformResult<Vec<LinkableAccount>> {
        Self::send_json(self.request(Method::GET, "/accounts")).await
    }

    async fn select_account(&self, id: &str, name: &str) -> PlatformResult<()> {
        let body = SelectAccountRequest { id, name };
        Self::send_empty(self.request(Method::POST, "/accounts/select").json(&body)).await
    }

    async fn disconnect(&self, pause_campaigns: bool) -> PlatformResult<()> {
        let body = DisconnectRequest { pause_campaigns };
        Self::send_empty(self.request(Method::POST, "/connection/disconnect").json(&body)).await
    }

    async fn list_campaigns(&self, filter: &CampaignFilter) -> PlatformResult<Vec<CampaignSummary>> {
        let request = self
            .request(Method::GET, "/campaigns")
            .query(&filter.query_pairs());
        Self::send_json(request).await
    }

    async fn fetch_campaign(&self, campaign_id: Uuid) -> PlatformResult<Campaign> {
        Self::send_json(self.request(Method::GET, &format!("/campaigns/{campaign_id}"))).await
    }

    async fn save_campaign(&self, campaign: &Campaign) -> PlatformResult<()> {
        let request = self
            .request(Method::PUT, &format!("/campaigns/{}", campaign.id))
            .json(campaign);
        Self::send_empty(request).await
    }

    async fn generate_draft(
        &self,
        campaign_id: Uuid,
        feedback: Option<&str>,
    ) -> PlatformResult<StructureDraft> {
        let request = self
            .request(Method::POST, &format!("/campaigns/{campaign_id}/generate"))
            .json(&GenerateRequest { feedback });
        Self::send_json(request).await
    }

    async fn regenerate_ad_copy(
        &self,
        campaign_id: Uuid,
        ad_group: &AdGroup,
    ) -> PlatformResult<AdCopySet> {
        let path = format!("/campaigns/{campaign_id}/ad-groups/{}/copy", ad_group.id);
        let request = self
            .request(Method::POST, &path)
            .json(&RegenerateCopyRequest { ad_group });
        Self::send_json(request).await
    }

    async fn publish_draft(
        &self,
        campaign_id: Uuid,
        target_group_indices: &[usize],
    ) -> PlatformResult<PublishOutcome> {
        let request = self
            .request(Method::POST, &format!("/campaigns/{campaign_id}/publish"))
            .json(&PublishRequest {
                ad_group_indices: target_group_indices,
            });
        Self::send_json(request).await
    }

    async fn set_campaign_enabled(
        &self,
        campaign_id: Uuid,
        enabled: bool,
    ) -> PlatformResult<ToggleOutcome> {
        let request = self
            .request(Method::PUT, &format!("/campaigns/{campaign_id}/status"))
            .json(&EnableRequest { enabled });
        Self::send_json(request).await
    }

    async fn set_ad_group_enabled(
        &self,
        campaign_id: Uuid,
        ad_group_ref: &str,
        enabled: bool,
    ) -> PlatformResult<ToggleOutcome> {
        let path = format!("/campaigns/{campaign_id}/ad-groups/{ad_group_ref}/status");
        let request = self
            .request(Method::PUT, &path)
            .json(&EnableRequest { enabled });
        Self::send_json(request).await
    }

    async fn fetch_analytics(&self, campaign_id: Uuid) -> PlatformResult<Analytics> {
        Self::send_json(self.request(Method::GET, &format!("/campaigns/{campaign_id}/analytics")))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let platform = HttpPlatform::new(HttpPlatformConfig::new("https://api.example.com/v1/"))
            .unwrap();
        assert_eq!(
            platform.url("/accounts"),
            "https://api.example.com/v1/accounts"
        );
    }

    #[test]
    fn config_defaults() {
        let cfg = HttpPlatformConfig::new("https://api.example.com").with_access_token("tok");
        assert_eq!(cfg.timeout, HttpPlatformConfig::DEFAULT_TIMEOUT);
        assert_eq!(cfg.access_token.as_deref(), Some("tok"));
    }
}
