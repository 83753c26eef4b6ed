//! HTTP backend client

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::attributes::SubscriberAttribute;
use crate::error::{map_status_to_error_code, PurchasesError, Result};
use crate::types::{AttributionData, AttributionNetwork, SystemInfo};

/// Default purchases API URL
pub const DEFAULT_BASE_URL: &str = "https://api.revenuecat.com";

/// Network calls the SDK makes. Implementations must not retry internally
/// beyond what the transport does; callers decide what to do with failures.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn post_attribution_data(
        &self,
        data: &AttributionData,
        network: AttributionNetwork,
        app_user_id: &str,
    ) -> Result<()>;

    async fn post_ad_services_token(&self, token: &str, app_user_id: &str) -> Result<()>;

    async fn post_subscriber_attributes(
        &self,
        attributes: &BTreeMap<String, SubscriberAttribute>,
        app_user_id: &str,
    ) -> Result<()>;
}

/// [`Backend`] speaking JSON over HTTPS.
pub struct HttpBackend {
    api_key: String,
    base_url: String,
    system_info: SystemInfo,
    http: HttpClient,
}

impl HttpBackend {
    /// Create a backend client.
    ///
    /// # Arguments
    /// * `api_key` - Public SDK key
    /// * `base_url` - API root (default: [`DEFAULT_BASE_URL`])
    pub fn new(api_key: &str, base_url: Option<&str>, system_info: SystemInfo) -> Result<Self> {
        if api_key.is_empty() {
            return Err(PurchasesError::validation("api_key is required"));
        }

        let base_url = base_url
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        Url::parse(&base_url)
            .map_err(|e| PurchasesError::validation(format!("Invalid base_url: {}", e)))?;

        let http = HttpClient::builder()
            .user_agent(concat!("purchases-sdk-rust/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PurchasesError::network(e.to_string()))?;

        Ok(Self {
            api_key: api_key.to_string(),
            base_url,
            system_info,
            http,
        })
    }

    fn subscriber_url(&self, app_user_id: &str, suffix: &str) -> String {
        format!(
            "{}/v1/subscribers/{}/{}",
            self.base_url,
            urlencoding::encode(app_user_id),
            suffix
        )
    }

    async fn post<B: Serialize>(&self, url: &str, body: &B) -> Result<()> {
        let mut request = self
            .http
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("X-Platform-Flavor", &self.system_info.platform_flavor)
            .json(body);
        if let Some(version) = &self.system_info.platform_version {
            request = request.header("X-Platform-Flavor-Version", version);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PurchasesError::network(e.to_string()))?;

        self.handle_response(response).await
    }

    async fn handle_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status().as_u16();

        if response.status().is_success() {
            return Ok(());
        }

        #[derive(Deserialize)]
        struct ErrorResponse {
            code: Option<i64>,
            message: Option<String>,
        }

        let error_body: ErrorResponse = response.json().await.unwrap_or(ErrorResponse {
            code: None,
            message: None,
        });

        let message = match (error_body.code, error_body.message) {
            (Some(code), Some(message)) => format!("{} (code {})", message, code),
            (None, Some(message)) => message,
            (Some(code), None) => format!("Request failed: {} (code {})", status, code),
            (None, None) => format!("Request failed: {}", status),
        };
        let code = map_status_to_error_code(status, &message);

        Err(PurchasesError::with_status(code, message, status))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn post_attribution_data(
        &self,
        data: &AttributionData,
        network: AttributionNetwork,
        app_user_id: &str,
    ) -> Result<()> {
        #[derive(Serialize)]
        struct AttributionRequest<'a> {
            network: AttributionNetwork,
            data: &'a AttributionData,
        }

        let url = self.subscriber_url(app_user_id, "attribution");
        self.post(&url, &AttributionRequest { network, data }).await
    }

    async fn post_ad_services_token(&self, token: &str, app_user_id: &str) -> Result<()> {
        #[derive(Serialize)]
        struct AdServicesRequest<'a> {
            aad_attribution_token: &'a str,
        }

        let url = self.subscriber_url(app_user_id, "adservices_attribution");
        self.post(
            &url,
            &AdServicesRequest {
                aad_attribution_token: token,
            },
        )
        .await
    }

    async fn post_subscriber_attributes(
        &self,
        attributes: &BTreeMap<String, SubscriberAttribute>,
        app_user_id: &str,
    ) -> Result<()> {
        #[derive(Serialize)]
        struct AttributeValue<'a> {
            value: Option<&'a str>,
            updated_at_ms: i64,
        }

        #[derive(Serialize)]
        struct AttributesRequest<'a> {
            attributes: BTreeMap<&'a str, AttributeValue<'a>>,
        }

        let body = AttributesRequest {
            attributes: attributes
                .iter()
                .map(|(key, attribute)| {
                    (
                        key.as_str(),
                        AttributeValue {
                            value: attribute.value.as_deref(),
                            updated_at_ms: attribute.set_at.timestamp_millis(),
                        },
                    )
                })
                .collect(),
        };

        let url = self.subscriber_url(app_user_id, "attributes");
        self.post(&url, &body).await
    }
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.base_url)
            .field("system_info", &self.system_info)
            .finish()
    }
}
