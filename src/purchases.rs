//! SDK entry point wiring the default collaborators together

use std::sync::Arc;

use crate::attribution::{AttributionFetcher, AttributionPoster, StaticAttributionFetcher};
use crate::attributes::AttributesManager;
use crate::backend::{Backend, HttpBackend};
use crate::device_cache::{DeviceCache, StorageDeviceCache};
use crate::error::Result;
use crate::identity::{CurrentUserProvider, IdentityManager};
use crate::storage::{MemoryStorage, StorageAdapter};
use crate::types::{AttributionData, AttributionNetwork, PostOutcome, SystemInfo};

/// Configuration options for the purchases client
#[derive(Clone, Default)]
pub struct PurchasesOptions {
    /// API server URL (default: [`crate::DEFAULT_BASE_URL`])
    pub base_url: Option<String>,
    /// Custom storage adapter (default: MemoryStorage)
    pub storage: Option<Arc<dyn StorageAdapter>>,
    /// Known app user id (default: persisted id, else anonymous)
    pub app_user_id: Option<String>,
    /// Suppress all network traffic and persisted writes
    pub ui_preview_mode: bool,
    /// Platform flavor reported to the backend (default: "native")
    pub platform_flavor: Option<String>,
    pub platform_version: Option<String>,
    /// Custom ad-services token source (default: none available)
    pub attribution_fetcher: Option<Arc<dyn AttributionFetcher>>,
}

impl std::fmt::Debug for PurchasesOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PurchasesOptions")
            .field("base_url", &self.base_url)
            .field("storage", &"<storage>")
            .field("app_user_id", &self.app_user_id)
            .field("ui_preview_mode", &self.ui_preview_mode)
            .field("platform_flavor", &self.platform_flavor)
            .field("platform_version", &self.platform_version)
            .field("attribution_fetcher", &"<fetcher>")
            .finish()
    }
}

/// Purchases SDK client.
///
/// # Example
/// ```rust,ignore
/// use purchases_sdk::{AttributionNetwork, Purchases};
///
/// let purchases = Purchases::new("appl_public_key", Default::default())?;
/// purchases.on_app_launch().await;
///
/// let data = serde_json::json!({ "adid": "abc" }).as_object().cloned().unwrap();
/// purchases
///     .post_attribution_data(&data, AttributionNetwork::Adjust, Some("adjust-user"))
///     .await?;
/// ```
pub struct Purchases {
    system_info: SystemInfo,
    identity: Arc<IdentityManager>,
    attributes: Arc<AttributesManager>,
    attribution: Arc<AttributionPoster>,
}

impl Purchases {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `api_key` - Public SDK key
    /// * `options` - Optional configuration
    pub fn new(api_key: &str, options: PurchasesOptions) -> Result<Self> {
        let system_info = SystemInfo {
            platform_flavor: options
                .platform_flavor
                .unwrap_or_else(|| SystemInfo::default().platform_flavor),
            platform_version: options.platform_version,
            ui_preview_mode: options.ui_preview_mode,
        };

        let storage: Arc<dyn StorageAdapter> =
            options.storage.unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(
            api_key,
            options.base_url.as_deref(),
            system_info.clone(),
        )?);
        let device_cache: Arc<dyn DeviceCache> =
            Arc::new(StorageDeviceCache::new(storage.clone()));
        let identity = Arc::new(IdentityManager::new(
            storage.clone(),
            device_cache.clone(),
            options.app_user_id.as_deref(),
            system_info.ui_preview_mode,
        ));
        let attributes = Arc::new(AttributesManager::new(storage, backend.clone()));
        let fetcher = options
            .attribution_fetcher
            .unwrap_or_else(|| Arc::new(StaticAttributionFetcher::default()));

        let attribution = Arc::new(AttributionPoster::new(
            device_cache,
            identity.clone(),
            backend,
            fetcher,
            attributes.clone(),
            system_info.clone(),
        ));

        Ok(Self {
            system_info,
            identity,
            attributes,
            attribution,
        })
    }

    pub fn app_user_id(&self) -> String {
        self.identity.current_app_user_id()
    }

    pub fn is_anonymous(&self) -> bool {
        self.identity.is_anonymous()
    }

    /// Switch to a known app user. Returns `true` if the user changed.
    pub fn log_in(&self, app_user_id: &str) -> Result<bool> {
        self.identity.log_in(app_user_id)
    }

    pub fn log_out(&self) -> Result<()> {
        self.identity.log_out()
    }

    pub fn attribution(&self) -> &Arc<AttributionPoster> {
        &self.attribution
    }

    pub fn attributes(&self) -> &Arc<AttributesManager> {
        &self.attributes
    }

    pub async fn post_attribution_data(
        &self,
        data: &AttributionData,
        network: AttributionNetwork,
        network_user_id: Option<&str>,
    ) -> Result<PostOutcome> {
        self.attribution
            .post_attribution_data(data, network, network_user_id)
            .await
    }

    /// Push converted attributes for the current user to the backend.
    ///
    /// Sends nothing in UI preview mode.
    pub async fn sync_attributes(&self) -> Result<usize> {
        if self.system_info.ui_preview_mode {
            tracing::debug!("Skipping subscriber attributes sync in UI preview mode");
            return Ok(0);
        }
        self.attributes
            .sync_attributes_for_user(&self.app_user_id())
            .await
    }

    /// Launch-time housekeeping: replay postponed attribution data and post
    /// the ad-services token if it hasn't been sent yet. Failures are logged.
    pub async fn on_app_launch(&self) {
        if let Err(e) = self
            .attribution
            .post_postponed_attribution_data_if_needed()
            .await
        {
            tracing::warn!("Failed to post postponed attribution data: {}", e);
        }
        if let Err(e) = self
            .attribution
            .post_ad_services_token_once_per_install_if_needed()
            .await
        {
            tracing::warn!("Failed to post ad services token: {}", e);
        }
    }
}

impl std::fmt::Debug for Purchases {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Purchases")
            .field("app_user_id", &self.app_user_id())
            .field("attribution", &self.attribution)
            .finish()
    }
}
