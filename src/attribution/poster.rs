//! Deduplicating attribution poster.
//!
//! Attribution data is forwarded at most once per (network, network user id)
//! pair for each app user. The record is written only after the backend (or
//! the subscriber attributes manager) accepted the data, so a failed post is
//! attempted again on the next call. Nothing here retries on its own.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use tokio::task::JoinHandle;

use super::fetcher::AttributionFetcher;
use super::locks::KeyedLocks;
use crate::attributes::SubscriberAttributesManager;
use crate::backend::Backend;
use crate::device_cache::DeviceCache;
use crate::error::Result;
use crate::identity::CurrentUserProvider;
use crate::types::{
    AttributionData, AttributionNetwork, PostOutcome, PostponedAttributionData, SkipReason,
    SystemInfo,
};

pub struct AttributionPoster {
    device_cache: Arc<dyn DeviceCache>,
    current_user_provider: Arc<dyn CurrentUserProvider>,
    backend: Arc<dyn Backend>,
    attribution_fetcher: Arc<dyn AttributionFetcher>,
    subscriber_attributes_manager: Arc<dyn SubscriberAttributesManager>,
    system_info: SystemInfo,
    postponed: Mutex<Vec<PostponedAttributionData>>,
    locks: KeyedLocks,
}

impl AttributionPoster {
    pub fn new(
        device_cache: Arc<dyn DeviceCache>,
        current_user_provider: Arc<dyn CurrentUserProvider>,
        backend: Arc<dyn Backend>,
        attribution_fetcher: Arc<dyn AttributionFetcher>,
        subscriber_attributes_manager: Arc<dyn SubscriberAttributesManager>,
        system_info: SystemInfo,
    ) -> Self {
        Self {
            device_cache,
            current_user_provider,
            backend,
            attribution_fetcher,
            subscriber_attributes_manager,
            system_info,
            postponed: Mutex::new(Vec::new()),
            locks: KeyedLocks::default(),
        }
    }

    fn preview_mode(&self) -> bool {
        self.system_info.ui_preview_mode
    }

    /// Forward attribution data unless this exact pair was already sent for
    /// the current app user.
    ///
    /// Search ads data goes straight to the attribution endpoint; everything
    /// else is converted into subscriber attributes.
    pub async fn post_attribution_data(
        &self,
        data: &AttributionData,
        network: AttributionNetwork,
        network_user_id: Option<&str>,
    ) -> Result<PostOutcome> {
        if self.preview_mode() {
            tracing::debug!("Skipping {} attribution in UI preview mode", network);
            return Ok(PostOutcome::Skipped(SkipReason::PreviewMode));
        }

        let app_user_id = self.current_user_provider.current_app_user_id();
        let _guard = self
            .locks
            .lock(format!(
                "attribution:{}:{}:{}",
                app_user_id,
                network.raw_value(),
                network_user_id.unwrap_or_default()
            ))
            .await;

        if self
            .device_cache
            .has_sent(&app_user_id, network, network_user_id)
        {
            tracing::debug!(
                "{} attribution for network user {:?} already sent, skipping",
                network,
                network_user_id
            );
            return Ok(PostOutcome::Skipped(SkipReason::AlreadySent));
        }

        let result = if network.posts_directly_to_backend() {
            self.backend
                .post_attribution_data(data, network, &app_user_id)
                .await
        } else {
            self.subscriber_attributes_manager
                .convert_attribution_data_and_set(data, network, &app_user_id)
                .await
        };

        if let Err(e) = result {
            tracing::warn!("Failed to post {} attribution data: {}", network, e);
            return Err(e);
        }

        self.device_cache
            .mark_sent(&app_user_id, network, network_user_id);
        tracing::info!("Posted {} attribution data for {}", network, app_user_id);
        Ok(PostOutcome::Posted)
    }

    /// Hold attribution data until [`Self::post_postponed_attribution_data_if_needed`].
    pub fn store_postponed_attribution_data(
        &self,
        data: AttributionData,
        network: AttributionNetwork,
        network_user_id: Option<String>,
    ) {
        self.postponed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(PostponedAttributionData {
                data,
                network,
                network_user_id,
            });
    }

    pub fn postponed_attribution_data(&self) -> Vec<PostponedAttributionData> {
        self.postponed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replay and clear postponed attribution data.
    ///
    /// Every entry is attempted; the first failure is returned afterwards.
    /// In preview mode the data is discarded unsent.
    pub async fn post_postponed_attribution_data_if_needed(&self) -> Result<usize> {
        let pending = std::mem::take(&mut *self.postponed.lock().unwrap_or_else(|e| e.into_inner()));

        if self.preview_mode() {
            if !pending.is_empty() {
                tracing::debug!(
                    "Discarding {} postponed attribution entries in UI preview mode",
                    pending.len()
                );
            }
            return Ok(0);
        }

        let mut posted = 0;
        let mut first_error = None;
        for entry in pending {
            match self
                .post_attribution_data(&entry.data, entry.network, entry.network_user_id.as_deref())
                .await
            {
                Ok(PostOutcome::Posted) => posted += 1,
                Ok(PostOutcome::Skipped(_)) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(posted),
        }
    }

    /// The ad-services token, unless one was already sent for the current user.
    pub async fn ad_services_token_to_post_if_needed(&self) -> Option<String> {
        let app_user_id = self.current_user_provider.current_app_user_id();
        if self
            .device_cache
            .ad_services_token_sent(&app_user_id)
            .is_some()
        {
            return None;
        }
        self.attribution_fetcher.ad_services_token().await
    }

    /// Post the ad-services token once per install.
    ///
    /// A missing token is not an error. On failure no marker is written, so
    /// the next launch tries again.
    pub async fn post_ad_services_token_once_per_install_if_needed(&self) -> Result<PostOutcome> {
        if self.preview_mode() {
            return Ok(PostOutcome::Skipped(SkipReason::PreviewMode));
        }

        let app_user_id = self.current_user_provider.current_app_user_id();
        let _guard = self
            .locks
            .lock(format!("ad_services:{}", app_user_id))
            .await;

        if self
            .device_cache
            .ad_services_token_sent(&app_user_id)
            .is_some()
        {
            tracing::debug!("Ad services token already sent, skipping");
            return Ok(PostOutcome::Skipped(SkipReason::AlreadySent));
        }

        let Some(token) = self.attribution_fetcher.ad_services_token().await else {
            tracing::debug!("No ad services token available");
            return Ok(PostOutcome::Skipped(SkipReason::NoToken));
        };

        if let Err(e) = self
            .backend
            .post_ad_services_token(&token, &app_user_id)
            .await
        {
            tracing::warn!("Failed to post ad services token: {}", e);
            return Err(e);
        }

        self.device_cache
            .mark_ad_services_token_sent(&token, &app_user_id);
        tracing::info!("Posted ad services token for {}", app_user_id);
        Ok(PostOutcome::Posted)
    }

    /// Fire-and-forget variant of
    /// [`Self::post_ad_services_token_once_per_install_if_needed`].
    ///
    /// Failures and panics are logged rather than surfaced.
    pub fn spawn_post_ad_services_token(self: &Arc<Self>) -> JoinHandle<()> {
        let poster = Arc::clone(self);
        tokio::spawn(
            AssertUnwindSafe(async move {
                if let Err(e) = poster
                    .post_ad_services_token_once_per_install_if_needed()
                    .await
                {
                    tracing::warn!("Ad services token post failed: {}", e);
                }
            })
            .catch_unwind()
            .map(|result| {
                if let Err(panic) = result {
                    let panic_msg = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!("Ad services token task panicked: {}", panic_msg);
                }
            }),
        )
    }
}

impl std::fmt::Debug for AttributionPoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributionPoster")
            .field("system_info", &self.system_info)
            .field("postponed", &self.postponed_attribution_data().len())
            .finish()
    }
}
