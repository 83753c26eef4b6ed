//! Test utilities and fixtures for purchases SDK integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

pub use purchases_sdk::*;

/// Default timeout for polling helpers
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Build an attribution payload from a `json!` object literal
pub fn attribution_data(value: serde_json::Value) -> AttributionData {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("attribution data must be an object, got {}", other),
    }
}

/// A backend failure like the one the server returns for a bad API key
pub fn invalid_api_key_error() -> PurchasesError {
    PurchasesError::with_status(PurchasesErrorCode::InvalidApiKey, "Invalid API key", 401)
}

/// Poll `condition` until it holds, panicking after `DEFAULT_TIMEOUT`.
pub async fn wait_until<F>(description: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    let start = tokio::time::Instant::now();
    loop {
        if condition() {
            return;
        }
        if start.elapsed() > DEFAULT_TIMEOUT {
            panic!("Timed out waiting for: {}", description);
        }
        tokio::time::sleep(DEFAULT_POLL_INTERVAL).await;
    }
}

/// Await `future`, returning `None` on timeout.
pub async fn wait_until_value<T>(future: impl Future<Output = T>) -> Option<T> {
    tokio::time::timeout(DEFAULT_TIMEOUT, future).await.ok()
}

// ─── Mocks ───

#[derive(Debug, Clone, PartialEq)]
pub struct PostAttributionDataCall {
    pub data: AttributionData,
    pub network: AttributionNetwork,
    pub app_user_id: String,
}

/// Backend recording every call, answering with stubbed results
pub struct MockBackend {
    pub stubbed_post_attribution_data_result: Mutex<Result<()>>,
    pub stubbed_post_ad_services_token_result: Mutex<Result<()>>,
    pub post_attribution_data_calls: Mutex<Vec<PostAttributionDataCall>>,
    pub post_ad_services_token_calls: Mutex<Vec<(String, String)>>,
    pub post_subscriber_attributes_count: AtomicUsize,
    /// Delays before answering, to widen race windows
    pub post_attribution_data_delay: Mutex<Option<Duration>>,
    pub ad_services_delay: Mutex<Option<Duration>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            stubbed_post_attribution_data_result: Mutex::new(Ok(())),
            stubbed_post_ad_services_token_result: Mutex::new(Ok(())),
            post_attribution_data_calls: Mutex::new(Vec::new()),
            post_ad_services_token_calls: Mutex::new(Vec::new()),
            post_subscriber_attributes_count: AtomicUsize::new(0),
            post_attribution_data_delay: Mutex::new(None),
            ad_services_delay: Mutex::new(None),
        }
    }
}

impl MockBackend {
    pub fn invoked_post_attribution_data_count(&self) -> usize {
        self.post_attribution_data_calls.lock().unwrap().len()
    }

    pub fn invoked_post_ad_services_token_count(&self) -> usize {
        self.post_ad_services_token_calls.lock().unwrap().len()
    }

    pub fn stub_post_attribution_data(&self, result: Result<()>) {
        *self.stubbed_post_attribution_data_result.lock().unwrap() = result;
    }

    pub fn stub_post_ad_services_token(&self, result: Result<()>) {
        *self.stubbed_post_ad_services_token_result.lock().unwrap() = result;
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn post_attribution_data(
        &self,
        data: &AttributionData,
        network: AttributionNetwork,
        app_user_id: &str,
    ) -> Result<()> {
        self.post_attribution_data_calls
            .lock()
            .unwrap()
            .push(PostAttributionDataCall {
                data: data.clone(),
                network,
                app_user_id: app_user_id.to_string(),
            });
        let delay = *self.post_attribution_data_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.stubbed_post_attribution_data_result.lock().unwrap().clone()
    }

    async fn post_ad_services_token(&self, token: &str, app_user_id: &str) -> Result<()> {
        self.post_ad_services_token_calls
            .lock()
            .unwrap()
            .push((token.to_string(), app_user_id.to_string()));
        let delay = *self.ad_services_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.stubbed_post_ad_services_token_result.lock().unwrap().clone()
    }

    async fn post_subscriber_attributes(
        &self,
        _attributes: &BTreeMap<String, SubscriberAttribute>,
        _app_user_id: &str,
    ) -> Result<()> {
        self.post_subscriber_attributes_count
            .fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Real storage-backed cache that also records writes
pub struct MockDeviceCache {
    inner: StorageDeviceCache,
    pub mark_sent_calls: Mutex<Vec<(String, AttributionNetwork, Option<String>)>>,
    pub mark_ad_services_token_sent_calls: Mutex<Vec<(BTreeMap<AttributionNetwork, String>, String)>>,
}

impl MockDeviceCache {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self {
            inner: StorageDeviceCache::new(storage),
            mark_sent_calls: Mutex::new(Vec::new()),
            mark_ad_services_token_sent_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn invoked_mark_sent_count(&self) -> usize {
        self.mark_sent_calls.lock().unwrap().len()
    }

    pub fn invoked_mark_ad_services_token_sent_count(&self) -> usize {
        self.mark_ad_services_token_sent_calls.lock().unwrap().len()
    }

    /// Total writes of either kind
    pub fn write_count(&self) -> usize {
        self.invoked_mark_sent_count() + self.invoked_mark_ad_services_token_sent_count()
    }
}

impl DeviceCache for MockDeviceCache {
    fn has_sent(
        &self,
        app_user_id: &str,
        network: AttributionNetwork,
        network_user_id: Option<&str>,
    ) -> bool {
        self.inner.has_sent(app_user_id, network, network_user_id)
    }

    fn mark_sent(
        &self,
        app_user_id: &str,
        network: AttributionNetwork,
        network_user_id: Option<&str>,
    ) {
        self.mark_sent_calls.lock().unwrap().push((
            app_user_id.to_string(),
            network,
            network_user_id.map(str::to_string),
        ));
        self.inner.mark_sent(app_user_id, network, network_user_id)
    }

    fn ad_services_token_sent(&self, app_user_id: &str) -> Option<String> {
        self.inner.ad_services_token_sent(app_user_id)
    }

    fn mark_ad_services_token_sent(&self, token: &str, app_user_id: &str) {
        let params = BTreeMap::from([(AttributionNetwork::AdServices, token.to_string())]);
        self.mark_ad_services_token_sent_calls
            .lock()
            .unwrap()
            .push((params, app_user_id.to_string()));
        self.inner.mark_ad_services_token_sent(token, app_user_id)
    }

    fn clear_attribution_cache(&self, app_user_id: &str) {
        self.inner.clear_attribution_cache(app_user_id)
    }
}

pub struct MockCurrentUserProvider {
    pub app_user_id: Mutex<String>,
}

impl MockCurrentUserProvider {
    pub fn new(app_user_id: &str) -> Self {
        Self {
            app_user_id: Mutex::new(app_user_id.to_string()),
        }
    }

    pub fn set(&self, app_user_id: &str) {
        *self.app_user_id.lock().unwrap() = app_user_id.to_string();
    }
}

impl CurrentUserProvider for MockCurrentUserProvider {
    fn current_app_user_id(&self) -> String {
        self.app_user_id.lock().unwrap().clone()
    }
}

pub struct MockAttributionFetcher {
    pub ad_services_token_to_return: Mutex<Option<String>>,
    pub invoked_ad_services_token_count: AtomicUsize,
}

impl Default for MockAttributionFetcher {
    fn default() -> Self {
        Self {
            ad_services_token_to_return: Mutex::new(Some("mock-ad-services-token".to_string())),
            invoked_ad_services_token_count: AtomicUsize::new(0),
        }
    }
}

impl MockAttributionFetcher {
    pub fn set_token(&self, token: Option<&str>) {
        *self.ad_services_token_to_return.lock().unwrap() = token.map(str::to_string);
    }
}

#[async_trait]
impl AttributionFetcher for MockAttributionFetcher {
    async fn ad_services_token(&self) -> Option<String> {
        self.invoked_ad_services_token_count
            .fetch_add(1, Ordering::SeqCst);
        self.ad_services_token_to_return.lock().unwrap().clone()
    }
}

pub struct MockSubscriberAttributesManager {
    pub stubbed_result: Mutex<Result<()>>,
    pub convert_calls: Mutex<Vec<(AttributionData, AttributionNetwork, String)>>,
}

impl Default for MockSubscriberAttributesManager {
    fn default() -> Self {
        Self {
            stubbed_result: Mutex::new(Ok(())),
            convert_calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockSubscriberAttributesManager {
    pub fn invoked_convert_attribution_data_and_set_count(&self) -> usize {
        self.convert_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SubscriberAttributesManager for MockSubscriberAttributesManager {
    async fn convert_attribution_data_and_set(
        &self,
        data: &AttributionData,
        network: AttributionNetwork,
        app_user_id: &str,
    ) -> Result<()> {
        self.convert_calls
            .lock()
            .unwrap()
            .push((data.clone(), network, app_user_id.to_string()));
        self.stubbed_result.lock().unwrap().clone()
    }
}

/// An attribution poster wired to mocks, with handles to every mock
pub struct PosterFixture {
    pub poster: Arc<AttributionPoster>,
    pub storage: Arc<MemoryStorage>,
    pub device_cache: Arc<MockDeviceCache>,
    pub backend: Arc<MockBackend>,
    pub current_user_provider: Arc<MockCurrentUserProvider>,
    pub attribution_fetcher: Arc<MockAttributionFetcher>,
    pub subscriber_attributes_manager: Arc<MockSubscriberAttributesManager>,
}

pub const TEST_APP_USER_ID: &str = "userID";

pub fn setup_poster() -> PosterFixture {
    setup_poster_with(SystemInfo::default())
}

pub fn setup_poster_in_preview_mode() -> PosterFixture {
    setup_poster_with(SystemInfo {
        ui_preview_mode: true,
        ..SystemInfo::default()
    })
}

pub fn setup_poster_with(system_info: SystemInfo) -> PosterFixture {
    let storage = Arc::new(MemoryStorage::new());
    let device_cache = Arc::new(MockDeviceCache::new(storage.clone()));
    let backend = Arc::new(MockBackend::default());
    let current_user_provider = Arc::new(MockCurrentUserProvider::new(TEST_APP_USER_ID));
    let attribution_fetcher = Arc::new(MockAttributionFetcher::default());
    let subscriber_attributes_manager = Arc::new(MockSubscriberAttributesManager::default());

    let poster = Arc::new(AttributionPoster::new(
        device_cache.clone(),
        current_user_provider.clone(),
        backend.clone(),
        attribution_fetcher.clone(),
        subscriber_attributes_manager.clone(),
        system_info,
    ));

    PosterFixture {
        poster,
        storage,
        device_cache,
        backend,
        current_user_provider,
        attribution_fetcher,
        subscriber_attributes_manager,
    }
}
