//! Persisted record of which attribution data has been sent.
//!
//! Each app user gets one JSON document in storage:
//!
//! ```json
//! {
//!   "networks": { "1": ["adjust-user"] },
//!   "networks_without_user": ["0"],
//!   "ad_services_token": "token"
//! }
//! ```
//!
//! Network keys are the network's raw value. Posts made without a network
//! user id are listed under `networks_without_user`, apart from any real id.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::storage::{keys, StorageAdapter};
use crate::types::AttributionNetwork;

/// Cache of attribution posts that already succeeded, partitioned by app user.
pub trait DeviceCache: Send + Sync {
    /// Whether data for this (network, network user id) pair was already sent
    fn has_sent(
        &self,
        app_user_id: &str,
        network: AttributionNetwork,
        network_user_id: Option<&str>,
    ) -> bool;

    /// Record a successful post for this (network, network user id) pair
    fn mark_sent(
        &self,
        app_user_id: &str,
        network: AttributionNetwork,
        network_user_id: Option<&str>,
    );

    /// The ad-services token already sent for this user, if any
    fn ad_services_token_sent(&self, app_user_id: &str) -> Option<String>;

    /// Record that the ad-services token was sent for this user
    fn mark_ad_services_token_sent(&self, token: &str, app_user_id: &str);

    /// Forget everything sent for this user
    fn clear_attribution_cache(&self, app_user_id: &str);
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SentAttributionRecord {
    #[serde(default)]
    networks: BTreeMap<String, BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    networks_without_user: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ad_services_token: Option<String>,
}

fn network_key(network: AttributionNetwork) -> String {
    network.raw_value().to_string()
}

impl SentAttributionRecord {
    fn contains(&self, network: AttributionNetwork, network_user_id: Option<&str>) -> bool {
        let key = network_key(network);
        match network_user_id {
            Some(id) => self.networks.get(&key).is_some_and(|sent| sent.contains(id)),
            None => self.networks_without_user.contains(&key),
        }
    }

    fn insert(&mut self, network: AttributionNetwork, network_user_id: Option<&str>) {
        let key = network_key(network);
        match network_user_id {
            Some(id) => {
                self.networks.entry(key).or_default().insert(id.to_string());
            }
            None => {
                self.networks_without_user.insert(key);
            }
        }
    }
}

/// [`DeviceCache`] backed by a [`StorageAdapter`].
pub struct StorageDeviceCache {
    storage: Arc<dyn StorageAdapter>,
    // Serializes read-modify-write of the per-user documents
    write_lock: Mutex<()>,
}

impl StorageDeviceCache {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    fn load(&self, app_user_id: &str) -> SentAttributionRecord {
        let Some(raw) = self.storage.get(&keys::attribution(app_user_id)) else {
            return SentAttributionRecord::default();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(
                "Discarding unreadable attribution cache for {}: {}",
                app_user_id,
                e
            );
            SentAttributionRecord::default()
        })
    }

    fn update(&self, app_user_id: &str, f: impl FnOnce(&mut SentAttributionRecord)) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut record = self.load(app_user_id);
        f(&mut record);
        match serde_json::to_string(&record) {
            Ok(json) => self.storage.set(&keys::attribution(app_user_id), &json),
            Err(e) => tracing::error!("Failed to encode attribution cache: {}", e),
        }
    }
}

impl DeviceCache for StorageDeviceCache {
    fn has_sent(
        &self,
        app_user_id: &str,
        network: AttributionNetwork,
        network_user_id: Option<&str>,
    ) -> bool {
        self.load(app_user_id).contains(network, network_user_id)
    }

    fn mark_sent(
        &self,
        app_user_id: &str,
        network: AttributionNetwork,
        network_user_id: Option<&str>,
    ) {
        self.update(app_user_id, |record| record.insert(network, network_user_id));
    }

    fn ad_services_token_sent(&self, app_user_id: &str) -> Option<String> {
        self.load(app_user_id).ad_services_token
    }

    fn mark_ad_services_token_sent(&self, token: &str, app_user_id: &str) {
        self.update(app_user_id, |record| {
            record.ad_services_token = Some(token.to_string());
        });
    }

    fn clear_attribution_cache(&self, app_user_id: &str) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.storage.remove(&keys::attribution(app_user_id));
    }
}

impl std::fmt::Debug for StorageDeviceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageDeviceCache").finish_non_exhaustive()
    }
}
