//! Subscriber attributes and the conversion of legacy attribution payloads
//! into them.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::Backend;
use crate::error::Result;
use crate::storage::{keys, StorageAdapter};
use crate::types::{AttributionData, AttributionNetwork};

/// Reserved attribute keys
pub mod reserved {
    pub const IDFA: &str = "$idfa";
    pub const IDFV: &str = "$idfv";
    pub const IP: &str = "$ip";
    pub const ADJUST_ID: &str = "$adjustId";
    pub const APPSFLYER_ID: &str = "$appsflyerId";
    pub const MPARTICLE_ID: &str = "$mparticleId";
    pub const MEDIA_SOURCE: &str = "$mediaSource";
    pub const CAMPAIGN: &str = "$campaign";
    pub const AD_GROUP: &str = "$adGroup";
    pub const AD: &str = "$ad";
    pub const KEYWORD: &str = "$keyword";
    pub const CREATIVE: &str = "$creative";
}

/// A single subscriber attribute as stored locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberAttribute {
    /// `None` deletes the attribute on the backend
    pub value: Option<String>,
    pub set_at: DateTime<Utc>,
    pub is_synced: bool,
}

/// Turns attribution payloads into subscriber attribute updates.
///
/// Implementations own their own dedup and sync policy.
#[async_trait]
pub trait SubscriberAttributesManager: Send + Sync {
    async fn convert_attribution_data_and_set(
        &self,
        data: &AttributionData,
        network: AttributionNetwork,
        app_user_id: &str,
    ) -> Result<()>;
}

/// Maps well-known attribution payload keys onto reserved attributes.
#[derive(Debug, Default, Clone, Copy)]
pub struct AttributionDataMigrator;

impl AttributionDataMigrator {
    pub fn new() -> Self {
        Self
    }

    pub fn convert_to_subscriber_attributes(
        &self,
        data: &AttributionData,
        network: AttributionNetwork,
    ) -> BTreeMap<String, String> {
        let mut attributes = BTreeMap::new();

        copy(&mut attributes, data, reserved::IDFA, &["rc_idfa"]);
        copy(&mut attributes, data, reserved::IDFV, &["rc_idfv"]);
        copy(&mut attributes, data, reserved::IP, &["rc_ip_address"]);

        match network {
            AttributionNetwork::Adjust => {
                copy(&mut attributes, data, reserved::ADJUST_ID, &["adid"]);
                copy(&mut attributes, data, reserved::MEDIA_SOURCE, &["network"]);
                copy(&mut attributes, data, reserved::CAMPAIGN, &["campaign"]);
                copy(&mut attributes, data, reserved::AD_GROUP, &["adgroup"]);
                copy(&mut attributes, data, reserved::CREATIVE, &["creative"]);
            }
            AttributionNetwork::AppsFlyer => {
                copy(
                    &mut attributes,
                    data,
                    reserved::APPSFLYER_ID,
                    &["rc_appsflyer_id", "appsflyer_id"],
                );
                // Conversion data may arrive wrapped in a `data` object
                let inner = match data.get("data") {
                    Some(Value::Object(inner)) => inner,
                    _ => data,
                };
                copy(
                    &mut attributes,
                    inner,
                    reserved::APPSFLYER_ID,
                    &["rc_appsflyer_id", "appsflyer_id"],
                );
                copy(&mut attributes, inner, reserved::MEDIA_SOURCE, &["media_source", "channel"]);
                copy(&mut attributes, inner, reserved::CAMPAIGN, &["campaign"]);
                copy(&mut attributes, inner, reserved::AD_GROUP, &["adgroup", "adset"]);
                copy(&mut attributes, inner, reserved::AD, &["af_ad", "ad_id"]);
                copy(&mut attributes, inner, reserved::KEYWORD, &["af_keywords", "keyword"]);
                copy(&mut attributes, inner, reserved::CREATIVE, &["creative"]);
            }
            AttributionNetwork::Branch => {
                copy(&mut attributes, data, reserved::MEDIA_SOURCE, &["channel"]);
                copy(&mut attributes, data, reserved::CAMPAIGN, &["campaign"]);
            }
            AttributionNetwork::MParticle => {
                copy(&mut attributes, data, reserved::MPARTICLE_ID, &["mpid"]);
            }
            AttributionNetwork::AppleSearchAds
            | AttributionNetwork::Tenjin
            | AttributionNetwork::Facebook
            | AttributionNetwork::AdServices => {}
        }

        attributes
    }
}

/// Copy the first usable value among `candidates` unless `attribute` is already set.
fn copy(
    attributes: &mut BTreeMap<String, String>,
    data: &AttributionData,
    attribute: &str,
    candidates: &[&str],
) {
    if attributes.contains_key(attribute) {
        return;
    }
    if let Some(value) = candidates.iter().find_map(|key| data.get(*key).and_then(stringify)) {
        attributes.insert(attribute.to_string(), value);
    }
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Stores subscriber attributes per app user and syncs them to the backend.
pub struct AttributesManager {
    storage: Arc<dyn StorageAdapter>,
    backend: Arc<dyn Backend>,
    migrator: AttributionDataMigrator,
    write_lock: Mutex<()>,
}

impl AttributesManager {
    pub fn new(storage: Arc<dyn StorageAdapter>, backend: Arc<dyn Backend>) -> Self {
        Self {
            storage,
            backend,
            migrator: AttributionDataMigrator::new(),
            write_lock: Mutex::new(()),
        }
    }

    fn load(&self, app_user_id: &str) -> BTreeMap<String, SubscriberAttribute> {
        let Some(raw) = self.storage.get(&keys::attributes(app_user_id)) else {
            return BTreeMap::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(
                "Discarding unreadable subscriber attributes for {}: {}",
                app_user_id,
                e
            );
            BTreeMap::new()
        })
    }

    fn store(&self, app_user_id: &str, attributes: &BTreeMap<String, SubscriberAttribute>) {
        match serde_json::to_string(attributes) {
            Ok(json) => self.storage.set(&keys::attributes(app_user_id), &json),
            Err(e) => tracing::error!("Failed to encode subscriber attributes: {}", e),
        }
    }

    /// All attributes stored for this user
    pub fn attributes(&self, app_user_id: &str) -> BTreeMap<String, SubscriberAttribute> {
        self.load(app_user_id)
    }

    /// Attributes not yet accepted by the backend
    pub fn unsynced_attributes(&self, app_user_id: &str) -> BTreeMap<String, SubscriberAttribute> {
        self.load(app_user_id)
            .into_iter()
            .filter(|(_, attribute)| !attribute.is_synced)
            .collect()
    }

    /// Set attributes, skipping any whose value is unchanged.
    ///
    /// Returns the number of attributes that changed.
    pub fn set_attributes(
        &self,
        values: BTreeMap<String, Option<String>>,
        app_user_id: &str,
    ) -> usize {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut stored = self.load(app_user_id);
        let now = Utc::now();
        let mut changed = 0;

        for (key, value) in values {
            if stored.get(&key).is_some_and(|existing| existing.value == value) {
                continue;
            }
            stored.insert(
                key,
                SubscriberAttribute {
                    value,
                    set_at: now,
                    is_synced: false,
                },
            );
            changed += 1;
        }

        if changed > 0 {
            self.store(app_user_id, &stored);
        }
        changed
    }

    /// Post unsynced attributes for this user.
    ///
    /// Returns the number of attributes sent. Attributes changed while the
    /// request was in flight stay unsynced.
    pub async fn sync_attributes_for_user(&self, app_user_id: &str) -> Result<usize> {
        let unsynced = self.unsynced_attributes(app_user_id);
        if unsynced.is_empty() {
            return Ok(0);
        }

        self.backend
            .post_subscriber_attributes(&unsynced, app_user_id)
            .await?;

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut stored = self.load(app_user_id);
        for (key, sent) in &unsynced {
            if let Some(current) = stored.get_mut(key)
                && current.set_at == sent.set_at
                && current.value == sent.value
            {
                current.is_synced = true;
            }
        }
        self.store(app_user_id, &stored);

        tracing::debug!("Synced {} subscriber attributes for {}", unsynced.len(), app_user_id);
        Ok(unsynced.len())
    }
}

#[async_trait]
impl SubscriberAttributesManager for AttributesManager {
    async fn convert_attribution_data_and_set(
        &self,
        data: &AttributionData,
        network: AttributionNetwork,
        app_user_id: &str,
    ) -> Result<()> {
        let converted = self.migrator.convert_to_subscriber_attributes(data, network);
        let values = converted.into_iter().map(|(k, v)| (k, Some(v))).collect();
        let changed = self.set_attributes(values, app_user_id);
        tracing::debug!(
            "Converted {} attribution data into {} attribute updates",
            network,
            changed
        );
        Ok(())
    }
}

impl std::fmt::Debug for AttributesManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributesManager").finish_non_exhaustive()
    }
}
