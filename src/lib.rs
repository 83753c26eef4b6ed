//! # Purchases SDK
//!
//! Client-side core for forwarding install attribution to the purchases
//! backend, plus the paywall layout model.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use purchases_sdk::{AttributionNetwork, Purchases, PurchasesOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let purchases = Purchases::new("appl_public_key", PurchasesOptions {
//!         app_user_id: Some("user-123".into()),
//!         ..Default::default()
//!     })?;
//!
//!     // Replays postponed data and posts the ad-services token once
//!     purchases.on_app_launch().await;
//!
//!     let data = serde_json::json!({ "adid": "abc", "network": "Organic" });
//!     if let Some(data) = data.as_object() {
//!         purchases
//!             .post_attribution_data(data, AttributionNetwork::Adjust, Some("adjust-user"))
//!             .await?;
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Deduplication
//!
//! Attribution data is sent at most once per (network, network user id) pair
//! for each app user. Records are written only after a successful post and
//! are cleared when the app user changes.
//!
//! ## Features
//!
//! - `native-storage` (default): File-based storage in an app data directory
//! - `native-tls` (default): Use native TLS for HTTPS
//! - `rustls-tls`: Use rustls for HTTPS (alternative to native-tls)

pub mod attributes;
pub mod attribution;
pub mod backend;
pub mod device_cache;
pub mod error;
pub mod identity;
pub mod paywalls;
pub mod purchases;
pub mod storage;
pub mod types;

// Main client
pub use purchases::{Purchases, PurchasesOptions};

// Error types
pub use error::{PurchasesError, PurchasesErrorCode, Result};

// Attribution
pub use attribution::{AttributionFetcher, AttributionPoster, StaticAttributionFetcher};

// Collaborators
pub use attributes::{
    AttributesManager, AttributionDataMigrator, SubscriberAttribute, SubscriberAttributesManager,
};
pub use backend::{Backend, HttpBackend, DEFAULT_BASE_URL};
pub use device_cache::{DeviceCache, StorageDeviceCache};
pub use identity::{CurrentUserProvider, IdentityManager};

// Storage
pub use storage::{MemoryStorage, StorageAdapter};

#[cfg(feature = "native-storage")]
pub use storage::FileStorage;

// Types
pub use types::{
    AttributionData, AttributionNetwork, PostOutcome, PostponedAttributionData, SkipReason,
    SystemInfo,
};

pub use paywalls::Dimension;
