//! Type definitions for the purchases SDK

use serde::{Deserialize, Serialize};

/// Free-form attribution payload as delivered by an attribution network SDK
pub type AttributionData = serde_json::Map<String, serde_json::Value>;

/// Attribution networks the SDK knows how to forward.
///
/// The raw value is the wire value sent to the backend and the key under
/// which sent records are cached, so it must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum AttributionNetwork {
    /// Legacy search ads integration, posted straight to the backend
    AppleSearchAds,
    Adjust,
    AppsFlyer,
    Branch,
    Tenjin,
    Facebook,
    MParticle,
    /// Platform ad-services token, posted once per install
    AdServices,
}

impl AttributionNetwork {
    pub const ALL: [AttributionNetwork; 8] = [
        Self::AppleSearchAds,
        Self::Adjust,
        Self::AppsFlyer,
        Self::Branch,
        Self::Tenjin,
        Self::Facebook,
        Self::MParticle,
        Self::AdServices,
    ];

    pub fn raw_value(self) -> u8 {
        match self {
            Self::AppleSearchAds => 0,
            Self::Adjust => 1,
            Self::AppsFlyer => 2,
            Self::Branch => 3,
            Self::Tenjin => 4,
            Self::Facebook => 5,
            Self::MParticle => 6,
            Self::AdServices => 7,
        }
    }

    pub fn from_raw_value(raw: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.raw_value() == raw)
    }

    /// Whether data from this network bypasses subscriber attributes and is
    /// posted to the attribution endpoint directly.
    pub fn posts_directly_to_backend(self) -> bool {
        matches!(self, Self::AppleSearchAds)
    }
}

impl From<AttributionNetwork> for u8 {
    fn from(network: AttributionNetwork) -> Self {
        network.raw_value()
    }
}

impl TryFrom<u8> for AttributionNetwork {
    type Error = String;

    fn try_from(raw: u8) -> std::result::Result<Self, Self::Error> {
        Self::from_raw_value(raw).ok_or_else(|| format!("unknown attribution network: {}", raw))
    }
}

impl std::fmt::Display for AttributionNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AppleSearchAds => "appleSearchAds",
            Self::Adjust => "adjust",
            Self::AppsFlyer => "appsFlyer",
            Self::Branch => "branch",
            Self::Tenjin => "tenjin",
            Self::Facebook => "facebook",
            Self::MParticle => "mParticle",
            Self::AdServices => "adServices",
        };
        f.write_str(name)
    }
}

/// Attribution data captured before an app user id was known.
#[derive(Debug, Clone, PartialEq)]
pub struct PostponedAttributionData {
    pub data: AttributionData,
    pub network: AttributionNetwork,
    pub network_user_id: Option<String>,
}

/// Platform details the SDK runs under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemInfo {
    /// Platform flavor, e.g. "iOS" or "native"
    pub platform_flavor: String,
    /// Platform flavor version
    pub platform_version: Option<String>,
    /// Set while rendering design-time previews. Suppresses all network
    /// traffic and persisted writes.
    pub ui_preview_mode: bool,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            platform_flavor: "native".to_string(),
            platform_version: None,
            ui_preview_mode: false,
        }
    }
}

/// What a post call ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    /// Sent and recorded
    Posted,
    /// Nothing was sent
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadySent,
    PreviewMode,
    NoToken,
}
