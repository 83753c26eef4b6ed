//! App user identity

use std::sync::{Arc, RwLock};

use crate::device_cache::DeviceCache;
use crate::error::{PurchasesError, Result};
use crate::storage::{keys, StorageAdapter};

const ANONYMOUS_ID_PREFIX: &str = "$RCAnonymousID:";

/// Supplies the app user id the SDK currently acts for.
pub trait CurrentUserProvider: Send + Sync {
    fn current_app_user_id(&self) -> String;
}

/// Generate a fresh anonymous app user id
pub fn generate_anonymous_id() -> String {
    format!("{}{}", ANONYMOUS_ID_PREFIX, uuid::Uuid::new_v4().simple())
}

pub fn is_anonymous(app_user_id: &str) -> bool {
    app_user_id.starts_with(ANONYMOUS_ID_PREFIX)
}

/// Tracks the current app user and persists it across launches.
///
/// Switching users clears the attribution cache of the user being left, so
/// attribution data is sent again for whoever logs in next. In UI preview
/// mode the user is tracked in memory only and nothing persisted is touched.
pub struct IdentityManager {
    storage: Arc<dyn StorageAdapter>,
    device_cache: Arc<dyn DeviceCache>,
    current: RwLock<String>,
    ui_preview_mode: bool,
}

impl IdentityManager {
    /// Restore the persisted user, or start with `app_user_id` (or a new
    /// anonymous id) when none is stored.
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        device_cache: Arc<dyn DeviceCache>,
        app_user_id: Option<&str>,
        ui_preview_mode: bool,
    ) -> Self {
        let id = match app_user_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => id.to_string(),
            None => storage
                .get(keys::APP_USER_ID)
                .unwrap_or_else(generate_anonymous_id),
        };
        if !ui_preview_mode {
            storage.set(keys::APP_USER_ID, &id);
        }

        Self {
            storage,
            device_cache,
            current: RwLock::new(id),
            ui_preview_mode,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        is_anonymous(&self.current_app_user_id())
    }

    /// Switch to a known app user.
    ///
    /// Returns `true` if the user changed.
    pub fn log_in(&self, app_user_id: &str) -> Result<bool> {
        let app_user_id = app_user_id.trim();
        if app_user_id.is_empty() {
            return Err(PurchasesError::validation("app_user_id must not be empty"));
        }
        Ok(self.switch_to(app_user_id.to_string()))
    }

    /// Switch to a fresh anonymous user.
    pub fn log_out(&self) -> Result<()> {
        if self.is_anonymous() {
            return Err(PurchasesError::validation(
                "Called log_out but the current user is anonymous",
            ));
        }
        self.switch_to(generate_anonymous_id());
        Ok(())
    }

    fn switch_to(&self, new_id: String) -> bool {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        if *current == new_id {
            return false;
        }

        if !self.ui_preview_mode {
            self.device_cache.clear_attribution_cache(&current);
            self.storage.set(keys::APP_USER_ID, &new_id);
        }
        tracing::info!("Switching app user from {} to {}", *current, new_id);
        *current = new_id;
        true
    }
}

impl CurrentUserProvider for IdentityManager {
    fn current_app_user_id(&self) -> String {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl std::fmt::Debug for IdentityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityManager")
            .field("current", &self.current_app_user_id())
            .finish()
    }
}
