use std::sync::Arc;

use anyhow::anyhow;
use nudge_db::Database;
use nudge_types::api::PushSubscriptionInfo;
use tracing::debug;
use uuid::Uuid;

use crate::error::RegistryError;

const DEFAULT_BROWSER: &str = "unknown";

#[derive(Debug, Clone, Copy)]
pub struct RegisterOutcome {
    pub created: bool,
    pub device_id: Uuid,
}

/// Upsert and ownership-scoped removal semantics over the store.
/// Validation happens here, before any row is touched; the registry never
/// trusts a caller-supplied identity, only the one the auth layer verified.
#[derive(Clone)]
pub struct Registry {
    db: Arc<Database>,
}

impl Registry {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Register (or refresh) a device subscription for `owner`.
    /// `created` is true only when this endpoint has never been seen before.
    pub async fn register(
        &self,
        owner: Uuid,
        subscription: &PushSubscriptionInfo,
        browser: Option<String>,
    ) -> Result<RegisterOutcome, RegistryError> {
        if subscription.endpoint.trim().is_empty() {
            return Err(RegistryError::InvalidSubscription("endpoint is required"));
        }
        if subscription.keys.p256dh.trim().is_empty() {
            return Err(RegistryError::InvalidSubscription("keys.p256dh is required"));
        }
        if subscription.keys.auth.trim().is_empty() {
            return Err(RegistryError::InvalidSubscription("keys.auth is required"));
        }

        let db = self.db.clone();
        let device_id = Uuid::new_v4();
        let endpoint = subscription.endpoint.clone();
        let p256dh = subscription.keys.p256dh.clone();
        let auth_secret = subscription.keys.auth.clone();
        let browser = browser.unwrap_or_else(|| DEFAULT_BROWSER.to_string());
        let owner_id = owner.to_string();

        let (row, created) = tokio::task::spawn_blocking(move || {
            db.upsert_device(
                &device_id.to_string(),
                &owner_id,
                &endpoint,
                &p256dh,
                &auth_secret,
                &browser,
            )
        })
        .await
        .map_err(|e| anyhow!("join error: {e}"))??;

        debug!(
            "Registered device {} for user {} (created: {})",
            row.id, owner, created
        );

        let device_id = row
            .id
            .parse()
            .map_err(|e| anyhow!("corrupt device id '{}': {e}", row.id))?;

        Ok(RegisterOutcome { created, device_id })
    }

    /// Remove a device, but only if `owner` actually owns it. Returns whether
    /// a row was removed; a non-owner request looks exactly like an unknown
    /// endpoint.
    pub async fn unregister(&self, owner: Uuid, endpoint: &str) -> Result<bool, RegistryError> {
        if endpoint.trim().is_empty() {
            return Err(RegistryError::InvalidSubscription("endpoint is required"));
        }

        let db = self.db.clone();
        let endpoint = endpoint.to_string();
        let owner_id = owner.to_string();

        let removed = tokio::task::spawn_blocking(move || db.delete_device(&endpoint, &owner_id))
            .await
            .map_err(|e| anyhow!("join error: {e}"))??;

        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nudge_types::api::SubscriptionKeys;

    fn subscription(endpoint: &str, p256dh: &str, auth: &str) -> PushSubscriptionInfo {
        PushSubscriptionInfo {
            endpoint: endpoint.to_string(),
            keys: SubscriptionKeys {
                p256dh: p256dh.to_string(),
                auth: auth.to_string(),
            },
        }
    }

    fn registry() -> (Registry, Arc<Database>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        (Registry::new(db.clone()), db)
    }

    #[tokio::test]
    async fn register_twice_is_idempotent() {
        let (registry, _db) = registry();
        let owner = Uuid::new_v4();
        let sub = subscription("https://push.example/e1", "P1", "A1");

        let first = registry.register(owner, &sub, None).await.unwrap();
        assert!(first.created);

        let second = registry.register(owner, &sub, None).await.unwrap();
        assert!(!second.created);
        assert_eq!(first.device_id, second.device_id);
    }

    #[tokio::test]
    async fn register_replaces_keys_in_place() {
        let (registry, db) = registry();
        let owner = Uuid::new_v4();

        registry
            .register(owner, &subscription("https://push.example/e1", "P1", "A1"), None)
            .await
            .unwrap();
        let outcome = registry
            .register(owner, &subscription("https://push.example/e1", "P2", "A1"), None)
            .await
            .unwrap();

        assert!(!outcome.created);
        let devices = db.list_active_devices(&owner.to_string()).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].p256dh, "P2");
    }

    #[tokio::test]
    async fn missing_auth_key_never_reaches_store() {
        let (registry, db) = registry();
        let owner = Uuid::new_v4();

        let err = registry
            .register(owner, &subscription("https://push.example/e1", "P1", ""), None)
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::InvalidSubscription(_)));
        assert!(db.list_active_devices(&owner.to_string()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_p256dh_is_rejected() {
        let (registry, _db) = registry();
        let err = registry
            .register(Uuid::new_v4(), &subscription("https://push.example/e1", "", "A1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSubscription(_)));
    }

    #[tokio::test]
    async fn unregister_is_ownership_scoped() {
        let (registry, db) = registry();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let sub = subscription("https://push.example/e1", "P1", "A1");

        registry.register(owner, &sub, None).await.unwrap();

        // A stranger's unregister looks exactly like an unknown endpoint
        let deleted = registry.unregister(stranger, &sub.endpoint).await.unwrap();
        assert!(!deleted);
        assert_eq!(db.list_active_devices(&owner.to_string()).unwrap().len(), 1);

        let deleted = registry.unregister(owner, &sub.endpoint).await.unwrap();
        assert!(deleted);
        assert!(db.list_active_devices(&owner.to_string()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn unregister_requires_endpoint() {
        let (registry, _db) = registry();
        let err = registry.unregister(Uuid::new_v4(), "  ").await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSubscription(_)));
    }

    #[tokio::test]
    async fn browser_label_defaults_to_unknown() {
        let (registry, db) = registry();
        let owner = Uuid::new_v4();

        registry
            .register(owner, &subscription("https://push.example/e1", "P1", "A1"), None)
            .await
            .unwrap();

        let devices = db.list_active_devices(&owner.to_string()).unwrap();
        assert_eq!(devices[0].browser, "unknown");
    }
}
