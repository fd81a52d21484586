use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use futures_util::future::join_all;
use nudge_db::Database;
use nudge_db::models::DeviceRow;
use nudge_types::push::NotificationPayload;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DispatchError, TransportError};
use crate::payload::build_test_payload;
use crate::transport::{DeviceTarget, PushTransport};

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Fans one payload out to every active device of a user. Holds no locks;
/// the store and the transport are the only shared resources.
#[derive(Clone)]
pub struct Dispatcher {
    db: Arc<Database>,
    transport: Arc<dyn PushTransport>,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(db: Arc<Database>, transport: Arc<dyn PushTransport>) -> Self {
        Self {
            db,
            transport,
            send_timeout: SEND_TIMEOUT,
        }
    }

    #[cfg(test)]
    fn with_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Send a test notification to all of `owner`'s active devices. Returns
    /// the number of devices targeted. Fails only when there is nothing to
    /// deliver to; individual send failures are logged and absorbed.
    pub async fn send_test(&self, owner: Uuid) -> Result<usize, DispatchError> {
        let db = self.db.clone();
        let owner_id = owner.to_string();
        let devices = tokio::task::spawn_blocking(move || db.list_active_devices(&owner_id))
            .await
            .map_err(|e| anyhow!("join error: {e}"))??;

        if devices.is_empty() {
            return Err(DispatchError::NoActiveDevices);
        }

        let payload = build_test_payload(&mut rand::rng());
        let count = devices.len();
        self.fan_out(devices, &payload).await;

        Ok(count)
    }

    /// Deliver one payload to every device in the list, concurrently. Each
    /// send is failure-isolated and bounded by the per-device timeout, so one
    /// dead or slow endpoint never stalls or aborts the rest.
    pub async fn fan_out(&self, devices: Vec<DeviceRow>, payload: &NotificationPayload) {
        let bytes = match serde_json::to_vec(payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to encode notification payload: {}", e);
                return;
            }
        };

        let sends = devices
            .iter()
            .map(|device| self.deliver_one(device, bytes.clone()));
        join_all(sends).await;
    }

    async fn deliver_one(&self, device: &DeviceRow, payload: Vec<u8>) {
        let target = DeviceTarget {
            endpoint: device.endpoint.clone(),
            p256dh: device.p256dh.clone(),
            auth_secret: device.auth_secret.clone(),
        };

        let result = tokio::time::timeout(self.send_timeout, self.transport.deliver(target, payload))
            .await
            .unwrap_or(Err(TransportError::Timeout));

        match result {
            Ok(()) => debug!("Delivered to device {} ({})", device.id, device.browser),
            Err(TransportError::Gone) => {
                warn!(
                    "Subscription expired for device {}; deactivating",
                    device.id
                );
                let db = self.db.clone();
                let endpoint = device.endpoint.clone();
                match tokio::task::spawn_blocking(move || db.deactivate_device(&endpoint)).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!("Failed to deactivate device {}: {}", device.id, e),
                    Err(e) => warn!("Failed to deactivate device {}: {}", device.id, e),
                }
            }
            Err(e) => warn!("Delivery to device {} failed: {}", device.id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::BoxFuture;
    use std::sync::Mutex;

    /// Transport double that records targeted endpoints and fails on demand.
    #[derive(Default)]
    struct FakeTransport {
        delivered: Mutex<Vec<String>>,
        fail_with_gone: Vec<String>,
        fail_with_error: Vec<String>,
        hang_forever: Vec<String>,
    }

    impl PushTransport for FakeTransport {
        fn deliver(
            &self,
            target: DeviceTarget,
            _payload: Vec<u8>,
        ) -> BoxFuture<'_, Result<(), TransportError>> {
            Box::pin(async move {
                if self.hang_forever.contains(&target.endpoint) {
                    std::future::pending::<()>().await;
                }
                if self.fail_with_gone.contains(&target.endpoint) {
                    return Err(TransportError::Gone);
                }
                if self.fail_with_error.contains(&target.endpoint) {
                    return Err(TransportError::Delivery("boom".to_string()));
                }
                self.delivered.lock().unwrap().push(target.endpoint);
                Ok(())
            })
        }
    }

    fn seed_device(db: &Database, user: &Uuid, endpoint: &str, active: bool) {
        db.upsert_device(
            &Uuid::new_v4().to_string(),
            &user.to_string(),
            endpoint,
            "P1",
            "A1",
            "Chrome",
        )
        .unwrap();
        if !active {
            db.deactivate_device(endpoint).unwrap();
        }
    }

    fn dispatcher(transport: FakeTransport) -> (Dispatcher, Arc<Database>, Arc<FakeTransport>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let transport = Arc::new(transport);
        (
            Dispatcher::new(db.clone(), transport.clone()),
            db,
            transport,
        )
    }

    #[tokio::test]
    async fn counts_only_active_devices() {
        let (dispatcher, db, transport) = dispatcher(FakeTransport::default());
        let owner = Uuid::new_v4();

        seed_device(&db, &owner, "https://push.example/a1", true);
        seed_device(&db, &owner, "https://push.example/a2", true);
        seed_device(&db, &owner, "https://push.example/i1", false);

        let count = dispatcher.send_test(owner).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(transport.delivered.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn no_active_devices_is_an_error_even_with_inactive_ones() {
        let (dispatcher, db, _transport) = dispatcher(FakeTransport::default());
        let owner = Uuid::new_v4();

        seed_device(&db, &owner, "https://push.example/i1", false);

        let err = dispatcher.send_test(owner).await.unwrap_err();
        assert!(matches!(err, DispatchError::NoActiveDevices));
    }

    #[tokio::test]
    async fn zero_registrations_is_an_error() {
        let (dispatcher, _db, _transport) = dispatcher(FakeTransport::default());
        let err = dispatcher.send_test(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DispatchError::NoActiveDevices));
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_batch() {
        let (dispatcher, db, transport) = dispatcher(FakeTransport {
            fail_with_error: vec!["https://push.example/bad".to_string()],
            ..Default::default()
        });
        let owner = Uuid::new_v4();

        seed_device(&db, &owner, "https://push.example/bad", true);
        seed_device(&db, &owner, "https://push.example/ok1", true);
        seed_device(&db, &owner, "https://push.example/ok2", true);

        // The count reports devices targeted, not devices reached
        let count = dispatcher.send_test(owner).await.unwrap();
        assert_eq!(count, 3);
        assert_eq!(transport.delivered.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn expired_subscription_gets_deactivated() {
        let (dispatcher, db, _transport) = dispatcher(FakeTransport {
            fail_with_gone: vec!["https://push.example/gone".to_string()],
            ..Default::default()
        });
        let owner = Uuid::new_v4();

        seed_device(&db, &owner, "https://push.example/gone", true);
        seed_device(&db, &owner, "https://push.example/ok", true);

        dispatcher.send_test(owner).await.unwrap();

        let remaining = db.list_active_devices(&owner.to_string()).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].endpoint, "https://push.example/ok");
    }

    #[tokio::test]
    async fn slow_device_hits_the_timeout_without_stalling_others() {
        let (dispatcher, db, transport) = dispatcher(FakeTransport {
            hang_forever: vec!["https://push.example/slow".to_string()],
            ..Default::default()
        });
        let dispatcher = dispatcher.with_timeout(Duration::from_millis(50));
        let owner = Uuid::new_v4();

        seed_device(&db, &owner, "https://push.example/slow", true);
        seed_device(&db, &owner, "https://push.example/ok", true);

        let count = dispatcher.send_test(owner).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            *transport.delivered.lock().unwrap(),
            vec!["https://push.example/ok".to_string()]
        );
    }
}
