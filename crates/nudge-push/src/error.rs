use thiserror::Error;

/// Failures registering or unregistering a subscription.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The payload is missing the endpoint or one of the encryption keys.
    /// Rejected before anything touches the store.
    #[error("invalid subscription: {0}")]
    InvalidSubscription(&'static str),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Failures fanning a notification out to a user's devices.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The user has no delivery-eligible devices. A caller problem, not a
    /// server fault: they should register first.
    #[error("no active devices")]
    NoActiveDevices,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Failures at the push-transport boundary. `Unavailable` only ever comes
/// out of the transport constructor at startup; the per-send variants are
/// per-device and never abort a batch.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("push transport unavailable: {0}")]
    Unavailable(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("delivery timed out")]
    Timeout,

    /// The push service says this subscription no longer exists (410 Gone).
    #[error("subscription expired")]
    Gone,
}
