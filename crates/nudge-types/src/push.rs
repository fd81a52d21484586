use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The notification payload delivered to devices. Opaque to the push
/// transport; the client-side push handler reads it to show the
/// notification and route the click.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub data: NotificationData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationData {
    pub url: String,
    pub timestamp: DateTime<Utc>,
}
