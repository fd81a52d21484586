use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use futures_util::future::BoxFuture;
use tracing::warn;
use web_push::{ContentEncoding, SubscriptionInfo, VapidSignatureBuilder, WebPushMessageBuilder};

use crate::error::TransportError;

/// Everything the transport needs to reach one device.
#[derive(Debug, Clone)]
pub struct DeviceTarget {
    pub endpoint: String,
    pub p256dh: String,
    pub auth_secret: String,
}

/// Boundary to the push service. Object-safe so the dispatcher can hold a
/// production transport or a test double behind the same type.
pub trait PushTransport: Send + Sync {
    /// Deliver one payload to one device. Errors are per-device; the caller
    /// decides what to do with them.
    fn deliver(
        &self,
        target: DeviceTarget,
        payload: Vec<u8>,
    ) -> BoxFuture<'_, Result<(), TransportError>>;
}

/// Production transport: RFC 8291 payload encryption and VAPID signing via
/// the `web-push` crate, with the HTTP request sent through a pooled
/// reqwest client.
#[derive(Debug)]
pub struct WebPushTransport {
    client: reqwest::Client,
    vapid_private_key: String,
    contact: String,
}

impl WebPushTransport {
    /// Validates the VAPID private key up front. A bad key is a deployment
    /// problem and must surface here at startup, not on the first send.
    /// `VapidSignatureBuilder::from_base64` asserts on a wrong-length scalar
    /// instead of returning an error, so the length check happens here.
    pub fn new(vapid_private_key: &str, contact: &str) -> Result<Self, TransportError> {
        let decoded = URL_SAFE_NO_PAD
            .decode(vapid_private_key)
            .map_err(|e| TransportError::Unavailable(format!("VAPID key is not base64url: {e}")))?;
        if decoded.len() != 32 {
            return Err(TransportError::Unavailable(format!(
                "VAPID private key must be a 32-byte P-256 scalar, got {} bytes",
                decoded.len()
            )));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            vapid_private_key: vapid_private_key.to_string(),
            contact: contact.to_string(),
        })
    }

    async fn send(&self, target: DeviceTarget, payload: Vec<u8>) -> Result<(), TransportError> {
        let sub_info =
            SubscriptionInfo::new(&target.endpoint, &target.p256dh, &target.auth_secret);

        let mut sig_builder = VapidSignatureBuilder::from_base64(&self.vapid_private_key, &sub_info)
            .map_err(|e| TransportError::Delivery(format!("VAPID signature setup failed: {e}")))?;
        sig_builder.add_claim("sub", self.contact.as_str());
        let signature = sig_builder
            .build()
            .map_err(|e| TransportError::Delivery(format!("VAPID signing failed: {e}")))?;

        let mut builder = WebPushMessageBuilder::new(&sub_info);
        builder.set_payload(ContentEncoding::Aes128Gcm, &payload);
        builder.set_vapid_signature(signature);
        builder.set_ttl(86400); // 24 hours

        let message = builder
            .build()
            .map_err(|e| TransportError::Delivery(format!("message encryption failed: {e}")))?;

        let mut request = self
            .client
            .post(message.endpoint.to_string())
            .header("TTL", message.ttl.to_string());

        if let Some(push_payload) = message.payload {
            request = request
                .header("Content-Encoding", push_payload.content_encoding.to_str())
                .header("Content-Type", "application/octet-stream");

            for (key, value) in &push_payload.crypto_headers {
                request = request.header(*key, value.as_str());
            }

            request = request.body(push_payload.content);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Delivery(format!("push request failed: {e}")))?;

        match response.status().as_u16() {
            200..=299 => Ok(()),
            404 | 410 => Err(TransportError::Gone),
            429 => {
                // Rate limited. The subscription itself is fine.
                warn!("Push service rate limited endpoint {}", target.endpoint);
                Ok(())
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(TransportError::Delivery(format!(
                    "push service returned HTTP {status}: {body}"
                )))
            }
        }
    }
}

impl PushTransport for WebPushTransport {
    fn deliver(
        &self,
        target: DeviceTarget,
        payload: Vec<u8>,
    ) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(self.send(target, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_base64_key() {
        let err = WebPushTransport::new("not base64!!", "mailto:ops@example.com").unwrap_err();
        assert!(matches!(err, TransportError::Unavailable(_)));
    }

    #[test]
    fn rejects_wrong_length_key() {
        let short = URL_SAFE_NO_PAD.encode([0u8; 16]);
        let err = WebPushTransport::new(&short, "mailto:ops@example.com").unwrap_err();
        assert!(matches!(err, TransportError::Unavailable(_)));
    }

    #[test]
    fn accepts_32_byte_scalar() {
        let key = URL_SAFE_NO_PAD.encode([7u8; 32]);
        assert!(WebPushTransport::new(&key, "mailto:ops@example.com").is_ok());
    }
}
