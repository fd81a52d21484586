use chrono::Utc;
use nudge_types::push::{NotificationData, NotificationPayload};
use rand::Rng;

/// Marker emojis for test notifications. One is chosen uniformly per test
/// send so the user can visually confirm a fresh delivery rather than a
/// cached notification.
pub const TEST_EMOJIS: [&str; 15] = [
    "🎉", "🚀", "✨", "🔔", "💡", "🌟", "🎯", "📣", "🔥", "⚡", "🎈", "💫", "📬", "🛎️", "✅",
];

/// Pick the marker emoji with the caller's randomness source, so tests can
/// pass a seeded generator.
pub fn pick_marker_emoji<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    TEST_EMOJIS[rng.random_range(0..TEST_EMOJIS.len())]
}

/// Build the test-notification payload. Identical for every device in the
/// fan-out; only one payload is constructed per send.
pub fn build_test_payload<R: Rng + ?Sized>(rng: &mut R) -> NotificationPayload {
    let emoji = pick_marker_emoji(rng);

    NotificationPayload {
        title: "Test notification".to_string(),
        body: format!(
            "This is a test notification. {} If you can read this, push delivery is working on this device.",
            emoji
        ),
        icon: "/static/icons/icon-192.png".to_string(),
        badge: "/static/icons/badge-72.png".to_string(),
        data: NotificationData {
            url: "/".to_string(),
            timestamp: Utc::now(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn emoji_set_has_fifteen_distinct_entries() {
        let unique: std::collections::HashSet<_> = TEST_EMOJIS.iter().collect();
        assert_eq!(unique.len(), 15);
    }

    #[test]
    fn pick_always_lands_in_the_set() {
        for seed in 0..64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let emoji = pick_marker_emoji(&mut rng);
            assert!(TEST_EMOJIS.contains(&emoji));
        }
    }

    #[test]
    fn pick_is_deterministic_with_seeded_rng() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        assert_eq!(pick_marker_emoji(&mut a), pick_marker_emoji(&mut b));
    }

    #[test]
    fn payload_serializes_with_all_fields() {
        let mut rng = StdRng::seed_from_u64(42);
        let payload = build_test_payload(&mut rng);

        let value: serde_json::Value =
            serde_json::from_slice(&serde_json::to_vec(&payload).unwrap()).unwrap();

        for field in ["title", "body", "icon", "badge", "data"] {
            assert!(value.get(field).is_some(), "missing field {field}");
        }
        assert!(value["data"].get("url").is_some());
        assert!(value["data"].get("timestamp").is_some());
    }

    #[test]
    fn body_contains_exactly_one_marker_emoji() {
        let mut rng = StdRng::seed_from_u64(3);
        let payload = build_test_payload(&mut rng);

        let hits: usize = TEST_EMOJIS
            .iter()
            .map(|e| payload.body.matches(e).count())
            .sum();
        assert_eq!(hits, 1);
    }
}
