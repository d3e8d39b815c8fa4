use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Consider a cached snapshot stale after 1 hour.
const CACHE_STALE_MINUTES: i64 = 60;

/// A cached value stamped with its capture time.
///
/// The value's fields are flattened next to a millisecond `timestamp`, so
/// `T` must serialize as a JSON object:
///
/// ```json
/// {"budgets": [], "categories": [], "transactions": [], "timestamp": 1735689600000}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedData<T> {
    #[serde(flatten)]
    pub data: T,
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }
}

/// True once a capture time is more than an hour old.
pub fn is_stale(cached_at: DateTime<Utc>) -> bool {
    (Utc::now() - cached_at).num_minutes() > CACHE_STALE_MINUTES
}

/// Human-readable age of a capture time ("just now", "5m ago", "2h ago", "3d ago").
pub fn age_display(cached_at: DateTime<Utc>) -> String {
    let minutes = (Utc::now() - cached_at).num_minutes();
    if minutes < 1 {
        // Also covers clock skew (negative ages)
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        items: Vec<u32>,
    }

    fn minutes_ago(minutes: i64) -> DateTime<Utc> {
        Utc::now() - Duration::minutes(minutes)
    }

    #[test]
    fn test_age_display() {
        assert_eq!(age_display(minutes_ago(0)), "just now");
        assert_eq!(age_display(minutes_ago(-5)), "just now");
        assert_eq!(age_display(minutes_ago(5)), "5m ago");
        assert_eq!(age_display(minutes_ago(60 + 29)), "1h ago");
        assert_eq!(age_display(minutes_ago(60 + 31)), "2h ago");
        assert_eq!(age_display(minutes_ago(3 * 1440 + 60)), "3d ago");
        assert_eq!(age_display(minutes_ago(3 * 1440 + 13 * 60)), "4d ago");
    }

    #[test]
    fn test_is_stale() {
        assert!(!is_stale(minutes_ago(0)));
        assert!(!is_stale(minutes_ago(59)));
        assert!(is_stale(minutes_ago(61)));
        assert!(is_stale(CachedData::new(()).cached_at - Duration::hours(3)));
    }

    #[test]
    fn test_serialized_shape_is_flat_with_millis() {
        let cached = CachedData {
            data: Payload { items: vec![3, 4] },
            cached_at: Utc.timestamp_millis_opt(1_735_689_600_123).unwrap(),
        };
        let v = serde_json::to_value(&cached).unwrap();
        assert_eq!(v, json!({"items": [3, 4], "timestamp": 1_735_689_600_123_i64}));

        let back: CachedData<Payload> = serde_json::from_value(v).unwrap();
        assert_eq!(back, cached);
    }

    #[test]
    fn test_missing_timestamp_is_rejected() {
        let result = serde_json::from_value::<CachedData<Payload>>(json!({"items": []}));
        assert!(result.is_err());
    }
}
