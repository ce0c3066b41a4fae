//! USGS earthquake GeoJSON summary feeds

use super::{get_json_with_backoff, ApiError};
use chrono::{DateTime, Utc};
use std::time::Duration;

#[derive(serde::Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

#[derive(serde::Deserialize)]
pub struct Feature {
    pub id: String,
    pub properties: Properties,
}

#[derive(serde::Deserialize)]
pub struct Properties {
    pub mag: Option<f64>,
    pub place: Option<String>,
    /// Milliseconds since the Unix epoch
    pub time: i64,
    pub url: String,
    #[serde(default)]
    pub tsunami: i64,
}

impl Feature {
    pub fn magnitude(&self) -> f64 {
        self.properties.mag.unwrap_or(0.0)
    }

    pub fn place(&self) -> &str {
        self.properties.place.as_deref().unwrap_or("Unknown location")
    }

    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.properties.time)
    }
}

impl FeatureCollection {
    /// Events strictly after `cursor_ms`, oldest first
    pub fn newer_than(&self, cursor_ms: i64) -> Vec<&Feature> {
        let mut newer: Vec<&Feature> = self
            .features
            .iter()
            .filter(|f| f.properties.time > cursor_ms)
            .collect();
        newer.sort_by_key(|f| f.properties.time);
        newer
    }

    pub fn newest_time(&self) -> Option<i64> {
        self.features.iter().map(|f| f.properties.time).max()
    }

    /// The most recent `count` events at or above `min_magnitude`, newest first
    pub fn recent(&self, min_magnitude: f64, count: usize) -> Vec<&Feature> {
        let mut recent: Vec<&Feature> = self
            .features
            .iter()
            .filter(|f| f.magnitude() >= min_magnitude)
            .collect();
        recent.sort_by_key(|f| std::cmp::Reverse(f.properties.time));
        recent.truncate(count);
        recent
    }
}

pub async fn fetch(
    web: &reqwest::Client,
    feed_url: &str,
    max_retries: u32,
) -> Result<FeatureCollection, ApiError> {
    get_json_with_backoff(web, feed_url, max_retries, Duration::from_secs(1)).await
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "id": "b",
             "properties": {"mag": 5.1, "place": "10 km S of Somewhere", "time": 2000,
                            "url": "https://example.org/b", "tsunami": 1}},
            {"type": "Feature", "id": "a",
             "properties": {"mag": 2.6, "place": null, "time": 1000,
                            "url": "https://example.org/a", "tsunami": 0}},
            {"type": "Feature", "id": "c",
             "properties": {"mag": null, "place": "Offshore", "time": 3000,
                            "url": "https://example.org/c"}}
        ]
    }"#;

    pub fn sample() -> FeatureCollection {
        crate::api::decode(SAMPLE.as_bytes()).unwrap()
    }

    #[test]
    fn decodes_feed_with_nulls() {
        let feed = sample();
        assert_eq!(feed.features.len(), 3);
        assert_eq!(feed.features[1].place(), "Unknown location");
        assert_eq!(feed.features[2].magnitude(), 0.0);
        assert_eq!(feed.features[0].properties.tsunami, 1);
        assert_eq!(
            feed.features[0].occurred_at().unwrap().timestamp_millis(),
            2000
        );
    }

    #[test]
    fn newer_events_come_oldest_first() {
        let feed = sample();
        let ids: Vec<&str> = feed.newer_than(1000).iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["b", "c"]);
        assert_eq!(feed.newest_time(), Some(3000));
        assert!(feed.newer_than(3000).is_empty());
    }

    #[test]
    fn recent_filters_by_magnitude() {
        let feed = sample();
        let ids: Vec<&str> = feed.recent(2.5, 5).iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
    }
}
