//! Live alert feed
//!
//! Queries the NWS active-alerts endpoint (`/alerts/active?area=GA`). Each
//! GeoJSON feature carries location codes in `properties.geocode.SAME`;
//! only 5-digit codes with the jurisdiction's state prefix name a region.
//!
//! # Usage
//!
//! ```rust,ignore
//! let feed = NwsAlertFeed::new(AlertFeedConfig::default())?;
//! let alerts = feed.fetch_active().await?;
//! let regions = extract_region_codes(&alerts, "13");
//! ```

use crate::{AlertError, AlertFeedConfig, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Width of a region identifier (2-digit state + 3-digit county)
pub const REGION_CODE_WIDTH: usize = 5;

/// Source of currently active hazard alerts
#[async_trait]
pub trait AlertFeed: Send + Sync {
    async fn fetch_active(&self) -> Result<Vec<ActiveAlert>>;
}

#[async_trait]
impl AlertFeed for Box<dyn AlertFeed> {
    async fn fetch_active(&self) -> Result<Vec<ActiveAlert>> {
        (**self).fetch_active().await
    }
}

/// One active alert, reduced to what the overlay needs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveAlert {
    pub event: Option<String>,
    pub severity: Option<String>,
    pub headline: Option<String>,
    pub location_codes: Vec<String>,
}

/// NWS alerts response structure
#[derive(Debug, Deserialize)]
struct AlertCollection {
    features: Vec<AlertFeature>,
}

#[derive(Debug, Deserialize)]
struct AlertFeature {
    properties: AlertProperties,
}

#[derive(Debug, Deserialize)]
struct AlertProperties {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    headline: Option<String>,
    #[serde(default)]
    geocode: Geocode,
}

#[derive(Debug, Default, Deserialize)]
struct Geocode {
    #[serde(rename = "SAME", default)]
    same: Vec<String>,
}

impl From<AlertFeature> for ActiveAlert {
    fn from(feature: AlertFeature) -> Self {
        let p = feature.properties;
        Self {
            event: p.event,
            severity: p.severity,
            headline: p.headline,
            location_codes: p.geocode.same,
        }
    }
}

/// Parse an alerts payload; a body that is not an alert collection is an
/// unavailable feed, not an empty one
pub fn parse_alerts(body: &str) -> Result<Vec<ActiveAlert>> {
    let collection: AlertCollection = serde_json::from_str(body)
        .map_err(|e| AlertError::FeedUnavailable(format!("malformed payload: {}", e)))?;
    Ok(collection.features.into_iter().map(ActiveAlert::from).collect())
}

/// Region identifiers named by the alerts.
///
/// Codes that are not exactly five ASCII digits starting with
/// `state_prefix` are skipped.
pub fn extract_region_codes(alerts: &[ActiveAlert], state_prefix: &str) -> BTreeSet<String> {
    alerts
        .iter()
        .flat_map(|a| a.location_codes.iter())
        .map(|code| code.trim())
        .filter(|code| {
            code.len() == REGION_CODE_WIDTH
                && code.bytes().all(|b| b.is_ascii_digit())
                && code.starts_with(state_prefix)
        })
        .map(str::to_string)
        .collect()
}

/// National Weather Service alert client
pub struct NwsAlertFeed {
    config: AlertFeedConfig,
    client: reqwest::Client,
}

impl NwsAlertFeed {
    pub fn new(config: AlertFeedConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AlertError::Client(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &AlertFeedConfig {
        &self.config
    }
}

#[async_trait]
impl AlertFeed for NwsAlertFeed {
    async fn fetch_active(&self) -> Result<Vec<ActiveAlert>> {
        let url = self.config.alerts_url();
        debug!("Fetching active alerts from {}", url);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/geo+json")
            .send()
            .await
            .map_err(|e| AlertError::FeedUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AlertError::FeedUnavailable(format!(
                "NWS returned status: {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AlertError::FeedUnavailable(e.to_string()))?;
        let alerts = parse_alerts(&body)?;

        info!("Fetched {} active alerts for {}", alerts.len(), self.config.area);
        Ok(alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {
                    "event": "Flood Warning",
                    "severity": "Severe",
                    "headline": "Flood Warning issued for Fulton County",
                    "geocode": {"SAME": ["13121", "013089"], "UGC": ["GAC121"]}
                }
            },
            {
                "type": "Feature",
                "properties": {
                    "event": "Heat Advisory",
                    "geocode": {"SAME": ["13089", "01001", "1312", "13a21", " 13001 "]}
                }
            },
            {
                "type": "Feature",
                "properties": {"event": "Special Weather Statement"}
            }
        ]
    }"#;

    #[test]
    fn test_parse_alerts() {
        let alerts = parse_alerts(PAYLOAD).unwrap();
        assert_eq!(alerts.len(), 3);
        assert_eq!(alerts[0].event.as_deref(), Some("Flood Warning"));
        assert_eq!(alerts[0].location_codes, vec!["13121", "013089"]);
        assert!(alerts[2].location_codes.is_empty());
    }

    #[test]
    fn test_extract_region_codes_strict() {
        let alerts = parse_alerts(PAYLOAD).unwrap();
        let codes = extract_region_codes(&alerts, "13");
        let codes: Vec<_> = codes.iter().map(String::as_str).collect();
        assert_eq!(codes, vec!["13001", "13089", "13121"]);
    }

    #[test]
    fn test_other_state_prefix() {
        let alerts = parse_alerts(PAYLOAD).unwrap();
        let codes = extract_region_codes(&alerts, "01");
        assert_eq!(codes.into_iter().collect::<Vec<_>>(), vec!["01001"]);
    }

    #[test]
    fn test_empty_collection_is_not_an_error() {
        let alerts = parse_alerts(r#"{"type":"FeatureCollection","features":[]}"#).unwrap();
        assert!(alerts.is_empty());
        assert!(extract_region_codes(&alerts, "13").is_empty());
    }

    #[test]
    fn test_malformed_payload_is_unavailable() {
        for body in ["", "<html>busy</html>", r#"{"title":"Not Found"}"#] {
            assert!(matches!(
                parse_alerts(body),
                Err(AlertError::FeedUnavailable(_))
            ));
        }
    }
}
