//! Reputation lookup abstraction for the threat analyst.
//!
//! Provides a trait-based interface for indicator reputation services, with a
//! VirusTotal v3 implementation (`VirusTotalClient`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, warn};
use vigil_common::{Result, VigilError};

pub const DEFAULT_VT_URL: &str = "https://www.virustotal.com/api/v3";
pub const VT_API_KEY_ENV: &str = "VT_API_KEY";

/// Engine verdict counts from the last analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStats {
    #[serde(default)]
    pub harmless: u64,
    #[serde(default)]
    pub malicious: u64,
    #[serde(default)]
    pub suspicious: u64,
    #[serde(default)]
    pub undetected: u64,
}

/// Summarised reputation of one indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationReport {
    pub ip_address: String,
    pub reputation: Option<i64>,
    pub analysis_stats: AnalysisStats,
    pub is_malicious: bool,
}

impl ReputationReport {
    pub fn new(ip_address: impl Into<String>, reputation: Option<i64>, stats: AnalysisStats) -> Self {
        let is_malicious = stats.malicious > 0 || stats.suspicious > 0;
        Self {
            ip_address: ip_address.into(),
            reputation,
            analysis_stats: stats,
            is_malicious,
        }
    }

    /// Summarise a VirusTotal `ip_addresses` response body.
    pub fn from_virustotal(ip_address: &str, body: &Value) -> Result<Self> {
        let attributes = body
            .pointer("/data/attributes")
            .ok_or_else(|| VigilError::ExternalCall("VirusTotal response has no attributes".into()))?;

        let stats = match attributes.get("last_analysis_stats") {
            Some(raw) => serde_json::from_value(raw.clone()).map_err(|e| {
                VigilError::ExternalCall(format!("Unexpected VirusTotal stats: {e}"))
            })?,
            None => AnalysisStats::default(),
        };
        let reputation = attributes.get("reputation").and_then(Value::as_i64);

        Ok(Self::new(ip_address, reputation, stats))
    }
}

/// Trait for indicator reputation services. Mockable for testing.
#[async_trait]
pub trait ReputationLookup: Send + Sync {
    /// A missing credential and a failed call are both `ExternalCall` errors.
    async fn lookup(&self, indicator: &str) -> Result<ReputationReport>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationConfig {
    #[serde(default = "default_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_url() -> String {
    DEFAULT_VT_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    15_000
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            api_url: default_url(),
            api_key: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ReputationConfig {
    /// The configured key, falling back to `VT_API_KEY`.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(VT_API_KEY_ENV).ok().filter(|k| !k.is_empty()))
    }
}

/// VirusTotal v3 IP address lookups.
pub struct VirusTotalClient {
    api_url: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl VirusTotalClient {
    pub fn new(config: &ReputationConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| VigilError::Configuration(format!("Cannot build HTTP client: {e}")))?;

        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.resolve_api_key(),
            http_client,
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl ReputationLookup for VirusTotalClient {
    async fn lookup(&self, indicator: &str) -> Result<ReputationReport> {
        let Some(key) = &self.api_key else {
            return Err(VigilError::ExternalCall(format!(
                "VirusTotal API key not found: set reputation.api_key or {VT_API_KEY_ENV}"
            )));
        };

        // Only a bare address may reach the keyed endpoint path
        let ip: IpAddr = indicator.trim().parse().map_err(|_| {
            VigilError::ExternalCall(format!("indicator '{indicator}' is not a valid IP address"))
        })?;
        let url = format!("{}/ip_addresses/{ip}", self.api_url);
        debug!(indicator = %indicator, "Looking up indicator reputation");

        let response = self
            .http_client
            .get(&url)
            .header("x-apikey", key)
            .send()
            .await
            .map_err(|e| VigilError::ExternalCall(format!("VirusTotal request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            warn!(indicator = %indicator, status = %status, "VirusTotal lookup failed");
            return Err(VigilError::ExternalCall(format!(
                "VirusTotal API error {status}: {body_text}"
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            VigilError::ExternalCall(format!("Failed to parse VirusTotal response: {e}"))
        })?;

        ReputationReport::from_virustotal(indicator, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn suspicious_engines_make_it_malicious() {
        let body = json!({
            "data": {"attributes": {
                "reputation": -12,
                "last_analysis_stats": {"harmless": 60, "malicious": 0, "suspicious": 2, "undetected": 20}
            }}
        });
        let report = ReputationReport::from_virustotal("198.51.100.10", &body).unwrap();
        assert!(report.is_malicious);
        assert_eq!(report.reputation, Some(-12));
        assert_eq!(report.analysis_stats.suspicious, 2);
    }

    #[test]
    fn clean_report_is_benign() {
        let body = json!({
            "data": {"attributes": {
                "reputation": 540,
                "last_analysis_stats": {"harmless": 70, "malicious": 0, "suspicious": 0, "undetected": 10}
            }}
        });
        let report = ReputationReport::from_virustotal("8.8.8.8", &body).unwrap();
        assert!(!report.is_malicious);
    }

    #[test]
    fn missing_stats_default_to_zero() {
        let body = json!({"data": {"attributes": {}}});
        let report = ReputationReport::from_virustotal("10.0.0.1", &body).unwrap();
        assert_eq!(report.analysis_stats, AnalysisStats::default());
        assert_eq!(report.reputation, None);
    }

    #[test]
    fn error_body_is_external_call_error() {
        let body = json!({"error": {"code": "NotFoundError"}});
        let err = ReputationReport::from_virustotal("10.0.0.1", &body).unwrap_err();
        assert!(matches!(err, VigilError::ExternalCall(_)));
    }

    #[tokio::test]
    async fn lookup_without_key_is_external_call_error() {
        let client = VirusTotalClient {
            api_url: DEFAULT_VT_URL.into(),
            api_key: None,
            http_client: reqwest::Client::new(),
        };
        let err = client.lookup("8.8.8.8").await.unwrap_err();
        assert!(matches!(err, VigilError::ExternalCall(_)));
    }

    #[tokio::test]
    async fn lookup_rejects_path_in_indicator() {
        let client = VirusTotalClient {
            api_url: "http://127.0.0.1:9/api/v3".into(),
            api_key: Some("vt-test".into()),
            http_client: reqwest::Client::new(),
        };
        for indicator in ["8.8.8.8/../users/me", "8.8.8.8/../../../users/me?x=", "users"] {
            match client.lookup(indicator).await {
                Err(VigilError::ExternalCall(msg)) => assert!(msg.contains("not a valid IP")),
                other => panic!("expected rejection for {indicator}, got {other:?}"),
            }
        }
    }

    #[test]
    fn config_defaults_to_virustotal() {
        let config: ReputationConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.api_url, DEFAULT_VT_URL);
        assert_eq!(config.timeout_ms, 15_000);
    }
}
