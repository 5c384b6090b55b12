/// Enrichment lookup
///
/// Resolves an object class name to a short description and a usage text.
/// Lookups never fail from the caller's point of view: any miss or error is
/// replaced by placeholder text.

use crate::config::LookupConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

pub const NO_DESCRIPTION: &str = "No description available";
pub const NO_USAGE: &str = "No usage information available";

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Lookup service returned status {0}")]
    Status(u16),

    #[error("No match for {0}")]
    NoMatch(String),
}

/// Descriptive text attached to a class on first sighting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    pub description: String,
    pub usage: String,
}

impl Enrichment {
    pub fn new(description: impl Into<String>, usage: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            usage: usage.into(),
        }
    }

    pub fn placeholder() -> Self {
        Self::new(NO_DESCRIPTION, NO_USAGE)
    }
}

impl Default for Enrichment {
    fn default() -> Self {
        Self::placeholder()
    }
}

/// Class name to description lookup
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnrichmentLookup: Send + Sync {
    /// Always yields a well-formed enrichment, falling back to placeholders
    async fn lookup(&self, label: &str) -> Enrichment;
}

/// Wikidata entity search response (only the fields we read)
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    description: Option<String>,
    label: Option<String>,
}

/// Lookup backed by the Wikidata REST entity search
#[derive(Clone)]
pub struct WikidataLookup {
    client: Client,
    config: LookupConfig,
}

impl WikidataLookup {
    pub fn new(config: LookupConfig) -> Result<Self, LookupError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| LookupError::Client(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    async fn fetch(&self, label: &str) -> Result<Enrichment, LookupError> {
        let response = self
            .client
            .get(self.config.endpoint.as_str())
            .query(&[("search", label), ("language", self.config.language.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LookupError::Status(response.status().as_u16()));
        }

        let body: SearchResponse = response.json().await?;
        enrichment_from_search(label, body)
    }
}

/// First search hit wins; each missing field gets its own placeholder
fn enrichment_from_search(label: &str, body: SearchResponse) -> Result<Enrichment, LookupError> {
    let hit = body
        .search
        .into_iter()
        .next()
        .ok_or_else(|| LookupError::NoMatch(label.to_string()))?;

    Ok(Enrichment {
        description: hit.description.unwrap_or_else(|| NO_DESCRIPTION.to_string()),
        usage: hit.label.unwrap_or_else(|| NO_USAGE.to_string()),
    })
}

#[async_trait]
impl EnrichmentLookup for WikidataLookup {
    async fn lookup(&self, label: &str) -> Enrichment {
        match self.fetch(label).await {
            Ok(enrichment) => {
                debug!("Enriched {}: {}", label, enrichment.description);
                enrichment
            }
            Err(LookupError::NoMatch(_)) => {
                debug!("No lookup match for {}", label);
                Enrichment::placeholder()
            }
            Err(e) => {
                warn!("Lookup for {} failed: {}", label, e);
                Enrichment::placeholder()
            }
        }
    }
}

/// Fixed table lookup, for offline runs
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    entries: HashMap<String, Enrichment>,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, label: impl Into<String>, enrichment: Enrichment) -> Self {
        self.entries.insert(label.into(), enrichment);
        self
    }
}

#[async_trait]
impl EnrichmentLookup for StaticLookup {
    async fn lookup(&self, label: &str) -> Enrichment {
        self.entries.get(label).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> SearchResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_first_hit_used() {
        let body = parse(
            r#"{"search": [
                {"id": "Q81727", "label": "cup", "description": "small open container"},
                {"id": "Q1", "label": "other", "description": "ignored"}
            ]}"#,
        );

        let enrichment = enrichment_from_search("cup", body).unwrap();
        assert_eq!(enrichment.description, "small open container");
        assert_eq!(enrichment.usage, "cup");
    }

    #[test]
    fn test_missing_fields_get_placeholders() {
        let body = parse(r#"{"search": [{"id": "Q2"}]}"#);

        let enrichment = enrichment_from_search("thing", body).unwrap();
        assert_eq!(enrichment, Enrichment::placeholder());
    }

    #[test]
    fn test_empty_search_is_no_match() {
        let body = parse(r#"{"search": []}"#);
        assert!(matches!(
            enrichment_from_search("widget", body),
            Err(LookupError::NoMatch(_))
        ));

        let body = parse(r#"{}"#);
        assert!(enrichment_from_search("widget", body).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_service_falls_back() {
        let lookup = WikidataLookup::new(LookupConfig {
            endpoint: "http://127.0.0.1:9/search".to_string(),
            language: "en".to_string(),
            timeout_secs: 1,
        })
        .unwrap();

        assert_eq!(lookup.lookup("widget").await, Enrichment::placeholder());
    }

    #[tokio::test]
    async fn test_static_lookup() {
        let lookup = StaticLookup::new()
            .with_entry("cup", Enrichment::new("small container", "drinking"));

        assert_eq!(lookup.lookup("cup").await.usage, "drinking");
        assert_eq!(lookup.lookup("widget").await, Enrichment::placeholder());
    }
}
