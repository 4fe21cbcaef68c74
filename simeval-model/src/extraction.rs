//! HTTP client for the entity-extraction service.
//!
//! The service contract is a single `predict` call: text plus candidate
//! entity-type labels and a detection threshold in, a list of
//! `{text, label, score}` detections out.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use simeval_core::{EntityExtractor, ExtractedEntity, Result, SimevalError};

/// Configuration for the extraction endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Full URL of the predict endpoint.
    pub endpoint: String,
    /// Optional bearer token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl ExtractionConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), api_key: None }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    text: &'a str,
    labels: &'a [String],
    threshold: f64,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    entities: Vec<ExtractedEntity>,
}

/// Client for a remote entity-extraction model.
pub struct ExtractionClient {
    client: Client,
    config: ExtractionConfig,
}

impl ExtractionClient {
    pub fn new(config: ExtractionConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| SimevalError::Model(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl EntityExtractor for ExtractionClient {
    async fn extract(
        &self,
        text: &str,
        entity_types: &[String],
        threshold: f64,
    ) -> Result<Vec<ExtractedEntity>> {
        let mut request = self
            .client
            .post(&self.config.endpoint)
            .json(&PredictRequest { text, labels: entity_types, threshold });

        if let Some(key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| SimevalError::Model(format!("extraction request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SimevalError::Model(format!("extraction API error {status}: {body}")));
        }

        let parsed: PredictResponse = response.json().await.map_err(|e| {
            SimevalError::ResponseContract(format!("malformed extraction response: {e}"))
        })?;

        Ok(parsed.entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_extract_parses_entities() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entities": [
                    {"text": "$23.00", "label": "amount", "score": 0.91},
                    {"text": "April 2024", "label": "date", "score": 0.85}
                ]
            })))
            .mount(&server)
            .await;

        let client = ExtractionClient::new(ExtractionConfig::new(format!(
            "{}/predict",
            server.uri()
        )))
        .unwrap();

        let entities = client
            .extract("Your bill is $23.00 for April 2024", &["amount".into(), "date".into()], 0.7)
            .await
            .unwrap();

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].text, "$23.00");
        assert_eq!(entities[1].label, "date");
    }

    #[tokio::test]
    async fn test_extract_contract_violation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = ExtractionClient::new(ExtractionConfig::new(format!(
            "{}/predict",
            server.uri()
        )))
        .unwrap();

        let err = client.extract("text", &[], 0.5).await.unwrap_err();
        assert!(matches!(err, SimevalError::ResponseContract(_)));
    }
}
