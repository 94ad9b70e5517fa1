// =============================================================================
// GOOGLE NLP CLIENT - Cloud Natural Language sentiment analysis
// =============================================================================
//
// Implements the `SentimentAnalyzer` port on top of
// `documents:analyzeSentiment` (https://cloud.google.com/natural-language/docs/reference/rest).
//
// **Authentication:** API key passed as the `key` query parameter.
// **Response:** the document-level score lives at `documentSentiment.score`,
// in [-1, 1].
//
// **Environment Variables:**
// - `GOOGLE_NLP_API_KEY` - API key with the Natural Language API enabled

use crate::core::moderation::{ModerationError, SentimentAnalyzer};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://language.googleapis.com";

// =============================================================================
// API DATA STRUCTURES
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeSentimentRequest<'a> {
    document: Document<'a>,
    encoding_type: &'static str,
}

#[derive(Debug, Serialize)]
struct Document<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeSentimentResponse {
    document_sentiment: Option<Sentiment>,
}

#[derive(Debug, Deserialize)]
struct Sentiment {
    score: Option<f32>,
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct GoogleNlpClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GoogleNlpClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different host (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl SentimentAnalyzer for GoogleNlpClient {
    async fn analyze(&self, text: &str) -> Result<f32, ModerationError> {
        let url = format!("{}/v1/documents:analyzeSentiment", self.base_url);

        let payload = AnalyzeSentimentRequest {
            document: Document {
                kind: "PLAIN_TEXT",
                content: text,
            },
            encoding_type: "UTF8",
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModerationError::Api(format!(
                "Google NLP API error: {} - {}",
                status, body
            )));
        }

        let parsed: AnalyzeSentimentResponse = response
            .json()
            .await
            .map_err(|e| ModerationError::MalformedResponse(e.to_string()))?;

        let score = parsed
            .document_sentiment
            .and_then(|s| s.score)
            .ok_or_else(|| {
                ModerationError::MalformedResponse("missing documentSentiment.score".to_string())
            })?;

        if !(-1.0..=1.0).contains(&score) {
            return Err(ModerationError::MalformedResponse(format!(
                "sentiment score {} outside [-1, 1]",
                score
            )));
        }

        Ok(score)
    }
}
