// =============================================================================
// REKOGNITION CLIENT - AWS image content moderation
// =============================================================================
//
// Implements the `ImageClassifier` port with Rekognition's
// `DetectModerationLabels` action (https://docs.aws.amazon.com/rekognition/latest/APIReference/API_DetectModerationLabels.html).
//
// **Protocol:** AWS JSON 1.1 - a signed POST to `/` with the action named in
// the `X-Amz-Target` header. The image travels inline as base64 in
// `Image.Bytes` (Rekognition caps inline images at 5 MB).
//
// **Response:** `ModerationLabels[]` with `Name`, `Confidence` and
// `ParentName`. Both top-level categories ("Explicit Nudity") and their
// children ("Graphic Male Nudity") come back as separate labels.
//
// **Environment Variables:**
// - `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, optional `AWS_SESSION_TOKEN`
// - `AWS_REGION` - defaults to `us-east-1`

use super::aws_sigv4::{sign_request, SigningInput};
use crate::core::moderation::{AwsSettings, ImageClassifier, ImageLabel, ModerationError};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

const SERVICE: &str = "rekognition";
const TARGET: &str = "RekognitionService.DetectModerationLabels";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Rekognition rejects inline images larger than this.
pub const MAX_INLINE_IMAGE_BYTES: usize = 5 * 1024 * 1024;

// =============================================================================
// API DATA STRUCTURES
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DetectModerationLabelsRequest {
    image: ImagePayload,
    min_confidence: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ImagePayload {
    /// Base64-encoded image bytes
    bytes: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DetectModerationLabelsResponse {
    moderation_labels: Vec<ModerationLabel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ModerationLabel {
    name: String,
    confidence: f32,
}

/// Error body of a failed JSON-protocol call.
#[derive(Debug, Deserialize)]
struct AwsErrorBody {
    #[serde(rename = "__type")]
    kind: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct RekognitionClient {
    client: Client,
    settings: AwsSettings,
    endpoint: Url,
}

impl RekognitionClient {
    pub fn new(settings: AwsSettings) -> Result<Self, ModerationError> {
        let endpoint = format!("https://rekognition.{}.amazonaws.com/", settings.region);
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| ModerationError::Config(format!("invalid AWS region: {}", e)))?;

        Ok(Self {
            client: Client::new(),
            settings,
            endpoint,
        })
    }

    /// Point the client at a different endpoint (used by tests).
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self, ModerationError> {
        self.endpoint = Url::parse(endpoint)
            .map_err(|e| ModerationError::Config(format!("invalid endpoint: {}", e)))?;
        Ok(self)
    }

    /// `host[:port]` as reqwest will put it in the Host header.
    fn host_header(&self) -> Result<String, ModerationError> {
        let host = self
            .endpoint
            .host_str()
            .ok_or_else(|| ModerationError::Config("endpoint has no host".to_string()))?;
        Ok(match self.endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
    }
}

#[async_trait]
impl ImageClassifier for RekognitionClient {
    async fn detect_labels(
        &self,
        image: &[u8],
        min_confidence: f32,
    ) -> Result<Vec<ImageLabel>, ModerationError> {
        if image.len() > MAX_INLINE_IMAGE_BYTES {
            return Err(ModerationError::InvalidInput(format!(
                "image is {} bytes, Rekognition accepts at most {}",
                image.len(),
                MAX_INLINE_IMAGE_BYTES
            )));
        }

        let payload = serde_json::to_vec(&DetectModerationLabelsRequest {
            image: ImagePayload {
                bytes: BASE64.encode(image),
            },
            min_confidence,
        })
        .map_err(|e| ModerationError::Api(e.to_string()))?;

        let host = self.host_header()?;
        let signed = sign_request(
            &self.settings,
            SERVICE,
            &SigningInput {
                method: "POST",
                host: &host,
                path: self.endpoint.path(),
                headers: &[("content-type", CONTENT_TYPE), ("x-amz-target", TARGET)],
                payload: &payload,
            },
            Utc::now(),
        )?;

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header("content-type", CONTENT_TYPE)
            .header("x-amz-target", TARGET);
        for (name, value) in signed {
            request = request.header(name, value);
        }

        let response = request.body(payload).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<AwsErrorBody>(&body) {
                Ok(err) => format!(
                    "{}: {}",
                    err.kind.unwrap_or_else(|| "UnknownError".to_string()),
                    err.message.unwrap_or_default()
                ),
                Err(_) => body,
            };
            return Err(ModerationError::Api(format!(
                "Rekognition API error: {} - {}",
                status, detail
            )));
        }

        let parsed: DetectModerationLabelsResponse = response
            .json()
            .await
            .map_err(|e| ModerationError::MalformedResponse(e.to_string()))?;

        Ok(parsed
            .moderation_labels
            .into_iter()
            .map(|label| ImageLabel {
                name: label.name,
                confidence: label.confidence,
            })
            .collect())
    }
}
