//! Gemini generateContent client.

use super::{GenerationOutput, ImageGenerator, ImagingError, InlineImage};
use crate::config::GeminiConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Part {
    Text(String),
    InlineData(InlineData),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn generate_content(&self, model: &str, parts: Vec<Part>) -> Result<GenerateContentResponse, ImagingError> {
        let url = format!("{}/v1beta/models/{model}:generateContent", self.config.api_base);
        let request = GenerateContentRequest {
            contents: vec![Content { parts }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ImagingError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.is_client_error() {
                return Err(ImagingError::Rejected(format!("{status}: {body}")));
            }
            return Err(ImagingError::Request(format!("{status}: {body}")));
        }

        response.json().await.map_err(|e| ImagingError::Request(e.to_string()))
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate(&self, prompt: &str, images: &[InlineImage]) -> Result<GenerationOutput, ImagingError> {
        let mut parts = vec![Part::Text(prompt.to_string())];
        for image in images {
            parts.push(Part::InlineData(InlineData {
                mime_type: image.mime_type.clone(),
                data: image.data.clone(),
            }));
        }

        debug!(model = %self.config.image_model, image_count = images.len(), "sending generation request");
        let response = self.generate_content(&self.config.image_model, parts).await?;

        response
            .candidates
            .into_iter()
            .flat_map(|c| c.content.parts)
            .find_map(|part| part.inline_data)
            .map(|data| GenerationOutput {
                image: InlineImage {
                    mime_type: data.mime_type,
                    data: data.data,
                },
            })
            .ok_or(ImagingError::EmptyResponse)
    }

    async fn analyze(&self, prompt: &str, image: &InlineImage) -> Result<String, ImagingError> {
        let parts = vec![
            Part::Text(prompt.to_string()),
            Part::InlineData(InlineData {
                mime_type: image.mime_type.clone(),
                data: image.data.clone(),
            }),
        ];

        let response = self.generate_content(&self.config.text_model, parts).await?;

        let text: String = response
            .candidates
            .into_iter()
            .flat_map(|c| c.content.parts)
            .filter_map(|part| part.text)
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(ImagingError::EmptyResponse);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text("describe".to_string()),
                    Part::InlineData(InlineData {
                        mime_type: "image/png".to_string(),
                        data: "aGVsbG8=".to_string(),
                    }),
                ],
            }],
        };
        let json = serde_json::to_value(&request).expect("serialize failed");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "describe");
        assert_eq!(json["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/png");
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "a bowl of ramen"},
                        {"inlineData": {"mimeType": "image/png", "data": "aW1n"}}
                    ]
                }
            }]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(body).expect("deserialize failed");
        let parts = &response.candidates[0].content.parts;
        assert_eq!(parts[0].text.as_deref(), Some("a bowl of ramen"));
        assert_eq!(parts[1].inline_data.as_ref().map(|d| d.data.as_str()), Some("aW1n"));
    }

    #[test]
    fn test_empty_candidates_parse() {
        let response: GenerateContentResponse = serde_json::from_str("{}").expect("deserialize failed");
        assert!(response.candidates.is_empty());
    }
}
