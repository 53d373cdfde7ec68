//! AI text-generation service boundary.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use adpack_core::blueprint::VariantTag;
use adpack_core::format::AspectRatio;

use crate::endpoint;
use crate::error::GenerationError;

/// What a call is for. Carried on the request so fakes and logs can tell
/// calls apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationPurpose {
    Copy,
    Blueprint {
        aspect_ratio: AspectRatio,
        variant: VariantTag,
    },
    Compliance,
}

impl GenerationPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationPurpose::Copy => "copy",
            GenerationPurpose::Blueprint { .. } => "blueprint",
            GenerationPurpose::Compliance => "compliance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Json,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub purpose: GenerationPurpose,
    pub system: String,
    pub prompt: String,
    pub response_format: ResponseFormat,
}

impl GenerationRequest {
    pub fn json(purpose: GenerationPurpose, system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            purpose,
            system: system.into(),
            prompt: prompt.into(),
            response_format: ResponseFormat::Json,
        }
    }
}

/// Returns the raw completion text. Parsing is the caller's job.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    purpose: &'a str,
    system: &'a str,
    prompt: &'a str,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    content: String,
}

/// `POST {base}/v1/generate` with a bearer key; the body's `content` is the completion.
#[derive(Debug, Clone)]
pub struct HttpGenerationClient {
    base_url: Url,
    api_key: Option<String>,
    model: Option<String>,
    client: Client,
}

impl HttpGenerationClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: Option<String>,
    ) -> Result<Self, GenerationError> {
        if base_url.trim().is_empty() {
            return Err(GenerationError::NotConfigured);
        }
        let base_url = endpoint::parse_base(base_url).map_err(GenerationError::InvalidUrl)?;
        let client = Client::builder().build()?;
        Ok(Self {
            base_url,
            api_key,
            model,
            client,
        })
    }

    fn endpoint(&self) -> Url {
        endpoint::join(&self.base_url, &["v1", "generate"])
    }
}

#[async_trait]
impl GenerationService for HttpGenerationClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let body = WireRequest {
            model: self.model.as_deref(),
            purpose: request.purpose.as_str(),
            system: &request.system,
            prompt: &request.prompt,
            response_format: request.response_format,
        };

        let mut call = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        let response = call.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(purpose = request.purpose.as_str(), status = status.as_u16(), "generation call rejected");
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: WireResponse = response.json().await?;
        Ok(parsed.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_normalizes_trailing_slash() {
        let c = HttpGenerationClient::new("http://127.0.0.1:9000/", None, None).unwrap();
        assert_eq!(c.endpoint().as_str(), "http://127.0.0.1:9000/v1/generate");
    }

    #[test]
    fn empty_url_is_not_configured() {
        assert!(matches!(
            HttpGenerationClient::new("  ", None, None),
            Err(GenerationError::NotConfigured)
        ));
    }

    #[test]
    fn purpose_serializes_with_kind_tag() {
        let p = GenerationPurpose::Blueprint {
            aspect_ratio: AspectRatio::Square,
            variant: VariantTag::from_index(1).unwrap(),
        };
        let v = serde_json::to_value(p).unwrap();
        assert_eq!(v["kind"], "blueprint");
        assert_eq!(v["aspect_ratio"], "1:1");
        assert_eq!(v["variant"], "B");
    }
}
