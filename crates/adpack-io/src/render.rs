//! Video render service boundary.
//!
//! The service takes a flat scene description (canvas, duration, timed
//! elements) and renders asynchronously: `submit` returns an id, `poll`
//! reports progress until a terminal status.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::endpoint;
use crate::error::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderElementKind {
    Text,
    Image,
    Video,
    Subtitle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderElement {
    #[serde(rename = "type")]
    pub kind: RenderElementKind,
    pub start_s: f32,
    pub end_s: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// `top`, `center`, `bottom` for text; ignored for media.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    pub width: u32,
    pub height: u32,
    pub duration_s: u32,
    pub output_format: String,
    pub elements: Vec<RenderElement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

impl RenderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RenderStatus::Done | RenderStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderPoll {
    pub status: RenderStatus,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[async_trait]
pub trait RenderService: Send + Sync {
    async fn submit(&self, scene: &SceneDescription) -> Result<String, RenderError>;
    async fn poll(&self, render_id: &str) -> Result<RenderPoll, RenderError>;
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

/// `POST {base}/v1/renders` then `GET {base}/v1/renders/{id}`.
#[derive(Debug, Clone)]
pub struct HttpRenderClient {
    base_url: Url,
    api_key: Option<String>,
    client: Client,
}

impl HttpRenderClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, RenderError> {
        if base_url.trim().is_empty() {
            return Err(RenderError::NotConfigured);
        }
        let base_url = endpoint::parse_base(base_url).map_err(RenderError::InvalidUrl)?;
        let client = Client::builder().build()?;
        Ok(Self {
            base_url,
            api_key,
            client,
        })
    }

    /// `{base}/v1/renders[/{id}]`; the id is escaped as one path segment.
    fn endpoint(&self, render_id: Option<&str>) -> Url {
        match render_id {
            Some(id) => endpoint::join(&self.base_url, &["v1", "renders", id]),
            None => endpoint::join(&self.base_url, &["v1", "renders"]),
        }
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn checked(response: reqwest::Response) -> Result<reqwest::Response, RenderError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(RenderError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl RenderService for HttpRenderClient {
    async fn submit(&self, scene: &SceneDescription) -> Result<String, RenderError> {
        let req = self.authorize(self.client.post(self.endpoint(None)).json(scene));
        let response = Self::checked(req.send().await?).await?;
        let body: SubmitResponse = response.json().await?;
        if body.id.trim().is_empty() {
            return Err(RenderError::Malformed("empty render id".into()));
        }
        Ok(body.id)
    }

    async fn poll(&self, render_id: &str) -> Result<RenderPoll, RenderError> {
        let req = self.authorize(self.client.get(self.endpoint(Some(render_id))));
        let response = Self::checked(req.send().await?).await?;
        Ok(response.json().await?)
    }
}
