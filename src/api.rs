//! Screens API client — the save/load boundary with the backend.
//!
//! DESIGN
//! ======
//! `ScreenApi` is the seam: the session only knows the trait, production
//! uses [`HttpScreenApi`], tests use in-process fakes. The save payload is
//! the current draft plus `metadata.save_timestamp`, the client clock
//! reading the push completion echoes back for end-to-end correlation.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::draft::{ComponentNode, PaletteEntry, ScreenDraft};

const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP client could not be constructed.
    #[error("http client build failed: {0}")]
    ClientBuild(String),

    /// The request never produced a response.
    #[error("request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not decode as the expected shape.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// A create response came back without a server-assigned id.
    #[error("created screen has no id")]
    MissingId,
}

// =============================================================================
// WIRE TYPES
// =============================================================================

/// Save payload: draft metadata, the component tree under `config`, and the
/// client save timestamp under `metadata`.
#[derive(Debug, Clone, Serialize)]
pub struct SaveRequest {
    pub name: String,
    pub title: String,
    pub description: String,
    pub platform: String,
    pub locale: String,
    pub is_active: bool,
    pub config: ScreenConfig,
    pub metadata: SaveMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreenConfig {
    #[serde(default)]
    pub components: Vec<ComponentNode>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SaveMetadata {
    pub save_timestamp: i64,
}

impl SaveRequest {
    /// Build the payload for one save issued at local time `save_timestamp`.
    #[must_use]
    pub fn from_draft(draft: &ScreenDraft, save_timestamp: i64) -> Self {
        Self {
            name: draft.name.clone(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            platform: draft.platform.clone(),
            locale: draft.locale.clone(),
            is_active: draft.is_active,
            config: ScreenConfig { components: draft.components.clone() },
            metadata: SaveMetadata { save_timestamp },
        }
    }
}

/// A persisted screen as the backend returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct ScreenRecord {
    pub id: i64,
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub platform: String,
    pub locale: String,
    pub is_active: bool,
    #[serde(default)]
    pub config: ScreenConfig,
}

impl ScreenRecord {
    /// Turn a fetched record back into an editable draft.
    #[must_use]
    pub fn into_draft(self) -> ScreenDraft {
        ScreenDraft {
            id: Some(self.id),
            name: self.name,
            title: self.title,
            description: self.description,
            platform: self.platform,
            locale: self.locale,
            is_active: self.is_active,
            components: self.config.components,
        }
    }
}

// =============================================================================
// TRAIT
// =============================================================================

/// The backend operations the builder needs. Everything else the admin
/// panel does (analytics, A/B tests, templates) is out of scope here.
#[async_trait]
pub trait ScreenApi: Send + Sync {
    /// Persist a brand-new screen; the server assigns the id.
    async fn create_screen(&self, payload: &SaveRequest) -> Result<ScreenRecord, ApiError>;

    /// Persist changes to an existing screen.
    async fn update_screen(&self, id: i64, payload: &SaveRequest) -> Result<ScreenRecord, ApiError>;

    /// Fetch one screen for editing.
    async fn get_screen(&self, id: i64) -> Result<ScreenRecord, ApiError>;

    /// Fetch the component palette.
    async fn list_components(&self) -> Result<Vec<PaletteEntry>, ApiError>;
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

/// Production client over the REST backend.
pub struct HttpScreenApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpScreenApi {
    /// Build a client for `base_url` (e.g. `http://localhost:8000`).
    ///
    /// # Errors
    ///
    /// Returns `ClientBuild` if the underlying HTTP client fails to build.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ApiError::ClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.into().trim_end_matches('/').to_owned() })
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(ApiError::Status { status, body: text });
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ScreenApi for HttpScreenApi {
    async fn create_screen(&self, payload: &SaveRequest) -> Result<ScreenRecord, ApiError> {
        let url = format!("{}/api/screens/", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        Self::decode(response).await
    }

    async fn update_screen(&self, id: i64, payload: &SaveRequest) -> Result<ScreenRecord, ApiError> {
        let url = format!("{}/api/screens/{id}", self.base_url);
        let response = self
            .http
            .put(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        Self::decode(response).await
    }

    async fn get_screen(&self, id: i64) -> Result<ScreenRecord, ApiError> {
        let url = format!("{}/api/screens/{id}", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        Self::decode(response).await
    }

    async fn list_components(&self) -> Result<Vec<PaletteEntry>, ApiError> {
        let url = format!("{}/api/components/", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        Self::decode(response).await
    }
}

// =============================================================================
// TESTS
// =============================================================================
