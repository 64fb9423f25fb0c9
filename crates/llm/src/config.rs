//! Provider configuration and per-call endpoint resolution.
//!
//! [`ProviderConfig`] is loaded once (usually from the process environment)
//! and never mutated. Each call overlays its own [`Credentials`] on top of it
//! to produce a [`ResolvedEndpoint`] that lives only for that call.

use std::time::Duration;

use pipeline::{ApiKey, ApiVersion, Credentials, EmbeddingSpec, LlmError, ModelName};
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

/// Default base URL for the OpenAI flavour.
pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default limit on connecting and receiving a complete response, or the
/// response headers of a stream.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default limit on the silence between two reads of a response body.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Which wire dialect an OpenAI-style endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiFlavor {
    /// Azure OpenAI: deployment in the path, `api-version` query, `api-key` header.
    Azure,
    /// OpenAI and compatible servers: model in the body, bearer token.
    OpenAi,
}

impl ApiFlavor {
    /// Environment variables holding `(endpoint, api_key, api_version)`.
    ///
    /// The OpenAI flavour has no API version variable.
    pub fn env_keys(self) -> (&'static str, &'static str, Option<&'static str>) {
        match self {
            Self::Azure => (
                "AZURE_OPENAI_ENDPOINT",
                "AZURE_OPENAI_API_KEY",
                Some("AZURE_OPENAI_API_VERSION"),
            ),
            Self::OpenAi => ("OPENAI_BASE_URL", "OPENAI_API_KEY", None),
        }
    }
}

impl std::fmt::Display for ApiFlavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Azure => f.write_str("azure"),
            Self::OpenAi => f.write_str("openai"),
        }
    }
}

// ---------------------------------------------------------------------------

/// Static configuration of one provider instance.
///
/// Endpoint, key, and version may be left unset here and supplied per call
/// through [`Credentials`]; resolution fails only if neither provides them.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Wire dialect.
    pub flavor: ApiFlavor,
    /// Base URL (Azure resource endpoint or OpenAI base URL).
    pub endpoint: Option<String>,
    /// API key.
    pub api_key: Option<ApiKey>,
    /// API version (Azure only).
    pub api_version: Option<ApiVersion>,
    /// Chat model used when a request names none.
    pub chat_model: ModelName,
    /// Embedding model and its vector width.
    pub embedding: EmbeddingSpec,
    /// Limit on one attempt: the whole exchange for plain calls, up to the
    /// response headers for streams. Also bounds connecting.
    pub timeout: Duration,
    /// Limit on the gap between body reads, so an idle stream fails instead
    /// of hanging.
    pub read_timeout: Duration,
}

impl ProviderConfig {
    /// Creates a configuration with no endpoint or credentials and default models.
    pub fn new(flavor: ApiFlavor) -> Self {
        Self {
            flavor,
            endpoint: match flavor {
                ApiFlavor::Azure => None,
                ApiFlavor::OpenAi => Some(OPENAI_DEFAULT_BASE_URL.to_string()),
            },
            api_key: None,
            api_version: None,
            chat_model: ModelName::default_chat(),
            embedding: EmbeddingSpec::default(),
            timeout: DEFAULT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Reads endpoint, key, and version from the process environment.
    ///
    /// The environment is only read, never written.
    pub fn from_env(flavor: ApiFlavor) -> Self {
        Self::from_lookup(flavor, |key| std::env::var(key).ok())
    }

    /// Like [`ProviderConfig::from_env`] but with an arbitrary variable source.
    pub fn from_lookup<F>(flavor: ApiFlavor, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let (endpoint_key, api_key_key, version_key) = flavor.env_keys();
        let mut config = Self::new(flavor);
        if let Some(endpoint) = lookup(endpoint_key).filter(|v| !v.trim().is_empty()) {
            config.endpoint = Some(endpoint);
        }
        config.api_key = lookup(api_key_key).and_then(ApiKey::new);
        config.api_version = version_key.and_then(&lookup).and_then(ApiVersion::new);
        config
    }

    /// Sets the endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: ApiKey) -> Self {
        self.api_key = Some(api_key);
        self
    }

    /// Sets the API version.
    #[must_use]
    pub fn with_api_version(mut self, api_version: ApiVersion) -> Self {
        self.api_version = Some(api_version);
        self
    }

    /// Sets the default chat model.
    #[must_use]
    pub fn with_chat_model(mut self, model: ModelName) -> Self {
        self.chat_model = model;
        self
    }

    /// Sets the embedding model attributes.
    #[must_use]
    pub fn with_embedding(mut self, embedding: EmbeddingSpec) -> Self {
        self.embedding = embedding;
        self
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the body read timeout.
    #[must_use]
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Overlays per-call `overrides` on this configuration.
    ///
    /// Fails with [`LlmError::ConfigurationError`] if the endpoint or key is
    /// missing from both, or if the Azure flavour has no API version.
    pub fn resolve(&self, overrides: &Credentials) -> Result<ResolvedEndpoint, LlmError> {
        let base = overrides
            .endpoint
            .clone()
            .or_else(|| self.endpoint.clone())
            .ok_or_else(|| {
                LlmError::configuration(format!(
                    "no endpoint configured ({} or per-call base_url)",
                    self.flavor.env_keys().0
                ))
            })?;
        let api_key = overrides
            .api_key
            .clone()
            .or_else(|| self.api_key.clone())
            .ok_or_else(|| {
                LlmError::configuration(format!(
                    "no API key configured ({} or per-call api_key)",
                    self.flavor.env_keys().1
                ))
            })?;
        let api_version = overrides
            .api_version
            .clone()
            .or_else(|| self.api_version.clone());
        if self.flavor == ApiFlavor::Azure && api_version.is_none() {
            return Err(LlmError::configuration(
                "no API version configured (AZURE_OPENAI_API_VERSION or per-call api_version)",
            ));
        }

        Ok(ResolvedEndpoint {
            flavor: self.flavor,
            base: base.trim_end_matches('/').to_string(),
            api_key,
            api_version,
        })
    }
}

// ---------------------------------------------------------------------------

/// Endpoint and credentials for exactly one call.
#[derive(Debug, Clone)]
pub struct ResolvedEndpoint {
    flavor: ApiFlavor,
    base: String,
    api_key: ApiKey,
    api_version: Option<ApiVersion>,
}

impl ResolvedEndpoint {
    /// URL of the chat completions endpoint for `model`.
    pub fn chat_url(&self, model: &ModelName) -> String {
        self.operation_url(model, "chat/completions")
    }

    /// URL of the embeddings endpoint for `model`.
    pub fn embeddings_url(&self, model: &ModelName) -> String {
        self.operation_url(model, "embeddings")
    }

    fn operation_url(&self, model: &ModelName, operation: &str) -> String {
        match (self.flavor, &self.api_version) {
            (ApiFlavor::Azure, Some(version)) => format!(
                "{}/openai/deployments/{}/{}?api-version={}",
                self.base, model, operation, version
            ),
            (ApiFlavor::Azure, None) => {
                format!("{}/openai/deployments/{}/{}", self.base, model, operation)
            }
            (ApiFlavor::OpenAi, _) => format!("{}/{}", self.base, operation),
        }
    }

    /// Request headers: JSON content type plus the flavour's auth header.
    pub fn headers(&self) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let (name, raw) = match self.flavor {
            ApiFlavor::Azure => (
                header::HeaderName::from_static("api-key"),
                self.api_key.expose().to_string(),
            ),
            ApiFlavor::OpenAi => (
                header::AUTHORIZATION,
                format!("Bearer {}", self.api_key.expose()),
            ),
        };
        let mut value = HeaderValue::from_str(&raw)
            .map_err(|_| LlmError::configuration("API key contains invalid header characters"))?;
        value.set_sensitive(true);
        headers.insert(name, value);
        Ok(headers)
    }
}
