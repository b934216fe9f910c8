//! Transport client for api.elsevier.com and shared HTTP utilities.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::info;

use crate::error::ScopusError;

pub const DEFAULT_API_BASE: &str = "https://api.elsevier.com";

const API_BASE_ENV: &str = "SCOPUS_API_BASE";
const API_KEY_ENV: &str = "SCOPUS_API_KEY";
const INST_TOKEN_ENV: &str = "SCOPUS_INST_TOKEN";

// Header names must be lowercase to satisfy `HeaderMap`'s static-name path;
// the wire treats them case-insensitively.
const API_KEY_HEADER: &str = "x-els-apikey";
const INST_TOKEN_HEADER: &str = "x-els-insttoken";
const API_STATUS_HEADER: &str = "x-els-status";

const ERROR_EXCERPT_MAX_CHARS: usize = 500;
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Wire format requested from the API via the `Accept` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseFormat {
    #[default]
    Json,
    Xml,
}

impl ResponseFormat {
    fn accept(self) -> &'static str {
        match self {
            ResponseFormat::Json => "application/json",
            ResponseFormat::Xml => "text/xml",
        }
    }
}

pub(crate) fn api_base() -> Cow<'static, str> {
    match std::env::var(API_BASE_ENV) {
        Ok(v) if !v.trim().is_empty() => {
            Cow::Owned(v.trim().trim_end_matches('/').to_string())
        }
        _ => Cow::Borrowed(DEFAULT_API_BASE),
    }
}

fn default_local_dir() -> PathBuf {
    match dirs::data_dir() {
        Some(dir) => dir.join("scopus-client"),
        None => std::env::temp_dir().join("scopus-client"),
    }
}

/// Handle on the remote API: one `reqwest` client plus the credentials and
/// the local directory retrieved payloads are cached under.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base: Cow<'static, str>,
    local_dir: PathBuf,
}

impl ApiClient {
    /// Builds a client authenticating with `api_key` and default settings.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ScopusError> {
        Self::builder(api_key).build()
    }

    pub fn builder(api_key: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder {
            api_key: api_key.into(),
            inst_token: None,
            base: None,
            local_dir: None,
        }
    }

    /// Builds a client from `SCOPUS_API_KEY` and, when set, `SCOPUS_INST_TOKEN`.
    pub fn from_env() -> Result<Self, ScopusError> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ScopusError::InvalidArgument(format!("{API_KEY_ENV} is not set"))
            })?;

        let mut builder = Self::builder(api_key);
        if let Some(token) = std::env::var(INST_TOKEN_ENV)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
        {
            builder = builder.inst_token(token);
        }
        builder.build()
    }

    pub fn base(&self) -> &str {
        self.base.as_ref()
    }

    /// Directory entity and search payloads are written under by default.
    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    /// Issues a single GET against `uri` and returns the parsed body.
    ///
    /// No retries; a non-success status surfaces as [`ScopusError::Api`]
    /// carrying a body excerpt and the `X-ELS-Status` diagnostic header when
    /// the API supplies one. An `Xml` response body is returned as a JSON
    /// string value.
    pub async fn exec_request(
        &self,
        uri: &str,
        format: ResponseFormat,
    ) -> Result<Value, ScopusError> {
        let resp = self
            .client
            .get(uri)
            .header(ACCEPT, format.accept())
            .send()
            .await?;

        let status = resp.status();
        let api_status = resp
            .headers()
            .get(API_STATUS_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = drain_capped(resp).await?.ok_or_else(|| ScopusError::Api {
            endpoint: uri.to_string(),
            message: format!("response body exceeded {MAX_BODY_BYTES} bytes"),
        })?;

        if !status.is_success() {
            let excerpt = one_line_excerpt(&bytes);
            let message = match api_status {
                Some(api_status) => format!("HTTP {status} ({api_status}): {excerpt}"),
                None => format!("HTTP {status}: {excerpt}"),
            };
            return Err(ScopusError::Api {
                endpoint: uri.to_string(),
                message,
            });
        }

        info!(uri, "request completed");

        match format {
            ResponseFormat::Json => {
                serde_json::from_slice(&bytes).map_err(|source| ScopusError::ApiJson {
                    endpoint: uri.to_string(),
                    source,
                })
            }
            ResponseFormat::Xml => Ok(Value::String(
                String::from_utf8_lossy(&bytes).into_owned(),
            )),
        }
    }
}

pub struct ApiClientBuilder {
    api_key: String,
    inst_token: Option<String>,
    base: Option<String>,
    local_dir: Option<PathBuf>,
}

impl ApiClientBuilder {
    /// Institutional token sent alongside the API key for subscriber access.
    pub fn inst_token(mut self, token: impl Into<String>) -> Self {
        self.inst_token = Some(token.into());
        self
    }

    /// Overrides the API host, e.g. for a mirror or a mock server.
    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn local_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> Result<ApiClient, ScopusError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            API_KEY_HEADER,
            HeaderValue::from_str(self.api_key.trim()).map_err(|_| {
                ScopusError::InvalidArgument("API key contains invalid header characters".into())
            })?,
        );
        if let Some(token) = self.inst_token.as_deref() {
            default_headers.insert(
                INST_TOKEN_HEADER,
                HeaderValue::from_str(token.trim()).map_err(|_| {
                    ScopusError::InvalidArgument(
                        "institutional token contains invalid header characters".into(),
                    )
                })?,
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("scopus-client/", env!("CARGO_PKG_VERSION")))
            .default_headers(default_headers)
            .build()
            .map_err(ScopusError::HttpClientInit)?;

        Ok(ApiClient {
            client,
            base: match self.base {
                Some(base) => Cow::Owned(base.trim_end_matches('/').to_string()),
                None => api_base(),
            },
            local_dir: self.local_dir.unwrap_or_else(default_local_dir),
        })
    }
}

/// Buffers the response body, refusing bodies longer than [`MAX_BODY_BYTES`].
/// `None` signals an over-long body; the caller decides how to report it.
async fn drain_capped(mut resp: reqwest::Response) -> Result<Option<Vec<u8>>, reqwest::Error> {
    let hint = resp
        .content_length()
        .map_or(0, |n| n.min(MAX_BODY_BYTES as u64) as usize);
    let mut body = Vec::with_capacity(hint);

    while let Some(chunk) = resp.chunk().await? {
        if chunk.len() > MAX_BODY_BYTES - body.len() {
            return Ok(None);
        }
        body.extend_from_slice(&chunk);
    }
    Ok(Some(body))
}

/// Flattens an error body to a single whitespace-normalized line, keeping at
/// most [`ERROR_EXCERPT_MAX_CHARS`] characters.
fn one_line_excerpt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let mut flat = String::new();
    for word in text.split_whitespace() {
        if !flat.is_empty() {
            flat.push(' ');
        }
        flat.push_str(word);
        if flat.chars().count() > ERROR_EXCERPT_MAX_CHARS {
            break;
        }
    }

    if flat.chars().count() > ERROR_EXCERPT_MAX_CHARS {
        flat = flat.chars().take(ERROR_EXCERPT_MAX_CHARS).collect();
        flat.push_str("...");
    }
    flat
}
