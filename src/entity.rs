//! Shared retrieval and persistence mechanics for single remote entities.
//!
//! Every entity kind (document, author profile, affiliation profile) is
//! addressed by a URI and nests its representation under a kind-specific key
//! in the response envelope. [`Entity`] keeps the fetch/cache/persist logic
//! in provided methods; implementors supply the payload key and their state.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::client::{ApiClient, ResponseFormat};
use crate::error::ScopusError;
use crate::store::{DataStore, DirStore, uri_file_name};

/// Per-instance state shared by all entity kinds.
///
/// The bound [`ApiClient`] is a clone of the caller's handle; dropping the
/// entity never tears down the client.
#[derive(Debug, Clone, Default)]
pub struct EntityState {
    uri: String,
    response_format: ResponseFormat,
    client: Option<ApiClient>,
    data: Option<Value>,
}

impl EntityState {
    pub fn new(uri: impl Into<String>, response_format: ResponseFormat) -> Self {
        Self {
            uri: uri.into(),
            response_format,
            client: None,
            data: None,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Repoints the entity at a different remote resource. Cached data is
    /// kept until the next successful `read` overwrites it.
    pub fn set_uri(&mut self, uri: impl Into<String>) {
        self.uri = uri.into();
    }

    pub fn response_format(&self) -> ResponseFormat {
        self.response_format
    }

    pub fn set_response_format(&mut self, format: ResponseFormat) {
        self.response_format = format;
    }

    pub fn client(&self) -> Option<&ApiClient> {
        self.client.as_ref()
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub(crate) fn bind(&mut self, client: ApiClient) {
        self.client = Some(client);
    }

    pub(crate) fn set_data(&mut self, data: Value) {
        self.data = Some(data);
    }
}

fn unwrap_payload(mut response: Value, key: &str) -> Option<Value> {
    let raw = response.get_mut(key)?.take();
    match raw {
        Value::Array(mut items) => {
            if items.is_empty() {
                None
            } else {
                Some(items.swap_remove(0))
            }
        }
        other => Some(other),
    }
}

/// A single remote object addressable by URI.
///
/// Implementors supply [`payload_key`](Entity::payload_key), the envelope
/// field their representation is nested under, plus access to their
/// [`EntityState`]; retrieval and persistence come as provided methods.
#[async_trait]
pub trait Entity: Send + Sync {
    /// Envelope field the entity's representation is nested under.
    fn payload_key(&self) -> &'static str;

    fn state(&self) -> &EntityState;

    fn state_mut(&mut self) -> &mut EntityState;

    fn uri(&self) -> &str {
        self.state().uri()
    }

    /// Raw payload cached by the last successful [`read`](Entity::read).
    fn data(&self) -> Option<&Value> {
        self.state().data()
    }

    /// Binds `client` for subsequent reads and writes, replacing any
    /// previously bound client.
    fn bind_client(&mut self, client: &ApiClient) {
        self.state_mut().bind(client.clone());
    }

    /// The entity's `dc:identifier`, e.g. `SCOPUS_ID:85040798649`.
    ///
    /// Only available after a successful [`read`](Entity::read).
    fn id(&self) -> Result<&str, ScopusError> {
        let state = self.state();
        let data = state
            .data()
            .ok_or_else(|| ScopusError::MissingData(state.uri().to_string()))?;
        data.pointer("/coredata/dc:identifier")
            .and_then(Value::as_str)
            .ok_or_else(|| ScopusError::MissingPayload {
                uri: state.uri().to_string(),
                key: "coredata/dc:identifier".to_string(),
            })
    }

    /// The numbers-only part of [`id`](Entity::id): everything after the
    /// first `:`, or the whole identifier when no separator is present.
    fn numeric_id(&self) -> Result<&str, ScopusError> {
        let id = self.id()?;
        let start = id.find(':').map(|i| i + 1).unwrap_or(0);
        Ok(&id[start..])
    }

    /// Fetches the latest representation from the bound client and caches it,
    /// overwriting any previously cached payload.
    ///
    /// When the envelope value under the payload key is a sequence, its first
    /// element is taken; a missing key or an empty sequence is
    /// [`ScopusError::MissingPayload`]. Fails with [`ScopusError::NotBound`]
    /// (cached data untouched) when no client is bound.
    async fn read(&mut self) -> Result<(), ScopusError> {
        let key = self.payload_key();
        let (client, uri, format) = {
            let state = self.state();
            let client = state.client().cloned().ok_or(ScopusError::NotBound)?;
            (client, state.uri().to_string(), state.response_format())
        };

        let response = client.exec_request(&uri, format).await?;
        let payload = unwrap_payload(response, key).ok_or_else(|| ScopusError::MissingPayload {
            uri: uri.clone(),
            key: key.to_string(),
        })?;

        self.state_mut().set_data(payload);
        info!(uri = %uri, "entity data loaded");
        Ok(())
    }

    /// Binds `client`, then [`read`](Entity::read)s.
    async fn read_with(&mut self, client: &ApiClient) -> Result<(), ScopusError> {
        self.bind_client(client);
        self.read().await
    }

    /// Persists the cached payload into `store` under the percent-encoded
    /// URI. Fails with [`ScopusError::MissingData`] when nothing has been
    /// fetched yet.
    fn write_to(&self, store: &dyn DataStore) -> Result<std::path::PathBuf, ScopusError> {
        let state = self.state();
        let Some(data) = state.data() else {
            warn!(uri = state.uri(), "no fetched data to write");
            return Err(ScopusError::MissingData(state.uri().to_string()));
        };
        store.put(&uri_file_name(state.uri()), data)
    }

    /// Persists the cached payload under the bound client's local directory.
    fn write(&self) -> Result<std::path::PathBuf, ScopusError> {
        let dir = self
            .state()
            .client()
            .ok_or(ScopusError::NotBound)?
            .local_dir()
            .to_path_buf();
        self.write_to(&DirStore::new(dir))
    }
}
