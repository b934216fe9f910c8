#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum ScopusError {
    #[error("HTTP client initialization failed: {0}")]
    HttpClientInit(reqwest::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error from {endpoint}: {message}")]
    Api { endpoint: String, message: String },

    #[error("API JSON error from {endpoint}: {source}")]
    ApiJson {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "not bound to an API client. Bind one with read_with() or bind_client() before retrying."
    )]
    NotBound,

    #[error("no fetched data for '{0}'")]
    MissingData(String),

    #[error("response for {uri} carries no usable '{key}' payload")]
    MissingPayload { uri: String, key: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
