use std::path::PathBuf;

/// Errors surfaced to callers of the request layer.
///
/// Configuration faults (missing URI, unregistered encoder) are raised
/// synchronously at dispatch time; transport failures are wrapped
/// transparently.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("no encoder registered for content type '{0}'")]
    NoEncoder(String),

    #[error("missing required property: {0}")]
    MissingProperty(&'static str),

    #[error("invalid uri: {0}")]
    InvalidUri(String),

    #[error("failed to encode request body: {0}")]
    Encode(String),

    #[error("failed to parse response body: {0}")]
    Parse(String),

    #[error("request failed with status {0}")]
    Status(u16),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    CookieStore(#[from] CookieStoreError),
}

/// Errors raised while constructing or loading a persistent cookie store.
///
/// A directory conflict is a configuration error and fails construction;
/// per-file load/write problems are recovered locally and never reach the
/// request layer.
#[derive(Debug, thiserror::Error)]
pub enum CookieStoreError {
    #[error("cookie directory already claimed by this process: {0}")]
    DirectoryClaimed(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
