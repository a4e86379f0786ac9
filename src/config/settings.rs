//! Per-node configuration state.
//!
//! A config node holds three groups of overridable state: request settings
//! (what goes on the wire), response settings (how the answer is handled)
//! and a free-form context map. Setters only ever touch the node they are
//! called on; ancestors are never mutated by a child override.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::cookies::Cookie;
use crate::errors::HttpError;
use crate::net::Response;
use crate::uri::UriBuilder;

/// Opaque request body handed to a content-type encoder.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Bytes(Vec<u8>),
    Text(String),
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
}

/// Encodes a body into wire bytes for one content type.
pub type EncoderFn = Arc<dyn Fn(&Body) -> Result<Vec<u8>, HttpError> + Send + Sync>;

/// Parses a buffered response into a body value.
pub type ParserFn = Arc<dyn Fn(&Response) -> Result<Body, HttpError> + Send + Sync>;

/// Handles a response after parsing; selected by status code.
pub type ResponseHandlerFn =
    Arc<dyn Fn(&Response, Body) -> Result<Body, HttpError> + Send + Sync>;

/// Maps a transport-level failure before it reaches the caller.
pub type ExceptionHandlerFn = Arc<dyn Fn(HttpError) -> HttpError + Send + Sync>;

/// Opaque value stored in the per-node context map.
pub type ContextValue = Arc<dyn Any + Send + Sync>;

/// Context map keyed by `(content type, key)`.
pub type ContextMap = HashMap<(String, String), ContextValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Basic,
    Digest,
}

/// Credentials descriptor resolved through the chain like any other property.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub scheme: AuthScheme,
    pub user: String,
    pub password: String,
}

/// Outbound request state for one node.
#[derive(Clone, Default)]
pub struct RequestSettings {
    pub content_type: Option<String>,
    pub charset: Option<String>,
    pub uri: Option<UriBuilder>,
    pub headers: HashMap<String, String>,
    pub body: Option<Body>,
    /// Cookies added explicitly at this node; purely appended across the chain.
    pub cookies: Vec<Cookie>,
    /// Encoders keyed by lowercased content type.
    pub encoders: HashMap<String, EncoderFn>,
    pub auth: Option<AuthConfig>,
}

/// Response-handling state for one node.
#[derive(Clone, Default)]
pub struct ResponseSettings {
    /// Exact status-code handlers; consulted before the threshold handlers.
    pub status_handlers: HashMap<u16, ResponseHandlerFn>,
    /// Handler for codes below 400 when no exact handler matches at this node.
    pub success: Option<ResponseHandlerFn>,
    /// Handler for codes 400 and up when no exact handler matches at this node.
    pub failure: Option<ResponseHandlerFn>,
    pub exception: Option<ExceptionHandlerFn>,
    /// Parsers keyed by lowercased content type.
    pub parsers: HashMap<String, ParserFn>,
}

impl ResponseSettings {
    /// Selects this node's handler for `status`.
    ///
    /// Ordering is exact-code first, then this node's own success/failure
    /// threshold handler. The chain resolver only moves to the parent when
    /// all three come up empty here, so a node's threshold handler shadows
    /// an ancestor's exact-code handler for the same status.
    pub(crate) fn handler_for(&self, status: u16) -> Option<ResponseHandlerFn> {
        if let Some(handler) = self.status_handlers.get(&status) {
            return Some(handler.clone());
        }
        if status < 400 {
            self.success.clone()
        } else {
            self.failure.clone()
        }
    }
}

pub(crate) fn normalize_content_type(content_type: &str) -> String {
    content_type.trim().to_ascii_lowercase()
}
