//! Config nodes and the chain they form.
//!
//! Three layers exist at runtime: the process-wide root node (carries the
//! baked-in codecs and default response handlers), a client-level
//! [`SharedConfig`] that many concurrent requests read from, and a
//! per-request [`BasicConfig`] that lives on one thread and is dropped when
//! the request completes. Children shadow ancestors; nothing a child does
//! can mutate an ancestor.
//!
//! Parents are held as `Arc<dyn ConfigLayer>` so several children can share
//! one parent; a parent always outlives the children linked to it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use lazy_static::lazy_static;

use crate::codecs;
use crate::config::settings::{
    normalize_content_type, AuthConfig, AuthScheme, Body, ContextMap, ContextValue, EncoderFn,
    ExceptionHandlerFn, ParserFn, RequestSettings, ResponseHandlerFn, ResponseSettings,
};
use crate::cookies::Cookie;
use crate::errors::HttpError;
use crate::uri::{UriBuilder, DEFAULT_PORT};

/// Shared, type-erased reference to a node in the chain.
pub type ConfigHandle = Arc<dyn ConfigLayer>;

/// One layer of overridable configuration.
///
/// Getters return owned snapshots so the thread-safe implementation can
/// release its lock before the value is used. `handler_for` performs the
/// per-node exact-code/success/failure selection; the resolver walks nodes
/// with it rather than flattening the maps.
pub trait ConfigLayer: Send + Sync {
    fn parent(&self) -> Option<ConfigHandle>;

    fn content_type(&self) -> Option<String>;
    fn charset(&self) -> Option<String>;
    fn body(&self) -> Option<Body>;
    fn auth(&self) -> Option<AuthConfig>;
    fn uri(&self) -> Option<UriBuilder>;

    /// Port from this node's URI builder, or the `-1` sentinel.
    fn port(&self) -> i32;
    /// Query map from this node's URI builder; empty when absent.
    fn query_params(&self) -> HashMap<String, Vec<String>>;

    fn headers(&self) -> HashMap<String, String>;
    fn cookies(&self) -> Vec<Cookie>;

    fn encoder_for(&self, content_type: &str) -> Option<EncoderFn>;
    fn parser_for(&self, content_type: &str) -> Option<ParserFn>;
    fn handler_for(&self, status: u16) -> Option<ResponseHandlerFn>;
    fn exception_handler(&self) -> Option<ExceptionHandlerFn>;

    fn context_value(&self, content_type: &str, key: &str) -> Option<ContextValue>;
}

/// Unsynchronized config node for single-threaded, per-request use.
///
/// Setters take `&mut self` and return `&mut Self` so a request closure can
/// chain calls. The node is discarded when the request completes.
pub struct BasicConfig {
    parent: Option<ConfigHandle>,
    pub(crate) request: RequestSettings,
    pub(crate) response: ResponseSettings,
    context: ContextMap,
}

impl BasicConfig {
    pub fn new(parent: Option<ConfigHandle>) -> Self {
        Self {
            parent,
            request: RequestSettings::default(),
            response: ResponseSettings::default(),
            context: ContextMap::new(),
        }
    }

    pub fn content_type(&mut self, content_type: &str) -> &mut Self {
        self.request.content_type = Some(content_type.to_string());
        self
    }

    pub fn charset(&mut self, charset: &str) -> &mut Self {
        self.request.charset = Some(charset.to_string());
        self
    }

    /// Sets the request URI from a full string; parse errors surface at
    /// dispatch, not here.
    pub fn uri(&mut self, full: &str) -> &mut Self {
        self.request.uri = Some(UriBuilder::from_full(full));
        self
    }

    pub fn uri_builder(&mut self, builder: UriBuilder) -> &mut Self {
        self.request.uri = Some(builder);
        self
    }

    pub fn header(&mut self, name: &str, value: &str) -> &mut Self {
        self.request.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn body(&mut self, body: Body) -> &mut Self {
        self.request.body = Some(body);
        self
    }

    pub fn cookie(&mut self, cookie: Cookie) -> &mut Self {
        self.request.cookies.push(cookie);
        self
    }

    pub fn auth_basic(&mut self, user: &str, password: &str) -> &mut Self {
        self.request.auth = Some(AuthConfig {
            scheme: AuthScheme::Basic,
            user: user.to_string(),
            password: password.to_string(),
        });
        self
    }

    pub fn encoder(&mut self, content_type: &str, encoder: EncoderFn) -> &mut Self {
        self.request
            .encoders
            .insert(normalize_content_type(content_type), encoder);
        self
    }

    pub fn parser(&mut self, content_type: &str, parser: ParserFn) -> &mut Self {
        self.response
            .parsers
            .insert(normalize_content_type(content_type), parser);
        self
    }

    pub fn on_status(&mut self, status: u16, handler: ResponseHandlerFn) -> &mut Self {
        self.response.status_handlers.insert(status, handler);
        self
    }

    pub fn on_success(&mut self, handler: ResponseHandlerFn) -> &mut Self {
        self.response.success = Some(handler);
        self
    }

    pub fn on_failure(&mut self, handler: ResponseHandlerFn) -> &mut Self {
        self.response.failure = Some(handler);
        self
    }

    pub fn on_exception(&mut self, handler: ExceptionHandlerFn) -> &mut Self {
        self.response.exception = Some(handler);
        self
    }

    pub fn context(&mut self, content_type: &str, key: &str, value: ContextValue) -> &mut Self {
        self.context
            .insert((normalize_content_type(content_type), key.to_string()), value);
        self
    }
}

impl ConfigLayer for BasicConfig {
    fn parent(&self) -> Option<ConfigHandle> {
        self.parent.clone()
    }

    fn content_type(&self) -> Option<String> {
        self.request.content_type.clone()
    }

    fn charset(&self) -> Option<String> {
        self.request.charset.clone()
    }

    fn body(&self) -> Option<Body> {
        self.request.body.clone()
    }

    fn auth(&self) -> Option<AuthConfig> {
        self.request.auth.clone()
    }

    fn uri(&self) -> Option<UriBuilder> {
        self.request.uri.clone()
    }

    fn port(&self) -> i32 {
        self.request
            .uri
            .as_ref()
            .map_or(DEFAULT_PORT, UriBuilder::port_value)
    }

    fn query_params(&self) -> HashMap<String, Vec<String>> {
        self.request
            .uri
            .as_ref()
            .map(|u| u.query_map().clone())
            .unwrap_or_default()
    }

    fn headers(&self) -> HashMap<String, String> {
        self.request.headers.clone()
    }

    fn cookies(&self) -> Vec<Cookie> {
        self.request.cookies.clone()
    }

    fn encoder_for(&self, content_type: &str) -> Option<EncoderFn> {
        self.request
            .encoders
            .get(&normalize_content_type(content_type))
            .cloned()
    }

    fn parser_for(&self, content_type: &str) -> Option<ParserFn> {
        self.response
            .parsers
            .get(&normalize_content_type(content_type))
            .cloned()
    }

    fn handler_for(&self, status: u16) -> Option<ResponseHandlerFn> {
        self.response.handler_for(status)
    }

    fn exception_handler(&self) -> Option<ExceptionHandlerFn> {
        self.response.exception.clone()
    }

    fn context_value(&self, content_type: &str, key: &str) -> Option<ContextValue> {
        self.context
            .get(&(normalize_content_type(content_type), key.to_string()))
            .cloned()
    }
}

#[derive(Default)]
struct SharedState {
    request: RequestSettings,
    response: ResponseSettings,
    context: ContextMap,
}

/// Thread-safe config node shared by concurrent requests.
///
/// Used for the client-level layer (and the process root). Setters take
/// `&self` and synchronize internally, so the node can sit behind an `Arc`
/// while requests on other threads read from it.
pub struct SharedConfig {
    parent: Option<ConfigHandle>,
    inner: RwLock<SharedState>,
}

impl SharedConfig {
    pub fn new(parent: Option<ConfigHandle>) -> Self {
        Self {
            parent,
            inner: RwLock::new(SharedState::default()),
        }
    }

    pub fn set_content_type(&self, content_type: &str) -> &Self {
        self.inner.write().unwrap().request.content_type = Some(content_type.to_string());
        self
    }

    pub fn set_charset(&self, charset: &str) -> &Self {
        self.inner.write().unwrap().request.charset = Some(charset.to_string());
        self
    }

    pub fn set_uri(&self, full: &str) -> &Self {
        self.inner.write().unwrap().request.uri = Some(UriBuilder::from_full(full));
        self
    }

    pub fn set_uri_builder(&self, builder: UriBuilder) -> &Self {
        self.inner.write().unwrap().request.uri = Some(builder);
        self
    }

    pub fn set_body(&self, body: Body) -> &Self {
        self.inner.write().unwrap().request.body = Some(body);
        self
    }

    pub fn set_header(&self, name: &str, value: &str) -> &Self {
        self.inner
            .write()
            .unwrap()
            .request
            .headers
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn add_cookie(&self, cookie: Cookie) -> &Self {
        self.inner.write().unwrap().request.cookies.push(cookie);
        self
    }

    pub fn set_auth_basic(&self, user: &str, password: &str) -> &Self {
        self.inner.write().unwrap().request.auth = Some(AuthConfig {
            scheme: AuthScheme::Basic,
            user: user.to_string(),
            password: password.to_string(),
        });
        self
    }

    pub fn register_encoder(&self, content_type: &str, encoder: EncoderFn) -> &Self {
        self.inner
            .write()
            .unwrap()
            .request
            .encoders
            .insert(normalize_content_type(content_type), encoder);
        self
    }

    pub fn register_parser(&self, content_type: &str, parser: ParserFn) -> &Self {
        self.inner
            .write()
            .unwrap()
            .response
            .parsers
            .insert(normalize_content_type(content_type), parser);
        self
    }

    pub fn set_status_handler(&self, status: u16, handler: ResponseHandlerFn) -> &Self {
        self.inner
            .write()
            .unwrap()
            .response
            .status_handlers
            .insert(status, handler);
        self
    }

    pub fn set_success_handler(&self, handler: ResponseHandlerFn) -> &Self {
        self.inner.write().unwrap().response.success = Some(handler);
        self
    }

    pub fn set_failure_handler(&self, handler: ResponseHandlerFn) -> &Self {
        self.inner.write().unwrap().response.failure = Some(handler);
        self
    }

    pub fn set_exception_handler(&self, handler: ExceptionHandlerFn) -> &Self {
        self.inner.write().unwrap().response.exception = Some(handler);
        self
    }

    pub fn put_context(&self, content_type: &str, key: &str, value: ContextValue) -> &Self {
        self.inner
            .write()
            .unwrap()
            .context
            .insert((normalize_content_type(content_type), key.to_string()), value);
        self
    }
}

impl ConfigLayer for SharedConfig {
    fn parent(&self) -> Option<ConfigHandle> {
        self.parent.clone()
    }

    fn content_type(&self) -> Option<String> {
        self.inner.read().unwrap().request.content_type.clone()
    }

    fn charset(&self) -> Option<String> {
        self.inner.read().unwrap().request.charset.clone()
    }

    fn body(&self) -> Option<Body> {
        self.inner.read().unwrap().request.body.clone()
    }

    fn auth(&self) -> Option<AuthConfig> {
        self.inner.read().unwrap().request.auth.clone()
    }

    fn uri(&self) -> Option<UriBuilder> {
        self.inner.read().unwrap().request.uri.clone()
    }

    fn port(&self) -> i32 {
        self.inner
            .read()
            .unwrap()
            .request
            .uri
            .as_ref()
            .map_or(DEFAULT_PORT, UriBuilder::port_value)
    }

    fn query_params(&self) -> HashMap<String, Vec<String>> {
        self.inner
            .read()
            .unwrap()
            .request
            .uri
            .as_ref()
            .map(|u| u.query_map().clone())
            .unwrap_or_default()
    }

    fn headers(&self) -> HashMap<String, String> {
        self.inner.read().unwrap().request.headers.clone()
    }

    fn cookies(&self) -> Vec<Cookie> {
        self.inner.read().unwrap().request.cookies.clone()
    }

    fn encoder_for(&self, content_type: &str) -> Option<EncoderFn> {
        self.inner
            .read()
            .unwrap()
            .request
            .encoders
            .get(&normalize_content_type(content_type))
            .cloned()
    }

    fn parser_for(&self, content_type: &str) -> Option<ParserFn> {
        self.inner
            .read()
            .unwrap()
            .response
            .parsers
            .get(&normalize_content_type(content_type))
            .cloned()
    }

    fn handler_for(&self, status: u16) -> Option<ResponseHandlerFn> {
        self.inner.read().unwrap().response.handler_for(status)
    }

    fn exception_handler(&self) -> Option<ExceptionHandlerFn> {
        self.inner.read().unwrap().response.exception.clone()
    }

    fn context_value(&self, content_type: &str, key: &str) -> Option<ContextValue> {
        self.inner
            .read()
            .unwrap()
            .context
            .get(&(normalize_content_type(content_type), key.to_string()))
            .cloned()
    }
}

lazy_static! {
    static ref ROOT_CONFIG: ConfigHandle = {
        let root = SharedConfig::new(None);
        codecs::install_defaults(&root);
        root.set_success_handler(Arc::new(|_response, body| Ok(body)));
        root.set_failure_handler(Arc::new(|response, _body| {
            Err(HttpError::Status(response.status))
        }));
        Arc::new(root)
    };
}

/// Process-wide root node holding the default codecs and handlers.
///
/// Created once and shared by every client; client-level nodes chain to it.
pub fn root_config() -> ConfigHandle {
    ROOT_CONFIG.clone()
}
