//! The HTTP client and its verb dispatch.
//!
//! A client owns the shared (thread-safe) config node, the cookie store and
//! the reqwest transport. Each request gets a fresh unsynchronized
//! [`BasicConfig`] chained to the client node, configures it in a closure,
//! and is resolved through the chain at dispatch: URI, headers, cookies,
//! encoder, then parser and status handler on the way back.

use std::path::Path;
use std::sync::Arc;

use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, COOKIE};
use http::{HeaderMap, Method};
use tokio::runtime::Handle;
use url::Url;

use crate::codecs;
use crate::config::{
    resolver, root_config, BasicConfig, Body, ConfigHandle, ConfigLayer, SharedConfig,
};
use crate::cookies::{
    Cookie, CookieStoreHandle, FileBackedCookieStore, NonBlockingCookieStore,
};
use crate::errors::HttpError;
use crate::net::{self, Response};

/// Configurable HTTP client with layered configuration and cookie
/// persistence.
pub struct HttpClient {
    config: Arc<SharedConfig>,
    cookie_store: CookieStoreHandle,
    transport: reqwest::Client,
}

/// Builder for [`HttpClient`].
pub struct ClientBuilder {
    config: Arc<SharedConfig>,
    cookie_store: Option<CookieStoreHandle>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            config: Arc::new(SharedConfig::new(Some(root_config()))),
            cookie_store: None,
        }
    }

    /// Applies client-level configuration (the layer between the root and
    /// each request).
    pub fn configure(self, f: impl FnOnce(&SharedConfig)) -> Self {
        f(&self.config);
        self
    }

    /// Uses `store` instead of the default in-memory store.
    pub fn cookie_store(mut self, store: CookieStoreHandle) -> Self {
        self.cookie_store = Some(store);
        self
    }

    /// Persists cookies under `dir`, writing files on `executor`'s blocking
    /// pool. Fails if another live store already claims the directory.
    pub fn cookie_directory(
        mut self,
        dir: impl AsRef<Path>,
        executor: Handle,
    ) -> Result<Self, HttpError> {
        let store = FileBackedCookieStore::new(dir, executor)?;
        self.cookie_store = Some(Arc::new(store));
        Ok(self)
    }

    pub fn build(self) -> Result<HttpClient, HttpError> {
        // reqwest's own cookie handling stays off; the store is ours.
        let transport = reqwest::Client::builder().build()?;
        Ok(HttpClient {
            config: self.config,
            cookie_store: self
                .cookie_store
                .unwrap_or_else(|| Arc::new(NonBlockingCookieStore::new())),
            transport,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Client-level config node, shared by all requests of this client.
    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn cookie_store(&self) -> CookieStoreHandle {
        self.cookie_store.clone()
    }

    /// Fresh request-level node chained to this client's config.
    pub fn request_config(&self) -> BasicConfig {
        let parent: ConfigHandle = self.config.clone();
        BasicConfig::new(Some(parent))
    }

    pub async fn get(&self, f: impl FnOnce(&mut BasicConfig)) -> Result<Body, HttpError> {
        self.request(Method::GET, f).await
    }

    pub async fn head(&self, f: impl FnOnce(&mut BasicConfig)) -> Result<Body, HttpError> {
        self.request(Method::HEAD, f).await
    }

    pub async fn post(&self, f: impl FnOnce(&mut BasicConfig)) -> Result<Body, HttpError> {
        self.request(Method::POST, f).await
    }

    pub async fn put(&self, f: impl FnOnce(&mut BasicConfig)) -> Result<Body, HttpError> {
        self.request(Method::PUT, f).await
    }

    pub async fn patch(&self, f: impl FnOnce(&mut BasicConfig)) -> Result<Body, HttpError> {
        self.request(Method::PATCH, f).await
    }

    pub async fn delete(&self, f: impl FnOnce(&mut BasicConfig)) -> Result<Body, HttpError> {
        self.request(Method::DELETE, f).await
    }

    /// Configures and dispatches one request.
    pub async fn request(
        &self,
        method: Method,
        f: impl FnOnce(&mut BasicConfig),
    ) -> Result<Body, HttpError> {
        let mut cfg = self.request_config();
        f(&mut cfg);
        self.execute(method, &cfg).await
    }

    async fn execute(&self, method: Method, cfg: &BasicConfig) -> Result<Body, HttpError> {
        let url = resolve_url(cfg)?;
        let content_type = resolver::content_type(cfg);
        let headers = self.assemble_headers(cfg, &url, content_type.as_deref());
        let body = self.encode_body(cfg, content_type.as_deref())?;
        let auth = resolver::auth(cfg);

        let response =
            match net::exchange(&self.transport, method, url, headers, body, auth).await {
                Ok(response) => response,
                Err(err) => {
                    let err = match resolver::exception_handler(cfg) {
                        Some(handler) => handler(err),
                        None => err,
                    };
                    return Err(err);
                }
            };

        self.store_response_cookies(&response);

        let parsed = self.parse_body(cfg, &response)?;
        match resolver::status_handler(cfg, response.status) {
            Some(handler) => handler(&response, parsed),
            // The root installs success/failure defaults, so this only
            // triggers for chains built without the root node.
            None if response.is_success() => Ok(parsed),
            None => Err(HttpError::Status(response.status)),
        }
    }

    fn assemble_headers(
        &self,
        cfg: &BasicConfig,
        url: &Url,
        content_type: Option<&str>,
    ) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in resolver::merged_headers(cfg) {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => log::warn!("skipping invalid header '{name}'"),
            }
        }

        if let Some(ct) = content_type {
            let full = match resolver::charset(cfg) {
                Some(charset) => format!("{ct}; charset={charset}"),
                None => ct.to_string(),
            };
            if let Ok(value) = HeaderValue::from_str(&full) {
                headers.insert(CONTENT_TYPE, value);
            }
        }

        let cookie_header = self.cookie_header(cfg, url);
        if let Some(value) = cookie_header.and_then(|v| HeaderValue::from_str(&v).ok()) {
            headers.insert(COOKIE, value);
        }

        headers
    }

    /// Builds the `Cookie` header from the config chain and the store.
    fn cookie_header(&self, cfg: &BasicConfig, url: &Url) -> Option<String> {
        let mut pairs: Vec<String> = Vec::new();
        for cookie in resolver::collected_cookies(cfg) {
            pairs.push(format!("{}={}", cookie.name, cookie.value));
        }
        for cookie in self.cookie_store.get(url) {
            let pair = format!("{}={}", cookie.name, cookie.value);
            if !pairs.contains(&pair) {
                pairs.push(pair);
            }
        }
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    fn encode_body(
        &self,
        cfg: &BasicConfig,
        content_type: Option<&str>,
    ) -> Result<Option<Vec<u8>>, HttpError> {
        let body = match resolver::body(cfg) {
            Some(body) => body,
            None => return Ok(None),
        };
        let ct = content_type.ok_or(HttpError::MissingProperty("content-type"))?;
        let encoder =
            resolver::encoder(cfg, ct).ok_or_else(|| HttpError::NoEncoder(ct.to_string()))?;
        encoder(&body).map(Some)
    }

    fn parse_body(&self, cfg: &BasicConfig, response: &Response) -> Result<Body, HttpError> {
        let ct = response
            .content_type()
            .unwrap_or_else(|| codecs::OCTET_STREAM.to_string());
        let parser = resolver::parser(cfg, &ct).unwrap_or_else(codecs::fallback_parser);
        parser(response)
    }

    fn store_response_cookies(&self, response: &Response) {
        for header in response.set_cookie_headers() {
            if let Some(cookie) = Cookie::parse_set_cookie(&header) {
                self.cookie_store.add(Some(&response.url), cookie);
            } else {
                log::debug!("ignoring unparseable Set-Cookie header");
            }
        }
    }
}

fn resolve_url(cfg: &dyn ConfigLayer) -> Result<Url, HttpError> {
    let builder = resolver::uri(cfg).ok_or(HttpError::MissingProperty("uri"))?;
    let port = resolver::port(cfg);
    let query = resolver::query_params(cfg);
    builder.build_with(port, &query)
}
