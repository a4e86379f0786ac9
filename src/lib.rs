//! httpforge: a configurable HTTP client core.
//!
//! Configuration lives in a parent-linked chain of nodes (process root →
//! client → request); every property is resolved by walking the chain until
//! a stop predicate is satisfied. Cookies live in a concurrent dual-keyed
//! store, optionally decorated with asynchronous file persistence.

pub mod client;
pub mod codecs;
pub mod config;
pub mod cookies;
pub mod errors;
pub mod net;
pub mod uri;

pub use client::{ClientBuilder, HttpClient};
pub use config::{root_config, BasicConfig, Body, ConfigHandle, ConfigLayer, SharedConfig};
pub use cookies::{
    Cookie, CookieKey, CookieStore, CookieStoreHandle, FileBackedCookieStore,
    NonBlockingCookieStore,
};
pub use errors::{CookieStoreError, HttpError};
pub use net::Response;
pub use uri::UriBuilder;
