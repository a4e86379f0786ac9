//! Layered configuration: nodes, settings and the chain resolver.

mod layer;
pub mod resolver;
mod settings;

pub use layer::{root_config, BasicConfig, ConfigHandle, ConfigLayer, SharedConfig};
pub use settings::{
    AuthConfig, AuthScheme, Body, ContextValue, EncoderFn, ExceptionHandlerFn, ParserFn,
    RequestSettings, ResponseHandlerFn, ResponseSettings,
};
