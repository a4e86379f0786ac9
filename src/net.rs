//! Network layer: response model and the reqwest transport adapter.

mod response;
mod transport;

pub use response::Response;
pub use transport::exchange;
