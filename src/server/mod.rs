pub mod config;
mod error;
pub mod form;
mod http_layers;
pub mod metrics;
mod routes;
#[allow(clippy::module_inception)]
pub mod server;
pub mod session;
pub mod state;

pub use config::ServerConfig;
pub use error::{expose_error_details, ErrorDetail};
pub use http_layers::*;
pub use server::{make_app, run_server};
