/*!
 * Model 240 Server
 *
 * This crate exposes the Model 240 gateway over HTTP: JSON schemas, routes,
 * extractors, error to response mapping and the shared application state.
 */

#![warn(missing_docs)]

pub mod error;
pub mod extract;
pub mod routes;
pub mod schemas;

use model240_devices::Model240Service;

pub use error::{ApiError, ApiResult};
pub use routes::router;

/// Model 240 server crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// State shared by every request handler
#[derive(Debug, Clone)]
pub struct AppState {
    /// Operations on the instrument
    pub service: Model240Service,
}

impl AppState {
    /// Create a new AppState
    pub fn new(service: Model240Service) -> Self {
        Self { service }
    }
}
