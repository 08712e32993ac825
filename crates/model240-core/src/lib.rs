/*!
 * Model240 Core
 *
 * This crate provides the ambient pieces shared by the gateway crates:
 * configuration, logging, the core error type, and async helpers for driving
 * blocking instrument I/O.
 */

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod utils;

/// Model240 core crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library initialization from a loaded configuration
pub fn init_with_config(config: &config::Config) -> Result<(), error::Error> {
    logging::init_with_config(&config.logging)?;
    tracing::info!("Model240 Core {} initialized", VERSION);
    Ok(())
}
