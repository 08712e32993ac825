/*!
 * Model 240 Devices
 *
 * This crate provides the instrument boundary, the device session and the
 * operation façade for the Model 240 gateway.
 */

#![warn(missing_docs)]

pub mod device;
pub mod devices;
pub mod service;
pub mod session;
pub mod types;
pub mod wire;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use model240_core::config::DeviceConfig;

// Re-export the device boundary and the session for convenience
pub use device::{DeviceError, DeviceFactory, Model240, Result};
pub use service::Model240Service;
pub use session::{
    ConnectOutcome, DeviceSession, DisconnectOutcome, SessionGuard, SharedDeviceSession,
};

/// Model 240 devices crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Pick the instrument implementation the configuration asks for
pub fn factory_from_config(config: &DeviceConfig) -> Result<Arc<dyn DeviceFactory>> {
    if config.use_mock {
        tracing::info!("Using the in-memory mock instrument");
        return Ok(Arc::new(devices::MockFactory::new()));
    }

    #[cfg(feature = "serial")]
    {
        Ok(Arc::new(devices::SerialFactory::new(
            config.port.clone(),
            config.baud_rate,
            config.io_timeout(),
        )))
    }

    #[cfg(not(feature = "serial"))]
    {
        Err(DeviceError::connection(
            "built without the `serial` feature; set device.use_mock",
        ))
    }
}

/// Build a disconnected session and the façade over it from configuration
pub fn service_from_config(config: &DeviceConfig) -> Result<Model240Service> {
    let factory = factory_from_config(config)?;
    let session = Arc::new(DeviceSession::new(factory, config.call_timeout()));
    Ok(Model240Service::new(session, config.batch_timeout()))
}

/// Information about available instrument back ends
pub fn available_backends() -> Vec<&'static str> {
    let mut backends = vec!["mock"];

    #[cfg(feature = "serial")]
    backends.push("serial");

    backends
}
