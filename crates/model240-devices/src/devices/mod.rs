/*!
 * Instrument implementations for the Model 240.
 *
 * This module contains the in-memory mock and, with the `serial` feature, the
 * driver for real hardware.
 */

// Export device implementations
pub mod mock;

#[cfg(feature = "serial")]
pub mod serial;

// Re-export specific device implementations for convenience
pub use mock::{MockFactory, MockModel240};

#[cfg(feature = "serial")]
pub use serial::{SerialFactory, SerialModel240, Transport};
