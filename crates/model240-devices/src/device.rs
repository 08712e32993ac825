/*!
 * Device boundary for the Model 240 instrument.
 *
 * [`Model240`] is the synchronous, blocking handle to one live instrument. Each
 * method is one interaction with the hardware and may fail at any time. Handles
 * are produced by a [`DeviceFactory`] and owned exclusively by the
 * [`DeviceSession`](crate::session::DeviceSession).
 */
use std::fmt::Debug;

use thiserror::Error;

use model240_core::error::Error as CoreError;

use crate::types::{
    Brightness, Channel, ChannelStatus, CurveDataPoint, CurveHeader, CurveIndex, Identification,
    InputParameter,
};

/// Error type for device operations
#[derive(Error, Debug)]
pub enum DeviceError {
    /// No session has been established
    #[error("Device not connected")]
    NotConnected,

    /// Channel outside 1-8
    #[error("Invalid channel {0}: expected 1-8")]
    InvalidChannel(i64),

    /// Curve point index outside 1-200
    #[error("Invalid curve data point index {0}: expected 1-200")]
    InvalidIndex(i64),

    /// Brightness outside 0-100
    #[error("Invalid brightness {0}: expected 0-100")]
    InvalidBrightness(i64),

    /// Opening the instrument failed
    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    /// A device call failed or returned data that could not be parsed
    #[error("Communication error: {0}")]
    CommunicationError(String),

    /// A write was rejected or failed partway
    #[error("Update failed: {0}")]
    UpdateFailed(String),

    /// The instrument has no way to do this
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// The interaction did not finish in time
    #[error("Timeout error: {0}")]
    Timeout(String),
}

/// Result type for device operations
pub type Result<T> = std::result::Result<T, DeviceError>;

impl DeviceError {
    /// Create a new connection failure
    pub fn connection<S: AsRef<str>>(msg: S) -> Self {
        DeviceError::ConnectionFailure(msg.as_ref().to_string())
    }

    /// Create a new communication error
    pub fn communication<S: AsRef<str>>(msg: S) -> Self {
        DeviceError::CommunicationError(msg.as_ref().to_string())
    }

    /// Create a new update failure
    pub fn update_failed<S: AsRef<str>>(msg: S) -> Self {
        DeviceError::UpdateFailed(msg.as_ref().to_string())
    }

    /// Create a new not-implemented error
    pub fn not_implemented<S: AsRef<str>>(msg: S) -> Self {
        DeviceError::NotImplemented(msg.as_ref().to_string())
    }

    /// Create a new timeout error
    pub fn timeout<S: AsRef<str>>(msg: S) -> Self {
        DeviceError::Timeout(msg.as_ref().to_string())
    }

    /// Caller input was rejected before touching the device
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DeviceError::InvalidChannel(_)
                | DeviceError::InvalidIndex(_)
                | DeviceError::InvalidBrightness(_)
        )
    }

    /// Turn a failed write into [`DeviceError::UpdateFailed`], leaving
    /// session-level and timeout errors untouched
    pub fn into_update_failure(self) -> Self {
        match self {
            DeviceError::CommunicationError(msg) => DeviceError::UpdateFailed(msg),
            other => other,
        }
    }
}

impl From<CoreError> for DeviceError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Timeout(msg) => DeviceError::Timeout(msg),
            other => DeviceError::CommunicationError(other.to_string()),
        }
    }
}

impl From<std::io::Error> for DeviceError {
    fn from(err: std::io::Error) -> Self {
        DeviceError::CommunicationError(err.to_string())
    }
}

/// A live connection to one instrument
///
/// Every method performs one blocking exchange with the hardware. Callers must
/// never use a handle from two threads at once; the session enforces this.
pub trait Model240: Send + Debug {
    /// Manufacturer, model, serial number and firmware version
    fn identification(&mut self) -> Result<Identification>;

    /// Atomic input configuration of a channel
    fn input_parameter(&mut self, channel: Channel) -> Result<InputParameter>;

    /// Write the atomic input configuration of a channel
    fn set_input_parameter(&mut self, channel: Channel, parameter: &InputParameter) -> Result<()>;

    /// Sensor name of a channel
    fn sensor_name(&mut self, channel: Channel) -> Result<String>;

    /// Set the sensor name of a channel
    fn set_sensor_name(&mut self, channel: Channel, name: &str) -> Result<()>;

    /// Filter setting of a channel
    fn filter(&mut self, channel: Channel) -> Result<String>;

    /// Set the filter of a channel
    fn set_filter(&mut self, channel: Channel, filter: &str) -> Result<()>;

    /// Reading in degrees Celsius
    fn celsius_reading(&mut self, channel: Channel) -> Result<f64>;

    /// Reading in degrees Fahrenheit
    fn fahrenheit_reading(&mut self, channel: Channel) -> Result<f64>;

    /// Reading in kelvin
    fn kelvin_reading(&mut self, channel: Channel) -> Result<f64>;

    /// Raw sensor reading
    fn sensor_reading(&mut self, channel: Channel) -> Result<f64>;

    /// Reading status flags
    fn channel_status(&mut self, channel: Channel) -> Result<ChannelStatus>;

    /// Calibration curve header
    fn curve_header(&mut self, channel: Channel) -> Result<CurveHeader>;

    /// Write the calibration curve header
    fn set_curve_header(&mut self, channel: Channel, header: &CurveHeader) -> Result<()>;

    /// One calibration curve point
    fn curve_data_point(&mut self, channel: Channel, index: CurveIndex) -> Result<CurveDataPoint>;

    /// Write one calibration curve point
    fn set_curve_data_point(
        &mut self,
        channel: Channel,
        index: CurveIndex,
        point: CurveDataPoint,
    ) -> Result<()>;

    /// Module name shown on the front panel
    fn module_name(&mut self) -> Result<String>;

    /// Set the module name
    fn set_module_name(&mut self, name: &str) -> Result<()>;

    /// Display brightness, already mapped from the instrument's level
    fn brightness(&mut self) -> Result<Brightness>;

    /// Set the display brightness
    fn set_brightness(&mut self, brightness: Brightness) -> Result<()>;

    /// Release the underlying hardware resource
    fn disconnect(&mut self) -> Result<()>;
}

/// Opens new instrument connections
pub trait DeviceFactory: Send + Sync + Debug {
    /// Open a connection; blocks until the instrument answers or fails
    fn open(&self) -> Result<Box<dyn Model240>>;

    /// Short description for logs, such as the serial port path
    fn describe(&self) -> String;
}
