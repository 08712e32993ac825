/*!
 * Operation façade for the Model 240.
 *
 * Each operation validates its arguments, then runs exactly one exclusive
 * session interaction, then translates the result. Invalid channels, indices
 * and brightness values are rejected before the session lock is taken, so
 * they never reach the instrument.
 *
 * Writes that fail at the instrument are reported as
 * [`DeviceError::UpdateFailed`]. Input configuration is written in up to three
 * steps (parameters, filter, sensor name) with no rollback: when a later step
 * fails, the earlier ones stay applied.
 */
use std::time::Duration;

use tracing::debug;

use crate::device::{DeviceError, Result};
use crate::session::{ConnectOutcome, DisconnectOutcome, SharedDeviceSession};
use crate::types::{
    Brightness, Channel, ChannelStatus, CurveDataPoint, CurveDataPoints, CurveHeader, CurveIndex,
    Identification, InputConfig, MonitorReading,
};

/// Stateless operations on the session's instrument
#[derive(Debug, Clone)]
pub struct Model240Service {
    session: SharedDeviceSession,
    batch_timeout: Duration,
}

impl Model240Service {
    /// Create a service over `session`; `batch_timeout` bounds full-curve reads
    pub fn new(session: SharedDeviceSession, batch_timeout: Duration) -> Self {
        Self {
            session,
            batch_timeout,
        }
    }

    /// The underlying session
    pub fn session(&self) -> &SharedDeviceSession {
        &self.session
    }

    /// Open the instrument connection (no-op when already connected)
    pub async fn connect(&self) -> Result<ConnectOutcome> {
        self.session.connect().await
    }

    /// Release the instrument connection (always succeeds)
    pub async fn disconnect(&self) -> DisconnectOutcome {
        self.session.disconnect().await
    }

    /// Whether the instrument is connected
    pub async fn is_connected(&self) -> bool {
        self.session.is_connected().await
    }

    /// Manufacturer, model, serial number and firmware version
    pub async fn identification(&self) -> Result<Identification> {
        self.session
            .with_exclusive_access("identification", |device| device.identification())
            .await
    }

    /// Fresh kelvin, sensor, Celsius and Fahrenheit readings of a channel
    pub async fn monitor(&self, channel: i64) -> Result<MonitorReading> {
        let channel = Channel::new(channel)?;
        self.session
            .with_exclusive_access("monitor", move |device| {
                Ok(MonitorReading {
                    kelvin: device.kelvin_reading(channel)?,
                    sensor: device.sensor_reading(channel)?,
                    celsius: device.celsius_reading(channel)?,
                    fahrenheit: device.fahrenheit_reading(channel)?,
                })
            })
            .await
    }

    /// Reading status flags of a channel
    pub async fn channel_status(&self, channel: i64) -> Result<ChannelStatus> {
        let channel = Channel::new(channel)?;
        self.session
            .with_exclusive_access("channel_status", move |device| {
                device.channel_status(channel)
            })
            .await
    }

    /// Raw sensor-unit reading; served by [`Self::monitor`] instead
    pub async fn sensor_units(&self, channel: i64) -> Result<f64> {
        Channel::new(channel)?;
        Err(DeviceError::not_implemented(
            "sensor units are reported by the monitor reading",
        ))
    }

    /// Input parameters, sensor name and filter of a channel
    pub async fn input_config(&self, channel: i64) -> Result<InputConfig> {
        let channel = Channel::new(channel)?;
        self.session
            .with_exclusive_access("input_config", move |device| {
                let parameter = device.input_parameter(channel)?;
                let sensor_name = device.sensor_name(channel)?;
                let filter = device.filter(channel)?;
                Ok(InputConfig::from_parts(parameter, sensor_name, filter))
            })
            .await
    }

    /// Write the input configuration of a channel
    ///
    /// The parameters are always written; the filter and the sensor name only
    /// when given. A failure stops the sequence and leaves earlier writes in
    /// place.
    pub async fn set_input_config(&self, channel: i64, config: InputConfig) -> Result<()> {
        let channel = Channel::new(channel)?;
        self.session
            .with_exclusive_access("set_input_config", move |device| {
                device.set_input_parameter(channel, &config.parameter())?;
                if let Some(filter) = &config.filter {
                    device.set_filter(channel, filter)?;
                }
                if let Some(name) = &config.sensor_name {
                    device.set_sensor_name(channel, name)?;
                }
                Ok(())
            })
            .await
            .map_err(DeviceError::into_update_failure)
    }

    /// Calibration curve header of a channel
    pub async fn curve_header(&self, channel: i64) -> Result<CurveHeader> {
        let channel = Channel::new(channel)?;
        self.session
            .with_exclusive_access("curve_header", move |device| device.curve_header(channel))
            .await
    }

    /// Write the calibration curve header of a channel
    pub async fn set_curve_header(&self, channel: i64, header: CurveHeader) -> Result<()> {
        let channel = Channel::new(channel)?;
        self.session
            .with_exclusive_access("set_curve_header", move |device| {
                device.set_curve_header(channel, &header)
            })
            .await
            .map_err(DeviceError::into_update_failure)
    }

    /// One calibration curve point
    pub async fn curve_data_point(&self, channel: i64, index: i64) -> Result<CurveDataPoint> {
        let channel = Channel::new(channel)?;
        let index = CurveIndex::new(index)?;
        self.session
            .with_exclusive_access("curve_data_point", move |device| {
                device.curve_data_point(channel, index)
            })
            .await
    }

    /// Write one calibration curve point
    pub async fn set_curve_data_point(
        &self,
        channel: i64,
        index: i64,
        point: CurveDataPoint,
    ) -> Result<()> {
        let channel = Channel::new(channel)?;
        let index = CurveIndex::new(index)?;
        self.session
            .with_exclusive_access("set_curve_data_point", move |device| {
                device.set_curve_data_point(channel, index, point)
            })
            .await
            .map_err(DeviceError::into_update_failure)
    }

    /// The whole 200-point curve of a channel
    ///
    /// All points are read under a single lock acquisition, so the result is a
    /// consistent snapshot; other callers wait for the full read.
    pub async fn curve_data_points(&self, channel: i64) -> Result<CurveDataPoints> {
        let channel = Channel::new(channel)?;
        self.session
            .with_exclusive_access_timeout("curve_data_points", self.batch_timeout, move |device| {
                let points = CurveIndex::all()
                    .map(|index| device.curve_data_point(channel, index))
                    .collect::<Result<Vec<_>>>()?;
                debug!("Read {} curve points from channel {}", points.len(), channel);
                Ok(CurveDataPoints::from_points(channel, &points))
            })
            .await
    }

    /// Erase the calibration curve of a channel
    pub async fn delete_curve(&self, channel: i64) -> Result<()> {
        Channel::new(channel)?;
        Err(DeviceError::not_implemented(
            "the instrument cannot delete curves",
        ))
    }

    /// Restore factory defaults
    pub async fn factory_reset(&self) -> Result<()> {
        Err(DeviceError::not_implemented(
            "the instrument cannot be reset remotely",
        ))
    }

    /// Module name shown on the front panel
    pub async fn module_name(&self) -> Result<String> {
        self.session
            .with_exclusive_access("module_name", |device| device.module_name())
            .await
    }

    /// Set the module name
    pub async fn set_module_name(&self, name: String) -> Result<()> {
        self.session
            .with_exclusive_access("set_module_name", move |device| {
                device.set_module_name(&name)
            })
            .await
            .map_err(DeviceError::into_update_failure)
    }

    /// Display brightness in percent, always a multiple of 25
    pub async fn brightness(&self) -> Result<u8> {
        self.session
            .with_exclusive_access("brightness", |device| device.brightness())
            .await
            .map(Brightness::percent)
    }

    /// Set the display brightness; stored as the nearest multiple of 25
    pub async fn set_brightness(&self, percent: i64) -> Result<()> {
        let brightness = Brightness::new(percent)?;
        self.session
            .with_exclusive_access("set_brightness", move |device| {
                device.set_brightness(brightness)
            })
            .await
            .map_err(DeviceError::into_update_failure)
    }
}
