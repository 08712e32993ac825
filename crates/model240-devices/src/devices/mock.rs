/*!
 * In-memory Model 240.
 *
 * Behaves like a freshly reset instrument and keeps every write in memory, so
 * the gateway can run end to end without hardware. Curve points are stored in
 * the instrument's `sensor,temperature` text encoding and go through the same
 * parser as the serial driver.
 */
use tracing::debug;

use crate::device::{DeviceError, DeviceFactory, Model240, Result};
use crate::types::{
    Brightness, Channel, ChannelStatus, Coefficient, CurveDataPoint, CurveFormat, CurveHeader,
    CurveIndex, Identification, InputParameter, SensorType, TemperatureUnit, CHANNEL_COUNT,
    CURVE_POINT_COUNT,
};
use crate::wire::{format_curve_point, parse_curve_point};

/// Readings reported by every mock channel
#[derive(Debug, Clone, Copy, PartialEq)]
struct MockReadings {
    celsius: f64,
    fahrenheit: f64,
    kelvin: f64,
    sensor: f64,
}

impl Default for MockReadings {
    fn default() -> Self {
        Self {
            celsius: 25.0,
            fahrenheit: 77.0,
            kelvin: 298.15,
            sensor: 100.0,
        }
    }
}

#[derive(Debug, Clone)]
struct MockChannel {
    sensor_name: String,
    filter: String,
    parameter: InputParameter,
    readings: MockReadings,
    status_bits: u8,
    curve_header: CurveHeader,
    curve_points: Vec<String>,
}

impl MockChannel {
    fn new(number: u8) -> Self {
        Self {
            sensor_name: format!("Sensor {}", number),
            filter: "No filter".to_string(),
            parameter: InputParameter {
                sensor_type: SensorType::NtcRtd,
                temperature_unit: TemperatureUnit::Kelvin,
                auto_range_enable: true,
                current_reversal_enable: false,
                input_enable: true,
                input_range: 1,
            },
            readings: MockReadings::default(),
            status_bits: 0,
            curve_header: CurveHeader {
                curve_name: format!("Curve {}", number),
                serial_number: format!("SN{}", number),
                curve_data_format: CurveFormat::VoltsPerKelvin,
                temperature_limit: 400.0,
                coefficient: Coefficient::Negative,
            },
            curve_points: (1..=CURVE_POINT_COUNT)
                .map(|j| {
                    format_curve_point(&CurveDataPoint {
                        sensor: f64::from(j) * 0.1,
                        temperature: f64::from(j),
                    })
                })
                .collect(),
        }
    }
}

/// An instrument that lives in memory
#[derive(Debug, Clone)]
pub struct MockModel240 {
    connected: bool,
    identification: Identification,
    module_name: String,
    brightness_level: u8,
    channels: Vec<MockChannel>,
}

impl Default for MockModel240 {
    fn default() -> Self {
        Self::new()
    }
}

impl MockModel240 {
    /// A connected mock with factory defaults
    pub fn new() -> Self {
        Self {
            connected: true,
            identification: Identification {
                manufacturer: "Mock Lakeshore".to_string(),
                model: "Model240".to_string(),
                serial_number: "12345".to_string(),
                firmware_version: "1.0".to_string(),
            },
            module_name: "Mock Model240".to_string(),
            brightness_level: 2,
            channels: (1..=CHANNEL_COUNT).map(MockChannel::new).collect(),
        }
    }

    /// Whether [`Model240::disconnect`] has been called
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Change the status register a channel reports
    pub fn set_status_bits(&mut self, channel: Channel, bits: u8) {
        self.channels[channel.slot()].status_bits = bits;
    }

    /// Store a curve point exactly as given, bypassing encoding
    pub fn set_raw_curve_point(&mut self, channel: Channel, index: CurveIndex, raw: &str) {
        self.channels[channel.slot()].curve_points[index.slot()] = raw.to_string();
    }

    fn channel(&mut self, channel: Channel) -> Result<&mut MockChannel> {
        if !self.connected {
            return Err(DeviceError::communication("mock instrument is disconnected"));
        }
        Ok(&mut self.channels[channel.slot()])
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(DeviceError::communication("mock instrument is disconnected"))
        }
    }
}

impl Model240 for MockModel240 {
    fn identification(&mut self) -> Result<Identification> {
        self.ensure_connected()?;
        Ok(self.identification.clone())
    }

    fn input_parameter(&mut self, channel: Channel) -> Result<InputParameter> {
        Ok(self.channel(channel)?.parameter.clone())
    }

    fn set_input_parameter(&mut self, channel: Channel, parameter: &InputParameter) -> Result<()> {
        self.channel(channel)?.parameter = parameter.clone();
        Ok(())
    }

    fn sensor_name(&mut self, channel: Channel) -> Result<String> {
        Ok(self.channel(channel)?.sensor_name.clone())
    }

    fn set_sensor_name(&mut self, channel: Channel, name: &str) -> Result<()> {
        self.channel(channel)?.sensor_name = name.to_string();
        Ok(())
    }

    fn filter(&mut self, channel: Channel) -> Result<String> {
        Ok(self.channel(channel)?.filter.clone())
    }

    fn set_filter(&mut self, channel: Channel, filter: &str) -> Result<()> {
        self.channel(channel)?.filter = filter.to_string();
        Ok(())
    }

    fn celsius_reading(&mut self, channel: Channel) -> Result<f64> {
        Ok(self.channel(channel)?.readings.celsius)
    }

    fn fahrenheit_reading(&mut self, channel: Channel) -> Result<f64> {
        Ok(self.channel(channel)?.readings.fahrenheit)
    }

    fn kelvin_reading(&mut self, channel: Channel) -> Result<f64> {
        Ok(self.channel(channel)?.readings.kelvin)
    }

    fn sensor_reading(&mut self, channel: Channel) -> Result<f64> {
        Ok(self.channel(channel)?.readings.sensor)
    }

    fn channel_status(&mut self, channel: Channel) -> Result<ChannelStatus> {
        Ok(ChannelStatus::from_bits(self.channel(channel)?.status_bits))
    }

    fn curve_header(&mut self, channel: Channel) -> Result<CurveHeader> {
        Ok(self.channel(channel)?.curve_header.clone())
    }

    fn set_curve_header(&mut self, channel: Channel, header: &CurveHeader) -> Result<()> {
        self.channel(channel)?.curve_header = header.clone();
        Ok(())
    }

    fn curve_data_point(&mut self, channel: Channel, index: CurveIndex) -> Result<CurveDataPoint> {
        let raw = &self.channel(channel)?.curve_points[index.slot()];
        parse_curve_point(raw)
    }

    fn set_curve_data_point(
        &mut self,
        channel: Channel,
        index: CurveIndex,
        point: CurveDataPoint,
    ) -> Result<()> {
        self.channel(channel)?.curve_points[index.slot()] = format_curve_point(&point);
        Ok(())
    }

    fn module_name(&mut self) -> Result<String> {
        self.ensure_connected()?;
        Ok(self.module_name.clone())
    }

    fn set_module_name(&mut self, name: &str) -> Result<()> {
        self.ensure_connected()?;
        self.module_name = name.to_string();
        Ok(())
    }

    fn brightness(&mut self) -> Result<Brightness> {
        self.ensure_connected()?;
        Brightness::from_level(self.brightness_level)
    }

    fn set_brightness(&mut self, brightness: Brightness) -> Result<()> {
        self.ensure_connected()?;
        self.brightness_level = brightness.level();
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        debug!("Mock instrument released");
        self.connected = false;
        Ok(())
    }
}

/// Produces fresh [`MockModel240`] instances
#[derive(Debug, Clone, Default)]
pub struct MockFactory;

impl MockFactory {
    /// Create a new MockFactory
    pub fn new() -> Self {
        Self
    }
}

impl DeviceFactory for MockFactory {
    fn open(&self) -> Result<Box<dyn Model240>> {
        Ok(Box::new(MockModel240::new()))
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(n: i64) -> Channel {
        Channel::new(n).unwrap()
    }

    fn idx(n: i64) -> CurveIndex {
        CurveIndex::new(n).unwrap()
    }

    #[test]
    fn test_factory_defaults() {
        let mut mock = MockModel240::new();
        assert_eq!(mock.identification().unwrap().manufacturer, "Mock Lakeshore");
        assert_eq!(mock.sensor_name(ch(3)).unwrap(), "Sensor 3");
        assert_eq!(mock.filter(ch(1)).unwrap(), "No filter");
        assert_eq!(mock.kelvin_reading(ch(8)).unwrap(), 298.15);
        assert_eq!(mock.input_parameter(ch(2)).unwrap().sensor_type, SensorType::NtcRtd);
        assert_eq!(mock.curve_header(ch(4)).unwrap().serial_number, "SN4");
        assert_eq!(mock.module_name().unwrap(), "Mock Model240");
        assert_eq!(mock.brightness().unwrap().percent(), 50);
        assert!(!mock.channel_status(ch(1)).unwrap().any());
    }

    #[test]
    fn test_default_curve_points() {
        let mut mock = MockModel240::new();
        let first = mock.curve_data_point(ch(1), idx(1)).unwrap();
        assert_eq!(first.temperature, 1.0);
        assert_eq!(first.sensor, 0.1);

        let last = mock.curve_data_point(ch(1), idx(200)).unwrap();
        assert_eq!(last.temperature, 200.0);
        assert_eq!(last.sensor, 200.0 * 0.1);
    }

    #[test]
    fn test_writes_persist() {
        let mut mock = MockModel240::new();
        mock.set_curve_data_point(
            ch(5),
            idx(17),
            CurveDataPoint {
                sensor: 1.5,
                temperature: 77.0,
            },
        )
        .unwrap();
        let point = mock.curve_data_point(ch(5), idx(17)).unwrap();
        assert_eq!((point.sensor, point.temperature), (1.5, 77.0));

        mock.set_brightness(Brightness::new(60).unwrap()).unwrap();
        assert_eq!(mock.brightness().unwrap().percent(), 50);

        mock.set_module_name("Cryostat").unwrap();
        assert_eq!(mock.module_name().unwrap(), "Cryostat");
    }

    #[test]
    fn test_raw_point_and_status_hooks() {
        let mut mock = MockModel240::new();
        mock.set_raw_curve_point(ch(1), idx(2), "garbage");
        assert!(matches!(
            mock.curve_data_point(ch(1), idx(2)),
            Err(DeviceError::CommunicationError(_))
        ));

        mock.set_status_bits(ch(2), 0b1000);
        assert!(mock.channel_status(ch(2)).unwrap().temp_over_range);
    }

    #[test]
    fn test_disconnected_mock_fails() {
        let mut mock = MockModel240::new();
        mock.disconnect().unwrap();
        assert!(!mock.is_connected());
        assert!(matches!(
            mock.kelvin_reading(ch(1)),
            Err(DeviceError::CommunicationError(_))
        ));
        assert!(mock.identification().is_err());
    }

    #[test]
    fn test_factory_opens_fresh_instances() {
        let factory = MockFactory::new();
        let mut device = factory.open().unwrap();
        device.set_module_name("Changed").unwrap();

        let mut other = factory.open().unwrap();
        assert_eq!(other.module_name().unwrap(), "Mock Model240");
        assert_eq!(factory.describe(), "mock");
    }
}
