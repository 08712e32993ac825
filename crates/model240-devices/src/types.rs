/*!
 * Value types exchanged with the instrument.
 *
 * Bounded identifiers ([`Channel`], [`CurveIndex`], [`Brightness`]) can only be
 * constructed through their validating constructors, so a value of one of these
 * types is always in range by the time it reaches a device call.
 */
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::{DeviceError, Result};

/// Number of sensor input channels
pub const CHANNEL_COUNT: u8 = 8;

/// Number of points in a calibration curve
pub const CURVE_POINT_COUNT: u8 = 200;

/// A sensor input channel, 1 through 8
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Channel(u8);

impl Channel {
    /// Validate a caller-supplied channel number
    pub fn new(channel: i64) -> Result<Self> {
        if (1..=i64::from(CHANNEL_COUNT)).contains(&channel) {
            Ok(Self(channel as u8))
        } else {
            Err(DeviceError::InvalidChannel(channel))
        }
    }

    /// The channel number as sent to the instrument
    pub fn number(self) -> u8 {
        self.0
    }

    /// Zero-based slot for per-channel tables
    pub fn slot(self) -> usize {
        usize::from(self.0 - 1)
    }

    /// All channels in ascending order
    pub fn all() -> impl Iterator<Item = Channel> {
        (1..=CHANNEL_COUNT).map(Channel)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A calibration curve point index, 1 through 200
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CurveIndex(u8);

impl CurveIndex {
    /// Validate a caller-supplied point index
    pub fn new(index: i64) -> Result<Self> {
        if (1..=i64::from(CURVE_POINT_COUNT)).contains(&index) {
            Ok(Self(index as u8))
        } else {
            Err(DeviceError::InvalidIndex(index))
        }
    }

    /// The index as sent to the instrument
    pub fn number(self) -> u8 {
        self.0
    }

    /// Zero-based slot for curve tables
    pub fn slot(self) -> usize {
        usize::from(self.0 - 1)
    }

    /// All indices in ascending order
    pub fn all() -> impl Iterator<Item = CurveIndex> {
        (1..=CURVE_POINT_COUNT).map(CurveIndex)
    }
}

impl fmt::Display for CurveIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Display brightness in percent, 0 through 100
///
/// The front panel only has five levels (0-4). Writes are quantized to the
/// nearest level and reads report `level * 25`, so setting 60 reads back as 50.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Brightness(u8);

impl Brightness {
    /// Highest level the instrument accepts
    pub const MAX_LEVEL: u8 = 4;

    const PERCENT_PER_LEVEL: u8 = 25;

    /// Validate a caller-supplied percentage
    pub fn new(percent: i64) -> Result<Self> {
        if (0..=100).contains(&percent) {
            Ok(Self(percent as u8))
        } else {
            Err(DeviceError::InvalidBrightness(percent))
        }
    }

    /// Translate a level reported by the instrument
    pub fn from_level(level: u8) -> Result<Self> {
        if level > Self::MAX_LEVEL {
            return Err(DeviceError::communication(format!(
                "brightness level {} outside 0-{}",
                level,
                Self::MAX_LEVEL
            )));
        }
        Ok(Self(level * Self::PERCENT_PER_LEVEL))
    }

    /// The requested percentage
    pub fn percent(self) -> u8 {
        self.0
    }

    /// Nearest instrument level for this percentage
    pub fn level(self) -> u8 {
        (self.0 + Self::PERCENT_PER_LEVEL / 2) / Self::PERCENT_PER_LEVEL
    }
}

/// Declares a fieldless enum carried as its integer code on the wire and in the
/// instrument's command set.
macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $what:literal {
            $($(#[$vmeta:meta])* $variant:ident = $code:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "u8", into = "u8")]
        pub enum $name {
            $($(#[$vmeta])* $variant = $code,)+
        }

        impl $name {
            /// Integer code used by the instrument
            pub fn code(self) -> u8 {
                self as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = DeviceError;

            fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
                match code {
                    $($code => Ok($name::$variant),)+
                    other => Err(DeviceError::communication(format!(
                        "unknown {} code {}",
                        $what, other
                    ))),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value.code()
            }
        }
    };
}

coded_enum! {
    /// Sensor family wired to an input
    SensorType, "sensor type" {
        /// Silicon or GaAlAs diode
        Diode = 1,
        /// Platinum resistance thermometer
        PlatinumRtd = 2,
        /// Negative temperature coefficient RTD
        NtcRtd = 3,
    }
}

coded_enum! {
    /// Unit used for the front panel and the preferred reading
    TemperatureUnit, "temperature unit" {
        /// Kelvin
        Kelvin = 1,
        /// Degrees Celsius
        Celsius = 2,
        /// Raw sensor units
        Sensor = 3,
        /// Degrees Fahrenheit
        Fahrenheit = 4,
    }
}

coded_enum! {
    /// Units of the sensor column of a calibration curve
    CurveFormat, "curve format" {
        /// Millivolts versus kelvin
        MillivoltsPerKelvin = 1,
        /// Volts versus kelvin
        VoltsPerKelvin = 2,
        /// Ohms versus kelvin
        OhmsPerKelvin = 3,
        /// log10(ohms) versus kelvin
        LogOhmsPerKelvin = 4,
    }
}

coded_enum! {
    /// Sign of the curve's temperature coefficient
    Coefficient, "coefficient" {
        /// Sensor value falls as temperature rises
        Negative = 1,
        /// Sensor value rises with temperature
        Positive = 2,
    }
}

/// Instrument identification as reported by `*IDN?`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identification {
    /// Manufacturer
    pub manufacturer: String,
    /// Model designation
    pub model: String,
    /// Serial number
    pub serial_number: String,
    /// Firmware version
    pub firmware_version: String,
}

/// The instrument's atomic per-channel input configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputParameter {
    /// Sensor family
    pub sensor_type: SensorType,
    /// Preferred unit
    pub temperature_unit: TemperatureUnit,
    /// Let the instrument pick the excitation range
    pub auto_range_enable: bool,
    /// Reverse excitation current to cancel thermal EMFs
    pub current_reversal_enable: bool,
    /// Input is scanned
    pub input_enable: bool,
    /// Excitation range code
    pub input_range: u8,
}

/// Input configuration as exposed to clients: the instrument's input
/// parameter plus the sensor name and filter, which the instrument stores
/// separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Sensor name shown on the front panel
    #[serde(default)]
    pub sensor_name: Option<String>,
    /// Sensor family
    pub sensor_type: SensorType,
    /// Preferred unit
    pub temperature_unit: TemperatureUnit,
    /// Let the instrument pick the excitation range
    pub auto_range_enable: bool,
    /// Reverse excitation current to cancel thermal EMFs
    pub current_reversal_enable: bool,
    /// Input is scanned
    pub input_enable: bool,
    /// Excitation range code
    pub input_range: u8,
    /// Reading filter setting
    #[serde(default)]
    pub filter: Option<String>,
}

impl InputConfig {
    /// Combine the three separately stored pieces
    pub fn from_parts(parameter: InputParameter, sensor_name: String, filter: String) -> Self {
        Self {
            sensor_name: Some(sensor_name),
            sensor_type: parameter.sensor_type,
            temperature_unit: parameter.temperature_unit,
            auto_range_enable: parameter.auto_range_enable,
            current_reversal_enable: parameter.current_reversal_enable,
            input_enable: parameter.input_enable,
            input_range: parameter.input_range,
            filter: Some(filter),
        }
    }

    /// The part written with a single input-parameter call
    pub fn parameter(&self) -> InputParameter {
        InputParameter {
            sensor_type: self.sensor_type,
            temperature_unit: self.temperature_unit,
            auto_range_enable: self.auto_range_enable,
            current_reversal_enable: self.current_reversal_enable,
            input_enable: self.input_enable,
            input_range: self.input_range,
        }
    }
}

/// Calibration curve header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveHeader {
    /// Curve name
    pub curve_name: String,
    /// Sensor serial number
    pub serial_number: String,
    /// Units of the sensor column
    pub curve_data_format: CurveFormat,
    /// Upper temperature limit in kelvin
    pub temperature_limit: f64,
    /// Temperature coefficient sign
    pub coefficient: Coefficient,
}

/// One calibration curve point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveDataPoint {
    /// Temperature in kelvin
    pub temperature: f64,
    /// Sensor value in the curve's units
    pub sensor: f64,
}

/// A full calibration curve as two index-aligned columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveDataPoints {
    /// Channel the curve belongs to
    pub channel: u8,
    /// Temperatures, index 1 first
    pub temperatures: Vec<f64>,
    /// Sensor values, index 1 first
    pub sensors: Vec<f64>,
}

impl CurveDataPoints {
    /// Split points into columns, keeping their order
    pub fn from_points(channel: Channel, points: &[CurveDataPoint]) -> Self {
        Self {
            channel: channel.number(),
            temperatures: points.iter().map(|p| p.temperature).collect(),
            sensors: points.iter().map(|p| p.sensor).collect(),
        }
    }
}

/// A fresh reading of one channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonitorReading {
    /// Temperature in kelvin
    pub kelvin: f64,
    /// Raw sensor value
    pub sensor: f64,
    /// Temperature in degrees Celsius
    pub celsius: f64,
    /// Temperature in degrees Fahrenheit
    pub fahrenheit: f64,
}

/// Reading status flags of one channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStatus {
    /// The reading could not be taken
    pub invalid_reading: bool,
    /// Bit 1, no documented meaning
    #[serde(skip)]
    pub reserved: bool,
    /// Temperature below the curve
    pub temp_under_range: bool,
    /// Temperature above the curve
    pub temp_over_range: bool,
    /// Sensor value above the input range
    pub sensor_units_over_range: bool,
    /// Sensor value below the input range
    pub sensor_units_under_range: bool,
}

impl ChannelStatus {
    /// Decode the `RDGST?` register
    pub fn from_bits(bits: u8) -> Self {
        Self {
            invalid_reading: bits & 0x01 != 0,
            reserved: bits & 0x02 != 0,
            temp_under_range: bits & 0x04 != 0,
            temp_over_range: bits & 0x08 != 0,
            sensor_units_over_range: bits & 0x10 != 0,
            sensor_units_under_range: bits & 0x20 != 0,
        }
    }

    /// Encode back into the register layout
    pub fn bits(&self) -> u8 {
        [
            self.invalid_reading,
            self.reserved,
            self.temp_under_range,
            self.temp_over_range,
            self.sensor_units_over_range,
            self.sensor_units_under_range,
        ]
        .iter()
        .enumerate()
        .filter(|(_, set)| **set)
        .fold(0, |acc, (bit, _)| acc | (1 << bit))
    }

    /// True when any flag is raised
    pub fn any(&self) -> bool {
        self.bits() != 0
    }
}
