/*!
 * Serial driver for the Model 240.
 *
 * The instrument enumerates as a USB virtual COM port and speaks a line
 * oriented command set. Queries end in `?` and answer with one line; commands
 * are followed by `*ESR?` so every write is confirmed by the event status
 * register. The driver works over any [`Transport`] so it can be exercised
 * without hardware.
 *
 * A read that fails partway leaves the rest of the reply on the link. The
 * driver then discards pending input before its next write, so a late answer
 * is never taken for the answer to a later query.
 */
use std::fmt;
use std::io::{self, ErrorKind, Read, Write};
use std::time::Duration;

use serialport::SerialPort;
use tracing::{debug, info, trace};

use crate::device::{DeviceError, DeviceFactory, Model240, Result};
use crate::types::{
    Brightness, Channel, ChannelStatus, Coefficient, CurveDataPoint, CurveFormat, CurveHeader,
    CurveIndex, Identification, InputParameter, SensorType, TemperatureUnit,
};
use crate::wire::{
    format_curve_point, parse_code, parse_curve_point, parse_flag, parse_float, quote,
    split_fields, unquote,
};

/// Longest response line accepted from the instrument
const MAX_LINE_LENGTH: usize = 256;

/// Event status register bits that signal a rejected command
/// (query error, device error, execution error, command error)
const ESR_ERROR_MASK: u8 = 0b0011_1100;

/// Byte stream to the instrument
pub trait Transport: Read + Write + Send {
    /// Drop everything received but not yet read
    fn discard_input(&mut self) -> io::Result<()>;
}

impl Transport for Box<dyn SerialPort> {
    fn discard_input(&mut self) -> io::Result<()> {
        self.clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::from)
    }
}

/// Driver for one instrument over a byte stream
pub struct SerialModel240<T: Transport> {
    transport: Option<T>,
    name: String,
    /// A read or write failed partway; stale bytes may be waiting
    desynchronized: bool,
}

impl<T: Transport> fmt::Debug for SerialModel240<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialModel240")
            .field("name", &self.name)
            .field("open", &self.transport.is_some())
            .field("desynchronized", &self.desynchronized)
            .finish()
    }
}

impl<T: Transport> SerialModel240<T> {
    /// Wrap an open transport; `name` is used in logs
    pub fn new(transport: T, name: impl Into<String>) -> Self {
        Self {
            transport: Some(transport),
            name: name.into(),
            desynchronized: false,
        }
    }

    fn transport(&mut self) -> Result<&mut T> {
        self.transport
            .as_mut()
            .ok_or_else(|| DeviceError::communication("serial transport already closed"))
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        trace!("{} <- {}", self.name, line);
        let transport = self.transport()?;
        transport.write_all(line.as_bytes()).map_err(io_error)?;
        transport.write_all(b"\n").map_err(io_error)?;
        transport.flush().map_err(io_error)
    }

    fn read_line(&mut self) -> Result<String> {
        let transport = self.transport()?;
        let mut line = Vec::with_capacity(64);
        let mut byte = [0u8; 1];

        loop {
            match transport.read(&mut byte) {
                Ok(0) => return Err(DeviceError::communication("serial transport closed")),
                Ok(_) if byte[0] == b'\n' => break,
                Ok(_) => {
                    if line.len() == MAX_LINE_LENGTH {
                        return Err(DeviceError::communication(format!(
                            "response longer than {} bytes",
                            MAX_LINE_LENGTH
                        )));
                    }
                    line.push(byte[0]);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(io_error(e)),
            }
        }

        let text = String::from_utf8(line)
            .map_err(|_| DeviceError::communication("response is not valid UTF-8"))?;
        let text = text.trim_end_matches('\r').to_string();
        trace!("{} -> {}", self.name, text);
        Ok(text)
    }

    fn resynchronize(&mut self) -> Result<()> {
        if !self.desynchronized {
            return Ok(());
        }
        debug!("Discarding stale input from {}", self.name);
        self.transport()?.discard_input().map_err(|e| {
            DeviceError::communication(format!("cannot discard stale input: {}", e))
        })?;
        self.desynchronized = false;
        Ok(())
    }

    /// Send a query and return its one-line answer
    pub fn query(&mut self, query: &str) -> Result<String> {
        self.resynchronize()?;
        let result = self.write_line(query).and_then(|()| self.read_line());
        if result.is_err() {
            self.desynchronized = true;
        }
        result
    }

    /// Send a command and check the event status register
    pub fn command(&mut self, command: &str) -> Result<()> {
        let esr = self.query(&format!("{};*ESR?", command))?;
        let esr = parse_code(&esr, "event status register")?;
        if esr & ESR_ERROR_MASK != 0 {
            return Err(DeviceError::communication(format!(
                "instrument rejected '{}' (ESR {:#04x})",
                command, esr
            )));
        }
        Ok(())
    }

    fn float_query(&mut self, query: &str, what: &str) -> Result<f64> {
        let raw = self.query(query)?;
        parse_float(&raw, what)
    }
}

/// Reject text that would split a command into two
fn plain_argument(value: &str, what: &str) -> Result<()> {
    if value.contains([';', ',', '"', '\n', '\r']) {
        return Err(DeviceError::update_failed(format!(
            "{} may not contain ';', ',', quotes or line breaks",
            what
        )));
    }
    Ok(())
}

fn io_error(err: std::io::Error) -> DeviceError {
    match err.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => {
            DeviceError::timeout(format!("no response from instrument: {}", err))
        }
        _ => DeviceError::communication(err.to_string()),
    }
}

impl<T: Transport> Model240 for SerialModel240<T> {
    fn identification(&mut self) -> Result<Identification> {
        let raw = self.query("*IDN?")?;
        let fields = split_fields(&raw, 4, "*IDN?")?;
        Ok(Identification {
            manufacturer: fields[0].to_string(),
            model: fields[1].to_string(),
            serial_number: fields[2].to_string(),
            firmware_version: fields[3].to_string(),
        })
    }

    fn input_parameter(&mut self, channel: Channel) -> Result<InputParameter> {
        let raw = self.query(&format!("INTYPE? {}", channel))?;
        let fields = split_fields(&raw, 6, "INTYPE?")?;
        Ok(InputParameter {
            sensor_type: SensorType::try_from(parse_code(fields[0], "sensor type")?)?,
            temperature_unit: TemperatureUnit::try_from(parse_code(fields[1], "unit")?)?,
            auto_range_enable: parse_flag(fields[2], "autorange")?,
            current_reversal_enable: parse_flag(fields[3], "current reversal")?,
            input_enable: parse_flag(fields[4], "input enable")?,
            input_range: parse_code(fields[5], "input range")?,
        })
    }

    fn set_input_parameter(&mut self, channel: Channel, parameter: &InputParameter) -> Result<()> {
        self.command(&format!(
            "INTYPE {},{},{},{},{},{},{}",
            channel,
            parameter.sensor_type.code(),
            parameter.temperature_unit.code(),
            u8::from(parameter.auto_range_enable),
            u8::from(parameter.current_reversal_enable),
            u8::from(parameter.input_enable),
            parameter.input_range
        ))
    }

    fn sensor_name(&mut self, channel: Channel) -> Result<String> {
        let raw = self.query(&format!("INNAME? {}", channel))?;
        Ok(unquote(&raw))
    }

    fn set_sensor_name(&mut self, channel: Channel, name: &str) -> Result<()> {
        let name = quote(name, "sensor name")?;
        self.command(&format!("INNAME {},{}", channel, name))
    }

    fn filter(&mut self, channel: Channel) -> Result<String> {
        let raw = self.query(&format!("FILTER? {}", channel))?;
        Ok(raw.trim().to_string())
    }

    fn set_filter(&mut self, channel: Channel, filter: &str) -> Result<()> {
        plain_argument(filter, "filter")?;
        self.command(&format!("FILTER {},{}", channel, filter.trim()))
    }

    fn celsius_reading(&mut self, channel: Channel) -> Result<f64> {
        self.float_query(&format!("CRDG? {}", channel), "celsius reading")
    }

    fn fahrenheit_reading(&mut self, channel: Channel) -> Result<f64> {
        self.float_query(&format!("FRDG? {}", channel), "fahrenheit reading")
    }

    fn kelvin_reading(&mut self, channel: Channel) -> Result<f64> {
        self.float_query(&format!("KRDG? {}", channel), "kelvin reading")
    }

    fn sensor_reading(&mut self, channel: Channel) -> Result<f64> {
        self.float_query(&format!("SRDG? {}", channel), "sensor reading")
    }

    fn channel_status(&mut self, channel: Channel) -> Result<ChannelStatus> {
        let raw = self.query(&format!("RDGST? {}", channel))?;
        Ok(ChannelStatus::from_bits(parse_code(&raw, "reading status")?))
    }

    fn curve_header(&mut self, channel: Channel) -> Result<CurveHeader> {
        let raw = self.query(&format!("CRVHDR? {}", channel))?;
        let fields = split_fields(&raw, 5, "CRVHDR?")?;
        Ok(CurveHeader {
            curve_name: unquote(fields[0]),
            serial_number: unquote(fields[1]),
            curve_data_format: CurveFormat::try_from(parse_code(fields[2], "curve format")?)?,
            temperature_limit: parse_float(fields[3], "temperature limit")?,
            coefficient: Coefficient::try_from(parse_code(fields[4], "coefficient")?)?,
        })
    }

    fn set_curve_header(&mut self, channel: Channel, header: &CurveHeader) -> Result<()> {
        let name = quote(&header.curve_name, "curve name")?;
        let serial = quote(&header.serial_number, "serial number")?;
        self.command(&format!(
            "CRVHDR {},{},{},{},{},{}",
            channel,
            name,
            serial,
            header.curve_data_format.code(),
            header.temperature_limit,
            header.coefficient.code()
        ))
    }

    fn curve_data_point(&mut self, channel: Channel, index: CurveIndex) -> Result<CurveDataPoint> {
        let raw = self.query(&format!("CRVPT? {},{}", channel, index))?;
        parse_curve_point(&raw)
    }

    fn set_curve_data_point(
        &mut self,
        channel: Channel,
        index: CurveIndex,
        point: CurveDataPoint,
    ) -> Result<()> {
        self.command(&format!(
            "CRVPT {},{},{}",
            channel,
            index,
            format_curve_point(&point)
        ))
    }

    fn module_name(&mut self) -> Result<String> {
        let raw = self.query("MODNAME?")?;
        Ok(unquote(&raw))
    }

    fn set_module_name(&mut self, name: &str) -> Result<()> {
        let name = quote(name, "module name")?;
        self.command(&format!("MODNAME {}", name))
    }

    fn brightness(&mut self) -> Result<Brightness> {
        let raw = self.query("BRIGT?")?;
        Brightness::from_level(parse_code(&raw, "brightness level")?)
    }

    fn set_brightness(&mut self, brightness: Brightness) -> Result<()> {
        self.command(&format!("BRIGT {}", brightness.level()))
    }

    fn disconnect(&mut self) -> Result<()> {
        match self.transport.take() {
            Some(mut transport) => {
                info!("Closing serial connection to {}", self.name);
                transport.flush().map_err(io_error)
            }
            None => Ok(()),
        }
    }
}

/// Opens the instrument on a serial port
#[derive(Debug, Clone)]
pub struct SerialFactory {
    port: String,
    baud_rate: u32,
    io_timeout: Duration,
}

impl SerialFactory {
    /// Create a new SerialFactory
    pub fn new(port: impl Into<String>, baud_rate: u32, io_timeout: Duration) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            io_timeout,
        }
    }
}

impl DeviceFactory for SerialFactory {
    fn open(&self) -> Result<Box<dyn Model240>> {
        debug!("Opening {} at {} baud", self.port, self.baud_rate);
        let port = serialport::new(&self.port, self.baud_rate)
            .timeout(self.io_timeout)
            .open()
            .map_err(|e| DeviceError::connection(format!("cannot open {}: {}", self.port, e)))?;
        port.clear(serialport::ClearBuffer::All)
            .map_err(|e| DeviceError::connection(format!("cannot reset {}: {}", self.port, e)))?;

        let mut device = SerialModel240::new(port, self.port.clone());
        let id = device.identification().map_err(|e| {
            DeviceError::connection(format!("no identification from {}: {}", self.port, e))
        })?;
        info!(
            "Connected to {} {} (serial {}, firmware {}) on {}",
            id.manufacturer, id.model, id.serial_number, id.firmware_version, self.port
        );

        Ok(Box::new(device))
    }

    fn describe(&self) -> String {
        format!("{} @ {} baud", self.port, self.baud_rate)
    }
}
