/*!
 * Text encodings used at the instrument boundary.
 *
 * The instrument reports a curve point as a single `sensor,temperature` string.
 * Everything above the device boundary works with [`CurveDataPoint`].
 */
use crate::device::{DeviceError, Result};
use crate::types::CurveDataPoint;

/// Parse a `sensor,temperature` pair
pub fn parse_curve_point(raw: &str) -> Result<CurveDataPoint> {
    let mut fields = raw.trim().split(',');
    let (sensor, temperature) = match (fields.next(), fields.next(), fields.next()) {
        (Some(sensor), Some(temperature), None) => (sensor, temperature),
        _ => {
            return Err(DeviceError::communication(format!(
                "malformed curve point '{}'",
                raw
            )))
        }
    };

    Ok(CurveDataPoint {
        sensor: parse_float(sensor, "curve point sensor")?,
        temperature: parse_float(temperature, "curve point temperature")?,
    })
}

/// Encode a point the way the instrument expects it
pub fn format_curve_point(point: &CurveDataPoint) -> String {
    format!("{},{}", point.sensor, point.temperature)
}

/// Parse one numeric field of a response
pub fn parse_float(raw: &str, what: &str) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| DeviceError::communication(format!("non-numeric {} '{}'", what, raw.trim())))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DeviceError::communication(format!("non-finite {} '{}'", what, raw.trim())))
    }
}

/// Parse one unsigned integer field of a response
pub fn parse_code(raw: &str, what: &str) -> Result<u8> {
    raw.trim()
        .parse()
        .map_err(|_| DeviceError::communication(format!("non-numeric {} '{}'", what, raw.trim())))
}

/// Parse a `0`/`1` flag
pub fn parse_flag(raw: &str, what: &str) -> Result<bool> {
    match raw.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(DeviceError::communication(format!(
            "expected 0 or 1 for {}, got '{}'",
            what, other
        ))),
    }
}

/// Quote a string argument, rejecting text that would break the framing
pub fn quote(value: &str, what: &str) -> Result<String> {
    if value.contains('"') || value.contains('\n') || value.contains('\r') {
        return Err(DeviceError::update_failed(format!(
            "{} may not contain quotes or line breaks",
            what
        )));
    }
    Ok(format!("\"{}\"", value))
}

/// Strip padding and the optional quotes around a string response
pub fn unquote(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

/// Split a comma separated response into exactly `count` fields
pub fn split_fields<'a>(raw: &'a str, count: usize, what: &str) -> Result<Vec<&'a str>> {
    let fields: Vec<&str> = raw.trim().split(',').map(str::trim).collect();
    if fields.len() == count {
        Ok(fields)
    } else {
        Err(DeviceError::communication(format!(
            "expected {} fields in {} response, got {}: '{}'",
            count,
            what,
            fields.len(),
            raw.trim()
        )))
    }
}
