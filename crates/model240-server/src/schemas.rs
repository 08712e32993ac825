/*!
 * JSON bodies and query strings of the HTTP interface.
 *
 * Instrument values (identification, readings, input configuration, curves)
 * are served with the device crate's types directly; this module holds the
 * shapes that only exist at the HTTP layer.
 */
use serde::{Deserialize, Serialize};

/// Outcome of a command-style request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Whether the operation went through
    pub is_success: bool,
    /// Human readable summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error description when the operation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationResult {
    /// A successful result
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            is_success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    /// A failed result
    pub fn failure(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            is_success: false,
            message: Some(message.into()),
            error: Some(error.into()),
        }
    }
}

/// Body of `GET /device/module-name`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleName {
    /// Name shown on the front panel
    pub module_name: String,
}

/// Body of `GET /device/brightness`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrightnessBody {
    /// Brightness in percent, a multiple of 25
    pub brightness: u8,
}

/// Body of `GET /device/connection`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionState {
    /// Whether the instrument is connected
    pub connected: bool,
}

/// Query of `PUT /device/module-name`
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleNameQuery {
    /// New module name
    pub name: String,
}

/// Query of `PUT /device/brightness`
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BrightnessQuery {
    /// New brightness in percent
    pub brightness: i64,
}
