use crate::error::DecodeError;
use crate::telemetry::Reading;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TOPIC_PREFIX: &str = "smartamp";
/// Upper bound on an accepted telemetry payload. Far above any real device
/// message, so extra diagnostic keys never push a valid reading over it.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

const DATA_SUFFIX: &str = "data";
const STATUS_SUFFIX: &str = "status";
const RELAY_CONTROL_SUFFIX: &str = "control/relay";

/// Topic names for one device, all sharing a common prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topics {
    pub data: String,
    pub status: String,
    pub relay_control: String,
}

impl Topics {
    pub fn with_prefix(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        Self {
            data: format!("{prefix}/{DATA_SUFFIX}"),
            status: format!("{prefix}/{STATUS_SUFFIX}"),
            relay_control: format!("{prefix}/{RELAY_CONTROL_SUFFIX}"),
        }
    }

    /// Topics the monitor subscribes to.
    pub fn inbound(&self) -> [&str; 2] {
        [&self.data, &self.status]
    }
}

impl Default for Topics {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_TOPIC_PREFIX)
    }
}

/// What an inbound message on one of the device topics carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundKind {
    Telemetry,
    Status,
    Unknown,
}

impl InboundKind {
    pub fn classify(topics: &Topics, topic: &str) -> Self {
        if topic == topics.data {
            InboundKind::Telemetry
        } else if topic == topics.status {
            InboundKind::Status
        } else {
            InboundKind::Unknown
        }
    }
}

/// Wire shape of the device's telemetry payload.
///
/// Every key is optional; `null` is treated the same as a missing key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curr: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay: Option<bool>,
}

impl TelemetryPayload {
    pub fn into_reading(self) -> Reading {
        let neutral = Reading::default();
        Reading {
            temperature: self.temp.unwrap_or(neutral.temperature),
            voltage: self.volt.unwrap_or(neutral.voltage),
            current: self.curr.unwrap_or(neutral.current),
            relay_on: self.relay.unwrap_or(neutral.relay_on),
        }
    }
}

impl From<&Reading> for TelemetryPayload {
    fn from(reading: &Reading) -> Self {
        Self {
            temp: Some(reading.temperature),
            volt: Some(reading.voltage),
            curr: Some(reading.current),
            relay: Some(reading.relay_on),
        }
    }
}

/// Decodes a raw telemetry payload into a full `Reading`.
///
/// The payload must be a JSON object. Arrays and scalars are rejected even
/// though serde would happily map a sequence onto the struct.
pub fn decode_telemetry(raw: &[u8]) -> Result<Reading, DecodeError> {
    if raw.len() > MAX_PAYLOAD_SIZE {
        return Err(DecodeError::TooLarge(raw.len()));
    }

    let value: serde_json::Value = serde_json::from_slice(raw)
        .map_err(|e| DecodeError::NotJson(e.to_string()))?;

    if !value.is_object() {
        return Err(DecodeError::NotObject);
    }

    let payload: TelemetryPayload = serde_json::from_value(value)
        .map_err(|e| DecodeError::InvalidField(e.to_string()))?;

    Ok(payload.into_reading())
}

/// Encodes a reading the way the device publishes it.
pub fn encode_telemetry(reading: &Reading) -> Result<String, serde_json::Error> {
    serde_json::to_string(&TelemetryPayload::from(reading))
}

/// Relay control command. Sent as the bare strings `ON` / `OFF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayCommand {
    On,
    Off,
}

impl RelayCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            RelayCommand::On => "ON",
            RelayCommand::Off => "OFF",
        }
    }

    pub fn as_bytes(self) -> &'static [u8] {
        self.as_str().as_bytes()
    }

    /// Parses a control payload as received by the device. Surrounding
    /// whitespace is ignored, case is not.
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        match core::str::from_utf8(payload).ok()?.trim() {
            "ON" => Some(RelayCommand::On),
            "OFF" => Some(RelayCommand::Off),
            _ => None,
        }
    }
}

impl core::fmt::Display for RelayCommand {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.pad(self.as_str())
    }
}
