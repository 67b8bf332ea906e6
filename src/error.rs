use thiserror::Error;

/// Inbound telemetry payload could not be decoded.
///
/// Never propagated past the ingestion path: the previous reading stays in
/// the buffer and the failure is only logged and counted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    NotJson(String),

    #[error("payload is not a JSON object")]
    NotObject,

    #[error("payload field has the wrong type: {0}")]
    InvalidField(String),

    #[error("payload of {0} bytes exceeds the maximum size")]
    TooLarge(usize),
}

/// Outbound publication failed at the message bus.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Broker connection is down; the message was dropped, not queued.
    #[error("message bus is not connected")]
    TransportUnavailable,

    #[error("publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },
}

/// Operator-supplied configuration value could not be used.
///
/// The stored configuration is left at its last known good value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cannot read value for {field}: {input:?}")]
    Unreadable { field: &'static str, input: String },

    #[error("value for {field} out of range: {input:?}")]
    OutOfRange { field: &'static str, input: String },

    #[error("value for {field} must be a finite number")]
    NonFinite { field: &'static str },

    #[error("unknown gate mode: {0:?} (expected OR, AND or XOR)")]
    UnknownGate(String),

    #[error("unknown operator command: {0:?}")]
    UnknownCommand(String),

    #[error("command {0:?} requires a value")]
    MissingValue(&'static str),
}

/// Top-level error for monitor setup and operator handling.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("bus error: {0}")]
    Bus(#[from] BusError),
}
