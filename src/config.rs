use crate::error::ConfigError;
use crate::liveness::DEVICE_TIMEOUT;
use crate::protocol::{Topics, DEFAULT_TOPIC_PREFIX};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub const DEFAULT_BROKER_HOST: &str = "broker.emqx.io";
pub const DEFAULT_BROKER_PORT: u16 = 1883;
pub const DEFAULT_CLIENT_ID_PREFIX: &str = "smartamp-monitor";
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);
pub const TICK_PERIOD: Duration = Duration::from_millis(200);

pub const MAX_LIVENESS_TIMEOUT: Duration = Duration::from_secs(86_400);

pub const DEFAULT_MAX_TEMP_C: f64 = 60.0;
pub const DEFAULT_MAX_CURRENT_A: f64 = 2.0;

/// Additive sensor corrections, applied before threshold evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CalibrationOffsets {
    pub temp_offset: f64,
    pub curr_offset: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub max_temp: f64,
    pub max_current: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_temp: DEFAULT_MAX_TEMP_C,
            max_current: DEFAULT_MAX_CURRENT_A,
        }
    }
}

/// How the over-temperature and short-circuit flags combine into a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GateMode {
    #[default]
    Or,
    And,
    Xor,
}

impl GateMode {
    pub const ALL: [GateMode; 3] = [GateMode::Or, GateMode::And, GateMode::Xor];

    pub fn combine(self, over_temp: bool, short_circuit: bool) -> bool {
        match self {
            GateMode::Or => over_temp || short_circuit,
            GateMode::And => over_temp && short_circuit,
            GateMode::Xor => over_temp != short_circuit,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GateMode::Or => "OR",
            GateMode::And => "AND",
            GateMode::Xor => "XOR",
        }
    }
}

impl core::fmt::Display for GateMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.pad(self.as_str())
    }
}

impl core::str::FromStr for GateMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OR" => Ok(GateMode::Or),
            "AND" => Ok(GateMode::And),
            "XOR" => Ok(GateMode::Xor),
            _ => Err(ConfigError::UnknownGate(s.to_string())),
        }
    }
}

/// Everything the evaluator needs besides the reading itself.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProtectionConfig {
    pub offsets: CalibrationOffsets,
    pub thresholds: Thresholds,
    pub gate: GateMode,
    /// Sticky short-circuit test: forces calibrated current above the limit.
    pub simulate_short_circuit: bool,
}

/// Fields the operator can edit with a numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TunableField {
    MaxTemp,
    MaxCurrent,
    TempOffset,
    CurrOffset,
}

impl TunableField {
    pub fn name(self) -> &'static str {
        match self {
            TunableField::MaxTemp => "max_temp",
            TunableField::MaxCurrent => "max_current",
            TunableField::TempOffset => "temp_offset",
            TunableField::CurrOffset => "curr_offset",
        }
    }
}

/// Parses operator input for `field`. Unreadable or non-finite input is
/// rejected so the caller keeps its last known good value.
pub fn parse_value(field: TunableField, input: &str) -> Result<f64, ConfigError> {
    let value: f64 = input.trim().parse().map_err(|_| ConfigError::Unreadable {
        field: field.name(),
        input: input.to_string(),
    })?;

    if !value.is_finite() {
        return Err(ConfigError::NonFinite { field: field.name() });
    }

    Ok(value)
}

/// Parses a liveness timeout in seconds. Must be positive and no longer
/// than `MAX_LIVENESS_TIMEOUT`.
pub fn parse_timeout(input: &str) -> Result<Duration, ConfigError> {
    let secs: f64 = input.trim().parse().map_err(|_| ConfigError::Unreadable {
        field: "timeout",
        input: input.to_string(),
    })?;

    if secs.is_nan() || secs <= 0.0 || secs > MAX_LIVENESS_TIMEOUT.as_secs_f64() {
        return Err(ConfigError::OutOfRange {
            field: "timeout",
            input: input.to_string(),
        });
    }

    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::OutOfRange {
        field: "timeout",
        input: input.to_string(),
    })
}

/// Latest-value cell holding the operator-editable protection config.
///
/// Handles are cheap to clone. Each evaluation tick takes one `snapshot()`
/// so that offsets and thresholds always come from the same edit.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    cell: Arc<watch::Sender<ProtectionConfig>>,
}

impl ConfigStore {
    pub fn new(initial: ProtectionConfig) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { cell: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> ProtectionConfig {
        *self.cell.borrow()
    }

    pub fn set_value(&self, field: TunableField, value: f64) -> Result<(), ConfigError> {
        if !value.is_finite() {
            return Err(ConfigError::NonFinite { field: field.name() });
        }

        self.cell.send_modify(|config| match field {
            TunableField::MaxTemp => config.thresholds.max_temp = value,
            TunableField::MaxCurrent => config.thresholds.max_current = value,
            TunableField::TempOffset => config.offsets.temp_offset = value,
            TunableField::CurrOffset => config.offsets.curr_offset = value,
        });
        Ok(())
    }

    /// Parses and applies operator input in one step.
    pub fn set_from_input(&self, field: TunableField, input: &str) -> Result<f64, ConfigError> {
        let value = parse_value(field, input)?;
        self.set_value(field, value)?;
        Ok(value)
    }

    pub fn set_gate(&self, gate: GateMode) {
        self.cell.send_modify(|config| config.gate = gate);
    }

    /// Flips the short-circuit simulation and returns the new state.
    pub fn toggle_simulation(&self) -> bool {
        let mut enabled = false;
        self.cell.send_modify(|config| {
            config.simulate_short_circuit = !config.simulate_short_circuit;
            enabled = config.simulate_short_circuit;
        });
        enabled
    }

    pub fn subscribe(&self) -> watch::Receiver<ProtectionConfig> {
        self.cell.subscribe()
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(ProtectionConfig::default())
    }
}

/// Process-level settings, filled from the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSettings {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id_prefix: String,
    pub topic_prefix: String,
    pub keep_alive: Duration,
    pub tick_period: Duration,
    pub liveness_timeout: Duration,
    pub protection: ProtectionConfig,
}

impl MonitorSettings {
    pub fn topics(&self) -> Topics {
        Topics::with_prefix(&self.topic_prefix)
    }

    /// Client id unique to this process so two monitors don't kick each
    /// other off the broker.
    pub fn client_id(&self) -> String {
        format!("{}-{}", self.client_id_prefix, std::process::id())
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            broker_host: DEFAULT_BROKER_HOST.to_string(),
            broker_port: DEFAULT_BROKER_PORT,
            client_id_prefix: DEFAULT_CLIENT_ID_PREFIX.to_string(),
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            keep_alive: DEFAULT_KEEP_ALIVE,
            tick_period: TICK_PERIOD,
            liveness_timeout: DEVICE_TIMEOUT,
            protection: ProtectionConfig::default(),
        }
    }
}
