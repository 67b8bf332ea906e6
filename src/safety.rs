use crate::config::{CalibrationOffsets, GateMode, ProtectionConfig, Thresholds};
use crate::telemetry::Reading;
use serde::{Deserialize, Serialize};

/// Margin added above the current limit while the short-circuit test runs.
pub const SIMULATED_SHORT_MARGIN_A: f64 = 1.5;

/// Calibrated values plus the two threshold outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub calibrated_temp: f64,
    pub calibrated_current: f64,
    /// Voltage is reported as measured, never calibrated.
    pub voltage: f64,
    pub over_temp: bool,
    pub short_circuit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProtectionDecision {
    pub over_temp: bool,
    pub short_circuit: bool,
    pub triggered: bool,
}

pub fn calibrated_temperature(reading: &Reading, offsets: &CalibrationOffsets) -> f64 {
    reading.temperature + offsets.temp_offset
}

/// Negative current is physically meaningless after an offset, so clamp.
pub fn calibrated_current(reading: &Reading, offsets: &CalibrationOffsets) -> f64 {
    (reading.current + offsets.curr_offset).max(0.0)
}

pub fn evaluate(reading: &Reading, offsets: &CalibrationOffsets, thresholds: &Thresholds) -> Evaluation {
    evaluate_with_override(reading, offsets, thresholds, false)
}

/// Evaluates the reading, optionally replacing the calibrated current with
/// a value just above the limit to exercise the interlock.
pub fn evaluate_with_override(
    reading: &Reading,
    offsets: &CalibrationOffsets,
    thresholds: &Thresholds,
    simulate_short_circuit: bool,
) -> Evaluation {
    let calibrated_temp = calibrated_temperature(reading, offsets);
    let calibrated_current = if simulate_short_circuit {
        thresholds.max_current + SIMULATED_SHORT_MARGIN_A
    } else {
        calibrated_current(reading, offsets)
    };

    // Strict comparisons: sitting exactly on a limit is still safe.
    Evaluation {
        calibrated_temp,
        calibrated_current,
        voltage: reading.voltage,
        over_temp: calibrated_temp > thresholds.max_temp,
        short_circuit: calibrated_current > thresholds.max_current,
    }
}

pub fn combine(over_temp: bool, short_circuit: bool, mode: GateMode) -> bool {
    mode.combine(over_temp, short_circuit)
}

impl ProtectionDecision {
    pub fn from_evaluation(evaluation: &Evaluation, mode: GateMode) -> Self {
        Self {
            over_temp: evaluation.over_temp,
            short_circuit: evaluation.short_circuit,
            triggered: combine(evaluation.over_temp, evaluation.short_circuit, mode),
        }
    }
}

/// One full evaluation cycle over a single reading and config snapshot.
pub fn assess(reading: &Reading, config: &ProtectionConfig) -> (Evaluation, ProtectionDecision) {
    let evaluation = evaluate_with_override(
        reading,
        &config.offsets,
        &config.thresholds,
        config.simulate_short_circuit,
    );
    let decision = ProtectionDecision::from_evaluation(&evaluation, config.gate);
    (evaluation, decision)
}

/// Relay state as the operator should see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayStatus {
    Active,
    CutOff,
    /// Device offline, last reported relay state can't be trusted.
    Unknown,
}

impl RelayStatus {
    pub fn derive(relay_on: bool, online: bool) -> Self {
        match (online, relay_on) {
            (false, _) => RelayStatus::Unknown,
            (true, true) => RelayStatus::Active,
            (true, false) => RelayStatus::CutOff,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RelayStatus::Active => "ACTIVE (ON)",
            RelayStatus::CutOff => "CUT OFF (PROTECTED)",
            RelayStatus::Unknown => "UNKNOWN",
        }
    }
}
