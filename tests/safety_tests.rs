use smartamp_monitor::config::{CalibrationOffsets, GateMode, ProtectionConfig, Thresholds};
use smartamp_monitor::protocol::decode_telemetry;
use smartamp_monitor::safety::*;
use smartamp_monitor::Reading;

fn reading(temperature: f64, current: f64) -> Reading {
    Reading {
        temperature,
        voltage: 12.0,
        current,
        relay_on: true,
    }
}

#[test]
fn test_default_thresholds() {
    let thresholds = Thresholds::default();
    assert_eq!(thresholds.max_temp, 60.0);
    assert_eq!(thresholds.max_current, 2.0);
    assert_eq!(GateMode::default(), GateMode::Or);
}

#[test]
fn test_offsets_applied_before_comparison() {
    let offsets = CalibrationOffsets {
        temp_offset: 5.0,
        curr_offset: -0.5,
    };
    let eval = evaluate(&reading(58.0, 2.25), &offsets, &Thresholds::default());

    assert_eq!(eval.calibrated_temp, 63.0);
    assert_eq!(eval.calibrated_current, 1.75);
    assert!(eval.over_temp);
    assert!(!eval.short_circuit);
}

#[test]
fn test_current_clamped_at_zero() {
    let offsets = CalibrationOffsets {
        temp_offset: 0.0,
        curr_offset: -5.0,
    };
    let eval = evaluate(&reading(25.0, 1.0), &offsets, &Thresholds::default());
    assert_eq!(eval.calibrated_current, 0.0);

    // Clamp holds for any combination of raw current and offset
    for raw in [-3.0_f64, -0.1, 0.0, 0.4, 1.9, 7.5] {
        for offset in [-10.0_f64, -1.0, 0.0, 0.25, 3.0] {
            let offsets = CalibrationOffsets {
                temp_offset: 0.0,
                curr_offset: offset,
            };
            let eval = evaluate(&reading(25.0, raw), &offsets, &Thresholds::default());
            assert!(eval.calibrated_current >= 0.0, "raw={} offset={}", raw, offset);
        }
    }
}

#[test]
fn test_temperature_not_clamped() {
    let offsets = CalibrationOffsets {
        temp_offset: -30.0,
        curr_offset: 0.0,
    };
    let eval = evaluate(&reading(10.0, 0.5), &offsets, &Thresholds::default());
    assert_eq!(eval.calibrated_temp, -20.0);
}

#[test]
fn test_thresholds_are_strict() {
    let offsets = CalibrationOffsets::default();
    let thresholds = Thresholds::default();

    let at_limit = evaluate(&reading(60.0, 2.0), &offsets, &thresholds);
    assert!(!at_limit.over_temp);
    assert!(!at_limit.short_circuit);

    let above = evaluate(&reading(60.5, 2.5), &offsets, &thresholds);
    assert!(above.over_temp);
    assert!(above.short_circuit);
}

#[test]
fn test_tiny_excess_over_limit_trips() {
    let eval = evaluate(
        &reading(60.000_000_1, 2.000_000_1),
        &CalibrationOffsets::default(),
        &Thresholds::default(),
    );
    assert!(eval.over_temp);
    assert!(eval.short_circuit);

    let decoded = decode_telemetry(br#"{"temp": 60.0000001}"#).expect("payload");
    let (_, decision) = assess(&decoded, &ProtectionConfig::default());
    assert!(decision.over_temp);
}

#[test]
fn test_voltage_passed_through_uncalibrated() {
    let offsets = CalibrationOffsets {
        temp_offset: 3.0,
        curr_offset: 0.3,
    };
    let raw = Reading {
        temperature: 20.0,
        voltage: 11.7,
        current: 0.2,
        relay_on: true,
    };
    let eval = evaluate(&raw, &offsets, &Thresholds::default());
    assert_eq!(eval.voltage, 11.7);
}

#[test]
fn test_gate_truth_table() {
    let cases = [
        (GateMode::Or, false, false, false),
        (GateMode::Or, true, false, true),
        (GateMode::Or, false, true, true),
        (GateMode::Or, true, true, true),
        (GateMode::And, false, false, false),
        (GateMode::And, true, false, false),
        (GateMode::And, false, true, false),
        (GateMode::And, true, true, true),
        (GateMode::Xor, false, false, false),
        (GateMode::Xor, true, false, true),
        (GateMode::Xor, false, true, true),
        (GateMode::Xor, true, true, false),
    ];

    for (mode, over_temp, short_circuit, expected) in cases {
        assert_eq!(
            combine(over_temp, short_circuit, mode),
            expected,
            "{} gate with over_temp={} short_circuit={}",
            mode,
            over_temp,
            short_circuit
        );
    }
}

#[test]
fn test_evaluation_is_pure() {
    let config = ProtectionConfig {
        offsets: CalibrationOffsets {
            temp_offset: 1.5,
            curr_offset: 0.2,
        },
        ..ProtectionConfig::default()
    };
    let r = reading(59.0, 1.9);

    let first = assess(&r, &config);
    let second = assess(&r, &config);
    assert_eq!(first, second);
}

#[test]
fn test_or_gate_trips_on_over_temp_alone() {
    let config = ProtectionConfig::default();
    let (eval, decision) = assess(&reading(65.0, 1.0), &config);

    assert_eq!(eval.calibrated_temp, 65.0);
    assert!(decision.over_temp);
    assert!(!decision.short_circuit);
    assert!(decision.triggered);
}

#[test]
fn test_and_gate_requires_both_conditions() {
    let config = ProtectionConfig {
        gate: GateMode::And,
        ..ProtectionConfig::default()
    };

    let (_, only_hot) = assess(&reading(65.0, 1.0), &config);
    assert!(only_hot.over_temp);
    assert!(!only_hot.triggered);

    let (_, both) = assess(&reading(65.0, 3.0), &config);
    assert!(both.triggered);
}

#[test]
fn test_xor_gate_clears_when_both_fire() {
    let config = ProtectionConfig {
        gate: GateMode::Xor,
        ..ProtectionConfig::default()
    };

    let (_, both) = assess(&reading(70.0, 3.0), &config);
    assert!(both.over_temp && both.short_circuit);
    assert!(!both.triggered);

    let (_, shorted) = assess(&reading(30.0, 3.0), &config);
    assert!(shorted.triggered);
}

#[test]
fn test_simulated_short_circuit_overrides_current() {
    let config = ProtectionConfig {
        simulate_short_circuit: true,
        ..ProtectionConfig::default()
    };
    let (eval, decision) = assess(&reading(25.0, 0.1), &config);

    assert_eq!(eval.calibrated_current, 2.0 + SIMULATED_SHORT_MARGIN_A);
    assert!(decision.short_circuit);
    assert!(decision.triggered);
}

#[test]
fn test_simulation_follows_current_limit() {
    let config = ProtectionConfig {
        thresholds: Thresholds {
            max_temp: 60.0,
            max_current: 5.0,
        },
        simulate_short_circuit: true,
        ..ProtectionConfig::default()
    };
    let (eval, _) = assess(&reading(25.0, 0.0), &config);
    assert_eq!(eval.calibrated_current, 6.5);
}

#[test]
fn test_relay_status_labels() {
    assert_eq!(RelayStatus::derive(true, true), RelayStatus::Active);
    assert_eq!(RelayStatus::derive(false, true), RelayStatus::CutOff);
    assert_eq!(RelayStatus::derive(true, false), RelayStatus::Unknown);
    assert_eq!(RelayStatus::derive(false, false), RelayStatus::Unknown);

    assert_eq!(RelayStatus::Active.label(), "ACTIVE (ON)");
    assert_eq!(RelayStatus::CutOff.label(), "CUT OFF (PROTECTED)");
}
