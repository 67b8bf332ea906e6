use smartamp_monitor::config::*;
use smartamp_monitor::error::ConfigError;
use smartamp_monitor::operator::OperatorCommand;
use smartamp_monitor::RelayCommand;
use std::time::Duration;

#[test]
fn test_default_settings() {
    let settings = MonitorSettings::default();

    assert_eq!(settings.broker_host, "broker.emqx.io");
    assert_eq!(settings.broker_port, 1883);
    assert_eq!(settings.keep_alive, Duration::from_secs(60));
    assert_eq!(settings.tick_period, Duration::from_millis(200));
    assert_eq!(settings.liveness_timeout, Duration::from_secs(5));
    assert_eq!(settings.protection, ProtectionConfig::default());

    let topics = settings.topics();
    assert_eq!(topics.data, "smartamp/data");
    assert_eq!(topics.status, "smartamp/status");
    assert_eq!(topics.relay_control, "smartamp/control/relay");
    assert!(settings.client_id().starts_with("smartamp-monitor-"));
}

#[test]
fn test_custom_topic_prefix() {
    let settings = MonitorSettings {
        topic_prefix: "lab/amp2/".to_string(),
        ..MonitorSettings::default()
    };
    let topics = settings.topics();

    assert_eq!(topics.data, "lab/amp2/data");
    assert_eq!(topics.inbound(), ["lab/amp2/data", "lab/amp2/status"]);
}

#[test]
fn test_gate_mode_parsing() {
    assert_eq!("or".parse::<GateMode>(), Ok(GateMode::Or));
    assert_eq!(" AND ".parse::<GateMode>(), Ok(GateMode::And));
    assert_eq!("Xor".parse::<GateMode>(), Ok(GateMode::Xor));
    assert_eq!(
        "nand".parse::<GateMode>(),
        Err(ConfigError::UnknownGate("nand".to_string()))
    );

    for mode in GateMode::ALL {
        assert_eq!(mode.to_string().parse::<GateMode>(), Ok(mode));
    }
}

#[test]
fn test_parse_value_rejects_bad_input() {
    assert_eq!(parse_value(TunableField::MaxTemp, " 72.5 "), Ok(72.5));
    assert!(matches!(
        parse_value(TunableField::MaxTemp, "hot"),
        Err(ConfigError::Unreadable { field: "max_temp", .. })
    ));
    assert!(matches!(
        parse_value(TunableField::MaxCurrent, ""),
        Err(ConfigError::Unreadable { .. })
    ));
    assert_eq!(
        parse_value(TunableField::TempOffset, "NaN"),
        Err(ConfigError::NonFinite { field: "temp_offset" })
    );
    assert_eq!(
        parse_value(TunableField::CurrOffset, "inf"),
        Err(ConfigError::NonFinite { field: "curr_offset" })
    );
}

#[test]
fn test_parse_timeout_bounds() {
    assert_eq!(parse_timeout("5"), Ok(Duration::from_secs(5)));
    assert_eq!(parse_timeout("0.25"), Ok(Duration::from_millis(250)));
    assert_eq!(parse_timeout("86400"), Ok(MAX_LIVENESS_TIMEOUT));

    for input in ["0", "-1", "NaN", "inf", "1e20", "86401"] {
        assert!(
            matches!(parse_timeout(input), Err(ConfigError::OutOfRange { field: "timeout", .. })),
            "{}",
            input
        );
    }
    assert!(matches!(
        parse_timeout("soon"),
        Err(ConfigError::Unreadable { field: "timeout", .. })
    ));
}

#[test]
fn test_gate_mode_display_honours_width() {
    assert_eq!(format!("{:>4}", GateMode::Or), "  OR");
    assert_eq!(format!("{:<5}|", GateMode::Xor), "XOR  |");
    assert_eq!(format!("{:<4}|", RelayCommand::On), "ON  |");
    assert_eq!(format!("{:^5}", RelayCommand::Off), " OFF ");
}

#[test]
fn test_store_keeps_last_good_value() {
    let store = ConfigStore::default();

    assert_eq!(store.set_from_input(TunableField::MaxTemp, "75"), Ok(75.0));
    assert!(store.set_from_input(TunableField::MaxTemp, "seventy").is_err());
    assert!(store.set_value(TunableField::MaxTemp, f64::NAN).is_err());

    assert_eq!(store.snapshot().thresholds.max_temp, 75.0);
}

#[test]
fn test_store_edits_each_field() {
    let store = ConfigStore::default();

    store.set_value(TunableField::MaxTemp, 70.0).expect("max temp");
    store.set_value(TunableField::MaxCurrent, 3.0).expect("max current");
    store.set_value(TunableField::TempOffset, -1.5).expect("temp offset");
    store.set_value(TunableField::CurrOffset, 0.25).expect("curr offset");
    store.set_gate(GateMode::And);

    let config = store.snapshot();
    assert_eq!(
        config,
        ProtectionConfig {
            offsets: CalibrationOffsets {
                temp_offset: -1.5,
                curr_offset: 0.25,
            },
            thresholds: Thresholds {
                max_temp: 70.0,
                max_current: 3.0,
            },
            gate: GateMode::And,
            simulate_short_circuit: false,
        }
    );
}

#[test]
fn test_snapshot_is_independent_of_later_edits() {
    let store = ConfigStore::default();
    let before = store.snapshot();

    store.set_value(TunableField::MaxCurrent, 9.0).expect("edit");

    assert_eq!(before.thresholds.max_current, 2.0);
    assert_eq!(store.snapshot().thresholds.max_current, 9.0);
}

#[test]
fn test_simulation_toggle() {
    let store = ConfigStore::default();
    let mut rx = store.subscribe();

    assert!(store.toggle_simulation());
    assert!(rx.has_changed().expect("store alive"));
    assert!(rx.borrow_and_update().simulate_short_circuit);

    assert!(!store.toggle_simulation());
    assert!(!store.snapshot().simulate_short_circuit);
}

#[test]
fn test_operator_relay_commands() {
    assert_eq!(
        OperatorCommand::parse("on"),
        Ok(OperatorCommand::Relay(RelayCommand::On))
    );
    assert_eq!(
        OperatorCommand::parse("  SHUTDOWN "),
        Ok(OperatorCommand::Relay(RelayCommand::Off))
    );
    assert_eq!(OperatorCommand::parse("sim"), Ok(OperatorCommand::ToggleSimulation));
    assert_eq!(OperatorCommand::parse("status"), Ok(OperatorCommand::Status));
    assert_eq!(OperatorCommand::parse("exit"), Ok(OperatorCommand::Quit));
}

#[test]
fn test_operator_value_commands() {
    assert_eq!(
        OperatorCommand::parse("max-temp 72.5"),
        Ok(OperatorCommand::Set {
            field: TunableField::MaxTemp,
            value: 72.5
        })
    );
    assert_eq!(
        OperatorCommand::parse("curr-offset -0.25"),
        Ok(OperatorCommand::Set {
            field: TunableField::CurrOffset,
            value: -0.25
        })
    );
    assert_eq!(
        OperatorCommand::parse("gate xor"),
        Ok(OperatorCommand::Gate(GateMode::Xor))
    );
}

#[test]
fn test_operator_parse_errors() {
    assert_eq!(
        OperatorCommand::parse("reboot"),
        Err(ConfigError::UnknownCommand("reboot".to_string()))
    );
    assert_eq!(
        OperatorCommand::parse("max-current"),
        Err(ConfigError::MissingValue("max_current"))
    );
    assert_eq!(OperatorCommand::parse("gate"), Err(ConfigError::MissingValue("gate")));
    assert!(matches!(
        OperatorCommand::parse("gate nor"),
        Err(ConfigError::UnknownGate(_))
    ));
    assert!(matches!(
        OperatorCommand::parse("temp-offset abc"),
        Err(ConfigError::Unreadable { .. })
    ));
}
