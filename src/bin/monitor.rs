use clap::{App, Arg, ArgMatches};
use colored::*;
use smartamp_monitor::bus::MessageBus;
use smartamp_monitor::config::{
    parse_timeout, parse_value, MonitorSettings, TunableField, DEFAULT_BROKER_HOST, DEFAULT_CLIENT_ID_PREFIX,
};
use smartamp_monitor::dispatcher::TripOutcome;
use smartamp_monitor::liveness::LinkStatus;
use smartamp_monitor::mqtt::MqttBus;
use smartamp_monitor::operator::{OperatorCommand, HELP};
use smartamp_monitor::protocol::DEFAULT_TOPIC_PREFIX;
use smartamp_monitor::safety::RelayStatus;
use smartamp_monitor::{GateMode, SafetyMonitor, TelemetryIngest, TickReport};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time;
use tracing::Level;

const DEFAULT_PORT: &str = "1883";
const DEFAULT_REFRESH_MS: &str = "1000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("smartamp-monitor")
        .version("0.1.0")
        .author("SmartAmp Engineering Team")
        .about("⚡ SmartAmp Monitor - live telemetry and automatic relay protection")
        .arg(
            Arg::with_name("host")
                .short("h")
                .long("host")
                .value_name("HOST")
                .help("MQTT broker address")
                .takes_value(true)
                .default_value(DEFAULT_BROKER_HOST),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("MQTT broker port")
                .takes_value(true)
                .default_value(DEFAULT_PORT),
        )
        .arg(
            Arg::with_name("topic-prefix")
                .long("topic-prefix")
                .value_name("PREFIX")
                .help("Device topic prefix (<prefix>/data, <prefix>/control/relay)")
                .takes_value(true)
                .default_value(DEFAULT_TOPIC_PREFIX),
        )
        .arg(
            Arg::with_name("client-id")
                .long("client-id")
                .value_name("PREFIX")
                .help("MQTT client id prefix (process id is appended)")
                .takes_value(true)
                .default_value(DEFAULT_CLIENT_ID_PREFIX),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["json", "table", "compact"])
                .default_value("table"),
        )
        .arg(
            Arg::with_name("refresh")
                .short("r")
                .long("refresh")
                .value_name("MS")
                .help("Display refresh period in milliseconds (evaluation always runs every 200ms)")
                .takes_value(true)
                .default_value(DEFAULT_REFRESH_MS)
                .validator(|v| match v.parse::<u64>() {
                    Ok(ms) if ms >= 200 => Ok(()),
                    _ => Err("Refresh must be a number of milliseconds >= 200".into()),
                }),
        )
        .arg(
            Arg::with_name("timeout")
                .long("timeout")
                .value_name("SECONDS")
                .help("Device liveness timeout")
                .takes_value(true)
                .default_value("5")
                .validator(|v| match parse_timeout(&v) {
                    Ok(_) => Ok(()),
                    Err(_) => Err("Timeout must be a number of seconds in (0, 86400]".into()),
                }),
        )
        .arg(numeric_arg("max-temp", "CELSIUS", "Over-temperature limit", "60"))
        .arg(numeric_arg("max-current", "AMPS", "Short-circuit current limit", "2.0"))
        .arg(numeric_arg("temp-offset", "CELSIUS", "Temperature calibration offset", "0"))
        .arg(numeric_arg("curr-offset", "AMPS", "Current calibration offset", "0"))
        .arg(
            Arg::with_name("gate")
                .short("g")
                .long("gate")
                .value_name("GATE")
                .help("Protection logic gate")
                .takes_value(true)
                .possible_values(&["or", "and", "xor", "OR", "AND", "XOR"])
                .default_value("or"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable debug logging"),
        )
        .get_matches();

    let verbose = matches.is_present("verbose");
    tracing_subscriber::fmt()
        .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let settings = settings_from_matches(&matches)?;
    let format = matches.value_of("format").unwrap_or("table").to_string();
    let refresh_ms: u64 = matches.value_of("refresh").unwrap_or(DEFAULT_REFRESH_MS).parse()?;

    println!("{}", "⚡ SmartAmp Monitor".bright_blue().bold());
    println!(
        "{} {}:{} ({}/#)",
        "Broker".dimmed(),
        settings.broker_host,
        settings.broker_port,
        settings.topic_prefix
    );
    println!("{}", "Type 'help' for operator commands.".dimmed());

    let ingest = TelemetryIngest::new(settings.topics(), settings.liveness_timeout);
    let bus = Arc::new(MqttBus::connect(&settings, ingest.clone()));
    let mut monitor = SafetyMonitor::with_ingest(Arc::clone(&bus), ingest.clone(), settings.protection);

    let (command_tx, mut command_rx) = mpsc::channel::<String>(16);
    tokio::spawn(read_operator_input(command_tx));

    let mut interval = time::interval(settings.tick_period);
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
    let ticks_per_refresh = (refresh_ms / settings.tick_period.as_millis().max(1) as u64).max(1);
    let mut ticks_since_refresh = ticks_per_refresh;
    let mut header_printed = false;
    let mut console_open = true;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                // The tick loop only runs while the broker link is up
                let connected = bus.is_connected();
                if connected && !monitor.get_state().running {
                    monitor.start();
                    header_printed = false;
                } else if !connected && monitor.get_state().running {
                    monitor.stop();
                    println!("{} {}", "🔌".yellow(), "Broker link down, waiting for reconnect...".yellow());
                }

                if let Some(report) = monitor.tick() {
                    if report.trip.was_due() {
                        print_trip(&report);
                    }

                    ticks_since_refresh += 1;
                    if ticks_since_refresh >= ticks_per_refresh {
                        ticks_since_refresh = 0;
                        if format == "table" && !header_printed {
                            print_table_header();
                            header_printed = true;
                        }
                        print_report(&report, &format);
                    }
                }
            }
            line = command_rx.recv(), if console_open => {
                let Some(line) = line else {
                    console_open = false;
                    continue;
                };
                if handle_operator_line(&mut monitor, &ingest, &line) {
                    break;
                }
                header_printed = false;
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    monitor.stop();
    bus.shutdown().await;
    println!("{}", "👋 SmartAmp Monitor stopped".bright_blue());

    Ok(())
}

fn numeric_arg<'a>(name: &'a str, value_name: &'a str, help: &'a str, default: &'a str) -> Arg<'a, 'a> {
    Arg::with_name(name)
        .long(name)
        .value_name(value_name)
        .help(help)
        .takes_value(true)
        .allow_hyphen_values(true)
        .default_value(default)
}

fn settings_from_matches(matches: &ArgMatches<'_>) -> Result<MonitorSettings, Box<dyn std::error::Error>> {
    let mut settings = MonitorSettings::default();

    if let Some(host) = matches.value_of("host") {
        settings.broker_host = host.to_string();
    }
    if let Some(port) = matches.value_of("port") {
        settings.broker_port = port.parse()?;
    }
    if let Some(prefix) = matches.value_of("topic-prefix") {
        settings.topic_prefix = prefix.to_string();
    }
    if let Some(client_id) = matches.value_of("client-id") {
        settings.client_id_prefix = client_id.to_string();
    }
    if let Some(timeout) = matches.value_of("timeout") {
        settings.liveness_timeout = parse_timeout(timeout)?;
    }

    let protection = &mut settings.protection;
    if let Some(v) = matches.value_of("max-temp") {
        protection.thresholds.max_temp = parse_value(TunableField::MaxTemp, v)?;
    }
    if let Some(v) = matches.value_of("max-current") {
        protection.thresholds.max_current = parse_value(TunableField::MaxCurrent, v)?;
    }
    if let Some(v) = matches.value_of("temp-offset") {
        protection.offsets.temp_offset = parse_value(TunableField::TempOffset, v)?;
    }
    if let Some(v) = matches.value_of("curr-offset") {
        protection.offsets.curr_offset = parse_value(TunableField::CurrOffset, v)?;
    }
    if let Some(gate) = matches.value_of("gate") {
        protection.gate = gate.parse::<GateMode>()?;
    }

    Ok(settings)
}

async fn read_operator_input(tx: mpsc::Sender<String>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).await.is_err() {
            break;
        }
    }
}

/// Returns true when the operator asked to quit.
fn handle_operator_line<B: MessageBus>(
    monitor: &mut SafetyMonitor<B>,
    ingest: &TelemetryIngest,
    line: &str,
) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return false;
    }
    if trimmed.eq_ignore_ascii_case("help") {
        println!("{}", HELP);
        return false;
    }

    match OperatorCommand::parse(trimmed) {
        Ok(OperatorCommand::Quit) => return true,
        Ok(OperatorCommand::Status) => print_status(monitor, ingest),
        Ok(command) => match monitor.handle_operator(command) {
            Ok(()) => println!("{} {}", "✅".green(), describe(command).bright_white()),
            Err(e) => println!("{} {}", "❌".red(), e.to_string().bright_red()),
        },
        Err(e) => {
            println!("{} {}", "❌".red(), e.to_string().bright_red());
            println!("{} Previous value kept. Type 'help' for commands.", "💡".yellow());
        }
    }
    false
}

fn describe(command: OperatorCommand) -> String {
    match command {
        OperatorCommand::Relay(relay) => format!("Relay command {} sent", relay),
        OperatorCommand::Set { field, value } => format!("{} set to {}", field.name(), value),
        OperatorCommand::Gate(gate) => format!("Protection gate set to {}", gate),
        OperatorCommand::ToggleSimulation => "Short-circuit simulation toggled".to_string(),
        OperatorCommand::Status | OperatorCommand::Quit => String::new(),
    }
}

fn print_table_header() {
    println!("{}", "┌──────────┬─────────┬─────────┬──────────┬──────┬──────┬──────┬─────────────────────┬───────────────┐".bright_white());
    println!("{}", "│ Time (s) │ Temp    │ Volt    │ Current  │ Gate │ OT   │ SC   │ Relay               │ Link          │".bright_white());
    println!("{}", "├──────────┼─────────┼─────────┼──────────┼──────┼──────┼──────┼─────────────────────┼───────────────┤".bright_white());
}

fn print_report(report: &TickReport, format: &str) {
    match format {
        "json" => match serde_json::to_string(report) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("{} Failed to serialize report: {}", "❌".red(), e),
        },
        "compact" => {
            let status = if report.decision.triggered {
                "TRIP".red()
            } else if report.online {
                "OK".green()
            } else {
                "WAIT".yellow()
            };
            println!(
                "[{}] {} | {:.1}°C | {:.2}V | {:.3}A | {} | {}",
                report.timestamp_ms / 1000,
                status,
                report.evaluation.calibrated_temp,
                report.evaluation.voltage,
                report.evaluation.calibrated_current,
                report.relay.label(),
                report.link.label()
            );
        }
        _ => print_table_row(report),
    }
}

fn print_table_row(report: &TickReport) {
    let eval = &report.evaluation;
    let limits = &report.config.thresholds;

    let time_str = format!("{:>8}", report.timestamp_ms / 1000);
    let temp_str = if eval.over_temp {
        format!("{:>5.1}°C", eval.calibrated_temp).red()
    } else {
        format!("{:>5.1}°C", eval.calibrated_temp).white()
    };
    let volt_str = format!("{:>6.2}V", eval.voltage);
    let curr_str = if eval.calibrated_current > limits.max_current {
        format!("{:>7.3}A", eval.calibrated_current).red()
    } else {
        format!("{:>7.3}A", eval.calibrated_current).white()
    };
    let gate_str = if report.decision.triggered {
        format!("{:>4}", report.config.gate).bright_red()
    } else {
        format!("{:>4}", report.config.gate).bright_cyan()
    };
    let flag = |on: bool| if on { "  ON".bright_red() } else { "  --".dimmed() };
    let relay_str = match report.relay {
        RelayStatus::Active => format!("{:<19}", report.relay.label()).bright_green(),
        RelayStatus::CutOff => format!("{:<19}", report.relay.label()).bright_red(),
        RelayStatus::Unknown => format!("{:<19}", report.relay.label()).dimmed(),
    };
    let link_str = match report.link {
        LinkStatus::Online => format!("{:<13}", report.link.label()).bright_green(),
        LinkStatus::DeviceSilent => format!("{:<13}", report.link.label()).bright_red(),
        LinkStatus::Disconnected => format!("{:<13}", report.link.label()).dimmed(),
    };

    println!(
        "│ {} │ {} │ {} │ {} │ {} │ {} │ {} │ {} │ {} │",
        time_str,
        temp_str,
        volt_str,
        curr_str,
        gate_str,
        flag(report.decision.over_temp),
        flag(report.decision.short_circuit),
        relay_str,
        link_str
    );
}

fn print_trip(report: &TickReport) {
    match &report.trip {
        TripOutcome::Sent => println!(
            "{} {}",
            "⚡".bright_red(),
            "Logic triggered -> relay OFF sent".bright_red().bold()
        ),
        TripOutcome::TransportUnavailable => println!(
            "{} {}",
            "⚠️".yellow(),
            "Logic triggered but broker is not connected; OFF not sent".yellow()
        ),
        TripOutcome::SendFailed(reason) => println!(
            "{} Logic triggered but OFF failed: {}",
            "⚠️".yellow(),
            reason.bright_red()
        ),
        TripOutcome::Idle => {}
    }
}

fn print_status<B: MessageBus>(monitor: &SafetyMonitor<B>, ingest: &TelemetryIngest) {
    let config = monitor.config().snapshot();
    let state = monitor.get_state();
    let ingest_stats = ingest.get_stats();
    let dispatch_stats = monitor.dispatcher().get_stats();

    println!("\n{}", "📊 Monitor Status".bright_blue().bold());
    println!("{}", "═════════════════".bright_blue());
    println!(
        "Limits: max temp {:.1}°C, max current {:.2}A | gate {}",
        config.thresholds.max_temp, config.thresholds.max_current, config.gate
    );
    println!(
        "Offsets: temp {:+.2}°C, current {:+.3}A",
        config.offsets.temp_offset, config.offsets.curr_offset
    );
    if config.simulate_short_circuit {
        println!("{}", "Short-circuit simulation ACTIVE".bright_red().bold());
    }
    println!(
        "Telemetry: {} accepted, {} rejected | ticks {}",
        ingest_stats.accepted, ingest_stats.decode_errors, state.tick_count
    );
    if let Some(status) = ingest.last_device_status() {
        println!("Device status: {}", status.bright_cyan());
    }

    let history = monitor.history();
    if let (Some(t), Some(c)) = (history.temperature_stats(), history.current_stats()) {
        println!(
            "Temp  min {:.1} / max {:.1} / avg {:.1} °C",
            t.min, t.max, t.avg
        );
        println!(
            "Curr  min {:.2} / max {:.2} / avg {:.2} A",
            c.min, c.max, c.avg
        );
    }

    println!(
        "Trips: {} sent, {} dropped | operator commands {}",
        dispatch_stats.trips_sent, dispatch_stats.trips_dropped, dispatch_stats.operator_commands_sent
    );
    for record in monitor.dispatcher().get_trip_log().iter().rev().take(5) {
        println!(
            "  [{:>8.1}s] {} gate, over_temp={}, short_circuit={}{}",
            record.timestamp_ms as f64 / 1000.0,
            record.gate,
            record.over_temp,
            record.short_circuit,
            if record.delivered { "" } else { " (not delivered)" }
        );
    }
    if let Some(error) = &state.last_error {
        println!("Last error: {}", error.bright_red());
    }
    println!();
}
