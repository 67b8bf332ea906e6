use clap::{App, Arg};
use rumqttc::{AsyncClient, Event, LastWill, MqttOptions, Packet, QoS};
use smartamp_monitor::config::{DEFAULT_BROKER_HOST, DEFAULT_KEEP_ALIVE};
use smartamp_monitor::protocol::{encode_telemetry, RelayCommand, Topics, DEFAULT_TOPIC_PREFIX};
use smartamp_monitor::Reading;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, error, info, warn};

const PUBLISH_PERIOD: Duration = Duration::from_millis(1000);
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

const AMBIENT_TEMP_C: f64 = 32.0;
const LOAD_TEMP_RISE_C: f64 = 12.0;
const SUPPLY_VOLTAGE_V: f64 = 12.0;
const LOAD_CURRENT_A: f64 = 1.2;
const SHORTED_CURRENT_A: f64 = 3.5;
const OVERHEAT_RAMP_C_PER_S: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    None,
    Overheat,
    Short,
}

/// Simple thermal and load model of the relay board.
#[derive(Debug)]
struct DeviceModel {
    relay_on: bool,
    temperature: f64,
    fault: Fault,
    step: u32,
}

impl DeviceModel {
    fn new(fault: Fault) -> Self {
        Self {
            relay_on: true,
            temperature: AMBIENT_TEMP_C,
            fault,
            step: 0,
        }
    }

    fn apply(&mut self, command: RelayCommand) {
        let relay_on = command == RelayCommand::On;
        if relay_on != self.relay_on {
            info!("🔁 Relay switched {}", command);
        }
        self.relay_on = relay_on;
    }

    /// Advances the model by one publish period.
    fn step(&mut self) -> Reading {
        self.step = self.step.wrapping_add(1);
        let wobble = (self.step as f64 * 0.7).sin();

        let target = if self.relay_on {
            AMBIENT_TEMP_C + LOAD_TEMP_RISE_C
        } else {
            AMBIENT_TEMP_C
        };
        // First-order approach to the target, plus a runaway ramp while overheating
        self.temperature += (target - self.temperature) * 0.2;
        if self.fault == Fault::Overheat && self.relay_on {
            self.temperature += OVERHEAT_RAMP_C_PER_S * PUBLISH_PERIOD.as_secs_f64();
        }

        let (voltage, current) = if self.relay_on {
            let load = match self.fault {
                Fault::Short => SHORTED_CURRENT_A,
                _ => LOAD_CURRENT_A,
            };
            (SUPPLY_VOLTAGE_V + wobble * 0.1, load + wobble * 0.05)
        } else {
            (0.0, 0.0)
        };

        Reading {
            temperature: self.temperature + wobble * 0.3,
            voltage,
            current,
            relay_on: self.relay_on,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("smartamp-device")
        .version("0.1.0")
        .author("SmartAmp Engineering Team")
        .about("🔌 Simulated SmartAmp relay board publishing telemetry over MQTT")
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
                .default_value("1883"),
        )
        .arg(
            Arg::with_name("topic-prefix")
                .long("topic-prefix")
                .value_name("PREFIX")
                .help("Device topic prefix")
                .takes_value(true)
                .default_value(DEFAULT_TOPIC_PREFIX),
        )
        .arg(
            Arg::with_name("fault")
                .long("fault")
                .value_name("FAULT")
                .help("Inject a fault into the simulated board")
                .takes_value(true)
                .possible_values(&["none", "overheat", "short"])
                .default_value("none"),
        )
        .get_matches();

    tracing_subscriber::fmt::init();

    let host = matches.value_of("host").unwrap_or(DEFAULT_BROKER_HOST).to_string();
    let port: u16 = matches.value_of("port").unwrap_or("1883").parse()?;
    let topics = Topics::with_prefix(matches.value_of("topic-prefix").unwrap_or(DEFAULT_TOPIC_PREFIX));
    let fault = match matches.value_of("fault") {
        Some("overheat") => Fault::Overheat,
        Some("short") => Fault::Short,
        _ => Fault::None,
    };

    println!("🔌 SmartAmp Device Simulator");
    println!("============================");
    println!("Publishing to {} on {}:{}", topics.data, host, port);

    let mut options = MqttOptions::new(format!("smartamp-device-{}", std::process::id()), host, port);
    options.set_keep_alive(DEFAULT_KEEP_ALIVE);
    options.set_clean_session(true);
    options.set_last_will(LastWill::new(topics.status.clone(), "offline", QoS::AtMostOnce, true));

    let (client, mut event_loop) = AsyncClient::new(options, 16);
    let (command_tx, mut command_rx) = mpsc::channel::<RelayCommand>(16);

    let event_client = client.clone();
    let event_topics = topics.clone();
    let events = tokio::spawn(async move {
        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("✅ Connected to MQTT broker");
                    if let Err(e) = event_client.try_subscribe(&event_topics.relay_control, QoS::AtMostOnce) {
                        warn!("Subscribe to {} failed: {}", event_topics.relay_control, e);
                    }
                    if let Err(e) = event_client.try_publish(&event_topics.status, QoS::AtMostOnce, true, "online") {
                        warn!("Failed to publish status: {}", e);
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if publish.topic != event_topics.relay_control {
                        continue;
                    }
                    match RelayCommand::from_payload(&publish.payload) {
                        Some(command) => {
                            info!("📨 Relay command: {}", command);
                            if command_tx.send(command).await.is_err() {
                                break;
                            }
                        }
                        None => warn!("Ignoring unknown relay payload {:?}", publish.payload),
                    }
                }
                Ok(event) => debug!("MQTT event: {:?}", event),
                Err(e) => {
                    error!("MQTT connection error: {}", e);
                    time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    });

    let mut model = DeviceModel::new(fault);
    if fault != Fault::None {
        warn!("⚠️  Fault injected: {:?}", fault);
    }

    let mut interval = time::interval(PUBLISH_PERIOD);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let reading = model.step();
                let payload = encode_telemetry(&reading)?;
                match client.try_publish(&topics.data, QoS::AtMostOnce, false, payload.clone()) {
                    Ok(()) => info!("📡 TELEMETRY: {}", payload),
                    Err(e) => warn!("Failed to publish telemetry: {}", e),
                }
            }
            Some(command) = command_rx.recv() => {
                model.apply(command);
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    if let Err(e) = client.publish(&topics.status, QoS::AtMostOnce, true, "offline").await {
        debug!("Failed to publish offline status: {}", e);
    }
    if let Err(e) = client.disconnect().await {
        debug!("Disconnect failed: {}", e);
    }
    time::sleep(Duration::from_millis(100)).await;
    events.abort();
    println!("🛑 SmartAmp Device Simulator stopped");

    Ok(())
}
