use crate::bus::{MessageBus, MessageSink};
use crate::config::{ConfigStore, MonitorSettings, ProtectionConfig};
use crate::dispatcher::{CommandDispatcher, TripOutcome};
use crate::error::MonitorError;
use crate::liveness::{LinkStatus, LivenessMonitor};
use crate::operator::OperatorCommand;
use crate::protocol::{InboundKind, Topics};
use crate::safety::{assess, Evaluation, ProtectionDecision, RelayStatus};
use crate::telemetry::{Reading, SeriesStats, TelemetryBuffer, TelemetryHistory};
use serde::{Deserialize, Serialize};
use static_assertions::assert_impl_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct IngestCounters {
    accepted: AtomicU64,
    decode_errors: AtomicU64,
    ignored: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub accepted: u64,
    pub decode_errors: u64,
    pub ignored: u64,
}

/// Inbound side of the monitor, handed to the bus adapter.
///
/// Runs on the adapter's delivery task. It only ever replaces whole values
/// in latest-value cells, so it never contends with the tick loop.
#[derive(Debug, Clone)]
pub struct TelemetryIngest {
    topics: Topics,
    buffer: TelemetryBuffer,
    liveness: LivenessMonitor,
    device_status: Arc<watch::Sender<Option<String>>>,
    counters: Arc<IngestCounters>,
}

assert_impl_all!(TelemetryIngest: MessageSink, Send, Sync, Clone);
assert_impl_all!(TelemetryBuffer: Send, Sync);
assert_impl_all!(ConfigStore: Send, Sync);

impl TelemetryIngest {
    pub fn new(topics: Topics, liveness_timeout: Duration) -> Self {
        let buffer = TelemetryBuffer::new();
        let liveness = LivenessMonitor::with_timeout(buffer.clone(), liveness_timeout);
        let (status_tx, _status_rx) = watch::channel(None);

        Self {
            topics,
            buffer,
            liveness,
            device_status: Arc::new(status_tx),
            counters: Arc::new(IngestCounters::default()),
        }
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn get_stats(&self) -> IngestStats {
        IngestStats {
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            decode_errors: self.counters.decode_errors.load(Ordering::Relaxed),
            ignored: self.counters.ignored.load(Ordering::Relaxed),
        }
    }

    pub fn last_device_status(&self) -> Option<String> {
        self.device_status.borrow().clone()
    }

    pub fn on_message_at(&self, topic: &str, payload: &[u8], now: Instant) {
        match InboundKind::classify(&self.topics, topic) {
            InboundKind::Telemetry => match self.buffer.update_at(payload, now) {
                Ok(_) => {
                    self.counters.accepted.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.counters.decode_errors.fetch_add(1, Ordering::Relaxed);
                    warn!("Discarding telemetry on {}: {}", topic, e);
                }
            },
            InboundKind::Status => {
                let status = String::from_utf8_lossy(payload).trim().to_string();
                debug!("Device status: {}", status);
                self.device_status.send_replace(Some(status));
            }
            InboundKind::Unknown => {
                self.counters.ignored.fetch_add(1, Ordering::Relaxed);
                debug!("Ignoring message on unexpected topic {}", topic);
            }
        }
    }
}

impl MessageSink for TelemetryIngest {
    fn on_message(&self, topic: &str, payload: &[u8]) {
        self.on_message_at(topic, payload, Instant::now());
    }

    fn on_connection_change(&self, connected: bool) {
        if connected != self.liveness.is_transport_connected() {
            info!("Message bus {}", if connected { "connected" } else { "disconnected" });
        }
        self.liveness.set_transport_connected(connected);
    }
}

/// Everything produced by one evaluation tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    pub timestamp_ms: u64,
    pub reading: Reading,
    pub evaluation: Evaluation,
    pub decision: ProtectionDecision,
    pub config: ProtectionConfig,
    pub online: bool,
    pub link: LinkStatus,
    pub relay: RelayStatus,
    pub trip: TripOutcome,
    pub seconds_since_reading: Option<f64>,
    pub temperature_stats: Option<SeriesStats>,
    pub current_stats: Option<SeriesStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorState {
    pub running: bool,
    pub tick_count: u64,
    pub uptime_ms: u64,
    pub last_error: Option<String>,
}

/// Telemetry ingestion and safety interlock.
///
/// Each `tick` reads exactly one telemetry snapshot and one config
/// snapshot, evaluates them, and dispatches a protective `OFF` if needed.
pub struct SafetyMonitor<B: MessageBus> {
    buffer: TelemetryBuffer,
    liveness: LivenessMonitor,
    config: ConfigStore,
    dispatcher: CommandDispatcher<B>,
    history: TelemetryHistory,
    ingest: TelemetryIngest,
    state: MonitorState,
    /// Set by the first `start`; trip timestamps are measured from it.
    start_time: Option<Instant>,
}

impl<B: MessageBus> SafetyMonitor<B> {
    pub fn new(bus: B, settings: &MonitorSettings) -> Self {
        let ingest = TelemetryIngest::new(settings.topics(), settings.liveness_timeout);
        Self::with_ingest(bus, ingest, settings.protection)
    }

    /// Builds the monitor around an ingest handle that may already be
    /// wired into a bus adapter.
    pub fn with_ingest(bus: B, ingest: TelemetryIngest, protection: ProtectionConfig) -> Self {
        Self {
            buffer: ingest.buffer.clone(),
            liveness: ingest.liveness.clone(),
            config: ConfigStore::new(protection),
            dispatcher: CommandDispatcher::new(bus, ingest.topics.relay_control.clone()),
            history: TelemetryHistory::new(),
            ingest,
            state: MonitorState::default(),
            start_time: None,
        }
    }

    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    /// Starts or resumes ticking. The clock is kept across stop/start
    /// cycles so trip log timestamps stay monotonic.
    pub fn start_at(&mut self, now: Instant) {
        self.start_time.get_or_insert(now);
        self.state.running = true;
        info!("🔌 Safety monitor started");
    }

    /// Stops ticking. Buffered telemetry and history are kept so a restart
    /// resumes where it left off.
    pub fn stop(&mut self) {
        self.state.running = false;
        info!("🛑 Safety monitor stopped");
    }

    pub fn tick(&mut self) -> Option<TickReport> {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> Option<TickReport> {
        if !self.state.running {
            return None;
        }

        // One snapshot of each per tick; never re-read mid-evaluation.
        let snapshot = self.buffer.snapshot();
        let config = self.config.snapshot();

        let reading = snapshot.map(|s| s.reading).unwrap_or_default();
        let online = self
            .liveness
            .is_fresh(snapshot.map(|s| s.received_at), now);
        let (evaluation, decision) = assess(&reading, &config);

        self.history
            .record(evaluation.calibrated_temp, evaluation.calibrated_current);

        let epoch = *self.start_time.get_or_insert(now);
        let timestamp_ms = now.saturating_duration_since(epoch).as_millis() as u64;
        let trip = self.dispatcher.dispatch(
            decision,
            config.gate,
            reading.relay_on,
            online,
            timestamp_ms,
        );

        match &trip {
            TripOutcome::TransportUnavailable => {
                self.state.last_error = Some("Protective OFF dropped: bus not connected".to_string());
            }
            TripOutcome::SendFailed(reason) => {
                self.state.last_error = Some(format!("Protective OFF failed: {}", reason));
            }
            _ => {}
        }

        self.state.tick_count = self.state.tick_count.saturating_add(1);
        self.state.uptime_ms = timestamp_ms;

        Some(TickReport {
            timestamp_ms,
            reading,
            evaluation,
            decision,
            config,
            online,
            link: self.liveness.link_status_for(online),
            relay: RelayStatus::derive(reading.relay_on, online),
            trip,
            seconds_since_reading: snapshot
                .map(|s| now.saturating_duration_since(s.received_at).as_secs_f64()),
            temperature_stats: self.history.temperature_stats(),
            current_stats: self.history.current_stats(),
        })
    }

    /// Applies an operator command. `Status` and `Quit` are handled by the
    /// caller and are no-ops here.
    pub fn handle_operator(&mut self, command: OperatorCommand) -> Result<(), MonitorError> {
        match command {
            OperatorCommand::Relay(relay) => {
                if let Err(e) = self.dispatcher.send_operator(relay) {
                    self.state.last_error = Some(format!("Operator {} not sent: {}", relay, e));
                    return Err(e.into());
                }
            }
            OperatorCommand::Set { field, value } => {
                self.config.set_value(field, value)?;
                info!("{} set to {}", field.name(), value);
            }
            OperatorCommand::Gate(gate) => {
                self.config.set_gate(gate);
                info!("Protection gate set to {}", gate);
            }
            OperatorCommand::ToggleSimulation => {
                let enabled = self.config.toggle_simulation();
                warn!(
                    "Short-circuit simulation {}",
                    if enabled { "ENABLED" } else { "disabled" }
                );
            }
            OperatorCommand::Status | OperatorCommand::Quit => {}
        }
        Ok(())
    }

    /// Handle for the bus adapter's delivery task.
    pub fn ingest(&self) -> TelemetryIngest {
        self.ingest.clone()
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn liveness(&self) -> &LivenessMonitor {
        &self.liveness
    }

    pub fn buffer(&self) -> &TelemetryBuffer {
        &self.buffer
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<B> {
        &self.dispatcher
    }

    pub fn history(&self) -> &TelemetryHistory {
        &self.history
    }

    pub fn get_state(&self) -> &MonitorState {
        &self.state
    }
}
