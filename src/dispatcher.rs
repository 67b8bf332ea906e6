use crate::bus::MessageBus;
use crate::config::GateMode;
use crate::error::BusError;
use crate::protocol::RelayCommand;
use crate::safety::ProtectionDecision;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const MAX_TRIP_RECORDS: usize = 32;

/// What a single `maybe_trip` call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripOutcome {
    /// Conditions for a trip were not met; nothing sent.
    Idle,
    /// `OFF` handed to the bus.
    Sent,
    /// Trip was due but the bus is down; dropped, not queued.
    TransportUnavailable,
    /// Trip was due but the bus refused the publish.
    SendFailed(String),
}

impl TripOutcome {
    pub fn was_due(&self) -> bool {
        !matches!(self, TripOutcome::Idle)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripRecord {
    /// Milliseconds since the monitor started.
    pub timestamp_ms: u64,
    pub over_temp: bool,
    pub short_circuit: bool,
    pub gate: GateMode,
    pub delivered: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DispatchStats {
    pub trips_sent: u32,
    pub trips_dropped: u32,
    pub operator_commands_sent: u32,
}

/// Sends relay commands to the device.
///
/// Deactivation is automatic, activation never is: `maybe_trip` can only
/// ever emit `OFF`, and `ON` goes out solely through `send_operator`.
pub struct CommandDispatcher<B: MessageBus> {
    bus: B,
    control_topic: String,
    trip_log: Vec<TripRecord, MAX_TRIP_RECORDS>,
    stats: DispatchStats,
}

impl<B: MessageBus> CommandDispatcher<B> {
    pub fn new(bus: B, control_topic: impl Into<String>) -> Self {
        Self {
            bus,
            control_topic: control_topic.into(),
            trip_log: Vec::new(),
            stats: DispatchStats::default(),
        }
    }

    /// Emits `OFF` iff the gate fired, the relay is on and the device is
    /// online. Fire-and-forget: no acknowledgment, no retry.
    pub fn maybe_trip(&mut self, triggered: bool, relay_on: bool, is_online: bool) -> TripOutcome {
        if !(triggered && relay_on && is_online) {
            return TripOutcome::Idle;
        }

        match self.publish(RelayCommand::Off) {
            Ok(()) => {
                self.stats.trips_sent = self.stats.trips_sent.saturating_add(1);
                TripOutcome::Sent
            }
            Err(BusError::TransportUnavailable) => {
                self.stats.trips_dropped = self.stats.trips_dropped.saturating_add(1);
                warn!("protective OFF dropped: message bus not connected");
                TripOutcome::TransportUnavailable
            }
            Err(e) => {
                self.stats.trips_dropped = self.stats.trips_dropped.saturating_add(1);
                warn!("protective OFF failed: {}", e);
                TripOutcome::SendFailed(e.to_string())
            }
        }
    }

    /// Runs `maybe_trip` for a decision and records the attempt.
    pub fn dispatch(
        &mut self,
        decision: ProtectionDecision,
        gate: GateMode,
        relay_on: bool,
        is_online: bool,
        timestamp_ms: u64,
    ) -> TripOutcome {
        let outcome = self.maybe_trip(decision.triggered, relay_on, is_online);

        if outcome.was_due() {
            info!(
                "⚡ Protection triggered ({} gate, over_temp={}, short_circuit={}) -> relay OFF",
                gate, decision.over_temp, decision.short_circuit
            );
            self.record_trip(TripRecord {
                timestamp_ms,
                over_temp: decision.over_temp,
                short_circuit: decision.short_circuit,
                gate,
                delivered: outcome == TripOutcome::Sent,
            });
        }

        outcome
    }

    /// Manual relay override from the operator.
    pub fn send_operator(&mut self, command: RelayCommand) -> Result<(), BusError> {
        self.publish(command)?;
        self.stats.operator_commands_sent = self.stats.operator_commands_sent.saturating_add(1);
        info!("Operator command sent: {}", command);
        Ok(())
    }

    fn publish(&self, command: RelayCommand) -> Result<(), BusError> {
        self.bus.publish(&self.control_topic, command.as_bytes())
    }

    fn record_trip(&mut self, record: TripRecord) {
        // Oldest entry makes room once the log is full
        if self.trip_log.is_full() {
            self.trip_log.remove(0);
        }

        let _ = self.trip_log.push(record);
    }

    pub fn get_trip_log(&self) -> &[TripRecord] {
        &self.trip_log
    }

    pub fn clear_trip_log(&mut self) {
        self.trip_log.clear();
    }

    pub fn get_stats(&self) -> &DispatchStats {
        &self.stats
    }

    pub fn get_bus(&self) -> &B {
        &self.bus
    }
}
