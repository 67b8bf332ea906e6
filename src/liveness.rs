//! Device liveness, derived from telemetry arrival rather than the broker link.
//!
//! A broker can report the connection as healthy while the device behind it
//! has stopped publishing. Liveness only cares about the latter: the device
//! is online iff an accepted reading arrived within the timeout.

use crate::telemetry::TelemetryBuffer;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEVICE_TIMEOUT: Duration = Duration::from_secs(5);

/// Combined view of transport and device state, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkStatus {
    /// Broker connection is down.
    Disconnected,
    /// Broker is reachable but the device has gone quiet.
    DeviceSilent,
    Online,
}

impl LinkStatus {
    pub fn label(self) -> &'static str {
        match self {
            LinkStatus::Disconnected => "DISCONNECTED",
            LinkStatus::DeviceSilent => "DEVICE SILENT",
            LinkStatus::Online => "ONLINE",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    buffer: TelemetryBuffer,
    timeout: Duration,
    transport_connected: Arc<AtomicBool>,
}

impl LivenessMonitor {
    pub fn new(buffer: TelemetryBuffer) -> Self {
        Self::with_timeout(buffer, DEVICE_TIMEOUT)
    }

    pub fn with_timeout(buffer: TelemetryBuffer, timeout: Duration) -> Self {
        Self {
            buffer,
            timeout,
            transport_connected: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_online(&self) -> bool {
        self.is_online_at(Instant::now())
    }

    /// No hysteresis: flips to offline the moment the timeout is exceeded
    /// and back on the next accepted reading.
    pub fn is_online_at(&self, now: Instant) -> bool {
        self.is_fresh(self.buffer.last_received_at(), now)
    }

    /// Liveness judged against an already taken receive timestamp.
    pub fn is_fresh(&self, received_at: Option<Instant>, now: Instant) -> bool {
        received_at.is_some_and(|at| now.saturating_duration_since(at) <= self.timeout)
    }

    /// Time since the last accepted reading, `None` if nothing arrived yet.
    pub fn silence_at(&self, now: Instant) -> Option<Duration> {
        self.buffer
            .last_received_at()
            .map(|received_at| now.saturating_duration_since(received_at))
    }

    pub fn set_transport_connected(&self, connected: bool) {
        self.transport_connected.store(connected, Ordering::Release);
    }

    pub fn is_transport_connected(&self) -> bool {
        self.transport_connected.load(Ordering::Acquire)
    }

    pub fn link_status_at(&self, now: Instant) -> LinkStatus {
        self.link_status_for(self.is_online_at(now))
    }

    pub fn link_status_for(&self, device_online: bool) -> LinkStatus {
        match (self.is_transport_connected(), device_online) {
            (false, _) => LinkStatus::Disconnected,
            (true, true) => LinkStatus::Online,
            (true, false) => LinkStatus::DeviceSilent,
        }
    }

    pub fn get_timeout(&self) -> Duration {
        self.timeout
    }
}
