use crate::error::DecodeError;
use crate::protocol::decode_telemetry;
use heapless::HistoryBuffer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Samples kept for the rolling statistics (one per evaluation tick).
pub const HISTORY_SAMPLES: usize = 60;

/// One decoded device reading.
///
/// Treated as an immutable value: a new delivery replaces it wholesale,
/// fields are never merged across deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub temperature: f64,
    pub voltage: f64,
    pub current: f64,
    pub relay_on: bool,
}

impl Default for Reading {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            voltage: 0.0,
            current: 0.0,
            relay_on: true,
        }
    }
}

/// A reading together with the instant it was accepted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySnapshot {
    pub reading: Reading,
    pub received_at: Instant,
}

/// Latest-value cell shared between the bus delivery task and the tick loop.
///
/// Cloning yields another handle to the same cell. Writers replace the
/// whole snapshot; readers get a copy taken under a single borrow, so a
/// reader can never observe fields from two different deliveries.
#[derive(Debug, Clone)]
pub struct TelemetryBuffer {
    cell: Arc<watch::Sender<Option<TelemetrySnapshot>>>,
}

impl TelemetryBuffer {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { cell: Arc::new(tx) }
    }

    /// Decodes `raw` and, on success, replaces the stored reading.
    pub fn update(&self, raw: &[u8]) -> Result<Reading, DecodeError> {
        self.update_at(raw, Instant::now())
    }

    pub fn update_at(&self, raw: &[u8], now: Instant) -> Result<Reading, DecodeError> {
        let reading = decode_telemetry(raw)?;
        self.store_at(reading, now);
        Ok(reading)
    }

    /// Stores an already decoded reading.
    pub fn store_at(&self, reading: Reading, now: Instant) {
        self.cell.send_replace(Some(TelemetrySnapshot {
            reading,
            received_at: now,
        }));
    }

    /// Most recent reading, or the neutral reading if nothing arrived yet.
    pub fn latest(&self) -> Reading {
        self.snapshot().map(|s| s.reading).unwrap_or_default()
    }

    pub fn snapshot(&self) -> Option<TelemetrySnapshot> {
        *self.cell.borrow()
    }

    pub fn last_received_at(&self) -> Option<Instant> {
        self.snapshot().map(|s| s.received_at)
    }

    /// Receiver that is notified on every accepted reading.
    pub fn subscribe(&self) -> watch::Receiver<Option<TelemetrySnapshot>> {
        self.cell.subscribe()
    }
}

impl Default for TelemetryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub samples: usize,
}

impl SeriesStats {
    fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let (min, max, sum) = samples.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0_f64),
            |(min, max, sum), &v| (min.min(v), max.max(v), sum + v),
        );

        Some(Self {
            min,
            max,
            avg: sum / samples.len() as f64,
            samples: samples.len(),
        })
    }
}

/// Rolling window of calibrated samples for the dashboard statistics.
#[derive(Debug)]
pub struct TelemetryHistory {
    temperature: HistoryBuffer<f64, HISTORY_SAMPLES>,
    current: HistoryBuffer<f64, HISTORY_SAMPLES>,
}

impl TelemetryHistory {
    pub fn new() -> Self {
        Self {
            temperature: HistoryBuffer::new(),
            current: HistoryBuffer::new(),
        }
    }

    pub fn record(&mut self, temperature: f64, current: f64) {
        self.temperature.write(temperature);
        self.current.write(current);
    }

    pub fn len(&self) -> usize {
        self.temperature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn temperature_stats(&self) -> Option<SeriesStats> {
        SeriesStats::from_samples(self.temperature.as_slice())
    }

    pub fn current_stats(&self) -> Option<SeriesStats> {
        SeriesStats::from_samples(self.current.as_slice())
    }

    /// Temperature samples, oldest first.
    pub fn temperature_series(&self) -> Vec<f64> {
        self.temperature.oldest_ordered().copied().collect()
    }

    /// Current samples, oldest first.
    pub fn current_series(&self) -> Vec<f64> {
        self.current.oldest_ordered().copied().collect()
    }

    pub fn clear(&mut self) {
        self.temperature.clear();
        self.current.clear();
    }
}

impl Default for TelemetryHistory {
    fn default() -> Self {
        Self::new()
    }
}
