//! # Smart Amplifier Monitor
//!
//! Telemetry ingestion and safety interlock for an MQTT-connected amplifier
//! relay board. The device publishes temperature, voltage, current and relay
//! state; the monitor calibrates the readings, evaluates two protection
//! thresholds through a selectable logic gate, and publishes a protective
//! `OFF` to the relay when the gate fires.
//!
//! ## Features
//!
//! - **Latest-value telemetry buffer**: readings replaced atomically, malformed payloads ignored
//! - **Liveness tracking**: device online/offline derived from data arrival, not the broker link
//! - **Calibration**: additive offsets with current clamped at zero
//! - **Protection gate**: over-temperature and short-circuit combined via OR / AND / XOR
//! - **Automatic shutdown only**: `OFF` is sent automatically, `ON` only on operator request
//! - **Rolling statistics** and a bounded trip log
//!
//! ## Quick Start
//!
//! ```rust
//! use smartamp_monitor::bus::{MemoryBus, MessageSink};
//! use smartamp_monitor::{MonitorSettings, SafetyMonitor};
//!
//! let bus = MemoryBus::connected();
//! let settings = MonitorSettings::default();
//! let mut monitor = SafetyMonitor::new(bus.clone(), &settings);
//! monitor.start();
//!
//! // The bus adapter delivers messages through the ingest handle
//! let ingest = monitor.ingest();
//! ingest.on_message("smartamp/data", br#"{"temp": 65.0, "curr": 1.0, "relay": true}"#);
//!
//! if let Some(report) = monitor.tick() {
//!     assert!(report.decision.triggered);
//! }
//! assert_eq!(bus.published_on("smartamp/control/relay"), vec!["OFF"]);
//! ```
//!
//! ## Architecture
//!
//! - [`telemetry`] - Reading, latest-value buffer and rolling history
//! - [`liveness`] - Device online/offline detection
//! - [`safety`] - Calibration, threshold evaluation and the protection gate
//! - [`dispatcher`] - Relay command emission and trip log
//! - [`monitor`] - Tick orchestration and the inbound ingest handle
//! - [`bus`] / [`mqtt`] - Message bus seams and the `rumqttc` adapter
//! - [`config`] / [`operator`] - Protection config, settings and console commands

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod bus;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod liveness;
pub mod monitor;
pub mod mqtt;
pub mod operator;
pub mod protocol;
pub mod safety;
pub mod telemetry;

// Re-export main public types for convenience
pub use config::{CalibrationOffsets, GateMode, MonitorSettings, ProtectionConfig, Thresholds};
pub use monitor::{SafetyMonitor, TelemetryIngest, TickReport};
pub use protocol::RelayCommand;
pub use safety::{combine, evaluate, Evaluation, ProtectionDecision};
pub use telemetry::{Reading, TelemetryBuffer};
