//! Message bus seams.
//!
//! `MessageBus` is the outbound side: fire-and-forget publication of control
//! payloads. `MessageSink` is the inbound contract a bus adapter drives from
//! its own delivery task.
//!
//! `MemoryBus` is an in-process implementation that records every publish.
//! It never touches the network and is what the tests drive the monitor with.

use crate::error::BusError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

pub trait MessageBus: Send + Sync {
    /// Publishes without waiting for any acknowledgment. Must not block.
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError>;

    fn is_connected(&self) -> bool;
}

impl<B: MessageBus + ?Sized> MessageBus for Arc<B> {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
        (**self).publish(topic, payload)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

/// Receives deliveries from a bus adapter's background task.
pub trait MessageSink: Send + Sync + 'static {
    fn on_message(&self, topic: &str, payload: &[u8]);

    fn on_connection_change(&self, connected: bool);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl PublishedMessage {
    pub fn payload_str(&self) -> &str {
        core::str::from_utf8(&self.payload).unwrap_or("")
    }
}

#[derive(Debug, Default)]
struct MemoryBusInner {
    connected: AtomicBool,
    reject_publishes: AtomicBool,
    published: Mutex<Vec<PublishedMessage>>,
}

/// In-memory bus. Clones share the same record of published messages.
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    inner: Arc<MemoryBusInner>,
}

impl MemoryBus {
    /// Creates a bus that reports itself connected.
    pub fn connected() -> Self {
        let bus = Self::default();
        bus.set_connected(true);
        bus
    }

    pub fn set_connected(&self, connected: bool) {
        self.inner.connected.store(connected, Ordering::Release);
    }

    /// Makes every subsequent publish fail as a broker-side error would.
    pub fn set_reject_publishes(&self, reject: bool) {
        self.inner.reject_publishes.store(reject, Ordering::Release);
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.lock().clone()
    }

    pub fn published_on(&self, topic: &str) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|m| m.topic == topic)
            .map(|m| m.payload_str().to_string())
            .collect()
    }

    pub fn take_published(&self) -> Vec<PublishedMessage> {
        core::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PublishedMessage>> {
        // A panicking test thread must not hide the record from the others.
        self.inner
            .published
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl MessageBus for MemoryBus {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
        if !self.is_connected() {
            return Err(BusError::TransportUnavailable);
        }

        if self.inner.reject_publishes.load(Ordering::Acquire) {
            return Err(BusError::Publish {
                topic: topic.to_string(),
                reason: "rejected by memory bus".to_string(),
            });
        }

        self.lock().push(PublishedMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }
}
