use smartamp_monitor::liveness::{LinkStatus, LivenessMonitor, DEVICE_TIMEOUT};
use smartamp_monitor::{Reading, TelemetryBuffer};
use std::time::{Duration, Instant};

#[test]
fn test_offline_before_first_reading() {
    let buffer = TelemetryBuffer::new();
    let liveness = LivenessMonitor::new(buffer);

    assert_eq!(liveness.get_timeout(), Duration::from_secs(5));
    assert!(!liveness.is_online_at(Instant::now()));
    assert!(liveness.silence_at(Instant::now()).is_none());
}

#[test]
fn test_online_within_timeout() {
    let buffer = TelemetryBuffer::new();
    let liveness = LivenessMonitor::new(buffer.clone());
    let t0 = Instant::now();

    buffer.store_at(Reading::default(), t0);

    assert!(liveness.is_online_at(t0));
    assert!(liveness.is_online_at(t0 + Duration::from_millis(4900)));
    assert!(!liveness.is_online_at(t0 + Duration::from_millis(5100)));
}

#[test]
fn test_exact_timeout_still_online() {
    let buffer = TelemetryBuffer::new();
    let liveness = LivenessMonitor::new(buffer.clone());
    let t0 = Instant::now();

    buffer.store_at(Reading::default(), t0);
    assert!(liveness.is_online_at(t0 + DEVICE_TIMEOUT));
}

#[test]
fn test_new_reading_restores_liveness() {
    let buffer = TelemetryBuffer::new();
    let liveness = LivenessMonitor::new(buffer.clone());
    let t0 = Instant::now();

    buffer.store_at(Reading::default(), t0);
    let silent = t0 + Duration::from_secs(8);
    assert!(!liveness.is_online_at(silent));
    assert_eq!(liveness.silence_at(silent), Some(Duration::from_secs(8)));

    buffer.store_at(Reading::default(), silent);
    assert!(liveness.is_online_at(silent + Duration::from_millis(200)));
}

#[test]
fn test_malformed_payload_does_not_refresh_liveness() {
    let buffer = TelemetryBuffer::new();
    let liveness = LivenessMonitor::new(buffer.clone());
    let t0 = Instant::now();

    buffer.update_at(br#"{"temp": 20.0}"#, t0).expect("payload");
    let _ = buffer.update_at(b"{broken", t0 + Duration::from_secs(4));

    assert!(!liveness.is_online_at(t0 + Duration::from_secs(6)));
}

#[test]
fn test_custom_timeout() {
    let buffer = TelemetryBuffer::new();
    let liveness = LivenessMonitor::with_timeout(buffer.clone(), Duration::from_secs(1));
    let t0 = Instant::now();

    buffer.store_at(Reading::default(), t0);
    assert!(liveness.is_online_at(t0 + Duration::from_millis(900)));
    assert!(!liveness.is_online_at(t0 + Duration::from_millis(1100)));
}

#[test]
fn test_link_status_combines_transport_and_device() {
    let buffer = TelemetryBuffer::new();
    let liveness = LivenessMonitor::new(buffer.clone());
    let t0 = Instant::now();

    assert_eq!(liveness.link_status_at(t0), LinkStatus::Disconnected);

    liveness.set_transport_connected(true);
    assert_eq!(liveness.link_status_at(t0), LinkStatus::DeviceSilent);

    buffer.store_at(Reading::default(), t0);
    assert_eq!(liveness.link_status_at(t0), LinkStatus::Online);

    // Broker link alone never makes the device online
    assert_eq!(
        liveness.link_status_at(t0 + Duration::from_secs(10)),
        LinkStatus::DeviceSilent
    );

    liveness.set_transport_connected(false);
    assert_eq!(liveness.link_status_at(t0), LinkStatus::Disconnected);
    assert_eq!(LinkStatus::Online.label(), "ONLINE");
}

#[test]
fn test_clones_share_transport_flag() {
    let liveness = LivenessMonitor::new(TelemetryBuffer::new());
    let other = liveness.clone();

    other.set_transport_connected(true);
    assert!(liveness.is_transport_connected());
}
