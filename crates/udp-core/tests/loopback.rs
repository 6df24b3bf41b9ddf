//! End-to-end cycle with the real UDP probe against loopback traffic.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;

use udp_core::{alert_channel, BatchChecker, CheckConfig, StreamSpec, StreamStatus, UdpProbe};

fn free_port() -> u16 {
    std::net::UdpSocket::bind("0.0.0.0:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[tokio::test]
async fn live_and_silent_unicast_streams() {
    let live_port = free_port();
    let silent_port = free_port();

    let sender = tokio::spawn(async move {
        let tx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let packet = [0x47u8; 188];
        loop {
            let _ = tx.send_to(&packet, ("127.0.0.1", live_port)).await;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    });

    let config = CheckConfig::default()
        .with_timeout(500)
        .with_attempts(2)
        .with_retry_delay(50);
    let (tx, mut rx) = alert_channel();
    let checker = BatchChecker::new(
        vec![
            StreamSpec::new("live", format!("udp://127.0.0.1:{live_port}")),
            StreamSpec::new("silent", format!("udp://@127.0.0.1:{silent_port}")),
        ],
        config,
        Arc::new(UdpProbe::new()),
        Some(tx),
    );

    let report = checker.check_all().await;
    sender.abort();

    assert_eq!(report.get("live").unwrap().status, StreamStatus::Active);
    assert_eq!(report.get("silent").unwrap().status, StreamStatus::Inactive);
    assert_eq!(report.get("silent").unwrap().attempts, 2);

    let alert = rx.try_recv().unwrap();
    assert_eq!(alert.stream_names(), vec!["silent"]);
}

#[tokio::test]
async fn bind_only_mode_skips_data_wait() {
    let config = CheckConfig::default()
        .with_timeout(5_000)
        .with_require_data(false);
    let checker = BatchChecker::new(
        vec![StreamSpec::new("idle", format!("udp://127.0.0.1:{}", free_port()))],
        config,
        Arc::new(UdpProbe::new()),
        None,
    );

    let started = std::time::Instant::now();
    let report = checker.check_all().await;

    assert!(report.is_healthy());
    assert!(started.elapsed() < Duration::from_secs(5));
}
