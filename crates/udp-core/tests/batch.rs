//! Check-cycle scenarios driven by a scripted probe.
//!
//! Time is paused, so retry delays and probe timeouts resolve instantly while
//! still being measurable with `tokio::time::Instant`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use udp_core::{
    alert_channel, BatchChecker, CheckConfig, InactiveReason, ParsedAddress, ProbeOutcome,
    StreamProbe, StreamSpec, StreamStatus,
};

/// Per-port behaviour; unlisted ports time out. Records every call.
#[derive(Default)]
struct ScriptedProbe {
    active_ports: Vec<u16>,
    calls: Mutex<HashMap<String, u32>>,
}

impl ScriptedProbe {
    fn with_active(ports: &[u16]) -> Self {
        Self {
            active_ports: ports.to_vec(),
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn calls_for(&self, addr: &str) -> u32 {
        self.calls.lock().unwrap().get(addr).copied().unwrap_or(0)
    }

    fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl StreamProbe for ScriptedProbe {
    async fn probe(&self, addr: &ParsedAddress, timeout: Duration, _: bool) -> ProbeOutcome {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(addr.to_string())
            .or_insert(0) += 1;

        if self.active_ports.contains(&addr.port) {
            ProbeOutcome::Active
        } else {
            tokio::time::sleep(timeout).await;
            ProbeOutcome::Inactive(InactiveReason::Timeout)
        }
    }
}

fn reference_config() -> CheckConfig {
    CheckConfig::default()
        .with_timeout(10_000)
        .with_attempts(2)
        .with_retry_delay(2_000)
}

#[tokio::test(start_paused = true)]
async fn multicast_stream_timing_out_is_inactive_and_alerted() {
    let probe = Arc::new(ScriptedProbe::default());
    let (tx, mut rx) = alert_channel();
    let checker = BatchChecker::new(
        vec![StreamSpec::new("A", "udp://239.1.1.1:5000")],
        reference_config(),
        probe.clone(),
        Some(tx),
    );

    let start = Instant::now();
    let report = checker.check_all().await;

    let a = report.get("A").unwrap();
    assert_eq!(a.status, StreamStatus::Inactive);
    assert_eq!(a.detail.as_deref(), Some("no response or timeout"));
    assert_eq!(a.attempts, 2);
    assert_eq!(probe.calls_for("239.1.1.1:5000"), 2);
    // two 10s timeouts and one 2s delay
    assert_eq!(start.elapsed(), Duration::from_secs(22));

    let alert = rx.try_recv().expect("one alert");
    assert_eq!(alert.stream_names(), vec!["A"]);
    assert!(alert.message.contains("- A (INACTIVE): no response or timeout"));
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn invalid_locator_is_never_probed() {
    let probe = Arc::new(ScriptedProbe::default());
    let (tx, mut rx) = alert_channel();
    let checker = BatchChecker::new(
        vec![StreamSpec::new("B", "not-a-url")],
        reference_config(),
        probe.clone(),
        Some(tx),
    );

    let report = checker.check_all().await;

    let b = report.get("B").unwrap();
    assert_eq!(b.status, StreamStatus::Invalid);
    assert_eq!(b.detail.as_deref(), Some("invalid locator"));
    assert_eq!(b.attempts, 0);
    assert_eq!(probe.total_calls(), 0);

    let alert = rx.try_recv().expect("one alert");
    assert_eq!(alert.stream_names(), vec!["B"]);
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn mixed_batch_alerts_only_failing_stream() {
    let probe = Arc::new(ScriptedProbe::with_active(&[5000]));
    let (tx, mut rx) = alert_channel();
    let checker = BatchChecker::new(
        vec![
            StreamSpec::new("up", "udp://@239.1.1.1:5000"),
            StreamSpec::new("down", "udp://@239.1.1.2:5002"),
        ],
        reference_config(),
        probe.clone(),
        Some(tx),
    );

    let report = checker.check_all().await;

    assert_eq!(report.len(), 2);
    assert_eq!(report.get("up").unwrap().status, StreamStatus::Active);
    assert_eq!(report.get("up").unwrap().attempts, 1);
    assert_eq!(report.get("down").unwrap().status, StreamStatus::Inactive);
    assert_eq!(probe.calls_for("239.1.1.1:5000"), 1);
    assert_eq!(probe.calls_for("239.1.1.2:5002"), 2);

    let alert = rx.try_recv().expect("one alert");
    assert_eq!(alert.stream_names(), vec!["down"]);
    assert!(!alert.message.contains("up"));
}

#[tokio::test(start_paused = true)]
async fn report_has_one_result_per_stream_in_input_order() {
    let probe = Arc::new(ScriptedProbe::with_active(&[1, 3]));
    let streams: Vec<StreamSpec> = vec![
        StreamSpec::new("s3", "udp://10.0.0.3:3"),
        StreamSpec::new("s1", "udp://10.0.0.1:1"),
        StreamSpec::new("bad", "http://10.0.0.9:9"),
        StreamSpec::new("s2", "udp://10.0.0.2:2"),
        StreamSpec::new("noport", "udp://10.0.0.4"),
    ];
    let expected: Vec<String> = streams.iter().map(|s| s.name.clone()).collect();

    let checker = BatchChecker::new(streams, reference_config(), probe, None);
    let report = checker.check_all().await;

    assert_eq!(report.names().collect::<Vec<_>>(), expected);
    let statuses: Vec<StreamStatus> = report.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            StreamStatus::Active,
            StreamStatus::Active,
            StreamStatus::Invalid,
            StreamStatus::Inactive,
            StreamStatus::Invalid,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn all_active_batch_sends_nothing() {
    let probe = Arc::new(ScriptedProbe::with_active(&[5000, 5001, 5002]));
    let (tx, mut rx) = alert_channel();
    let checker = BatchChecker::new(
        vec![
            StreamSpec::new("a", "udp://239.1.1.1:5000"),
            StreamSpec::new("b", "udp://239.1.1.1:5001"),
            StreamSpec::new("c", "udp://192.168.1.10:5002"),
        ],
        reference_config(),
        probe,
        Some(tx),
    );

    let report = checker.check_all().await;

    assert!(report.is_healthy());
    assert!(report.down_streams().is_empty());
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn parallel_checks_overlap_in_time() {
    let probe = Arc::new(ScriptedProbe::default());
    let config = reference_config().with_max_concurrent(4);
    let checker = BatchChecker::new(
        (0..4)
            .map(|i| StreamSpec::new(format!("s{i}"), format!("udp://239.0.0.1:{}", 6000 + i)))
            .collect(),
        config,
        probe,
        None,
    );

    let start = Instant::now();
    let report = checker.check_all().await;

    assert_eq!(report.down_streams().len(), 4);
    // four streams in one wave: same latency as a single stream
    assert_eq!(start.elapsed(), Duration::from_secs(22));
}
