#![forbid(unsafe_code)]

pub mod alert;
pub mod checker;
pub mod config;
pub mod locator;
pub mod notify;
pub mod probe;
pub mod scheduler;

pub use alert::{alert_channel, Alert, AlertDispatcher};
pub use checker::{
    check_with_retry, BatchChecker, CheckReport, RetryPolicy, StreamResult, StreamSpec,
    StreamStatus, Verdict,
};
pub use config::CheckConfig;
pub use locator::{parse, LocatorError, ParsedAddress};
pub use notify::{
    build_client, Notifier, NotifyError, TelegramConfig, TelegramNotifier, WebhookConfig,
    WebhookNotifier, WebhookPayload,
};
pub use probe::{InactiveReason, ProbeError, ProbeOutcome, StreamProbe, UdpProbe};
pub use scheduler::{Scheduler, SchedulerState};
