//! Periodic driver for the batch checker.
//!
//! One cycle runs immediately on start and then once per interval. Cycles run
//! inline in a single task, so they never overlap: ticks that fall due while a
//! cycle is still running are skipped. Stopping drops any in-flight cycle,
//! which closes its probe sockets; that cycle produces no report.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::checker::{log_report, BatchChecker, CheckReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Active,
    Stopping,
    Stopped,
}

impl SchedulerState {
    pub fn can_transition_to(self, target: SchedulerState) -> bool {
        matches!(
            (self, target),
            (SchedulerState::Idle, SchedulerState::Active)
                | (SchedulerState::Active, SchedulerState::Stopping)
                | (SchedulerState::Stopping, SchedulerState::Stopped)
                | (SchedulerState::Stopped, SchedulerState::Active)
        )
    }
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Active => write!(f, "active"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

pub struct Scheduler {
    checker: Arc<BatchChecker>,
    interval: Duration,
    state: Arc<RwLock<SchedulerState>>,
    last_report: Arc<RwLock<Option<CheckReport>>>,
    cycles: Arc<AtomicU64>,
    shutdown_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(checker: BatchChecker) -> Self {
        let interval = checker.config().interval;
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            checker: Arc::new(checker),
            interval,
            state: Arc::new(RwLock::new(SchedulerState::Idle)),
            last_report: Arc::new(RwLock::new(None)),
            cycles: Arc::new(AtomicU64::new(0)),
            shutdown_tx,
            handle: Mutex::new(None),
        }
    }

    pub async fn state(&self) -> SchedulerState {
        *self.state.read().await
    }

    /// Completed cycles since construction.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    pub async fn last_report(&self) -> Option<CheckReport> {
        self.last_report.read().await.clone()
    }

    pub async fn start(&self) -> Result<(), String> {
        {
            let mut state = self.state.write().await;
            if *state == SchedulerState::Active {
                return Ok(());
            }
            if !state.can_transition_to(SchedulerState::Active) {
                return Err(format!("Cannot start scheduler while {}", *state));
            }
            *state = SchedulerState::Active;
        }

        self.shutdown_tx.send_replace(false);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let worst_case = self
            .checker
            .config()
            .worst_case_cycle(self.checker.streams().len());
        if worst_case > self.interval {
            warn!(
                interval_secs = self.interval.as_secs(),
                worst_case_secs = worst_case.as_secs(),
                "Check interval is shorter than the worst-case cycle; slow cycles will skip ticks"
            );
        }

        info!(
            streams = self.checker.streams().len(),
            interval_secs = self.interval.as_secs(),
            "Starting scheduler"
        );

        let checker = Arc::clone(&self.checker);
        let state = Arc::clone(&self.state);
        let last_report = Arc::clone(&self.last_report);
        let cycles = Arc::clone(&self.cycles);
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown_rx.changed() => break,
                }

                info!("Starting scheduled UDP stream check");
                tokio::select! {
                    report = checker.check_all() => {
                        log_report(&report);
                        *last_report.write().await = Some(report);
                        cycles.fetch_add(1, Ordering::SeqCst);
                    }
                    _ = shutdown_rx.changed() => {
                        warn!("Check cycle interrupted by shutdown; report incomplete");
                        break;
                    }
                }
            }

            *state.write().await = SchedulerState::Stopped;
            info!("Scheduler stopped");
        });

        *self.handle.lock().await = Some(handle);
        Ok(())
    }

    /// Signals the loop to stop and waits for it to finish.
    pub async fn stop(&self) {
        {
            let mut state = self.state.write().await;
            if *state != SchedulerState::Active {
                return;
            }
            *state = SchedulerState::Stopping;
        }
        info!("Stopping scheduler");
        self.shutdown_tx.send_replace(true);

        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Scheduler task ended abnormally");
                *self.state.write().await = SchedulerState::Stopped;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_state_transitions() {
        assert!(SchedulerState::Idle.can_transition_to(SchedulerState::Active));
        assert!(SchedulerState::Active.can_transition_to(SchedulerState::Stopping));
        assert!(SchedulerState::Stopping.can_transition_to(SchedulerState::Stopped));
        assert!(SchedulerState::Stopped.can_transition_to(SchedulerState::Active));
    }

    #[test]
    fn invalid_state_transitions() {
        assert!(!SchedulerState::Idle.can_transition_to(SchedulerState::Stopping));
        assert!(!SchedulerState::Idle.can_transition_to(SchedulerState::Stopped));
        assert!(!SchedulerState::Active.can_transition_to(SchedulerState::Idle));
        assert!(!SchedulerState::Active.can_transition_to(SchedulerState::Active));
        assert!(!SchedulerState::Stopping.can_transition_to(SchedulerState::Active));
    }
}
