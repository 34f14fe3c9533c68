//! Owns the recurring timer that drives sync-then-remind cycles.
//!
//! At most one timer task exists at a time. Replacing the schedule cancels
//! the old task and waits for it to be gone before the new one is spawned,
//! so there is never a moment with two live timers. Cycles are serialised
//! through `cycle_lock` and are never cancelled once started. A timer fire
//! while a cycle runs is skipped rather than queued.
use crate::modules::inactivity::InactivityMonitor;
use crate::modules::sync::SyncOrchestrator;
use async_trait::async_trait;
use cf_progress_libs::schedule::{CronSchedule, InvalidSchedule};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Run requested right after (re)configuration or on demand.
    Immediate,
    /// Timer fire for the given minute.
    Scheduled(DateTime<Utc>),
}

/// One full cycle: sync of the whole roster followed by the inactivity check.
#[async_trait]
pub trait Cycle: Send + Sync {
    async fn run(&self, trigger: Trigger);
}

pub struct ProgressCycle {
    orchestrator: Arc<SyncOrchestrator>,
    monitor: Arc<InactivityMonitor>,
}

impl ProgressCycle {
    pub fn new(orchestrator: Arc<SyncOrchestrator>, monitor: Arc<InactivityMonitor>) -> Self {
        Self {
            orchestrator,
            monitor,
        }
    }
}

#[async_trait]
impl Cycle for ProgressCycle {
    async fn run(&self, trigger: Trigger) {
        tracing::info!("Running cycle triggered by {:?}", trigger);
        // the inactivity phase runs even when the sync phase could not start
        if let Err(e) = self.orchestrator.run_sync_cycle().await {
            tracing::error!("sync phase aborted: {}", e);
        }
        if let Err(e) = self.monitor.check_and_notify().await {
            tracing::error!("inactivity phase aborted: {}", e);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Scheduled,
    Running,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleAck {
    pub schedule: String,
    pub next_run: Option<DateTime<Utc>>,
}

struct ActiveTimer {
    schedule: CronSchedule,
    handle: JoinHandle<()>,
}

pub struct Scheduler {
    cycle: Arc<dyn Cycle>,
    cycle_lock: Arc<Mutex<()>>,
    timer: Mutex<Option<ActiveTimer>>,
    // read back by the control surface; not persisted across restarts
    active_expression: RwLock<Option<String>>,
}

impl Scheduler {
    pub fn new(cycle: Arc<dyn Cycle>) -> Self {
        Self {
            cycle,
            cycle_lock: Arc::new(Mutex::new(())),
            timer: Mutex::new(None),
            active_expression: RwLock::new(None),
        }
    }

    /// Installs `expression` as the schedule and immediately runs one cycle.
    ///
    /// An invalid expression is rejected before anything changes, so the
    /// previous schedule stays active.
    pub async fn configure(&self, expression: &str) -> Result<ScheduleAck, InvalidSchedule> {
        let ack = self.install(expression).await?;
        self.run_now().await;
        Ok(ack)
    }

    /// Swaps the timer without running a cycle.
    pub async fn install(&self, expression: &str) -> Result<ScheduleAck, InvalidSchedule> {
        let schedule: CronSchedule = expression.parse().map_err(|e| {
            tracing::warn!("rejected schedule '{}': {}", expression, e);
            e
        })?;

        let mut timer = self.timer.lock().await;
        if let Some(previous) = timer.take() {
            cancel(previous).await;
        }

        let handle = tokio::spawn(run_timer(
            schedule.clone(),
            self.cycle.clone(),
            self.cycle_lock.clone(),
        ));
        let ack = ScheduleAck {
            schedule: schedule.to_string(),
            next_run: schedule.next_after(Utc::now()),
        };
        *timer = Some(ActiveTimer { schedule, handle });
        *self.active_expression.write().await = Some(ack.schedule.clone());

        tracing::info!(
            "Cycle scheduled at UTC '{}', next run at {:?}",
            ack.schedule,
            ack.next_run
        );
        Ok(ack)
    }

    /// Runs one cycle now, after any cycle that is already running.
    pub async fn run_now(&self) {
        run_cycle(&self.cycle, &self.cycle_lock, Trigger::Immediate).await;
    }

    pub async fn stop(&self) {
        let mut timer = self.timer.lock().await;
        if let Some(previous) = timer.take() {
            cancel(previous).await;
        }
        *self.active_expression.write().await = None;
    }

    pub async fn state(&self) -> SchedulerState {
        if self.cycle_lock.try_lock().is_err() {
            return SchedulerState::Running;
        }
        match *self.timer.lock().await {
            Some(_) => SchedulerState::Scheduled,
            None => SchedulerState::Idle,
        }
    }

    pub async fn active_expression(&self) -> Option<String> {
        self.active_expression.read().await.clone()
    }

    pub async fn next_run(&self) -> Option<DateTime<Utc>> {
        self.timer
            .lock()
            .await
            .as_ref()
            .and_then(|timer| timer.schedule.next_after(Utc::now()))
    }
}

async fn cancel(timer: ActiveTimer) {
    timer.handle.abort();
    // a cancelled task reports JoinError::Cancelled, which is the expected outcome
    if let Err(e) = timer.handle.await {
        if !e.is_cancelled() {
            tracing::error!("previous timer task ended abnormally: {}", e);
        }
    }
    tracing::info!("Previous schedule '{}' cancelled.", timer.schedule);
}

async fn run_cycle(cycle: &Arc<dyn Cycle>, cycle_lock: &Mutex<()>, trigger: Trigger) {
    let _running = cycle_lock.lock().await;
    cycle.run(trigger).await;
}

async fn run_timer(schedule: CronSchedule, cycle: Arc<dyn Cycle>, cycle_lock: Arc<Mutex<()>>) {
    let mut last_fire: Option<DateTime<Utc>> = None;
    loop {
        let now = Utc::now();
        let from = last_fire.map_or(now, |last_fire| last_fire.max(now));
        let next = match schedule.next_after(from) {
            Some(next) => next,
            None => {
                tracing::warn!("schedule '{}' never fires, timer stops.", schedule);
                return;
            }
        };

        let wait = (next - now).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;
        last_fire = Some(next);

        // a fire that finds a cycle in progress is dropped, so fires never queue up
        let running = match cycle_lock.clone().try_lock_owned() {
            Ok(running) => running,
            Err(_) => {
                tracing::warn!("Previous cycle is still running, skipping fire at {}.", next);
                continue;
            }
        };
        // spawned so that cancelling the timer never cancels a running cycle
        let cycle = cycle.clone();
        tokio::spawn(async move {
            cycle.run(Trigger::Scheduled(next)).await;
            drop(running);
        });
    }
}
