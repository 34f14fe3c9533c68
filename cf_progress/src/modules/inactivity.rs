use crate::modules::notifier::{Notifier, Reminder};
use crate::modules::store::{Store, StoreError};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;

pub const DEFAULT_WINDOW_DAYS: i64 = 7;
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// Parses a window length in days, accepting `1..=MAX_WINDOW_DAYS`.
pub fn parse_window_days(value: &str) -> Option<i64> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|days| (1..=MAX_WINDOW_DAYS).contains(days))
}

#[derive(Debug, Default)]
pub struct InactivityReport {
    pub checked: usize,
    pub notified: Vec<Reminder>,
    /// Reminders whose counter was incremented but whose delivery failed.
    pub undelivered: Vec<i64>,
    pub failed: Vec<(i64, String)>,
}

/// A student is inactive when the latest accepted submission is strictly
/// older than `cutoff`, or when there is none at all.
pub fn is_inactive(latest_accepted: Option<DateTime<Utc>>, cutoff: DateTime<Utc>) -> bool {
    match latest_accepted {
        Some(latest) => latest < cutoff,
        None => true,
    }
}

pub struct InactivityMonitor {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    window_days: i64,
}

impl InactivityMonitor {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, window_days: i64) -> Self {
        Self {
            store,
            notifier,
            window_days,
        }
    }

    pub async fn check_and_notify(&self) -> Result<InactivityReport, StoreError> {
        self.check_and_notify_at(Utc::now()).await
    }

    /// Runs the inactivity phase with `now` fixed for the whole roster scan.
    pub async fn check_and_notify_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<InactivityReport, StoreError> {
        let cutoff = now - Duration::days(self.window_days);
        tracing::info!("Checking for students inactive since {}.", cutoff);

        let candidates = self.store.list_reminder_candidates().await.map_err(|e| {
            tracing::error!("failed to read reminder candidates: {}", e);
            e
        })?;

        let mut report = InactivityReport::default();
        let mut seen: HashSet<i64> = HashSet::new();
        for student in candidates.iter() {
            // one reminder per student and cycle, whatever the candidate list holds
            if !seen.insert(student.id) || !student.accepts_reminders() {
                continue;
            }
            report.checked += 1;

            let latest = match self.store.latest_accepted_submission_time(student.id).await {
                Ok(latest) => latest,
                Err(e) => {
                    tracing::error!("failed to look up submissions of {}: {}", student.name, e);
                    report.failed.push((student.id, e.to_string()));
                    continue;
                }
            };
            if !is_inactive(latest, cutoff) {
                continue;
            }

            tracing::info!(
                "Student {} is inactive. Last accepted submission: {}",
                student.name,
                latest
                    .map(|latest| latest.to_rfc3339())
                    .unwrap_or_else(|| String::from("never"))
            );

            let reminder_count = match self.store.increment_reminder_count(student.id).await {
                Ok(count) => count,
                Err(e) => {
                    tracing::error!("failed to count reminder of {}: {}", student.name, e);
                    report.failed.push((student.id, e.to_string()));
                    continue;
                }
            };

            let reminder = Reminder {
                student_id: student.id,
                to: student.email.clone(),
                name: student.name.clone(),
                reminder_count,
                window_days: self.window_days,
            };
            // the counter tracks cycles, not deliveries, so it is not rolled back
            if let Err(e) = self.notifier.send_reminder(&reminder).await {
                tracing::error!(
                    "failed to send inactivity reminder to {}: {}",
                    reminder.to,
                    e
                );
                report.undelivered.push(student.id);
            }
            report.notified.push(reminder);
        }

        tracing::info!(
            "Finished checking for inactive students: {} checked, {} reminded.",
            report.checked,
            report.notified.len()
        );

        Ok(report)
    }
}
