//! Daily birthday notifier
//!
//! Each job sleeps until its wall-clock time in the configured timezone,
//! looks up the birthdays `offset` days away and pushes one message per
//! match. Jobs are independent tasks and stop when the shutdown flag flips.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::features::birthdays::messages;
use crate::features::birthdays::{BirthdayStore, Outbound, Transport};

/// A daily firing: at `hour:minute` local time, announce birthdays `offset` days from today
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyJob {
    pub hour: u32,
    pub minute: u32,
    pub offset: i64,
}

impl NotifyJob {
    pub const fn new(hour: u32, minute: u32, offset: i64) -> Self {
        Self { hour, minute, offset }
    }

    pub fn at(&self) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0)
    }
}

/// Yesterday's follow-up at noon, today at midnight, tomorrow at 20:00, next week at 10:00
pub const DEFAULT_JOBS: [NotifyJob; 4] = [
    NotifyJob::new(12, 0, -1),
    NotifyJob::new(0, 0, 0),
    NotifyJob::new(20, 0, 1),
    NotifyJob::new(10, 0, 7),
];

/// Calendar day `offset` days from `today`
pub fn due_on(today: NaiveDate, offset: i64) -> Option<NaiveDate> {
    let days = Days::new(offset.unsigned_abs());
    if offset >= 0 {
        today.checked_add_days(days)
    } else {
        today.checked_sub_days(days)
    }
}

/// Next instant strictly after `now` whose local time is `at`.
/// Skips days where `at` does not exist locally.
pub fn next_fire(now: &DateTime<Tz>, at: NaiveTime) -> Option<DateTime<Tz>> {
    let timezone = now.timezone();
    let mut date = now.date_naive();
    for _ in 0..3 {
        if let Some(candidate) = timezone.from_local_datetime(&date.and_time(at)).earliest() {
            if candidate > *now {
                return Some(candidate);
            }
        }
        date = date.succ_opt()?;
    }
    None
}

pub struct BirthdayNotifier {
    store: Arc<dyn BirthdayStore>,
    transport: Arc<dyn Transport>,
    timezone: Tz,
    jobs: Vec<NotifyJob>,
}

impl BirthdayNotifier {
    pub fn new(store: Arc<dyn BirthdayStore>, transport: Arc<dyn Transport>, timezone: Tz) -> Self {
        Self {
            store,
            transport,
            timezone,
            jobs: DEFAULT_JOBS.to_vec(),
        }
    }

    pub fn with_jobs(mut self, jobs: Vec<NotifyJob>) -> Self {
        self.jobs = jobs;
        self
    }

    /// Send reminders for birthdays `offset` days after `today`. Returns how many were delivered.
    pub async fn notify(&self, today: NaiveDate, offset: i64) -> Result<usize> {
        let target = due_on(today, offset)
            .ok_or_else(|| anyhow!("{today} {offset:+} days is out of range"))?;
        let birthdays = self
            .store
            .find_on_calendar_day(target.day(), target.month())
            .await?;
        debug!(
            "🔍 {} birthdays on {} ({today} {offset:+})",
            birthdays.len(),
            target.format("%m-%d")
        );

        let mut sent = 0;
        for birthday in &birthdays {
            let message = Outbound::text(
                birthday.conversation_id,
                messages::notification(birthday, offset),
            );
            match self.transport.deliver(message).await {
                Ok(_) => sent += 1,
                Err(e) => warn!(
                    "⚠️ Failed to send reminder for '{}' to {}: {e}",
                    birthday.name, birthday.conversation_id
                ),
            }
        }
        Ok(sent)
    }

    /// Start one task per job. Tasks exit once `shutdown` becomes true or its sender is dropped.
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        self.jobs
            .iter()
            .map(|job| {
                let notifier = Arc::clone(&self);
                let shutdown = shutdown.clone();
                let job = *job;
                tokio::spawn(async move { notifier.run_job(job, shutdown).await })
            })
            .collect()
    }

    async fn run_job(&self, job: NotifyJob, mut shutdown: watch::Receiver<bool>) {
        let Some(at) = job.at() else {
            error!("❌ Invalid reminder time {:02}:{:02}", job.hour, job.minute);
            return;
        };
        info!(
            "⏰ Birthday reminders ({:+} days) scheduled daily at {at} {}",
            job.offset, self.timezone
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let now = Utc::now().with_timezone(&self.timezone);
            let Some(fire_at) = next_fire(&now, at) else {
                error!("❌ No upcoming {at} in {} for reminder job", self.timezone);
                return;
            };
            let wait = (fire_at - now).to_std().unwrap_or_default();
            debug!("💤 Next {:+} day reminder run at {fire_at}", job.offset);

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            match self.notify(fire_at.date_naive(), job.offset).await {
                Ok(sent) => info!("🎂 Sent {sent} reminders ({:+} days)", job.offset),
                Err(e) => error!("❌ Reminder run ({:+} days) failed: {e:#}", job.offset),
            }
        }

        info!("🛑 Birthday reminder job ({:+} days) stopped", job.offset);
    }
}
