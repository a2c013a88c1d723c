//! Recurring task scheduling.
//!
//! The host fires scheduled tasks cooperatively: nothing runs on a timer,
//! instead some later request polls the scheduler with the current time and
//! runs whatever is due. A task therefore fires no earlier than its due time,
//! with no upper bound on the delay.

use crate::errors::{LicenseError, LicenseResult};

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// How often a scheduled task recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Recurrence {
    #[serde(rename = "hourly")]
    Hourly,
    #[serde(rename = "twicedaily")]
    TwiceDaily,
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "weekly")]
    Weekly,
}

impl Recurrence {
    /// Interval between two runs.
    pub fn interval(&self) -> Duration {
        match self {
            Recurrence::Hourly => Duration::hours(1),
            Recurrence::TwiceDaily => Duration::hours(12),
            Recurrence::Daily => Duration::days(1),
            Recurrence::Weekly => Duration::weeks(1),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::Hourly => "hourly",
            Recurrence::TwiceDaily => "twicedaily",
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
        }
    }
}

/// Host task scheduler.
pub trait Scheduler: Send + Sync {
    /// Next due time of a task, `None` when it is not scheduled.
    fn next_scheduled(&self, hook: &str) -> Option<DateTime<Utc>>;

    /// Schedule a recurring task whose first run is due at `first_run`.
    fn schedule_event(
        &self,
        first_run: DateTime<Utc>,
        recurrence: Recurrence,
        hook: &str,
    ) -> LicenseResult<()>;

    /// Remove a task; returns whether it was scheduled.
    fn clear_scheduled(&self, hook: &str) -> bool;

    /// Hooks due at `now`. Each returned task is rescheduled by its recurrence.
    fn take_due(&self, now: DateTime<Utc>) -> Vec<String>;
}

/// Schedule an event unless one is already registered under `hook`.
///
/// Returns `true` when a new event was scheduled.
pub fn ensure_scheduled(
    scheduler: &dyn Scheduler,
    hook: &str,
    recurrence: Recurrence,
    first_run: DateTime<Utc>,
) -> LicenseResult<bool> {
    if scheduler.next_scheduled(hook).is_some() {
        return Ok(false);
    }
    scheduler.schedule_event(first_run, recurrence, hook)?;
    Ok(true)
}

#[derive(Debug, Clone)]
struct ScheduledEvent {
    next_run: DateTime<Utc>,
    recurrence: Recurrence,
}

/// In-process cooperative scheduler.
#[derive(Debug, Default)]
pub struct CooperativeScheduler {
    events: Mutex<HashMap<String, ScheduledEvent>>,
}

impl CooperativeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of scheduled tasks.
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Scheduler for CooperativeScheduler {
    fn next_scheduled(&self, hook: &str) -> Option<DateTime<Utc>> {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.get(hook).map(|e| e.next_run)
    }

    fn schedule_event(
        &self,
        first_run: DateTime<Utc>,
        recurrence: Recurrence,
        hook: &str,
    ) -> LicenseResult<()> {
        if hook.is_empty() {
            return Err(LicenseError::SchedulerError(
                "cannot schedule a task without a name".to_string(),
            ));
        }

        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.insert(
            hook.to_string(),
            ScheduledEvent {
                next_run: first_run,
                recurrence,
            },
        );
        debug!(
            "Scheduled {} ({}), first run at {}",
            hook,
            recurrence.as_str(),
            first_run
        );
        Ok(())
    }

    fn clear_scheduled(&self, hook: &str) -> bool {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.remove(hook).is_some()
    }

    fn take_due(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        let mut due: Vec<String> = Vec::new();

        for (hook, event) in events.iter_mut() {
            if event.next_run <= now {
                // Missed runs collapse into one; the next run is an interval from now.
                event.next_run = now + event.recurrence.interval();
                due.push(hook.clone());
            }
        }

        due.sort();
        due
    }
}
