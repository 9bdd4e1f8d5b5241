use crate::error::AppResult;
use crate::reminder::{Reminder, RepeatUpdate, TriggerResponse, TriggerStatus};
use crate::scheduler::Scheduler;
use crate::storage::ReminderStore;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Where a reminder ended up after a trigger outcome was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Completed and retired; no check remains
    Completed,
    /// Moved to a later due time and re-armed
    Rescheduled(DateTime<Utc>),
    /// Unchanged and re-armed to try again
    Retrying,
    /// Reminder no longer exists locally (or the outcome was stray)
    Ignored,
}

/// Guards the "fire" request so at most one is outstanding per reminder.
#[derive(Debug, Default)]
pub struct TriggerCoordinator {
    in_flight: HashSet<i64>,
}

impl TriggerCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id` for a fire request. Returns false, with no side effects, if a request for
    /// it is already outstanding; the caller only sends a request on true.
    pub fn invoke(&mut self, id: i64) -> bool {
        self.in_flight.insert(id)
    }

    pub fn is_in_flight(&self, id: i64) -> bool {
        self.in_flight.contains(&id)
    }

    pub fn in_flight(&self) -> &HashSet<i64> {
        &self.in_flight
    }

    /// Apply the backend's answer to a fire request and re-arm or retire the reminder.
    ///
    /// Every path leaves the reminder either completed or armed exactly once.
    pub fn resolve(
        &mut self,
        id: i64,
        result: AppResult<TriggerResponse>,
        store: &mut ReminderStore,
        scheduler: &mut Scheduler,
        now: DateTime<Utc>,
    ) -> TriggerOutcome {
        if !self.in_flight.remove(&id) {
            log::debug!("Dropping trigger outcome for reminder {} that was not in flight", id);
            return TriggerOutcome::Ignored;
        }

        let Some(reminder) = store.get_mut(id) else {
            log::debug!("Reminder {} was deleted while its trigger was in flight", id);
            scheduler.disarm(id);
            return TriggerOutcome::Ignored;
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Trigger for reminder {} failed: {}, retrying", id, e);
                return retry_unless_completed(reminder.is_completed, id, scheduler, now);
            }
        };

        match response.status {
            TriggerStatus::Sent => {
                reminder.is_completed = true;
                reminder.sent_at.get_or_insert(now);
                scheduler.disarm(id);
                log::info!("Reminder {} sent", id);
                TriggerOutcome::Completed
            }
            TriggerStatus::AlreadyCompleted => {
                reminder.is_completed = true;
                reminder.sent_at.get_or_insert(now);
                scheduler.disarm(id);
                log::info!("Reminder {} was already completed on the server", id);
                TriggerOutcome::Completed
            }
            TriggerStatus::Repeated => {
                let previous = reminder.due_time;
                let next_due = match response.reminder {
                    Some(update) => apply_repeat(reminder, update),
                    None => {
                        reminder.repeat_count += 1;
                        reminder.next_repeat_due()
                    }
                };
                // due_time never moves backwards across a repeat
                reminder.due_time = if next_due > previous {
                    next_due
                } else {
                    reminder.next_repeat_due()
                };
                reminder.is_completed = false;
                scheduler.arm(reminder, now);
                log::info!(
                    "Reminder {} repeated ({}/{}), next due {}",
                    id,
                    reminder.repeat_count,
                    reminder.max_repeats,
                    reminder.due_time
                );
                TriggerOutcome::Rescheduled(reminder.due_time)
            }
            TriggerStatus::AlreadySending | TriggerStatus::NotDueYet => {
                log::debug!("Reminder {} deferred by server: {:?}", id, response.status);
                retry_unless_completed(reminder.is_completed, id, scheduler, now)
            }
        }
    }
}

/// Copy the repeat fields from the payload; returns the proposed next due time.
fn apply_repeat(reminder: &mut Reminder, update: RepeatUpdate) -> DateTime<Utc> {
    reminder.repeat_count = update.repeat_count.unwrap_or(reminder.repeat_count + 1);
    if let Some(max_repeats) = update.max_repeats {
        reminder.max_repeats = max_repeats.max(1);
    }
    if let Some(interval) = update.repeat_interval_minutes {
        reminder.repeat_interval_minutes = interval;
    }
    update.due_time
}

fn retry_unless_completed(
    completed: bool,
    id: i64,
    scheduler: &mut Scheduler,
    now: DateTime<Utc>,
) -> TriggerOutcome {
    if completed {
        scheduler.disarm(id);
        TriggerOutcome::Completed
    } else {
        scheduler.arm_retry(id, now);
        TriggerOutcome::Retrying
    }
}
