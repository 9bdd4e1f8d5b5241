use crate::error::{AppError, AppResult};
use crate::storage::ReminderStore;
use chrono::{DateTime, Utc};

/// Optimistic completion toggle. Holds the pre-change values so a failed acknowledgment
/// can put them back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionToggle {
    pub id: i64,
    pub target: bool,
    previous_completed: bool,
    previous_sent_at: Option<DateTime<Utc>>,
}

impl CompletionToggle {
    /// Flip completion of `id` in the store right away and capture what it replaced.
    /// Reopening clears `sent_at` so the reminder is treated as never sent.
    pub fn apply(store: &mut ReminderStore, id: i64) -> AppResult<Self> {
        let reminder = store
            .get_mut(id)
            .ok_or_else(|| AppError::not_found(format!("reminder {}", id)))?;

        let toggle = Self {
            id,
            target: !reminder.is_completed,
            previous_completed: reminder.is_completed,
            previous_sent_at: reminder.sent_at,
        };

        reminder.is_completed = toggle.target;
        if !toggle.target {
            reminder.sent_at = None;
        }
        Ok(toggle)
    }

    /// Restore the captured values. Returns false if the reminder is gone.
    pub fn revert(&self, store: &mut ReminderStore) -> bool {
        match store.get_mut(self.id) {
            Some(reminder) => {
                reminder.is_completed = self.previous_completed;
                reminder.sent_at = self.previous_sent_at;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::Reminder;
    use chrono::TimeZone;

    fn store_with(completed: bool) -> ReminderStore {
        let sent = Utc.with_ymd_and_hms(2025, 1, 5, 9, 30, 0).unwrap();
        let mut store = ReminderStore::new(20);
        store.upsert(Reminder {
            id: 3,
            text: "Call back".to_string(),
            groups: vec![],
            due_time: sent,
            is_completed: completed,
            sent_at: completed.then_some(sent),
            repeat_interval_minutes: 0,
            repeat_count: 0,
            max_repeats: 1,
        });
        store
    }

    #[test]
    fn test_apply_then_revert_restores_previous_state() {
        let mut store = store_with(true);
        let before = store.get(3).unwrap().clone();

        let toggle = CompletionToggle::apply(&mut store, 3).unwrap();
        assert!(!toggle.target);
        assert!(!store.get(3).unwrap().is_completed);
        assert_eq!(store.get(3).unwrap().sent_at, None);

        assert!(toggle.revert(&mut store));
        assert_eq!(store.get(3).unwrap(), &before);
    }

    #[test]
    fn test_apply_unknown_reminder() {
        let mut store = store_with(false);
        let err = CompletionToggle::apply(&mut store, 99).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_revert_after_delete_is_noop() {
        let mut store = store_with(false);
        let toggle = CompletionToggle::apply(&mut store, 3).unwrap();
        store.remove(3);
        assert!(!toggle.revert(&mut store));
    }
}
