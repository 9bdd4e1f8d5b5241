pub mod local;
pub mod merge;

use crate::reminder::{Pagination, Reminder, ReminderPage};
use merge::{merge_page, MergeReport};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Which completion states a list view shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Completed,
}

/// Presentation-side filters applied on top of the display sort
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListFilter {
    pub status: StatusFilter,
    pub text: String,
    pub group: Option<i64>,
}

impl ListFilter {
    pub fn matches(&self, reminder: &Reminder) -> bool {
        let status_ok = match self.status {
            StatusFilter::All => true,
            StatusFilter::Pending => !reminder.is_completed,
            StatusFilter::Completed => reminder.is_completed,
        };
        let needle = self.text.trim().to_lowercase();
        let text_ok = needle.is_empty() || reminder.text.to_lowercase().contains(&needle);
        let group_ok = self.group.map_or(true, |id| reminder.in_group(id));
        status_ok && text_ok && group_ok
    }
}

/// Client-side collection of reminders, keyed and ordered by id, plus the pagination
/// metadata of the last fetched page.
#[derive(Debug, Clone, Default)]
pub struct ReminderStore {
    reminders: BTreeMap<i64, Reminder>,
    /// Page each reminder was last returned on; absent for reminders created locally
    seen_on_page: HashMap<i64, u32>,
    pagination: Pagination,
}

impl ReminderStore {
    pub fn new(page_size: u32) -> Self {
        Self {
            pagination: Pagination {
                page_size,
                ..Pagination::default()
            },
            ..Self::default()
        }
    }

    pub fn get(&self, id: i64) -> Option<&Reminder> {
        self.reminders.get(&id)
    }

    pub fn get_mut(&mut self, id: i64) -> Option<&mut Reminder> {
        self.reminders.get_mut(&id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.reminders.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.reminders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reminders.is_empty()
    }

    /// All reminders in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &Reminder> {
        self.reminders.values()
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    /// Insert or fully replace a reminder with the server's canonical copy.
    /// Returns the previous value, if any.
    pub fn upsert(&mut self, reminder: Reminder) -> Option<Reminder> {
        self.reminders.insert(reminder.id, reminder)
    }

    /// Remove permanently; ids are never reused.
    pub fn remove(&mut self, id: i64) -> Option<Reminder> {
        self.seen_on_page.remove(&id);
        self.reminders.remove(&id)
    }

    pub fn seen_on_page(&self, id: i64) -> Option<u32> {
        self.seen_on_page.get(&id).copied()
    }

    /// Merge a fetched page into the store. The merge is computed completely before the
    /// store is swapped, so no caller ever observes a half-merged state.
    pub fn reconcile(&mut self, page: ReminderPage) -> MergeReport {
        let (merged, report) = merge_page(self, page);
        *self = merged;
        report
    }

    /// Display order: pending before completed, pending by ascending due time,
    /// completed by most recently sent first.
    pub fn sorted_for_display(&self, filter: &ListFilter) -> Vec<&Reminder> {
        let mut visible: Vec<&Reminder> = self
            .reminders
            .values()
            .filter(|r| filter.matches(r))
            .collect();
        visible.sort_by(|a, b| display_cmp(a, b));
        visible
    }

    /// Reminders belonging to the current page (or created locally and not yet listed),
    /// in display order.
    pub fn current_page(&self, filter: &ListFilter) -> Vec<&Reminder> {
        let current = self.pagination.current_page;
        self.sorted_for_display(filter)
            .into_iter()
            .filter(|r| self.seen_on_page(r.id).map_or(true, |page| page == current))
            .collect()
    }
}

pub fn display_cmp(a: &Reminder, b: &Reminder) -> Ordering {
    match (a.is_completed, b.is_completed) {
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (false, false) => a.due_time.cmp(&b.due_time).then(a.id.cmp(&b.id)),
        // None sorts before Some, so reversing puts unsent completions last
        (true, true) => b.sent_at.cmp(&a.sent_at).then(a.id.cmp(&b.id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::Group;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 10, 8, 0, 0).unwrap()
    }

    fn make_reminder(id: i64, due_in_mins: i64) -> Reminder {
        Reminder {
            id,
            text: format!("Task {}", id),
            groups: vec![Group { id: 1, name: "Ops".to_string() }],
            due_time: t0() + Duration::minutes(due_in_mins),
            is_completed: false,
            sent_at: None,
            repeat_interval_minutes: 0,
            repeat_count: 0,
            max_repeats: 1,
        }
    }

    fn completed(id: i64, sent_in_mins: Option<i64>) -> Reminder {
        let mut r = make_reminder(id, 0);
        r.is_completed = true;
        r.sent_at = sent_in_mins.map(|m| t0() + Duration::minutes(m));
        r
    }

    #[test]
    fn test_display_order() {
        let mut store = ReminderStore::new(20);
        store.upsert(completed(1, Some(5)));
        store.upsert(make_reminder(2, 30));
        store.upsert(completed(3, Some(10)));
        store.upsert(make_reminder(4, 10));
        store.upsert(completed(5, None));

        let order: Vec<i64> = store
            .sorted_for_display(&ListFilter::default())
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(order, vec![4, 2, 3, 1, 5]);
    }

    #[test]
    fn test_filters() {
        let mut store = ReminderStore::new(20);
        store.upsert(make_reminder(1, 10));
        let mut other_group = make_reminder(2, 20);
        other_group.groups = vec![Group { id: 9, name: "Family".to_string() }];
        other_group.text = "Buy MILK".to_string();
        store.upsert(other_group);
        store.upsert(completed(3, Some(1)));

        let pending = ListFilter { status: StatusFilter::Pending, ..ListFilter::default() };
        assert_eq!(store.sorted_for_display(&pending).len(), 2);

        let text = ListFilter { text: "milk".to_string(), ..ListFilter::default() };
        let found = store.sorted_for_display(&text);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 2);

        let group = ListFilter { group: Some(1), ..ListFilter::default() };
        assert_eq!(store.sorted_for_display(&group).len(), 2);
    }

    #[test]
    fn test_remove_is_permanent() {
        let mut store = ReminderStore::new(20);
        store.upsert(make_reminder(1, 10));
        assert!(store.remove(1).is_some());
        assert!(!store.contains(1));
        assert!(store.remove(1).is_none());
    }
}
