use crate::reminder::{Reminder, ReminderPage};
use crate::storage::ReminderStore;

/// What a reconciliation changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub added: usize,
    pub updated: usize,
    pub dropped: Vec<i64>,
}

/// Merge one fetched reminder over its local counterpart.
///
/// Shared fields come from the fetch. A local `sent_at` survives when the fetch has none
/// or an earlier one, and so does the local completion it belongs to: a fetch that left
/// the server before our trigger landed must not reopen the reminder. Likewise a local
/// repeat that is further along than the fetch keeps its `due_time` and `repeat_count`.
pub fn merge_reminder(local: &Reminder, fetched: Reminder) -> Reminder {
    let sent_is_newer = match (local.sent_at, fetched.sent_at) {
        (Some(ours), Some(theirs)) => ours > theirs,
        (Some(_), None) => true,
        _ => false,
    };
    let repeat_is_newer =
        local.repeat_count > fetched.repeat_count && local.due_time > fetched.due_time;

    let mut merged = fetched;
    if sent_is_newer {
        merged.sent_at = local.sent_at;
        merged.is_completed |= local.is_completed;
    }
    if repeat_is_newer {
        merged.due_time = local.due_time;
        merged.repeat_count = local.repeat_count;
    }
    merged
}

/// Merge a fetched page into a copy of the local store.
///
/// Reminders missing from the fetch are dropped only if they were last seen on this same
/// page; reminders seen on other pages or created locally are kept, since their absence
/// says nothing about them.
pub fn merge_page(local: &ReminderStore, page: ReminderPage) -> (ReminderStore, MergeReport) {
    let page_number = page.pagination.normalized().current_page;
    let mut merged = local.clone();
    let mut report = MergeReport::default();

    let fetched_ids: Vec<i64> = page.reminders.iter().map(|r| r.id).collect();

    for fetched in page.reminders {
        let id = fetched.id;
        match local.reminders.get(&id) {
            Some(existing) => {
                merged.reminders.insert(id, merge_reminder(existing, fetched));
                report.updated += 1;
            }
            None => {
                merged.reminders.insert(id, fetched);
                report.added += 1;
            }
        }
        merged.seen_on_page.insert(id, page_number);
    }

    for (id, seen) in &local.seen_on_page {
        if *seen == page_number && !fetched_ids.contains(id) {
            merged.reminders.remove(id);
            merged.seen_on_page.remove(id);
            report.dropped.push(*id);
        }
    }
    report.dropped.sort_unstable();

    merged.pagination = page.pagination.normalized();
    (merged, report)
}
