use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Recipient group; read-only reference data from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

/// Group reference as sent in create/update bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRef {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: i64,
    pub text: String,
    #[serde(default)]
    pub groups: Vec<Group>,
    pub due_time: DateTime<Utc>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub repeat_interval_minutes: u32,
    #[serde(default)]
    pub repeat_count: u32,
    #[serde(default = "default_max_repeats")]
    pub max_repeats: u32,
}

fn default_max_repeats() -> u32 {
    1
}

impl Reminder {
    /// Due means the due time has passed and the reminder is still pending.
    /// In-flight membership is tracked by the trigger coordinator, not here.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.is_completed && self.due_time <= now
    }

    pub fn is_repeating(&self) -> bool {
        self.repeat_interval_minutes > 0
    }

    pub fn in_group(&self, group_id: i64) -> bool {
        self.groups.iter().any(|g| g.id == group_id)
    }

    pub fn group_ids(&self) -> Vec<i64> {
        self.groups.iter().map(|g| g.id).collect()
    }

    /// Next due time for a repeat, never earlier than one interval after the current one.
    pub fn next_repeat_due(&self) -> DateTime<Utc> {
        let interval = i64::from(self.repeat_interval_minutes.max(1));
        self.due_time + Duration::minutes(interval)
    }
}

/// Body of `POST create` and `PUT update/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderDraft {
    pub text: String,
    pub groups: Vec<GroupRef>,
    pub due_time: DateTime<Utc>,
    pub is_completed: bool,
    pub repeat_interval_minutes: u32,
    pub max_repeats: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_count: u64,
    pub has_next: bool,
    pub has_previous: bool,
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            current_page: 1,
            total_pages: 1,
            total_count: 0,
            has_next: false,
            has_previous: false,
            page_size: crate::config::DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    /// Clamp the current page into range and recompute the navigation flags.
    pub fn normalized(mut self) -> Self {
        let last = self.total_pages.max(1);
        self.current_page = self.current_page.clamp(1, last);
        self.has_next = self.current_page < self.total_pages;
        self.has_previous = self.current_page > 1;
        self
    }
}

/// Response of `GET list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderPage {
    pub reminders: Vec<Reminder>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
    Sent,
    Repeated,
    AlreadyCompleted,
    AlreadySending,
    NotDueYet,
}

/// Fields the backend returns alongside a `repeated` status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatUpdate {
    pub due_time: DateTime<Utc>,
    #[serde(default)]
    pub repeat_count: Option<u32>,
    #[serde(default)]
    pub max_repeats: Option<u32>,
    #[serde(default)]
    pub repeat_interval_minutes: Option<u32>,
}

/// Response of `POST trigger`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub status: TriggerStatus,
    #[serde(default)]
    pub reminder: Option<RepeatUpdate>,
}

/// Countdown shown next to a reminder: send time once sent, "sending" once due.
pub fn format_time_left(reminder: &Reminder, now: DateTime<Utc>) -> String {
    if let Some(sent_at) = reminder.sent_at {
        return sent_at.format("%d.%m.%y %H:%M").to_string();
    }

    let left = reminder.due_time - now;
    if left <= Duration::zero() {
        return "sending".to_string();
    }

    let days = left.num_days();
    let hours = left.num_hours() % 24;
    let minutes = left.num_minutes() % 60;
    let seconds = left.num_seconds() % 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, m, s).unwrap()
    }

    fn make_reminder(due_time: DateTime<Utc>) -> Reminder {
        Reminder {
            id: 1,
            text: "Standup".to_string(),
            groups: vec![Group { id: 7, name: "Team".to_string() }],
            due_time,
            is_completed: false,
            sent_at: None,
            repeat_interval_minutes: 0,
            repeat_count: 0,
            max_repeats: 1,
        }
    }

    #[test]
    fn test_is_due() {
        let reminder = make_reminder(at(10, 0, 0));
        assert!(!reminder.is_due(at(9, 59, 59)));
        assert!(reminder.is_due(at(10, 0, 0)));

        let mut done = reminder.clone();
        done.is_completed = true;
        assert!(!done.is_due(at(11, 0, 0)));
    }

    #[test]
    fn test_next_repeat_due_moves_forward() {
        let mut reminder = make_reminder(at(10, 0, 0));
        reminder.repeat_interval_minutes = 15;
        assert_eq!(reminder.next_repeat_due(), at(10, 15, 0));
    }

    #[test]
    fn test_deserialize_backend_payload_with_offset() {
        let json = r#"{
            "id": 12,
            "text": "Pay rent",
            "groups": [{"id": 3, "name": "Family"}],
            "due_time": "2025-03-01T13:00:00+03:00",
            "is_completed": false
        }"#;
        let reminder: Reminder = serde_json::from_str(json).unwrap();
        assert_eq!(reminder.due_time, at(10, 0, 0));
        assert_eq!(reminder.sent_at, None);
        assert_eq!(reminder.max_repeats, 1);
        assert_eq!(reminder.group_ids(), vec![3]);
    }

    #[test]
    fn test_trigger_response_statuses() {
        let sent: TriggerResponse = serde_json::from_str(r#"{"status":"sent"}"#).unwrap();
        assert_eq!(sent.status, TriggerStatus::Sent);

        let repeated: TriggerResponse = serde_json::from_str(
            r#"{"status":"repeated","reminder":{"due_time":"2025-03-01T10:30:00Z","repeat_count":2}}"#,
        )
        .unwrap();
        assert_eq!(repeated.status, TriggerStatus::Repeated);
        assert_eq!(repeated.reminder.unwrap().repeat_count, Some(2));

        assert!(serde_json::from_str::<TriggerResponse>(r#"{"status":"exploded"}"#).is_err());
    }

    #[test]
    fn test_pagination_normalized() {
        let raw = Pagination {
            current_page: 9,
            total_pages: 4,
            total_count: 80,
            has_next: true,
            has_previous: false,
            page_size: 20,
        };
        let page = raw.normalized();
        assert_eq!(page.current_page, 4);
        assert!(!page.has_next);
        assert!(page.has_previous);

        let empty = Pagination { total_pages: 0, current_page: 0, ..Pagination::default() };
        assert_eq!(empty.normalized().current_page, 1);
    }

    #[test]
    fn test_format_time_left() {
        let reminder = make_reminder(at(12, 30, 15));
        assert_eq!(format_time_left(&reminder, at(10, 0, 0)), "2h 30m 15s");
        assert_eq!(format_time_left(&reminder, at(12, 29, 0)), "1m 15s");
        assert_eq!(format_time_left(&reminder, at(12, 30, 10)), "5s");
        assert_eq!(format_time_left(&reminder, at(12, 31, 0)), "sending");

        let mut sent = reminder.clone();
        sent.sent_at = Some(at(12, 31, 0));
        assert_eq!(format_time_left(&sent, at(13, 0, 0)), "01.03.25 12:31");
    }
}
