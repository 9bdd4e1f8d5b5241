use crate::config::RELATIVE_EDIT_WINDOW_DAYS;
use crate::error::{AppError, AppResult};
use crate::preferences::FormDefaults;
use crate::reminder::{GroupRef, Reminder, ReminderDraft};
use chrono::{DateTime, Duration, Utc};

const MINUTES_PER_DAY: i64 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit(i64),
}

/// How the operator expressed the due time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueInput {
    /// Offset from the moment the form is submitted
    Relative { days: u32, hours: u32, minutes: u32 },
    Absolute(DateTime<Utc>),
}

impl DueInput {
    pub fn resolve(&self, now: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
        match *self {
            DueInput::Relative { days, hours, minutes } => {
                let offset = Duration::days(i64::from(days))
                    + Duration::hours(i64::from(hours))
                    + Duration::minutes(i64::from(minutes));
                if offset <= Duration::zero() {
                    return Err(AppError::validation("Duration must be positive"));
                }
                Ok(now + offset)
            }
            DueInput::Absolute(at) => {
                if at <= now {
                    return Err(AppError::validation("Due time must be in the future"));
                }
                Ok(at)
            }
        }
    }
}

/// Contents of the create/edit form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormDraft {
    pub mode: FormMode,
    pub text: String,
    pub group_ids: Vec<i64>,
    pub due: DueInput,
    pub repeat_interval_minutes: u32,
    pub max_repeats: u32,
}

impl FormDraft {
    /// Empty create form pre-filled from stored defaults and the last used groups.
    pub fn create(defaults: FormDefaults, last_used_groups: &[i64]) -> Self {
        Self {
            mode: FormMode::Create,
            text: String::new(),
            group_ids: last_used_groups.to_vec(),
            due: DueInput::Relative {
                days: defaults.days,
                hours: defaults.hours,
                minutes: defaults.minutes,
            },
            repeat_interval_minutes: defaults.repeat_interval_minutes,
            max_repeats: defaults.max_repeats,
        }
    }

    /// Edit form for an existing reminder. Reminders due within the relative window are
    /// shown as a days/hours/minutes countdown, anything else as an absolute time.
    /// The countdown rounds up to the next whole minute so it never reads as zero.
    pub fn edit(reminder: &Reminder, now: DateTime<Utc>) -> Self {
        let left = reminder.due_time - now;
        let due = if left > Duration::zero() && left <= Duration::days(RELATIVE_EDIT_WINDOW_DAYS) {
            let total_minutes = (left.num_seconds() + 59) / 60;
            DueInput::Relative {
                days: (total_minutes / MINUTES_PER_DAY) as u32,
                hours: (total_minutes % MINUTES_PER_DAY / 60) as u32,
                minutes: (total_minutes % 60) as u32,
            }
        } else {
            DueInput::Absolute(reminder.due_time)
        };

        Self {
            mode: FormMode::Edit(reminder.id),
            text: reminder.text.clone(),
            group_ids: reminder.group_ids(),
            due,
            repeat_interval_minutes: reminder.repeat_interval_minutes,
            max_repeats: reminder.max_repeats,
        }
    }

    /// Validate and turn the form into a request body. Submitting always resets completion.
    pub fn to_draft(&self, now: DateTime<Utc>) -> AppResult<ReminderDraft> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(AppError::validation("Text is required"));
        }
        if self.group_ids.is_empty() {
            return Err(AppError::validation("Select at least one group"));
        }
        if self.max_repeats < 1 {
            return Err(AppError::validation("Repeat count must be at least 1"));
        }
        let due_time = self.due.resolve(now)?;

        Ok(ReminderDraft {
            text: text.to_string(),
            groups: self.group_ids.iter().map(|&id| GroupRef { id }).collect(),
            due_time,
            is_completed: false,
            repeat_interval_minutes: self.repeat_interval_minutes,
            max_repeats: self.max_repeats,
        })
    }

    /// Defaults to remember after a successful submit
    pub fn as_defaults(&self) -> Option<FormDefaults> {
        match self.due {
            DueInput::Relative { days, hours, minutes } => Some(FormDefaults {
                days,
                hours,
                minutes,
                repeat_interval_minutes: self.repeat_interval_minutes,
                max_repeats: self.max_repeats,
            }),
            DueInput::Absolute(_) => None,
        }
    }
}
