use crate::error::{AppError, AppResult};
use crate::reminder::{Group, Reminder, ReminderDraft, ReminderPage, TriggerResponse};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Backend operations the engine depends on. Implementations block; the runtime calls them
/// from worker threads.
pub trait ReminderApi: Send + Sync {
    fn list(&self, page: u32, page_size: u32) -> AppResult<ReminderPage>;
    fn create(&self, draft: &ReminderDraft) -> AppResult<Reminder>;
    fn update(&self, id: i64, draft: &ReminderDraft) -> AppResult<Reminder>;
    fn set_completed(&self, id: i64, completed: bool) -> AppResult<()>;
    fn delete(&self, id: i64) -> AppResult<()>;
    fn trigger(&self, id: i64) -> AppResult<TriggerResponse>;
    fn list_groups(&self) -> AppResult<Vec<Group>>;
}

/// Who asked for a page load; only explicit loads surface their failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    Explicit,
    Background,
}

/// Work the engine hands to the runtime
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// `seq` increases with every list request so late answers can be recognised
    List { seq: u64, page: u32, page_size: u32, origin: LoadOrigin },
    Groups,
    Create(ReminderDraft),
    Update { id: i64, draft: ReminderDraft },
    SetCompleted { id: i64, completed: bool },
    Delete { id: i64 },
    Trigger { id: i64 },
}

/// Completed request, fed back into the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Listed { seq: u64, origin: LoadOrigin, result: AppResult<ReminderPage> },
    Groups(AppResult<Vec<Group>>),
    Created(AppResult<Reminder>),
    Updated { id: i64, result: AppResult<Reminder> },
    CompletionSet { id: i64, result: AppResult<()> },
    Deleted { id: i64, result: AppResult<()> },
    Triggered { id: i64, result: AppResult<TriggerResponse> },
}

/// Run one request to completion against `api`.
pub fn execute(api: &dyn ReminderApi, request: Request) -> Response {
    match request {
        Request::List { seq, page, page_size, origin } => Response::Listed {
            seq,
            origin,
            result: api.list(page, page_size),
        },
        Request::Groups => Response::Groups(api.list_groups()),
        Request::Create(draft) => Response::Created(api.create(&draft)),
        Request::Update { id, draft } => Response::Updated {
            id,
            result: api.update(id, &draft),
        },
        Request::SetCompleted { id, completed } => Response::CompletionSet {
            id,
            result: api.set_completed(id, completed),
        },
        Request::Delete { id } => Response::Deleted {
            id,
            result: api.delete(id),
        },
        Request::Trigger { id } => Response::Triggered {
            id,
            result: api.trigger(id),
        },
    }
}

/// `ReminderApi` over the backend's JSON HTTP endpoints
pub struct HttpReminderApi {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpReminderApi {
    pub fn new(base_url: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }
}

fn read_json<T: DeserializeOwned>(response: ureq::Response) -> AppResult<T> {
    response
        .into_json()
        .map_err(|e| AppError::api(format!("Malformed response: {}", e)))
}

impl ReminderApi for HttpReminderApi {
    fn list(&self, page: u32, page_size: u32) -> AppResult<ReminderPage> {
        let response = self
            .agent
            .get(&self.url("reminders/"))
            .query("page", &page.to_string())
            .query("page_size", &page_size.to_string())
            .call()?;
        let mut page: ReminderPage = read_json(response)?;
        page.pagination = page.pagination.normalized();
        log::debug!(
            "Fetched page {}/{} with {} reminders",
            page.pagination.current_page,
            page.pagination.total_pages,
            page.reminders.len()
        );
        Ok(page)
    }

    fn create(&self, draft: &ReminderDraft) -> AppResult<Reminder> {
        let response = self.agent.post(&self.url("reminders/")).send_json(draft)?;
        read_json(response)
    }

    fn update(&self, id: i64, draft: &ReminderDraft) -> AppResult<Reminder> {
        let response = self
            .agent
            .put(&self.url(&format!("reminders/{}/", id)))
            .send_json(draft)?;
        read_json(response)
    }

    fn set_completed(&self, id: i64, completed: bool) -> AppResult<()> {
        self.agent
            .request("PATCH", &self.url(&format!("reminders/{}/", id)))
            .send_json(json!({ "is_completed": completed }))?;
        Ok(())
    }

    fn delete(&self, id: i64) -> AppResult<()> {
        self.agent
            .delete(&self.url(&format!("reminders/delete/{}/", id)))
            .call()?;
        Ok(())
    }

    fn trigger(&self, id: i64) -> AppResult<TriggerResponse> {
        let response = self
            .agent
            .post(&self.url("reminders/send_due/"))
            .send_json(json!({ "reminder_id": id }))?;
        read_json(response)
    }

    fn list_groups(&self) -> AppResult<Vec<Group>> {
        let response = self.agent.get(&self.url("groups/")).call()?;
        read_json(response)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use crate::reminder::{Pagination, TriggerStatus};
    use std::sync::Mutex;

    /// Scriptable in-process backend recording every call
    #[derive(Default)]
    pub struct FakeApi {
        pub calls: Mutex<Vec<String>>,
        pub page: Mutex<Option<ReminderPage>>,
        pub trigger_status: Mutex<Option<TriggerStatus>>,
        pub fail_mutations: Mutex<bool>,
    }

    impl FakeApi {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn mutation_result(&self) -> AppResult<()> {
            if *self.fail_mutations.lock().unwrap() {
                Err(AppError::network("HTTP 500"))
            } else {
                Ok(())
            }
        }
    }

    impl ReminderApi for FakeApi {
        fn list(&self, page: u32, page_size: u32) -> AppResult<ReminderPage> {
            self.record(format!("list {} {}", page, page_size));
            Ok(self.page.lock().unwrap().clone().unwrap_or(ReminderPage {
                reminders: vec![],
                pagination: Pagination::default(),
            }))
        }

        fn create(&self, draft: &ReminderDraft) -> AppResult<Reminder> {
            self.record(format!("create {}", draft.text));
            self.mutation_result()?;
            Ok(Reminder {
                id: 100,
                text: draft.text.clone(),
                groups: draft
                    .groups
                    .iter()
                    .map(|g| Group { id: g.id, name: String::new() })
                    .collect(),
                due_time: draft.due_time,
                is_completed: false,
                sent_at: None,
                repeat_interval_minutes: draft.repeat_interval_minutes,
                repeat_count: 0,
                max_repeats: draft.max_repeats,
            })
        }

        fn update(&self, id: i64, draft: &ReminderDraft) -> AppResult<Reminder> {
            self.record(format!("update {}", id));
            let mut reminder = self.create(draft)?;
            reminder.id = id;
            Ok(reminder)
        }

        fn set_completed(&self, id: i64, completed: bool) -> AppResult<()> {
            self.record(format!("set_completed {} {}", id, completed));
            self.mutation_result()
        }

        fn delete(&self, id: i64) -> AppResult<()> {
            self.record(format!("delete {}", id));
            self.mutation_result()
        }

        fn trigger(&self, id: i64) -> AppResult<TriggerResponse> {
            self.record(format!("trigger {}", id));
            match *self.trigger_status.lock().unwrap() {
                Some(status) => Ok(TriggerResponse { status, reminder: None }),
                None => Err(AppError::network("connection refused")),
            }
        }

        fn list_groups(&self) -> AppResult<Vec<Group>> {
            self.record("groups".to_string());
            Ok(vec![Group { id: 1, name: "Team".to_string() }])
        }
    }
}
