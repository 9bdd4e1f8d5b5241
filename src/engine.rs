use crate::api::{LoadOrigin, Request, Response};
use crate::clock::Clock;
use crate::config::{PAGE_WINDOW_DELTA, TICK_INTERVAL_MS};
use crate::error::{AppError, AppResult};
use crate::form::{FormDraft, FormMode};
use crate::mutation::CompletionToggle;
use crate::paginator::{self, PageItem};
use crate::preferences::Preferences;
use crate::reminder::{format_time_left, Group, Pagination, Reminder, ReminderPage};
use crate::scheduler::Scheduler;
use crate::storage::{ListFilter, ReminderStore, StatusFilter};
use crate::trigger::{TriggerCoordinator, TriggerOutcome};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};

/// Client-side state of one reminder's due check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Armed,
    InFlight,
    Completed,
    /// Pending but neither armed nor in flight; only transient inside an operation
    Idle,
}

/// Open create/edit form and whether its submit is awaiting the backend
#[derive(Debug, Clone)]
struct OpenForm {
    draft: FormDraft,
    submitting: bool,
}

/// Single-threaded reminder engine.
///
/// Every operation runs to completion and never blocks: backend work is queued as
/// [`Request`]s for the runtime to execute, and their [`Response`]s come back through
/// [`Engine::handle_response`].
pub struct Engine {
    clock: Box<dyn Clock>,
    store: ReminderStore,
    scheduler: Scheduler,
    coordinator: TriggerCoordinator,
    preferences: Preferences,
    pending_toggles: HashMap<i64, CompletionToggle>,
    pending_deletes: HashSet<i64>,
    form: Option<OpenForm>,
    refresh_deferred: bool,
    /// Sequence number handed to the next list request
    next_list_seq: u64,
    /// Newest explicit load issued; list answers issued before it are stale
    latest_explicit: u64,
    /// Newest list answer merged into the store
    latest_applied: u64,
    awaiting_explicit: bool,
    filter: ListFilter,
    groups: Vec<Group>,
    outbox: Vec<Request>,
    last_error: Option<AppError>,
    page_size: u32,
}

impl Engine {
    pub fn new(clock: Box<dyn Clock>, preferences: Preferences, page_size: u32) -> Self {
        let filter = ListFilter {
            group: preferences.active_group_filter(),
            ..ListFilter::default()
        };

        Self {
            clock,
            store: ReminderStore::new(page_size),
            scheduler: Scheduler::new(Duration::milliseconds(TICK_INTERVAL_MS)),
            coordinator: TriggerCoordinator::new(),
            preferences,
            pending_toggles: HashMap::new(),
            pending_deletes: HashSet::new(),
            form: None,
            refresh_deferred: false,
            next_list_seq: 1,
            latest_explicit: 0,
            latest_applied: 0,
            awaiting_explicit: false,
            filter,
            groups: Vec::new(),
            outbox: Vec::new(),
            last_error: None,
            page_size,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Queue the initial loads: group reference data and the first page.
    pub fn start(&mut self) {
        log::info!("Starting reminder engine (page size {})", self.page_size);
        self.outbox.push(Request::Groups);
        self.load_page(1);
    }

    /// Requests queued since the last call, in the order they were issued.
    pub fn take_requests(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.outbox)
    }

    // ---- Scheduling ----

    /// Run every expired due check. Returns how many fire requests were issued.
    pub fn tick(&mut self) -> usize {
        let now = self.now();
        let expired = self.scheduler.poll(now);
        expired.into_iter().filter(|&id| self.fire(id, now)).count()
    }

    /// Earliest instant at which `tick` has work to do.
    pub fn next_deadline(&mut self) -> Option<DateTime<Utc>> {
        self.scheduler.next_deadline()
    }

    fn fire(&mut self, id: i64, now: DateTime<Utc>) -> bool {
        let Some(reminder) = self.store.get(id) else {
            return false;
        };
        if reminder.is_completed {
            return false;
        }
        if !reminder.is_due(now) {
            self.scheduler.arm(reminder, now);
            return false;
        }
        if !self.coordinator.invoke(id) {
            log::debug!("Reminder {} already has a fire request outstanding", id);
            return false;
        }

        log::info!("Reminder {} is due, firing", id);
        self.outbox.push(Request::Trigger { id });
        true
    }

    pub fn timer_state(&self, id: i64) -> Option<TimerState> {
        let reminder = self.store.get(id)?;
        let state = if self.coordinator.is_in_flight(id) {
            TimerState::InFlight
        } else if self.scheduler.is_armed(id) {
            TimerState::Armed
        } else if reminder.is_completed {
            TimerState::Completed
        } else {
            TimerState::Idle
        };
        Some(state)
    }

    // ---- Loading and pagination ----

    /// Periodic background refresh of the current page. Suppressed while a form is open;
    /// the skipped refresh runs when the form closes. Skipped while a page load is
    /// outstanding, since that load brings fresh data anyway.
    pub fn refresh(&mut self) -> bool {
        if self.form.is_some() {
            log::debug!("Form open, deferring background refresh");
            self.refresh_deferred = true;
            return false;
        }
        self.refresh_deferred = false;
        if self.awaiting_explicit {
            log::debug!("Page load outstanding, skipping background refresh");
            return false;
        }
        let seq = self.take_list_seq();
        self.outbox.push(Request::List {
            seq,
            page: self.store.pagination().current_page,
            page_size: self.page_size,
            origin: LoadOrigin::Background,
        });
        true
    }

    /// Explicit reload of the current page; failures are surfaced.
    pub fn reload(&mut self) {
        self.load_page(self.store.pagination().current_page);
    }

    pub fn go_to_page(&mut self, page: u32) -> bool {
        match paginator::go_to_page(&self.store.pagination(), page) {
            Some(page) => {
                self.load_page(page);
                true
            }
            None => false,
        }
    }

    pub fn next_page(&mut self) -> bool {
        match paginator::next_page(&self.store.pagination()) {
            Some(page) => {
                self.load_page(page);
                true
            }
            None => false,
        }
    }

    pub fn previous_page(&mut self) -> bool {
        match paginator::previous_page(&self.store.pagination()) {
            Some(page) => {
                self.load_page(page);
                true
            }
            None => false,
        }
    }

    fn load_page(&mut self, page: u32) {
        let seq = self.take_list_seq();
        self.latest_explicit = seq;
        self.awaiting_explicit = true;
        self.outbox.push(Request::List {
            seq,
            page,
            page_size: self.page_size,
            origin: LoadOrigin::Explicit,
        });
    }

    fn take_list_seq(&mut self) -> u64 {
        let seq = self.next_list_seq;
        self.next_list_seq += 1;
        seq
    }

    pub fn pagination(&self) -> Pagination {
        self.store.pagination()
    }

    pub fn visible_pages(&self) -> Vec<PageItem> {
        let pagination = self.store.pagination();
        paginator::visible_pages(pagination.current_page, pagination.total_pages, PAGE_WINDOW_DELTA)
    }

    // ---- Views and filters ----

    /// Reminders of the current page matching the active filters, in display order.
    pub fn reminders(&self) -> Vec<&Reminder> {
        self.store.current_page(&self.filter)
    }

    pub fn reminder(&self, id: i64) -> Option<&Reminder> {
        self.store.get(id)
    }

    pub fn time_left(&self, id: i64) -> Option<String> {
        self.store.get(id).map(|r| format_time_left(r, self.now()))
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn filter(&self) -> &ListFilter {
        &self.filter
    }

    pub fn set_status_filter(&mut self, status: StatusFilter) {
        self.filter.status = status;
    }

    pub fn set_text_filter(&mut self, text: &str) {
        self.filter.text = text.to_string();
    }

    /// Change the group filter and remember it for the next session.
    pub fn set_group_filter(&mut self, group: Option<i64>) {
        self.filter.group = group;
        if let Err(e) = self.preferences.set_active_group_filter(group) {
            log::warn!("Could not save group filter: {}", e);
        }
    }

    /// Most recent error worth showing to the user, cleared on read.
    pub fn take_error(&mut self) -> Option<AppError> {
        self.last_error.take()
    }

    // ---- Forms ----

    pub fn form(&self) -> Option<&FormDraft> {
        self.form.as_ref().map(|f| &f.draft)
    }

    /// Editable form contents; None while no form is open or a submit is pending.
    pub fn form_mut(&mut self) -> Option<&mut FormDraft> {
        self.form
            .as_mut()
            .filter(|f| !f.submitting)
            .map(|f| &mut f.draft)
    }

    pub fn open_create_form(&mut self) -> &FormDraft {
        let draft = FormDraft::create(
            self.preferences.form_defaults(),
            self.preferences.last_used_groups(),
        );
        &self.open_form(draft).draft
    }

    pub fn open_edit_form(&mut self, id: i64) -> AppResult<&FormDraft> {
        let reminder = self
            .store
            .get(id)
            .ok_or_else(|| AppError::not_found(format!("reminder {}", id)))?;
        let draft = FormDraft::edit(reminder, self.now());
        Ok(&self.open_form(draft).draft)
    }

    fn open_form(&mut self, draft: FormDraft) -> &OpenForm {
        self.form.insert(OpenForm {
            draft,
            submitting: false,
        })
    }

    pub fn close_form(&mut self) {
        if self.form.take().is_some() && self.refresh_deferred {
            self.refresh();
        }
    }

    /// Validate the open form and send it. The form stays open until the backend answers.
    pub fn submit_form(&mut self) -> AppResult<()> {
        let now = self.now();
        let form = self
            .form
            .as_mut()
            .ok_or_else(|| AppError::validation("No form is open"))?;
        if form.submitting {
            return Err(AppError::validation("Form is already being submitted"));
        }

        let draft = form.draft.to_draft(now)?;
        let request = match form.draft.mode {
            FormMode::Create => Request::Create(draft),
            FormMode::Edit(id) => Request::Update { id, draft },
        };
        form.submitting = true;
        self.outbox.push(request);
        Ok(())
    }

    /// Apply the answer to a create or update. Form choices are remembered only when the
    /// answer belongs to the form that is still open.
    fn finish_submit(&mut self, mode: FormMode, result: AppResult<Reminder>) {
        let draft = match self.form.as_mut() {
            Some(form) if form.submitting && form.draft.mode == mode => {
                form.submitting = false;
                Some(form.draft.clone())
            }
            _ => None,
        };

        let reminder = match result {
            Ok(reminder) => reminder,
            Err(e) => {
                log::warn!("Saving reminder failed: {}", e);
                self.last_error = Some(e);
                return;
            }
        };

        if let Some(draft) = &draft {
            if let Err(e) = self.preferences.set_last_used_groups(draft.group_ids.clone()) {
                log::warn!("Could not save last used groups: {}", e);
            }
            if let Some(defaults) = draft.as_defaults() {
                if let Err(e) = self.preferences.set_form_defaults(defaults) {
                    log::warn!("Could not save form defaults: {}", e);
                }
            }
        }

        let id = reminder.id;
        self.pending_toggles.remove(&id);
        self.store.upsert(reminder);
        self.sync_timer(id);
        log::info!("Saved reminder {}", id);

        if draft.is_some() {
            self.close_form();
        }
    }

    // ---- Mutations ----

    /// Flip completion immediately and send it; reverted if the backend rejects it.
    pub fn toggle_completed(&mut self, id: i64) -> AppResult<bool> {
        if self.pending_toggles.contains_key(&id) {
            return Err(AppError::validation("Reminder is already being updated"));
        }

        let toggle = CompletionToggle::apply(&mut self.store, id)?;
        self.sync_timer(id);
        self.outbox.push(Request::SetCompleted {
            id,
            completed: toggle.target,
        });
        let target = toggle.target;
        self.pending_toggles.insert(id, toggle);
        Ok(target)
    }

    /// Ask the backend to delete `id`; it leaves the store once the delete succeeds.
    pub fn delete(&mut self, id: i64) -> AppResult<()> {
        if !self.store.contains(id) {
            return Err(AppError::not_found(format!("reminder {}", id)));
        }
        if self.pending_deletes.insert(id) {
            self.outbox.push(Request::Delete { id });
        }
        Ok(())
    }

    /// Arm or disarm after a local change, leaving in-flight reminders to the coordinator.
    fn sync_timer(&mut self, id: i64) {
        if self.coordinator.is_in_flight(id) {
            return;
        }
        let now = self.now();
        match self.store.get(id) {
            Some(reminder) => {
                self.scheduler.arm(reminder, now);
            }
            None => {
                self.scheduler.disarm(id);
            }
        }
    }

    // ---- Responses ----

    pub fn handle_response(&mut self, response: Response) {
        match response {
            Response::Listed { seq, origin, result } => self.finish_load(seq, origin, result),
            Response::Groups(Ok(groups)) => {
                log::debug!("Loaded {} groups", groups.len());
                self.groups = groups;
            }
            Response::Groups(Err(e)) => log::warn!("Loading groups failed: {}", e),
            Response::Created(result) => self.finish_submit(FormMode::Create, result),
            Response::Updated { id, result } => self.finish_submit(FormMode::Edit(id), result),
            Response::CompletionSet { id, result } => self.finish_toggle(id, result),
            Response::Deleted { id, result } => self.finish_delete(id, result),
            Response::Triggered { id, result } => {
                let now = self.now();
                let outcome =
                    self.coordinator
                        .resolve(id, result, &mut self.store, &mut self.scheduler, now);
                if outcome == TriggerOutcome::Ignored {
                    log::debug!("Trigger outcome for reminder {} had no effect", id);
                }
            }
        }
    }

    /// Merge a list answer unless a newer page load or newer answer already superseded it.
    fn finish_load(&mut self, seq: u64, origin: LoadOrigin, result: AppResult<ReminderPage>) {
        if seq < self.latest_explicit || seq < self.latest_applied {
            log::debug!("Discarding stale list response {} ({:?})", seq, origin);
            return;
        }
        if origin == LoadOrigin::Explicit {
            self.awaiting_explicit = false;
        }

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                log::warn!("Loading reminders failed: {}", e);
                if origin == LoadOrigin::Explicit {
                    self.last_error = Some(e);
                }
                return;
            }
        };

        let report = self.store.reconcile(page);
        self.latest_applied = seq;
        self.reapply_pending_toggles();
        let now = self.now();
        self.scheduler
            .rearm_all(self.store.iter(), self.coordinator.in_flight(), now);

        let pagination = self.store.pagination();
        log::info!(
            "Synced page {}/{}: {} added, {} updated, {} dropped",
            pagination.current_page,
            pagination.total_pages,
            report.added,
            report.updated,
            report.dropped.len()
        );
    }

    /// Unacknowledged toggles win over the fetched value until the backend answers.
    fn reapply_pending_toggles(&mut self) {
        for toggle in self.pending_toggles.values() {
            if let Some(reminder) = self.store.get_mut(toggle.id) {
                reminder.is_completed = toggle.target;
                if !toggle.target {
                    reminder.sent_at = None;
                }
            }
        }
    }

    fn finish_toggle(&mut self, id: i64, result: AppResult<()>) {
        let Some(toggle) = self.pending_toggles.remove(&id) else {
            return;
        };
        if let Err(e) = result {
            log::warn!("Updating reminder {} failed, reverting: {}", id, e);
            toggle.revert(&mut self.store);
            self.sync_timer(id);
            self.last_error = Some(e);
        }
    }

    fn finish_delete(&mut self, id: i64, result: AppResult<()>) {
        self.pending_deletes.remove(&id);
        if let Err(e) = result {
            log::warn!("Deleting reminder {} failed: {}", id, e);
            self.last_error = Some(e);
            return;
        }

        self.store.remove(id);
        self.scheduler.disarm(id);
        self.pending_toggles.remove(&id);
        if self.form().map(|f| f.mode) == Some(FormMode::Edit(id)) {
            self.close_form();
        }
        log::info!("Deleted reminder {}", id);
    }
}
