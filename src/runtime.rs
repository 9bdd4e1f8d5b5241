use crate::api::{execute, ReminderApi, Response};
use crate::config::{REFRESH_INTERVAL_SECS, TICK_INTERVAL_MS};
use crate::engine::Engine;
use crate::error::{AppError, AppResult};
use crate::form::DueInput;
use crate::storage::StatusFilter;
use chrono::{DateTime, Duration, Utc};
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;

/// Operator commands read from stdin, one per line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Groups,
    Page(u32),
    Next,
    Prev,
    Reload,
    Toggle(i64),
    Delete(i64),
    /// Create in one step: due in `minutes`, for `groups`
    Add { minutes: u32, groups: Vec<i64>, text: String },
    New,
    Edit(i64),
    Text(String),
    DueIn(u32),
    SetGroups(Vec<i64>),
    Repeat { interval_minutes: u32, max_repeats: u32 },
    Save,
    Cancel,
    Filter(Option<i64>),
    Status(StatusFilter),
    Search(String),
    Help,
    Quit,
}

pub const USAGE: &str = "commands: list | groups | page N | next | prev | reload | toggle ID | delete ID \
| add MINUTES GROUP[,GROUP] TEXT | new | edit ID | text TEXT | in MINUTES | set-groups G[,G] \
| repeat INTERVAL COUNT | save | cancel | filter GROUP|all | status all|pending|completed \
| search [TEXT] | help | quit";

impl Command {
    pub fn parse(line: &str) -> AppResult<Self> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_lowercase().as_str() {
            "list" | "ls" => Command::List,
            "groups" => Command::Groups,
            "page" => Command::Page(parse_number(rest, "page")?),
            "next" => Command::Next,
            "prev" => Command::Prev,
            "reload" | "refresh" => Command::Reload,
            "toggle" => Command::Toggle(parse_number(rest, "reminder id")?),
            "delete" | "rm" => Command::Delete(parse_number(rest, "reminder id")?),
            "add" => {
                let mut parts = rest.splitn(3, char::is_whitespace);
                let minutes = parse_number(parts.next().unwrap_or(""), "minutes")?;
                let groups = parse_groups(parts.next().unwrap_or(""))?;
                let text = parts.next().unwrap_or("").trim().to_string();
                Command::Add { minutes, groups, text }
            }
            "new" => Command::New,
            "edit" => Command::Edit(parse_number(rest, "reminder id")?),
            "text" => Command::Text(rest.to_string()),
            "in" => Command::DueIn(parse_number(rest, "minutes")?),
            "set-groups" => Command::SetGroups(parse_groups(rest)?),
            "repeat" => {
                let mut parts = rest.split_whitespace();
                let interval_minutes = parse_number(parts.next().unwrap_or(""), "interval")?;
                let max_repeats = parse_number(parts.next().unwrap_or("1"), "count")?;
                Command::Repeat { interval_minutes, max_repeats }
            }
            "save" => Command::Save,
            "cancel" => Command::Cancel,
            "filter" => match rest {
                "" | "all" => Command::Filter(None),
                id => Command::Filter(Some(parse_number(id, "group id")?)),
            },
            "status" => Command::Status(match rest {
                "" | "all" => StatusFilter::All,
                "pending" => StatusFilter::Pending,
                "completed" | "done" => StatusFilter::Completed,
                other => return Err(AppError::validation(format!("Unknown status '{}'", other))),
            }),
            "search" => Command::Search(rest.to_string()),
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(AppError::validation(format!("Unknown command '{}'", other))),
        };
        Ok(command)
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str, what: &str) -> AppResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::validation(format!("Expected {}, got '{}'", what, raw)))
}

fn parse_groups(raw: &str) -> AppResult<Vec<i64>> {
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| parse_number(part, "group id"))
        .collect()
}

pub enum Event {
    Response(Response),
    Command(Command),
    Shutdown,
}

/// Drives an [`Engine`]: ticks its scheduler, runs its requests on worker threads and
/// feeds responses and operator commands back in on this thread.
pub struct Runtime {
    engine: Engine,
    api: Arc<dyn ReminderApi>,
    events_tx: Sender<Event>,
    events_rx: Receiver<Event>,
    refresh_interval: Duration,
    next_refresh: DateTime<Utc>,
}

impl Runtime {
    pub fn new(engine: Engine, api: Arc<dyn ReminderApi>) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        let refresh_interval = Duration::seconds(REFRESH_INTERVAL_SECS);
        let next_refresh = engine.now() + refresh_interval;
        Self {
            engine,
            api,
            events_tx,
            events_rx,
            refresh_interval,
            next_refresh,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn sender(&self) -> Sender<Event> {
        self.events_tx.clone()
    }

    /// Forward stdin lines as commands until EOF.
    pub fn spawn_stdin_reader(&self) {
        let tx = self.sender();
        thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        log::warn!("Failed to read stdin: {}", e);
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match Command::parse(&line) {
                    Ok(command) => {
                        if tx.send(Event::Command(command)).is_err() {
                            break;
                        }
                    }
                    Err(e) => println!("{}\n{}", e, USAGE),
                }
            }
            log::debug!("stdin closed, no more commands");
        });
    }

    /// Run until `quit` or a shutdown event.
    pub fn run(mut self) -> AppResult<()> {
        self.engine.start();
        let tick = std::time::Duration::from_millis(TICK_INTERVAL_MS as u64);
        while self.run_once(tick) {}
        log::info!("Reminder engine stopped");
        Ok(())
    }

    /// One loop iteration: periodic refresh, due checks, request dispatch, then wait up to
    /// `max_wait` for the next event. Returns false once the runtime should stop.
    pub fn run_once(&mut self, max_wait: std::time::Duration) -> bool {
        let now = self.engine.now();
        if now >= self.next_refresh {
            self.engine.refresh();
            self.next_refresh = now + self.refresh_interval;
        }
        self.engine.tick();
        self.dispatch();

        let wait = self.wait_time(now, max_wait);
        let keep_running = match self.events_rx.recv_timeout(wait) {
            Ok(Event::Response(response)) => {
                self.engine.handle_response(response);
                true
            }
            Ok(Event::Command(command)) => self.apply(command),
            Ok(Event::Shutdown) | Err(RecvTimeoutError::Disconnected) => false,
            Err(RecvTimeoutError::Timeout) => true,
        };

        if let Some(e) = self.engine.take_error() {
            println!("error: {}", e);
        }
        self.dispatch();
        keep_running
    }

    fn wait_time(&mut self, now: DateTime<Utc>, max_wait: std::time::Duration) -> std::time::Duration {
        let next = match self.engine.next_deadline() {
            Some(deadline) => deadline.min(self.next_refresh),
            None => self.next_refresh,
        };
        (next - now).to_std().unwrap_or_default().min(max_wait)
    }

    fn dispatch(&mut self) {
        for request in self.engine.take_requests() {
            let api = Arc::clone(&self.api);
            let tx = self.events_tx.clone();
            thread::spawn(move || {
                let response = execute(api.as_ref(), request);
                // the runtime may already be gone on shutdown
                let _ = tx.send(Event::Response(response));
            });
        }
    }

    fn apply(&mut self, command: Command) -> bool {
        let result = match command {
            Command::Quit => return false,
            Command::Help => {
                println!("{}", USAGE);
                Ok(())
            }
            Command::List => {
                self.print_list();
                Ok(())
            }
            Command::Groups => {
                for group in self.engine.groups() {
                    println!("{:>4}  {}", group.id, group.name);
                }
                Ok(())
            }
            Command::Page(page) => self.navigate(|engine| engine.go_to_page(page)),
            Command::Next => self.navigate(Engine::next_page),
            Command::Prev => self.navigate(Engine::previous_page),
            Command::Reload => {
                self.engine.reload();
                Ok(())
            }
            Command::Toggle(id) => self.engine.toggle_completed(id).map(|completed| {
                println!("reminder {} marked {}", id, if completed { "done" } else { "pending" });
            }),
            Command::Delete(id) => self.engine.delete(id),
            Command::Add { minutes, groups, text } => {
                self.engine.open_create_form();
                self.edit_form(|form| {
                    form.text = text;
                    form.group_ids = groups;
                    form.due = DueInput::Relative { days: 0, hours: 0, minutes };
                })
                .and_then(|_| self.engine.submit_form())
                .map_err(|e| {
                    self.engine.close_form();
                    e
                })
            }
            Command::New => {
                let form = self.engine.open_create_form();
                println!("new reminder form: groups {:?}, due {:?}", form.group_ids, form.due);
                Ok(())
            }
            Command::Edit(id) => self.engine.open_edit_form(id).map(|form| {
                println!("editing {}: '{}' due {:?}", id, form.text, form.due);
            }),
            Command::Text(text) => self.edit_form(|form| form.text = text),
            Command::DueIn(minutes) => self.edit_form(|form| {
                form.due = DueInput::Relative { days: 0, hours: 0, minutes }
            }),
            Command::SetGroups(groups) => self.edit_form(|form| form.group_ids = groups),
            Command::Repeat { interval_minutes, max_repeats } => self.edit_form(|form| {
                form.repeat_interval_minutes = interval_minutes;
                form.max_repeats = max_repeats;
            }),
            Command::Save => self.engine.submit_form(),
            Command::Cancel => {
                self.engine.close_form();
                Ok(())
            }
            Command::Filter(group) => {
                self.engine.set_group_filter(group);
                self.print_list();
                Ok(())
            }
            Command::Status(status) => {
                self.engine.set_status_filter(status);
                self.print_list();
                Ok(())
            }
            Command::Search(text) => {
                self.engine.set_text_filter(&text);
                self.print_list();
                Ok(())
            }
        };

        if let Err(e) = result {
            println!("error: {}", e);
        }
        true
    }

    fn navigate(&mut self, go: impl FnOnce(&mut Engine) -> bool) -> AppResult<()> {
        if go(&mut self.engine) {
            Ok(())
        } else {
            Err(AppError::validation("No such page"))
        }
    }

    fn edit_form(&mut self, edit: impl FnOnce(&mut crate::form::FormDraft)) -> AppResult<()> {
        let form = self
            .engine
            .form_mut()
            .ok_or_else(|| AppError::validation("No editable form is open"))?;
        edit(form);
        Ok(())
    }

    fn print_list(&self) {
        let pagination = self.engine.pagination();
        let pages: Vec<String> = self
            .engine
            .visible_pages()
            .iter()
            .map(|item| item.to_string())
            .collect();
        println!(
            "page {}/{} ({} total)  [{}]",
            pagination.current_page,
            pagination.total_pages,
            pagination.total_count,
            pages.join(" ")
        );

        for reminder in self.engine.reminders() {
            let groups: Vec<&str> = reminder.groups.iter().map(|g| g.name.as_str()).collect();
            println!(
                "{:>6} [{}] {:<40} {:<20} {}",
                reminder.id,
                if reminder.is_completed { "x" } else { " " },
                reminder.text,
                groups.join(", "),
                self.engine.time_left(reminder.id).unwrap_or_default()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeApi;
    use crate::clock::ManualClock;
    use crate::preferences::Preferences;
    use crate::reminder::{Group, Pagination, Reminder, ReminderPage, TriggerStatus};
    use chrono::TimeZone;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("list").unwrap(), Command::List);
        assert_eq!(Command::parse(" page 3 ").unwrap(), Command::Page(3));
        assert_eq!(Command::parse("toggle 12").unwrap(), Command::Toggle(12));
        assert_eq!(Command::parse("filter all").unwrap(), Command::Filter(None));
        assert_eq!(Command::parse("filter 4").unwrap(), Command::Filter(Some(4)));
        assert_eq!(
            Command::parse("status pending").unwrap(),
            Command::Status(StatusFilter::Pending)
        );
        assert_eq!(
            Command::parse("add 15 1,3 Call the plumber").unwrap(),
            Command::Add { minutes: 15, groups: vec![1, 3], text: "Call the plumber".to_string() }
        );
        assert_eq!(
            Command::parse("repeat 10 3").unwrap(),
            Command::Repeat { interval_minutes: 10, max_repeats: 3 }
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(Command::parse("page two"), Err(AppError::Validation(_))));
        assert!(matches!(Command::parse("launch"), Err(AppError::Validation(_))));
        assert!(matches!(Command::parse("add 5 x,y hi"), Err(AppError::Validation(_))));
        assert!(matches!(Command::parse("status maybe"), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_due_reminder_is_fired_through_worker_threads() {
        let start = Utc.with_ymd_and_hms(2025, 7, 1, 8, 0, 0).unwrap();
        let api = Arc::new(FakeApi::default());
        *api.page.lock().unwrap() = Some(ReminderPage {
            reminders: vec![Reminder {
                id: 4,
                text: "Stretch".to_string(),
                groups: vec![Group { id: 1, name: "Team".to_string() }],
                due_time: start,
                is_completed: false,
                sent_at: None,
                repeat_interval_minutes: 0,
                repeat_count: 0,
                max_repeats: 1,
            }],
            pagination: Pagination::default(),
        });
        *api.trigger_status.lock().unwrap() = Some(TriggerStatus::Sent);

        let engine = Engine::new(Box::new(ManualClock::new(start)), Preferences::in_memory(), 20);
        let mut runtime = Runtime::new(engine, api.clone());
        runtime.engine.start();

        let wait = std::time::Duration::from_secs(2);
        for _ in 0..10 {
            assert!(runtime.run_once(wait));
            if runtime.engine().reminder(4).map_or(false, |r| r.is_completed) {
                break;
            }
        }

        assert!(runtime.engine().reminder(4).unwrap().is_completed);
        let calls = api.calls.lock().unwrap();
        assert_eq!(calls.iter().filter(|c| c.as_str() == "trigger 4").count(), 1);
    }

    #[test]
    fn test_quit_command_stops_loop() {
        let api = Arc::new(FakeApi::default());
        let engine = Engine::new(Box::new(ManualClock::new(Utc::now())), Preferences::in_memory(), 20);
        let mut runtime = Runtime::new(engine, api);
        runtime.sender().send(Event::Command(Command::Quit)).unwrap();
        assert!(!runtime.run_once(std::time::Duration::from_millis(100)));
    }
}
