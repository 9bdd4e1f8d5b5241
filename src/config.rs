//! Application configuration constants
//!
//! Centralized configuration for the reminder engine.

use crate::error::{AppError, AppResult};
use std::env;
use std::path::PathBuf;

/// Granularity of the due-check clock, in milliseconds
pub const TICK_INTERVAL_MS: i64 = 1_000;

/// Background refresh period while no form is open, in seconds
pub const REFRESH_INTERVAL_SECS: i64 = 30;

/// Page size requested from the backend unless overridden
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// The backend silently caps larger page sizes to this value
pub const MAX_PAGE_SIZE: u32 = 100;

/// Pages shown on each side of the current page in the page control
pub const PAGE_WINDOW_DELTA: u32 = 2;

/// Edit forms use relative timing for reminders due within this many days
pub const RELATIVE_EDIT_WINDOW_DAYS: i64 = 30;

/// Backend used when REMINDER_API_URL is not set
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";

/// Folder created under the platform's local data directory
pub const APP_DATA_FOLDER: &str = "ReminderEngine";

/// Runtime settings resolved from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub page_size: u32,
    pub data_dir: PathBuf,
}

impl ClientConfig {
    /// Resolve settings from `REMINDER_API_URL`, `REMINDER_PAGE_SIZE` and `REMINDER_DATA_DIR`.
    pub fn from_env() -> AppResult<Self> {
        let api_base_url = env::var("REMINDER_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());
        let page_size = parse_page_size(env::var("REMINDER_PAGE_SIZE").ok().as_deref());
        let data_dir = match env::var("REMINDER_DATA_DIR") {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => default_data_dir()?,
        };

        Ok(Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            page_size,
            data_dir,
        })
    }
}

fn default_data_dir() -> AppResult<PathBuf> {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DATA_FOLDER))
        .ok_or_else(|| AppError::storage("Failed to get local data dir"))
}

/// Falls back to the default for missing or unparsable values and clamps to the server cap.
fn parse_page_size(raw: Option<&str>) -> u32 {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|size| *size > 0)
        .map(|size| size.min(MAX_PAGE_SIZE))
        .unwrap_or(DEFAULT_PAGE_SIZE)
}
