pub mod api;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod form;
pub mod mutation;
pub mod paginator;
pub mod preferences;
pub mod reminder;
pub mod runtime;
pub mod scheduler;
pub mod storage;
pub mod trigger;

use std::sync::Arc;

use api::HttpReminderApi;
use clock::SystemClock;
use config::ClientConfig;
use engine::Engine;
use error::AppResult;
use preferences::Preferences;
use runtime::Runtime;
use storage::local::FileKeyValueStore;

/// Start the headless client: load preferences, connect to the backend and drive the engine
/// from stdin commands until `quit`.
pub fn run() -> AppResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ClientConfig::from_env()?;
    log::info!(
        "Using backend {} with data dir {}",
        config.api_base_url,
        config.data_dir.display()
    );

    let store = FileKeyValueStore::open(&config.data_dir)?;
    log::debug!("Preferences file: {}", store.path().display());
    let preferences = Preferences::load(Box::new(store));

    let api = Arc::new(HttpReminderApi::new(&config.api_base_url));
    let engine = Engine::new(Box::new(SystemClock), preferences, config.page_size);

    let runtime = Runtime::new(engine, api);
    println!("{}", runtime::USAGE);
    runtime.spawn_stdin_reader();
    runtime.run()
}
