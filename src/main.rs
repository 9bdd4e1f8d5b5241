fn main() {
    if let Err(e) = reminder_engine_lib::run() {
        eprintln!("reminder-engine: {}", e);
        std::process::exit(1);
    }
}
