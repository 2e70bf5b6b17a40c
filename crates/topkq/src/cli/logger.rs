use anstream::eprintln;
use log::{Metadata, Record};

/// Writes log records to stderr, so they never mix with generated SQL on
/// stdout.
pub struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let module = record.module_path().unwrap_or_default();
            eprintln!("[{} {module}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}
