//! `log` backend for the loader. Records go to the serial port so they can
//! be captured by the host; the display is reserved for fatal diagnostics.
//!
//! The level is fixed at build time through the `LOG` environment variable.

use log::{Level, LevelFilter, Log, Metadata, Record};

struct KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        crate::serial_println!(
            "[{:>5}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

pub fn level_filter() -> LevelFilter {
    match option_env!("LOG") {
        Some("OFF") => LevelFilter::Off,
        Some("ERROR") => LevelFilter::Error,
        Some("WARN") => LevelFilter::Warn,
        Some("DEBUG") => LevelFilter::Debug,
        Some("TRACE") => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Install the logger. A second call keeps the first logger in place.
pub fn init() {
    static LOGGER: KernelLogger = KernelLogger;
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level_filter());
    }
}

/// Whether records at `level` currently reach the serial port.
pub fn enabled(level: Level) -> bool {
    level <= log::max_level()
}
