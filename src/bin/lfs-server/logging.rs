//! Global logger

use std::env;
use std::fmt;
use std::thread;

use log::{Level, LevelFilter, Log, Metadata, Record};

/// Add escape sequence to print with color in Linux console
macro_rules! with_color {
    ($args: ident, $color_code: ident) => {{
        format_args!("\u{1B}[{}m{}\u{1B}[0m", $color_code as u8, $args)
    }};
}

/// Print msg with color
fn print_in_color(args: fmt::Arguments, color_code: u8) {
    eprint!("{}", with_color!(args, color_code));
}

/// a simple logger
struct SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }
    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let color = match record.level() {
            Level::Error => 31, // Red
            Level::Warn => 93,  // BrightYellow
            Level::Info => 34,  // Blue
            Level::Debug => 32, // Green
            Level::Trace => 90, // BrightBlack
        };
        let current = thread::current();
        print_in_color(
            format_args!(
                "[{:>5}][{}][{}] {}\n",
                record.level(),
                record.target(),
                current.name().unwrap_or("-"),
                record.args()
            ),
            color,
        );
    }
    fn flush(&self) {}
}

fn level_filter(level: Option<&str>) -> LevelFilter {
    match level {
        Some("ERROR") => LevelFilter::Error,
        Some("WARN") => LevelFilter::Warn,
        Some("INFO") => LevelFilter::Info,
        Some("DEBUG") => LevelFilter::Debug,
        Some("TRACE") => LevelFilter::Trace,
        Some("OFF") => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// initiate logger, the level is taken from the `LOG` environment variable
pub fn init() {
    static LOGGER: SimpleLogger = SimpleLogger;
    if log::set_logger(&LOGGER).is_ok() {
        let level = env::var("LOG").ok().map(|level| level.to_uppercase());
        log::set_max_level(level_filter(level.as_deref()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter() {
        assert_eq!(LevelFilter::Error, level_filter(Some("ERROR")));
        assert_eq!(LevelFilter::Trace, level_filter(Some("TRACE")));
        assert_eq!(LevelFilter::Off, level_filter(Some("OFF")));
        assert_eq!(LevelFilter::Info, level_filter(Some("verbose")));
        assert_eq!(LevelFilter::Info, level_filter(None));
    }
}
