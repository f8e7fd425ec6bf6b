//! Clock used to stamp changelogs

use chrono::Local;

/// Timestamp format, e.g. `20130101-1200+0100`
pub const DATESTAMP_FORMAT: &str = "%Y%m%d-%H%M%z";

/// Source of sortable timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> String;
}

/// Wall clock in the local timezone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> String {
        Local::now().format(DATESTAMP_FORMAT).to_string()
    }
}

/// Clock that always answers the same timestamp
#[derive(Debug, Clone)]
pub struct FixedClock(pub String);

impl Clock for FixedClock {
    fn now(&self) -> String {
        self.0.clone()
    }
}
