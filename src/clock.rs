use chrono::{DateTime, Local, NaiveTime, Utc};

/// Source of "now" for status derivation and attendance marking.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;

    /// Wall-clock time of day used when a mark is captured.
    fn wall_time(&self) -> NaiveTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn wall_time(&self) -> NaiveTime {
        Local::now().time()
    }
}

/// A clock pinned to a single instant. Tests move it forward explicitly.
#[derive(Debug)]
pub struct FixedClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn wall_time(&self) -> NaiveTime {
        self.now_utc().time()
    }
}

/// Times are exchanged as `HH:MM`.
pub fn format_wall_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}
