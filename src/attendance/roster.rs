use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::clock::format_wall_time;
use crate::error::AppError;
use crate::models::{AttendanceMark, AttendanceRecord, AttendanceStatus, RosterEntry, Student};

/// The in-memory attendance sheet for one class on one date.
///
/// Edits made through [`Roster::set_status`] stay local until the whole roster
/// is handed to a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    class_id: String,
    date: NaiveDate,
    entries: Vec<RosterEntry>,
}

impl Roster {
    /// Merge persisted marks with the enrolled students.
    ///
    /// Students with a persisted PRESENT, ABSENT or LATE mark keep it as is.
    /// Everyone else defaults to PRESENT at `now`, captured once for the
    /// whole build. Archived students are left out and records for other
    /// classes or dates are ignored.
    pub fn build(
        class_id: &str,
        date: NaiveDate,
        students: &[Student],
        persisted: &[AttendanceRecord],
        now: NaiveTime,
    ) -> Self {
        let by_student: HashMap<&str, &AttendanceRecord> = persisted
            .iter()
            .filter(|r| r.class_id == class_id && r.date == date)
            .map(|r| (r.student_id.as_str(), r))
            .collect();

        let captured = format_wall_time(now);

        let mut entries: Vec<RosterEntry> = students
            .iter()
            .filter(|s| !s.is_archived)
            .map(|student| {
                let (status, time) = match by_student.get(student.id.as_str()) {
                    Some(record) if record.status.is_marked() => (record.status, record.time.clone()),
                    _ => (AttendanceStatus::Present, Some(captured.clone())),
                };
                RosterEntry {
                    student_id: student.id.clone(),
                    first_name: student.first_name.clone(),
                    last_name: student.last_name.clone(),
                    status,
                    time,
                }
            })
            .collect();

        entries.sort_by_cached_key(name_key);

        Self {
            class_id: class_id.to_string(),
            date,
            entries,
        }
    }

    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, student_id: &str) -> Option<&RosterEntry> {
        self.entries.iter().find(|e| e.student_id == student_id)
    }

    /// Local edit. ABSENT clears the time; PRESENT and LATE always take a
    /// fresh time rather than keeping whatever was there before.
    pub fn set_status(
        &mut self,
        student_id: &str,
        status: AttendanceStatus,
        now: NaiveTime,
    ) -> Result<(), AppError> {
        if !status.is_marked() {
            return Err(AppError::BadRequest(
                "a roster entry cannot be reset to UNMARKED".to_string(),
            ));
        }

        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.student_id == student_id)
            .ok_or(AppError::NotFound)?;

        entry.status = status;
        entry.time = if status.carries_time() {
            Some(format_wall_time(now))
        } else {
            None
        };
        Ok(())
    }

    /// Every entry, changed or not, as sent to a bulk save.
    pub fn marks(&self) -> Vec<AttendanceMark> {
        self.entries.iter().map(RosterEntry::to_mark).collect()
    }
}

/// Collation key for roster order: accents and case are ignored first, so
/// "Émile" sits with the E's, then the exact lowercase spelling and the
/// student id break ties.
fn name_key(entry: &RosterEntry) -> (String, String, String, String, String) {
    (
        fold(&entry.first_name),
        fold(&entry.last_name),
        entry.first_name.to_lowercase(),
        entry.last_name.to_lowercase(),
        entry.student_id.clone(),
    )
}

fn fold(name: &str) -> String {
    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}
