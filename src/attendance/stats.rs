use serde::Serialize;

use crate::models::{AttendanceRecord, AttendanceStatus};

/// Attendance rate over a set of persisted marks. LATE counts as attended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttendanceStats {
    pub present: usize,
    pub late: usize,
    pub absent: usize,
    pub marked: usize,
    /// Percentage of marked sessions attended, `None` if nothing is marked.
    pub rate: Option<f64>,
}

impl AttendanceStats {
    pub fn from_records(records: &[AttendanceRecord]) -> Self {
        let mut present = 0;
        let mut late = 0;
        let mut absent = 0;

        for record in records {
            match record.status {
                AttendanceStatus::Present => present += 1,
                AttendanceStatus::Late => late += 1,
                AttendanceStatus::Absent => absent += 1,
                AttendanceStatus::Unmarked => {}
            }
        }

        let marked = present + late + absent;
        let rate = if marked == 0 {
            None
        } else {
            Some((present + late) as f64 / marked as f64 * 100.0)
        };

        Self {
            present,
            late,
            absent,
            marked,
            rate,
        }
    }
}
