use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Unmarked,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "PRESENT",
            AttendanceStatus::Absent => "ABSENT",
            AttendanceStatus::Late => "LATE",
            AttendanceStatus::Unmarked => "UNMARKED",
        }
    }

    /// PRESENT and LATE carry the wall-clock time the mark was taken.
    pub fn carries_time(&self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Late)
    }

    pub fn is_marked(&self) -> bool {
        !matches!(self, AttendanceStatus::Unmarked)
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PRESENT" => Ok(AttendanceStatus::Present),
            "ABSENT" => Ok(AttendanceStatus::Absent),
            "LATE" => Ok(AttendanceStatus::Late),
            "UNMARKED" => Ok(AttendanceStatus::Unmarked),
            other => Err(AppError::BadRequest(format!("Unknown attendance status: {}", other))),
        }
    }
}

/// A persisted mark, unique per (student_id, class_id, date).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub student_id: String,
    pub class_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceMark {
    pub student_id: String,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveAttendanceRequest {
    pub records: Vec<AttendanceMark>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub status: AttendanceStatus,
    pub time: Option<String>,
}

impl RosterEntry {
    pub fn to_mark(&self) -> AttendanceMark {
        AttendanceMark {
            student_id: self.student_id.clone(),
            status: self.status,
            time: self.time.clone(),
        }
    }
}
