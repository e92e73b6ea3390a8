use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::AppError;
use crate::models::{AttendanceMark, AttendanceRecord, Student};

/// The persistence authority an attendance session reads from and saves to.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn fetch_students(&self, class_id: &str) -> Result<Vec<Student>, AppError>;

    async fn fetch_records(
        &self,
        class_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AppError>;

    /// Replace the marks for `(class_id, date)` in one atomic batch.
    async fn save_records(
        &self,
        class_id: &str,
        date: NaiveDate,
        marks: &[AttendanceMark],
    ) -> Result<(), AppError>;
}
