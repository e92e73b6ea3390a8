use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::attendance::AttendanceStore;
use crate::db::repository;
use crate::error::AppError;
use crate::models::{AttendanceMark, AttendanceRecord, Student};

/// Attendance store backed directly by the local database.
#[derive(Clone)]
pub struct SqliteStore {
    db: SqlitePool,
}

impl SqliteStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AttendanceStore for SqliteStore {
    async fn fetch_students(&self, class_id: &str) -> Result<Vec<Student>, AppError> {
        Ok(repository::fetch_students_for_class(&self.db, class_id).await?)
    }

    async fn fetch_records(
        &self,
        class_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        repository::fetch_attendance(&self.db, class_id, date).await
    }

    async fn save_records(
        &self,
        class_id: &str,
        date: NaiveDate,
        marks: &[AttendanceMark],
    ) -> Result<(), AppError> {
        repository::replace_attendance(&self.db, class_id, date, marks).await?;
        Ok(())
    }
}
