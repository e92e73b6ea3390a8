use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::attendance::{AttendanceStore, Roster};
use crate::clock::Clock;
use crate::error::AppError;
use crate::models::AttendanceStatus;

/// Attendance marking for one `(class_id, date)` at a time.
///
/// The roster only ever belongs to the current key. Changing the class or
/// committing a different date replaces the old roster once the new one is
/// fetched, so edits never carry over. Nothing is persisted until [`save`](Self::save).
pub struct AttendanceSession {
    store: Arc<dyn AttendanceStore>,
    clock: Arc<dyn Clock>,
    class_id: String,
    date: NaiveDate,
    roster: Option<Roster>,
    picker_open: bool,
    picker_month: Option<NaiveDate>,
}

impl AttendanceSession {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        clock: Arc<dyn Clock>,
        class_id: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            store,
            clock,
            class_id: class_id.into(),
            date,
            roster: None,
            picker_open: false,
            picker_month: None,
        }
    }

    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn roster(&self) -> Option<&Roster> {
        self.roster.as_ref()
    }

    pub fn is_picker_open(&self) -> bool {
        self.picker_open
    }

    /// Fetch students and persisted marks for the current key and rebuild.
    pub async fn load(&mut self) -> Result<&Roster, AppError> {
        self.roster = None;
        let roster = self.fetch_roster().await?;
        Ok(&*self.roster.insert(roster))
    }

    async fn fetch_roster(&self) -> Result<Roster, AppError> {
        let students = self.store.fetch_students(&self.class_id).await?;
        let records = self.store.fetch_records(&self.class_id, self.date).await?;
        let roster = Roster::build(
            &self.class_id,
            self.date,
            &students,
            &records,
            self.clock.wall_time(),
        );
        debug!(
            "built roster for class {} on {} ({} students, {} persisted)",
            self.class_id,
            self.date,
            roster.len(),
            records.len()
        );
        Ok(roster)
    }

    /// Reload triggered by focus or navigation events. Suppressed while the
    /// date picker is open; returns whether a rebuild happened.
    pub async fn refresh(&mut self) -> Result<bool, AppError> {
        if self.picker_open {
            debug!("date picker open, skipping roster refresh");
            return Ok(false);
        }
        self.load().await?;
        Ok(true)
    }

    pub async fn select_class(&mut self, class_id: &str) -> Result<bool, AppError> {
        if self.class_id == class_id && self.roster.is_some() {
            return Ok(false);
        }
        let date = self.date;
        self.switch_to(class_id.to_string(), date).await?;
        Ok(true)
    }

    pub fn open_date_picker(&mut self) {
        self.picker_open = true;
        self.picker_month = Some(self.date);
    }

    /// Month or year navigation inside the picker. Never fetches.
    pub fn navigate_picker(&mut self, visible_month: NaiveDate) {
        if self.picker_open {
            self.picker_month = Some(visible_month);
        }
    }

    pub fn picker_month(&self) -> Option<NaiveDate> {
        self.picker_month
    }

    /// Dismiss the picker without choosing a day.
    pub fn close_date_picker(&mut self) {
        self.picker_open = false;
        self.picker_month = None;
    }

    /// A day was actually chosen. Rebuilds only when the date changed.
    pub async fn commit_date(&mut self, date: NaiveDate) -> Result<bool, AppError> {
        self.close_date_picker();
        if self.date == date && self.roster.is_some() {
            return Ok(false);
        }
        let class_id = self.class_id.clone();
        self.switch_to(class_id, date).await?;
        Ok(true)
    }

    /// Move to a new key and rebuild. If the fetch fails the session stays on
    /// the previous key with its previous roster, edits included.
    async fn switch_to(&mut self, class_id: String, date: NaiveDate) -> Result<(), AppError> {
        let previous_class = std::mem::replace(&mut self.class_id, class_id);
        let previous_date = std::mem::replace(&mut self.date, date);
        match self.fetch_roster().await {
            Ok(roster) => {
                self.roster = Some(roster);
                Ok(())
            }
            Err(e) => {
                warn!(
                    "loading class {} on {} failed, staying on class {} on {}: {}",
                    self.class_id, self.date, previous_class, previous_date, e
                );
                self.class_id = previous_class;
                self.date = previous_date;
                Err(e)
            }
        }
    }

    pub fn set_status(&mut self, student_id: &str, status: AttendanceStatus) -> Result<(), AppError> {
        let now = self.clock.wall_time();
        let roster = self
            .roster
            .as_mut()
            .ok_or_else(|| AppError::BadRequest("attendance roster has not been loaded".to_string()))?;
        roster.set_status(student_id, status, now)
    }

    /// Send every entry to the store as one batch, then rebuild from what the
    /// store now holds. On failure the in-memory roster is left untouched.
    pub async fn save(&mut self) -> Result<&Roster, AppError> {
        let roster = self
            .roster
            .as_ref()
            .ok_or_else(|| AppError::BadRequest("attendance roster has not been loaded".to_string()))?;
        if roster.is_empty() {
            warn!(
                "refusing to save empty roster for class {} on {}",
                self.class_id, self.date
            );
            return Err(AppError::EmptyRoster);
        }

        let marks = roster.marks();
        if let Err(e) = self
            .store
            .save_records(&self.class_id, self.date, &marks)
            .await
        {
            warn!(
                "saving attendance for class {} on {} failed: {}",
                self.class_id, self.date, e
            );
            return Err(e);
        }
        info!(
            "saved {} attendance marks for class {} on {}",
            marks.len(),
            self.class_id,
            self.date
        );

        // The store is the authority for what was saved.
        let fresh = self.fetch_roster().await?;
        Ok(&*self.roster.insert(fresh))
    }
}
