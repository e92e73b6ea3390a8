mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use madrasah_backend::attendance::{AttendanceSession, AttendanceStore};
use madrasah_backend::db::SqliteStore;
use madrasah_backend::error::AppError;
use madrasah_backend::models::{AttendanceMark, AttendanceRecord, AttendanceStatus, Student};

use common::{enrol, fixed_clock, setup_test_db, utc};

/// Wraps the SQLite store, counting fetches and optionally failing saves.
struct ObservedStore {
    inner: SqliteStore,
    fetches: AtomicUsize,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
    fail_fetches: AtomicBool,
}

impl ObservedStore {
    fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            fetches: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
            fail_saves: AtomicBool::new(false),
            fail_fetches: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl AttendanceStore for ObservedStore {
    async fn fetch_students(&self, class_id: &str) -> Result<Vec<Student>, AppError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(AppError::Upstream("request timed out".to_string()));
        }
        self.inner.fetch_students(class_id).await
    }

    async fn fetch_records(
        &self,
        class_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        self.inner.fetch_records(class_id, date).await
    }

    async fn save_records(
        &self,
        class_id: &str,
        date: NaiveDate,
        marks: &[AttendanceMark],
    ) -> Result<(), AppError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(AppError::Upstream("connection reset".to_string()));
        }
        self.inner.save_records(class_id, date, marks).await
    }
}

fn jan(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
}

#[tokio::test]
async fn test_defaults_to_present_with_a_single_captured_time() {
    let pool = setup_test_db().await;
    for name in ["Aisha", "Bilal", "Fatima"] {
        enrol(&pool, "class-a", name, "Khan").await;
    }
    let store = Arc::new(SqliteStore::new(pool));
    let clock = fixed_clock(utc(2025, 1, 6, 8, 55));
    let mut session = AttendanceSession::new(store, clock, "class-a", jan(6));

    let roster = session.load().await.unwrap();
    assert_eq!(roster.len(), 3);
    assert!(roster.entries().iter().all(|e| e.status == AttendanceStatus::Present));
    assert!(roster.entries().iter().all(|e| e.time.as_deref() == Some("08:55")));
}

#[tokio::test]
async fn test_save_persists_every_entry_and_rebuilds_from_store() {
    let pool = setup_test_db().await;
    let adam = enrol(&pool, "class-a", "Adam", "Patel").await;
    let hana = enrol(&pool, "class-a", "Hana", "Ali").await;
    let store = Arc::new(SqliteStore::new(pool.clone()));
    let clock = fixed_clock(utc(2025, 1, 6, 9, 0));
    let mut session = AttendanceSession::new(store.clone(), clock.clone(), "class-a", jan(6));
    session.load().await.unwrap();

    clock.set(utc(2025, 1, 6, 9, 5));
    session.set_status(&hana.id, AttendanceStatus::Absent).unwrap();
    let roster = session.save().await.unwrap();
    assert_eq!(roster.get(&hana.id).unwrap().status, AttendanceStatus::Absent);
    assert_eq!(roster.get(&adam.id).unwrap().time.as_deref(), Some("09:00"));

    // Unchanged entries were saved too.
    let persisted = store.fetch_records("class-a", jan(6)).await.unwrap();
    assert_eq!(persisted.len(), 2);

    // A fresh session sees the saved marks, not new defaults.
    clock.set(utc(2025, 1, 6, 11, 0));
    let mut other = AttendanceSession::new(store, clock, "class-a", jan(6));
    let roster = other.load().await.unwrap();
    assert_eq!(roster.get(&adam.id).unwrap().time.as_deref(), Some("09:00"));
    assert_eq!(roster.get(&hana.id).unwrap().time, None);
}

#[tokio::test]
async fn test_absent_then_present_takes_a_fresh_time() {
    let pool = setup_test_db().await;
    let adam = enrol(&pool, "class-a", "Adam", "Patel").await;
    let clock = fixed_clock(utc(2025, 1, 6, 9, 0));
    let mut session =
        AttendanceSession::new(Arc::new(SqliteStore::new(pool)), clock.clone(), "class-a", jan(6));
    session.load().await.unwrap();

    clock.set(utc(2025, 1, 6, 9, 10));
    session.set_status(&adam.id, AttendanceStatus::Absent).unwrap();
    assert_eq!(session.roster().unwrap().get(&adam.id).unwrap().time, None);

    clock.set(utc(2025, 1, 6, 9, 20));
    session.set_status(&adam.id, AttendanceStatus::Present).unwrap();
    assert_eq!(
        session.roster().unwrap().get(&adam.id).unwrap().time.as_deref(),
        Some("09:20")
    );
}

#[tokio::test]
async fn test_switching_date_discards_unsaved_edits() {
    let pool = setup_test_db().await;
    let adam = enrol(&pool, "class-a", "Adam", "Patel").await;
    let clock = fixed_clock(utc(2025, 1, 6, 9, 0));
    let mut session =
        AttendanceSession::new(Arc::new(SqliteStore::new(pool)), clock, "class-a", jan(6));
    session.load().await.unwrap();

    session.set_status(&adam.id, AttendanceStatus::Absent).unwrap();
    assert!(session.commit_date(jan(7)).await.unwrap());
    assert_eq!(
        session.roster().unwrap().get(&adam.id).unwrap().status,
        AttendanceStatus::Present
    );

    // Going back does not resurrect the unsaved absence either.
    assert!(session.commit_date(jan(6)).await.unwrap());
    assert_eq!(
        session.roster().unwrap().get(&adam.id).unwrap().status,
        AttendanceStatus::Present
    );
}

#[tokio::test]
async fn test_switching_class_rebuilds_for_new_class() {
    let pool = setup_test_db().await;
    enrol(&pool, "class-a", "Adam", "Patel").await;
    let yusuf = enrol(&pool, "class-b", "Yusuf", "Rahman").await;
    let clock = fixed_clock(utc(2025, 1, 6, 9, 0));
    let mut session =
        AttendanceSession::new(Arc::new(SqliteStore::new(pool)), clock, "class-a", jan(6));
    session.load().await.unwrap();

    assert!(session.select_class("class-b").await.unwrap());
    let roster = session.roster().unwrap();
    assert_eq!(roster.class_id(), "class-b");
    assert_eq!(roster.len(), 1);
    assert!(roster.get(&yusuf.id).is_some());

    assert!(!session.select_class("class-b").await.unwrap());
}

#[tokio::test]
async fn test_open_picker_suppresses_refetching() {
    let pool = setup_test_db().await;
    enrol(&pool, "class-a", "Adam", "Patel").await;
    let store = Arc::new(ObservedStore::new(SqliteStore::new(pool)));
    let clock = fixed_clock(utc(2025, 1, 6, 9, 0));
    let mut session = AttendanceSession::new(store.clone(), clock, "class-a", jan(6));
    session.load().await.unwrap();
    assert_eq!(store.fetches.load(Ordering::SeqCst), 1);

    session.open_date_picker();
    session.navigate_picker(NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
    session.navigate_picker(NaiveDate::from_ymd_opt(2024, 11, 1).unwrap());
    assert!(!session.refresh().await.unwrap());
    assert_eq!(session.picker_month(), NaiveDate::from_ymd_opt(2024, 11, 1));
    assert_eq!(store.fetches.load(Ordering::SeqCst), 1);

    assert!(session.commit_date(jan(8)).await.unwrap());
    assert!(!session.is_picker_open());
    assert_eq!(session.date(), jan(8));
    assert_eq!(store.fetches.load(Ordering::SeqCst), 2);

    // Re-committing the same day is not a change.
    session.open_date_picker();
    assert!(!session.commit_date(jan(8)).await.unwrap());
    assert_eq!(store.fetches.load(Ordering::SeqCst), 2);

    assert!(session.refresh().await.unwrap());
    assert_eq!(store.fetches.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_failed_save_keeps_edits() {
    let pool = setup_test_db().await;
    let adam = enrol(&pool, "class-a", "Adam", "Patel").await;
    let store = Arc::new(ObservedStore::new(SqliteStore::new(pool)));
    store.fail_saves.store(true, Ordering::SeqCst);
    let clock = fixed_clock(utc(2025, 1, 6, 9, 0));
    let mut session = AttendanceSession::new(store.clone(), clock, "class-a", jan(6));
    session.load().await.unwrap();
    session.set_status(&adam.id, AttendanceStatus::Late).unwrap();

    let result = session.save().await;
    assert!(matches!(result, Err(AppError::Upstream(_))));
    assert_eq!(
        session.roster().unwrap().get(&adam.id).unwrap().status,
        AttendanceStatus::Late
    );

    // Retrying after the failure goes through.
    store.fail_saves.store(false, Ordering::SeqCst);
    let roster = session.save().await.unwrap();
    assert_eq!(roster.get(&adam.id).unwrap().status, AttendanceStatus::Late);
    assert_eq!(store.saves.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_empty_roster_cannot_be_saved() {
    let pool = setup_test_db().await;
    let store = Arc::new(ObservedStore::new(SqliteStore::new(pool)));
    let clock = fixed_clock(utc(2025, 1, 6, 9, 0));
    let mut session = AttendanceSession::new(store.clone(), clock, "empty-class", jan(6));

    assert!(matches!(session.save().await, Err(AppError::BadRequest(_))));

    session.load().await.unwrap();
    let err = session.save().await.unwrap_err();
    assert!(matches!(err, AppError::EmptyRoster));
    assert_eq!(err.to_string(), "No students to mark attendance for");
    assert_eq!(store.saves.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_switch_stays_on_previous_key() {
    let pool = setup_test_db().await;
    let adam = enrol(&pool, "class-a", "Adam", "Patel").await;
    enrol(&pool, "class-b", "Yusuf", "Rahman").await;
    let store = Arc::new(ObservedStore::new(SqliteStore::new(pool)));
    let clock = fixed_clock(utc(2025, 1, 6, 9, 0));
    let mut session = AttendanceSession::new(store.clone(), clock, "class-a", jan(6));
    session.load().await.unwrap();
    session.set_status(&adam.id, AttendanceStatus::Late).unwrap();

    store.fail_fetches.store(true, Ordering::SeqCst);
    assert!(matches!(
        session.select_class("class-b").await,
        Err(AppError::Upstream(_))
    ));
    assert_eq!(session.class_id(), "class-a");

    session.open_date_picker();
    assert!(matches!(session.commit_date(jan(7)).await, Err(AppError::Upstream(_))));
    assert_eq!(session.date(), jan(6));
    assert!(!session.is_picker_open());

    let roster = session.roster().unwrap();
    assert_eq!(roster.class_id(), "class-a");
    assert_eq!(roster.date(), jan(6));
    assert_eq!(roster.get(&adam.id).unwrap().status, AttendanceStatus::Late);

    // Once the store is back the switch goes through.
    store.fail_fetches.store(false, Ordering::SeqCst);
    assert!(session.select_class("class-b").await.unwrap());
    assert_eq!(session.roster().unwrap().class_id(), "class-b");
}
