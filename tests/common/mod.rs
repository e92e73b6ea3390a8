#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use madrasah_backend::clock::FixedClock;
use madrasah_backend::db::repository;
use madrasah_backend::models::{NewStudentRequest, Student};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

pub async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test db");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub fn fixed_clock(now: DateTime<Utc>) -> Arc<FixedClock> {
    Arc::new(FixedClock::new(now))
}

pub async fn enrol(pool: &SqlitePool, class_id: &str, first: &str, last: &str) -> Student {
    repository::insert_student(
        pool,
        NewStudentRequest {
            class_id: class_id.to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
        },
    )
    .await
    .expect("Failed to insert student")
}
