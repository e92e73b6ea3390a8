use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query};
use axum::routing::{patch, post};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::attendance::{AttendanceStats, Roster};
use crate::billing::format_pence;
use crate::db::repository;
use crate::error::AppError;
use crate::models::*;
use crate::state::AppState;

#[derive(Deserialize)]
struct DateQuery {
    date: NaiveDate,
}

#[derive(Deserialize)]
struct RangeQuery {
    from: NaiveDate,
    to: NaiveDate,
}

#[derive(Serialize)]
struct SaveAttendanceResponse {
    saved: usize,
}

#[derive(Serialize)]
struct RosterResponse {
    class_id: String,
    date: NaiveDate,
    entries: Vec<RosterEntry>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/students", post(create_student))
        .route("/students/{id}/archive", patch(archive_student))
        .route("/classes/{class_id}/students", get(list_students))
        .route(
            "/classes/{class_id}/attendance",
            get(list_attendance).put(save_attendance),
        )
        .route("/classes/{class_id}/attendance/stats", get(attendance_stats))
        .route("/classes/{class_id}/roster", get(class_roster))
        .route("/invoices", get(list_invoices).post(create_invoice))
        .route("/invoices/{id}/issue", post(issue_invoice))
        .route("/invoices/{id}/payments", post(record_payment))
        .route("/leads", get(list_leads).post(create_lead))
        .route("/leads/{id}/emails", post(send_lead_email))
        .route("/leads/{id}/complete", post(complete_lead))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn create_student(
    State(state): State<AppState>,
    Json(req): Json<NewStudentRequest>,
) -> Result<Json<Student>, AppError> {
    let student = repository::insert_student(&state.db, req).await?;
    Ok(Json(student))
}

async fn archive_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let ok = repository::archive_student(&state.db, &id).await?;
    if ok {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

async fn list_students(
    State(state): State<AppState>,
    Path(class_id): Path<String>,
) -> Result<Json<Vec<Student>>, AppError> {
    let students = repository::fetch_students_for_class(&state.db, &class_id).await?;
    Ok(Json(students))
}

async fn list_attendance(
    State(state): State<AppState>,
    Path(class_id): Path<String>,
    query: Result<Query<DateQuery>, QueryRejection>,
) -> Result<Json<Vec<AttendanceRecord>>, AppError> {
    let Query(params) = query?;
    let records = repository::fetch_attendance(&state.db, &class_id, params.date).await?;
    Ok(Json(records))
}

async fn save_attendance(
    State(state): State<AppState>,
    Path(class_id): Path<String>,
    query: Result<Query<DateQuery>, QueryRejection>,
    Json(req): Json<SaveAttendanceRequest>,
) -> Result<Json<SaveAttendanceResponse>, AppError> {
    let Query(params) = query?;
    let saved = repository::replace_attendance(&state.db, &class_id, params.date, &req.records).await?;
    info!("saved {} attendance marks for class {} on {}", saved, class_id, params.date);
    Ok(Json(SaveAttendanceResponse { saved }))
}

async fn attendance_stats(
    State(state): State<AppState>,
    Path(class_id): Path<String>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Json<AttendanceStats>, AppError> {
    let Query(params) = query?;
    if params.from > params.to {
        return Err(AppError::BadRequest("from must not be after to".to_string()));
    }
    let records =
        repository::fetch_attendance_between(&state.db, &class_id, params.from, params.to).await?;
    Ok(Json(AttendanceStats::from_records(&records)))
}

/// The reconciled sheet staff start marking from. Nothing is persisted.
async fn class_roster(
    State(state): State<AppState>,
    Path(class_id): Path<String>,
    query: Result<Query<DateQuery>, QueryRejection>,
) -> Result<Json<RosterResponse>, AppError> {
    let Query(params) = query?;
    let students = repository::fetch_students_for_class(&state.db, &class_id).await?;
    let records = repository::fetch_attendance(&state.db, &class_id, params.date).await?;
    let roster = Roster::build(&class_id, params.date, &students, &records, state.clock.wall_time());
    Ok(Json(RosterResponse {
        class_id,
        date: params.date,
        entries: roster.entries().to_vec(),
    }))
}

fn to_view(invoice: Invoice, state: &AppState) -> InvoiceView {
    InvoiceView {
        status: invoice.effective_status(state.clock.now_utc()),
        amount_display: format_pence(invoice.amount_pence),
        invoice,
    }
}

async fn list_invoices(State(state): State<AppState>) -> Result<Json<Vec<InvoiceView>>, AppError> {
    let invoices = repository::fetch_invoices(&state.db).await?;
    Ok(Json(invoices.into_iter().map(|i| to_view(i, &state)).collect()))
}

async fn create_invoice(
    State(state): State<AppState>,
    Json(req): Json<NewInvoiceRequest>,
) -> Result<Json<InvoiceView>, AppError> {
    let invoice = repository::insert_invoice(&state.db, req).await?;
    Ok(Json(to_view(invoice, &state)))
}

async fn issue_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InvoiceView>, AppError> {
    let invoice = repository::issue_invoice(&state.db, &id).await?;
    Ok(Json(to_view(invoice, &state)))
}

async fn record_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RecordPaymentRequest>,
) -> Result<Json<InvoiceView>, AppError> {
    let paid_at = req.paid_at.unwrap_or_else(|| state.clock.now_utc());
    let invoice = repository::record_payment(&state.db, &id, req.method, paid_at).await?;
    info!("recorded {} payment for invoice {}", req.method.as_str(), id);
    Ok(Json(to_view(invoice, &state)))
}

async fn list_leads(State(state): State<AppState>) -> Result<Json<Vec<Lead>>, AppError> {
    let leads = repository::fetch_leads(&state.db).await?;
    Ok(Json(leads))
}

async fn create_lead(
    State(state): State<AppState>,
    Json(req): Json<NewLeadRequest>,
) -> Result<Json<Lead>, AppError> {
    let lead = repository::insert_lead(&state.db, req).await?;
    Ok(Json(lead))
}

async fn send_lead_email(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Lead>, AppError> {
    let lead = repository::record_email_sent(&state.db, &id, state.clock.now_utc()).await?;
    if let Some(stage) = lead.email_stage {
        info!("lead {} moved to {}", id, stage);
    }
    Ok(Json(lead))
}

async fn complete_lead(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Lead>, AppError> {
    let lead = repository::complete_outreach(&state.db, &id).await?;
    info!("outreach completed for lead {}", id);
    Ok(Json(lead))
}
