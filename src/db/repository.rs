use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::error::AppError;
use crate::leads::{LeadEmailStage, OutreachProgress};
use crate::models::{
    AttendanceMark, AttendanceRecord, AttendanceStatus, Invoice, InvoiceState, Lead,
    NewInvoiceRequest, NewLeadRequest, NewStudentRequest, PaymentMethod, Student,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_stored_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| AppError::InvalidDate(format!("stored date {:?}: {}", raw, e)))
}

fn parse_stored_timestamp(raw: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::InvalidDate(format!("stored timestamp {:?}: {}", raw, e)))
}

// Students

pub async fn insert_student(db: &SqlitePool, req: NewStudentRequest) -> Result<Student, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO students (id, class_id, first_name, last_name, is_archived, created_at) VALUES (?, ?, ?, ?, 0, ?)",
    )
    .bind(&id)
    .bind(&req.class_id)
    .bind(&req.first_name)
    .bind(&req.last_name)
    .bind(&now)
    .execute(db)
    .await?;

    Ok(Student {
        id,
        class_id: req.class_id,
        first_name: req.first_name,
        last_name: req.last_name,
        is_archived: false,
        created_at: now,
    })
}

/// All students ever enrolled in the class, archived ones included.
pub async fn fetch_students_for_class(db: &SqlitePool, class_id: &str) -> Result<Vec<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>(
        "SELECT id, class_id, first_name, last_name, is_archived, created_at FROM students WHERE class_id = ? ORDER BY first_name, last_name",
    )
    .bind(class_id)
    .fetch_all(db)
    .await
}

pub async fn archive_student(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE students SET is_archived = 1 WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}

// Attendance

#[derive(FromRow)]
struct AttendanceRow {
    student_id: String,
    class_id: String,
    date: String,
    status: String,
    time: Option<String>,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = AppError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        Ok(AttendanceRecord {
            date: parse_stored_date(&row.date)?,
            status: row.status.parse()?,
            student_id: row.student_id,
            class_id: row.class_id,
            time: row.time,
        })
    }
}

pub async fn fetch_attendance(
    db: &SqlitePool,
    class_id: &str,
    date: NaiveDate,
) -> Result<Vec<AttendanceRecord>, AppError> {
    let rows = sqlx::query_as::<_, AttendanceRow>(
        "SELECT student_id, class_id, date, status, time FROM attendance WHERE class_id = ? AND date = ?",
    )
    .bind(class_id)
    .bind(format_date(date))
    .fetch_all(db)
    .await?;

    rows.into_iter().map(AttendanceRecord::try_from).collect()
}

/// Inclusive on both ends.
pub async fn fetch_attendance_between(
    db: &SqlitePool,
    class_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<AttendanceRecord>, AppError> {
    let rows = sqlx::query_as::<_, AttendanceRow>(
        "SELECT student_id, class_id, date, status, time FROM attendance WHERE class_id = ? AND date >= ? AND date <= ? ORDER BY date",
    )
    .bind(class_id)
    .bind(format_date(from))
    .bind(format_date(to))
    .fetch_all(db)
    .await?;

    rows.into_iter().map(AttendanceRecord::try_from).collect()
}

/// Check a batch before it touches the database and normalise times.
/// ABSENT never keeps a time; PRESENT and LATE must carry `HH:MM`.
fn validate_marks(marks: &[AttendanceMark]) -> Result<Vec<AttendanceMark>, AppError> {
    if marks.is_empty() {
        return Err(AppError::EmptyRoster);
    }

    let mut seen = HashSet::new();
    let mut normalised = Vec::with_capacity(marks.len());
    for mark in marks {
        if !seen.insert(mark.student_id.as_str()) {
            return Err(AppError::BadRequest(format!(
                "student {} appears more than once",
                mark.student_id
            )));
        }

        let time = match mark.status {
            AttendanceStatus::Unmarked => {
                return Err(AppError::BadRequest(format!(
                    "student {} has no attendance status",
                    mark.student_id
                )));
            }
            AttendanceStatus::Absent => None,
            AttendanceStatus::Present | AttendanceStatus::Late => {
                let raw = mark.time.as_deref().ok_or_else(|| {
                    AppError::BadRequest(format!(
                        "{} mark for student {} needs a time",
                        mark.status, mark.student_id
                    ))
                })?;
                NaiveTime::parse_from_str(raw, "%H:%M").map_err(|_| {
                    AppError::BadRequest(format!("invalid time {:?} for student {}", raw, mark.student_id))
                })?;
                Some(raw.to_string())
            }
        };

        normalised.push(AttendanceMark {
            student_id: mark.student_id.clone(),
            status: mark.status,
            time,
        });
    }
    Ok(normalised)
}

/// Write a whole roster for `(class_id, date)` in one transaction.
/// Any invalid mark aborts the batch and nothing is written.
pub async fn replace_attendance(
    db: &SqlitePool,
    class_id: &str,
    date: NaiveDate,
    marks: &[AttendanceMark],
) -> Result<usize, AppError> {
    let marks = validate_marks(marks)?;
    let date = format_date(date);
    let now = Utc::now().to_rfc3339();

    let mut tx = db.begin().await?;

    for mark in &marks {
        let enrolled: Option<(String,)> =
            sqlx::query_as("SELECT id FROM students WHERE id = ? AND class_id = ?")
                .bind(&mark.student_id)
                .bind(class_id)
                .fetch_optional(&mut *tx)
                .await?;
        if enrolled.is_none() {
            return Err(AppError::BadRequest(format!(
                "student {} is not enrolled in class {}",
                mark.student_id, class_id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO attendance (student_id, class_id, date, status, time, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (student_id, class_id, date)
            DO UPDATE SET status = excluded.status, time = excluded.time, updated_at = excluded.updated_at
            "#,
        )
        .bind(&mark.student_id)
        .bind(class_id)
        .bind(&date)
        .bind(mark.status.as_str())
        .bind(&mark.time)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(marks.len())
}

// Invoices

#[derive(FromRow)]
struct InvoiceRow {
    id: String,
    student_id: String,
    description: String,
    amount_pence: i64,
    due_date: String,
    state: String,
    paid_at: Option<String>,
    payment_method: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = AppError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        Ok(Invoice {
            due_date: parse_stored_date(&row.due_date)?,
            state: row.state.parse()?,
            paid_at: row.paid_at.as_deref().map(parse_stored_timestamp).transpose()?,
            payment_method: row
                .payment_method
                .as_deref()
                .map(str::parse::<PaymentMethod>)
                .transpose()?,
            id: row.id,
            student_id: row.student_id,
            description: row.description,
            amount_pence: row.amount_pence,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const INVOICE_COLUMNS: &str =
    "id, student_id, description, amount_pence, due_date, state, paid_at, payment_method, created_at, updated_at";

pub async fn insert_invoice(db: &SqlitePool, req: NewInvoiceRequest) -> Result<Invoice, AppError> {
    if req.amount_pence <= 0 {
        return Err(AppError::BadRequest("amount_pence must be positive".to_string()));
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    let state = if req.issue { InvoiceState::Issued } else { InvoiceState::Draft };

    sqlx::query(
        r#"
        INSERT INTO invoices
            (id, student_id, description, amount_pence, due_date, state,
            paid_at, payment_method, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, NULL, NULL, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&req.student_id)
    .bind(&req.description)
    .bind(req.amount_pence)
    .bind(format_date(req.due_date))
    .bind(state.as_str())
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    Ok(Invoice {
        id,
        student_id: req.student_id,
        description: req.description,
        amount_pence: req.amount_pence,
        due_date: req.due_date,
        state,
        paid_at: None,
        payment_method: None,
        created_at: now.clone(),
        updated_at: now,
    })
}

pub async fn fetch_invoices(db: &SqlitePool) -> Result<Vec<Invoice>, AppError> {
    let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
        "SELECT {} FROM invoices ORDER BY due_date DESC, created_at DESC",
        INVOICE_COLUMNS
    ))
    .fetch_all(db)
    .await?;

    rows.into_iter().map(Invoice::try_from).collect()
}

pub async fn find_invoice_by_id(db: &SqlitePool, id: &str) -> Result<Option<Invoice>, AppError> {
    let row = sqlx::query_as::<_, InvoiceRow>(&format!(
        "SELECT {} FROM invoices WHERE id = ?",
        INVOICE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;

    row.map(Invoice::try_from).transpose()
}

pub async fn issue_invoice(db: &SqlitePool, id: &str) -> Result<Invoice, AppError> {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query("UPDATE invoices SET state = 'ISSUED', updated_at = ? WHERE id = ? AND state = 'DRAFT'")
        .bind(&now)
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    let invoice = find_invoice_by_id(db, id).await?.ok_or(AppError::NotFound)?;
    if result == 0 {
        return Err(AppError::Conflict(format!("invoice {} is not a draft", id)));
    }
    Ok(invoice)
}

/// Set `paid_at` once. A second payment, or one against a draft, is refused.
pub async fn record_payment(
    db: &SqlitePool,
    id: &str,
    method: PaymentMethod,
    paid_at: DateTime<Utc>,
) -> Result<Invoice, AppError> {
    let invoice = find_invoice_by_id(db, id).await?.ok_or(AppError::NotFound)?;
    match invoice.state {
        InvoiceState::Draft => {
            return Err(AppError::BadRequest(format!(
                "invoice {} is a draft and cannot be paid",
                id
            )));
        }
        InvoiceState::Paid => {
            return Err(AppError::Conflict(format!("invoice {} is already paid", id)));
        }
        InvoiceState::Issued => {}
    }

    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        r#"
        UPDATE invoices
        SET state = 'PAID', paid_at = ?, payment_method = ?, updated_at = ?
        WHERE id = ? AND state = 'ISSUED' AND paid_at IS NULL
        "#,
    )
    .bind(paid_at.to_rfc3339())
    .bind(method.as_str())
    .bind(&now)
    .bind(id)
    .execute(db)
    .await?
    .rows_affected();

    if result == 0 {
        return Err(AppError::Conflict(format!("invoice {} is already paid", id)));
    }

    find_invoice_by_id(db, id).await?.ok_or(AppError::NotFound)
}

// Leads

#[derive(FromRow)]
struct LeadRow {
    id: String,
    name: String,
    email: String,
    email_stage: Option<String>,
    outreach_completed: bool,
    last_emailed_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<LeadRow> for Lead {
    type Error = AppError;

    fn try_from(row: LeadRow) -> Result<Self, Self::Error> {
        Ok(Lead {
            email_stage: row
                .email_stage
                .as_deref()
                .map(str::parse::<LeadEmailStage>)
                .transpose()?,
            id: row.id,
            name: row.name,
            email: row.email,
            outreach_completed: row.outreach_completed,
            last_emailed_at: row.last_emailed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const LEAD_COLUMNS: &str =
    "id, name, email, email_stage, outreach_completed, last_emailed_at, created_at, updated_at";

pub async fn insert_lead(db: &SqlitePool, req: NewLeadRequest) -> Result<Lead, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO leads (id, name, email, email_stage, outreach_completed, last_emailed_at, created_at, updated_at) VALUES (?, ?, ?, NULL, 0, NULL, ?, ?)",
    )
    .bind(&id)
    .bind(&req.name)
    .bind(&req.email)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    Ok(Lead {
        id,
        name: req.name,
        email: req.email,
        email_stage: None,
        outreach_completed: false,
        last_emailed_at: None,
        created_at: now.clone(),
        updated_at: now,
    })
}

pub async fn fetch_leads(db: &SqlitePool) -> Result<Vec<Lead>, AppError> {
    let rows = sqlx::query_as::<_, LeadRow>(&format!(
        "SELECT {} FROM leads ORDER BY created_at DESC",
        LEAD_COLUMNS
    ))
    .fetch_all(db)
    .await?;

    rows.into_iter().map(Lead::try_from).collect()
}

pub async fn find_lead_by_id(db: &SqlitePool, id: &str) -> Result<Option<Lead>, AppError> {
    let row = sqlx::query_as::<_, LeadRow>(&format!("SELECT {} FROM leads WHERE id = ?", LEAD_COLUMNS))
        .bind(id)
        .fetch_optional(db)
        .await?;

    row.map(Lead::try_from).transpose()
}

/// Record that the next outreach email went out. Moves exactly one stage.
pub async fn record_email_sent(db: &SqlitePool, id: &str, sent_at: DateTime<Utc>) -> Result<Lead, AppError> {
    let lead = find_lead_by_id(db, id).await?.ok_or(AppError::NotFound)?;
    let progress = lead.progress();
    let next = progress.email_to_send().ok_or_else(|| {
        AppError::Conflict(format!("lead {} has no further outreach emails", id))
    })?;

    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        r#"
        UPDATE leads
        SET email_stage = ?, last_emailed_at = ?, updated_at = ?
        WHERE id = ? AND email_stage IS ? AND outreach_completed = 0
        "#,
    )
    .bind(next.as_str())
    .bind(sent_at.to_rfc3339())
    .bind(&now)
    .bind(id)
    .bind(lead.email_stage.map(|s| s.as_str()))
    .execute(db)
    .await?
    .rows_affected();

    if result == 0 {
        return Err(AppError::Conflict(format!("lead {} was updated concurrently", id)));
    }

    find_lead_by_id(db, id).await?.ok_or(AppError::NotFound)
}

pub async fn complete_outreach(db: &SqlitePool, id: &str) -> Result<Lead, AppError> {
    let lead = find_lead_by_id(db, id).await?.ok_or(AppError::NotFound)?;
    let progress = lead.progress();
    if progress.is_completed() {
        return Err(AppError::Conflict(format!("lead {} is already completed", id)));
    }
    if progress != OutreachProgress::Sent(LeadEmailStage::Final) {
        return Err(AppError::Conflict(format!(
            "lead {} cannot be completed before the final email is sent",
            id
        )));
    }

    if !mark_outreach_completed(db, id).await? {
        return Err(AppError::Conflict(format!("lead {} was updated concurrently", id)));
    }

    find_lead_by_id(db, id).await?.ok_or(AppError::NotFound)
}

/// Only flips a lead whose FINAL email is recorded and which is still open.
async fn mark_outreach_completed(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        r#"
        UPDATE leads
        SET outreach_completed = 1, updated_at = ?
        WHERE id = ? AND email_stage = ? AND outreach_completed = 0
        "#,
    )
    .bind(&now)
    .bind(id)
    .bind(LeadEmailStage::Final.as_str())
    .execute(db)
    .await?
    .rows_affected();

    Ok(result > 0)
}
