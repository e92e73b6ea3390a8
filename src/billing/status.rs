use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::error::AppError;
use crate::models::{Invoice, InvoiceState, InvoiceStatus};

const MILLIS_PER_HOUR: i64 = 3_600_000;
const LATE_AFTER_HOURS: i64 = 48;
const OVERDUE_AFTER_HOURS: i64 = 96;

/// Derive the payment status of an issued invoice.
///
/// A recorded payment always wins. Otherwise the hours elapsed since the due
/// instant decide: under 48 is PENDING (a future due date included), 48 up to
/// 96 is LATE, 96 and beyond is OVERDUE. The comparison is done in whole
/// milliseconds so 47h59m59.999s is still PENDING.
///
/// Drafts must be filtered out by the caller; see [`Invoice::effective_status`].
pub fn compute_status(
    due: DateTime<Utc>,
    now: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
) -> InvoiceStatus {
    if paid_at.is_some() {
        return InvoiceStatus::Paid;
    }

    let millis_past_due = (now - due).num_milliseconds();
    if millis_past_due < LATE_AFTER_HOURS * MILLIS_PER_HOUR {
        InvoiceStatus::Pending
    } else if millis_past_due < OVERDUE_AFTER_HOURS * MILLIS_PER_HOUR {
        InvoiceStatus::Late
    } else {
        InvoiceStatus::Overdue
    }
}

/// Same as [`compute_status`] but over raw ISO 8601 strings as they arrive
/// from the API. Unparseable input is an error, never a silent PENDING.
pub fn compute_status_from_wire(
    due_date: &str,
    now: DateTime<Utc>,
    paid_at: Option<&str>,
) -> Result<InvoiceStatus, AppError> {
    let due = parse_due_date(due_date)?;
    let paid_at = paid_at.map(parse_timestamp).transpose()?;
    Ok(compute_status(due, now, paid_at))
}

/// Accepts `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp.
pub fn parse_due_date(raw: &str) -> Result<DateTime<Utc>, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::InvalidDate("due date is empty".to_string()));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(start_of_day(date));
    }
    parse_timestamp(raw)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::InvalidDate(format!("{:?}: {}", raw, e)))
}

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

impl Invoice {
    /// Status as presented to users. Drafts are reported as DRAFT without
    /// running the calculator; a recorded payment is PAID.
    pub fn effective_status(&self, now: DateTime<Utc>) -> InvoiceStatus {
        match self.state {
            InvoiceState::Draft => InvoiceStatus::Draft,
            InvoiceState::Paid | InvoiceState::Issued => {
                compute_status(start_of_day(self.due_date), now, self.paid_at)
            }
        }
    }
}
