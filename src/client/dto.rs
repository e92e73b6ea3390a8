use serde::{Deserialize, Serialize};

use crate::models::{AttendanceMark, InvoiceState};

/// Invoice exactly as it comes over the wire, dates still as strings.
#[derive(Debug, Deserialize)]
pub struct InvoiceDto {
    pub id: String,
    pub student_id: String,
    pub description: String,
    pub amount_pence: i64,
    pub due_date: String,
    pub state: InvoiceState,
    #[serde(default)]
    pub paid_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SaveAttendanceBody<'a> {
    pub records: &'a [AttendanceMark],
}

#[derive(Debug, Deserialize)]
pub struct SaveAttendanceResponse {
    pub saved: usize,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_state_must_be_known() {
        let issued = r#"{"id":"i-1","student_id":"s-1","description":"Fees","amount_pence":100,"due_date":"2025-01-01","state":"ISSUED"}"#;
        let dto: InvoiceDto = serde_json::from_str(issued).unwrap();
        assert_eq!(dto.state, InvoiceState::Issued);
        assert_eq!(dto.paid_at, None);

        let unknown = issued.replace("ISSUED", "VOID");
        assert!(serde_json::from_str::<InvoiceDto>(&unknown).is_err());
    }
}
