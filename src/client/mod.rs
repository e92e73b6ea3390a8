pub mod dto;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, Response, StatusCode, Url};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::attendance::AttendanceStore;
use crate::billing::{compute_status_from_wire, format_pence};
use crate::config::ApiClientConfig;
use crate::error::AppError;
use crate::models::{AttendanceMark, AttendanceRecord, InvoiceState, InvoiceStatus, Student};

/// An invoice line ready for display, status derived from the raw wire dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceSummary {
    pub id: String,
    pub student_id: String,
    pub description: String,
    pub amount_display: String,
    pub status: InvoiceStatus,
}

/// Client for the school REST API.
pub struct HttpSchoolClient {
    client: Client,
    base_url: Url,
}

impl HttpSchoolClient {
    pub fn new(config: ApiClientConfig) -> Result<Self, AppError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| AppError::BadRequest(format!("Invalid API url {}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::BadRequest(format!("Invalid API url {}", config.base_url)));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                error!("failed to build http client: {}", e);
                AppError::InternalServerError
            })?;
        Ok(Self { client, base_url })
    }

    fn url(&self, segments: &[&str], query: &[(&str, String)]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(segments);
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        url
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, AppError> {
        let response = request
            .send()
            .await
            .map_err(upstream)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<dto::ErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or(body);
        warn!("school API returned {}: {}", status, message);

        Err(match status {
            StatusCode::NOT_FOUND => AppError::NotFound,
            StatusCode::CONFLICT => AppError::Conflict(message),
            StatusCode::BAD_REQUEST if message == AppError::EmptyRoster.to_string() => AppError::EmptyRoster,
            StatusCode::BAD_REQUEST => AppError::BadRequest(message),
            _ => AppError::Upstream(format!("{} {}", status, message)),
        })
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, AppError> {
        response
            .json::<T>()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    upstream(e)
                } else {
                    AppError::Upstream(format!("Failed to parse API response: {}", e))
                }
            })
    }

    /// Fetch all invoices and derive each status locally against `now`.
    /// Drafts are skipped. A malformed date fails the whole call.
    pub async fn fetch_invoice_summaries(&self, now: DateTime<Utc>) -> Result<Vec<InvoiceSummary>, AppError> {
        let response = self.send(self.client.get(self.url(&["invoices"], &[]))).await?;
        let invoices: Vec<dto::InvoiceDto> = Self::parse(response).await?;

        let mut summaries = Vec::with_capacity(invoices.len());
        for invoice in invoices {
            if invoice.state == InvoiceState::Draft {
                continue;
            }
            let status = compute_status_from_wire(&invoice.due_date, now, invoice.paid_at.as_deref())
                .map_err(|e| {
                    warn!("invoice {} has unusable dates: {}", invoice.id, e);
                    e
                })?;
            summaries.push(InvoiceSummary {
                amount_display: format_pence(invoice.amount_pence),
                id: invoice.id,
                student_id: invoice.student_id,
                description: invoice.description,
                status,
            });
        }
        Ok(summaries)
    }
}

fn upstream(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        warn!("school API timed out: {}", e);
        AppError::Upstream(format!("request timed out: {}", e))
    } else {
        AppError::Upstream(format!("request failed: {}", e))
    }
}

#[async_trait]
impl AttendanceStore for HttpSchoolClient {
    async fn fetch_students(&self, class_id: &str) -> Result<Vec<Student>, AppError> {
        let url = self.url(&["classes", class_id, "students"], &[]);
        let response = self.send(self.client.get(url)).await?;
        Self::parse(response).await
    }

    async fn fetch_records(
        &self,
        class_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        let url = self.url(
            &["classes", class_id, "attendance"],
            &[("date", date.format("%Y-%m-%d").to_string())],
        );
        let response = self.send(self.client.get(url)).await?;
        Self::parse(response).await
    }

    async fn save_records(
        &self,
        class_id: &str,
        date: NaiveDate,
        marks: &[AttendanceMark],
    ) -> Result<(), AppError> {
        let url = self.url(
            &["classes", class_id, "attendance"],
            &[("date", date.format("%Y-%m-%d").to_string())],
        );
        let body = dto::SaveAttendanceBody { records: marks };
        let response = self.send(self.client.put(url).json(&body)).await?;
        let saved: dto::SaveAttendanceResponse = Self::parse(response).await?;
        debug!("API saved {} marks for class {} on {}", saved.saved, class_id, date);
        Ok(())
    }
}
