//! Lead export: render a batch as CSV or JSON and write it to object storage.

mod storage;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Lead, ParseEnumError};

pub use storage::{ExportStorage, UploadMetadata};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV buffer error: {0}")]
    Buffer(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, ExportError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(ParseEnumError {
                kind: "export format",
                value: value.to_string(),
            }),
        }
    }
}

/// Where an export landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportReceipt {
    pub bucket: String,
    pub key: String,
    pub format: ExportFormat,
    pub rows: usize,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    id: &'a str,
    customer_name: &'a str,
    customer_phone: &'a str,
    customer_email: &'a str,
    address: &'a str,
    city: &'a str,
    service: &'a str,
    sub_service: &'a str,
    status: &'static str,
    priority: &'static str,
    assigned_vendors: String,
    created_at: String,
}

impl<'a> From<&'a Lead> for CsvRow<'a> {
    fn from(lead: &'a Lead) -> Self {
        Self {
            id: lead.id.as_str(),
            customer_name: &lead.customer.name,
            customer_phone: &lead.customer.phone,
            customer_email: lead.customer.email.as_deref().unwrap_or_default(),
            address: &lead.address,
            city: lead.city.as_deref().unwrap_or_default(),
            service: &lead.service,
            sub_service: lead.sub_service.as_deref().unwrap_or_default(),
            status: lead.status.label(),
            priority: lead.priority.label(),
            assigned_vendors: lead
                .assigned_vendors
                .iter()
                .map(|id| id.as_str())
                .collect::<Vec<_>>()
                .join(";"),
            created_at: lead.created_at.to_rfc3339(),
        }
    }
}

pub fn render(leads: &[Lead], format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_vec_pretty(leads)?),
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            for lead in leads {
                writer.serialize(CsvRow::from(lead))?;
            }
            writer
                .into_inner()
                .map_err(|err| ExportError::Buffer(err.to_string()))
        }
    }
}

/// Renders lead batches and uploads them as `leads-{uuid}.{ext}`.
#[derive(Clone)]
pub struct Exporter {
    storage: ExportStorage,
}

impl Exporter {
    pub fn new(storage: ExportStorage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &ExportStorage {
        &self.storage
    }

    pub async fn export(&self, leads: &[Lead], format: ExportFormat) -> Result<ExportReceipt> {
        let body = render(leads, format)?;
        let key = self
            .storage
            .key_for(&format!("leads-{}.{}", Uuid::new_v4(), format.extension()));
        let meta = self.storage.upload(&key, body).await?;

        Ok(ExportReceipt {
            bucket: self.storage.bucket.clone(),
            key: meta.key,
            format,
            rows: leads.len(),
            size: meta.size,
            etag: meta.etag,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Customer, NewLead};
    use chrono::Utc;

    fn lead(name: &str) -> Lead {
        Lead::new(
            NewLead {
                customer: Customer {
                    name: name.to_string(),
                    phone: "555-0101".to_string(),
                    email: None,
                },
                address: "10 Bay Rd, Salem, MA 01970".to_string(),
                service: "Cleaning".to_string(),
                sub_service: Some("Deep clean".to_string()),
                description: None,
                status: None,
                priority: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn csv_has_header_and_one_row_per_lead() {
        let body = render(&[lead("Ann"), lead("Bo, Jr.")], ExportFormat::Csv).unwrap();
        let text = String::from_utf8(body).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("id,customer_name,customer_phone"));
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("\"Bo, Jr.\""));
        assert!(text.contains(",Salem,Cleaning,Deep clean,pending,medium,"));
    }

    #[test]
    fn json_round_trips_leads() {
        let leads = vec![lead("Ann")];
        let body = render(&leads, ExportFormat::Json).unwrap();
        let parsed: Vec<Lead> = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed, leads);
    }

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("xlsx".parse::<ExportFormat>().is_err());
    }

    #[tokio::test]
    async fn export_uploads_under_prefix() {
        let exporter = Exporter::new(ExportStorage::in_memory(
            "leadflow-exports".to_string(),
            "exports/".to_string(),
        ));
        let receipt = exporter.export(&[lead("Ann")], ExportFormat::Json).await.unwrap();
        assert!(receipt.key.starts_with("exports/leads-"));
        assert!(receipt.key.ends_with(".json"));
        assert_eq!(receipt.rows, 1);

        let stored = exporter.storage().download(&receipt.key).await.unwrap();
        assert_eq!(stored.len(), receipt.size);
    }
}
