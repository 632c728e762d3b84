//! Data models for the onboarding API

use chrono::{DateTime, Utc};
use onboard_pdf::{DocumentKind, SourceRecord};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Account row; `role` is free text managed by admins
#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

/// Stored onboarding documents for one user
#[derive(Debug, Clone, FromRow)]
pub struct DbUserPdf {
    pub user_id: String,
    pub pdf_data: Option<Vec<u8>>,
    pub waiver_pdf_data: Option<Vec<u8>>,
    pub disclosure_pdf_data: Option<Vec<u8>>,
    pub addon_pdf_data: Option<Vec<u8>>,
    pub signature: Option<String>,
    pub signature_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbUserPdf {
    pub fn stored_kinds(&self) -> Vec<DocumentKind> {
        [
            (DocumentKind::Waiver, &self.waiver_pdf_data),
            (DocumentKind::Disclosure, &self.disclosure_pdf_data),
            (DocumentKind::Addon, &self.addon_pdf_data),
            (DocumentKind::Legacy, &self.pdf_data),
        ]
        .into_iter()
        .filter(|(_, data)| data.as_ref().is_some_and(|d| !d.is_empty()))
        .map(|(kind, _)| kind)
        .collect()
    }
}

impl From<DbUserPdf> for SourceRecord {
    fn from(row: DbUserPdf) -> Self {
        SourceRecord {
            pdf_data: row.pdf_data,
            waiver_pdf_data: row.waiver_pdf_data,
            disclosure_pdf_data: row.disclosure_pdf_data,
            addon_pdf_data: row.addon_pdf_data,
            signature: row.signature,
            signature_type: row.signature_type,
            created_at: Some(row.created_at.date_naive()),
        }
    }
}

/// Decoded payloads to write; `None` keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct UserPdfUpsert {
    pub user_id: String,
    pub pdf_data: Option<Vec<u8>>,
    pub waiver_pdf_data: Option<Vec<u8>>,
    pub disclosure_pdf_data: Option<Vec<u8>>,
    pub addon_pdf_data: Option<Vec<u8>>,
    pub signature: Option<String>,
    pub signature_type: Option<String>,
}

impl UserPdfUpsert {
    pub fn set(&mut self, kind: DocumentKind, bytes: Vec<u8>) {
        let slot = match kind {
            DocumentKind::Waiver => &mut self.waiver_pdf_data,
            DocumentKind::Disclosure => &mut self.disclosure_pdf_data,
            DocumentKind::Addon => &mut self.addon_pdf_data,
            DocumentKind::Legacy => &mut self.pdf_data,
        };
        *slot = Some(bytes);
    }
}

/// Saved in-progress form
#[derive(Debug, Clone, FromRow)]
pub struct DbProgress {
    pub user_id: String,
    pub form_name: String,
    pub pdf_data: Vec<u8>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for `POST /api/onboarding/pdf`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SavePdfRequest {
    #[serde(default)]
    pub pdf_data: Option<String>,
    #[serde(default)]
    pub waiver_pdf_data: Option<String>,
    #[serde(default)]
    pub disclosure_pdf_data: Option<String>,
    #[serde(default)]
    pub addon_pdf_data: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub signature_type: Option<String>,
}

impl SavePdfRequest {
    /// Non-blank payloads paired with their document kind
    pub fn payloads(&self) -> Vec<(DocumentKind, &str)> {
        [
            (DocumentKind::Waiver, &self.waiver_pdf_data),
            (DocumentKind::Disclosure, &self.disclosure_pdf_data),
            (DocumentKind::Addon, &self.addon_pdf_data),
            (DocumentKind::Legacy, &self.pdf_data),
        ]
        .into_iter()
        .filter_map(|(kind, payload)| {
            payload
                .as_deref()
                .filter(|p| !p.trim().is_empty())
                .map(|p| (kind, p))
        })
        .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavePdfResponse {
    pub success: bool,
    pub user_id: String,
    /// Documents now stored for the user, including earlier uploads
    pub stored: Vec<DocumentKind>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for `POST /api/onboarding/progress`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveProgressRequest {
    #[serde(default)]
    pub form_name: Option<String>,
    #[serde(default)]
    pub pdf_data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub form_name: String,
    /// Base64 PDF bytes; omitted in save acknowledgements
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_data: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPdfQuery {
    pub user_id: Option<String>,
    pub embed_signature: Option<String>,
    pub document: Option<String>,
}

impl UserPdfQuery {
    /// `embed_signature` flag, on when absent or blank
    pub fn embed_signature(&self) -> Result<bool, String> {
        let Some(raw) = self.embed_signature.as_deref().map(str::trim) else {
            return Ok(true);
        };
        match raw.to_ascii_lowercase().as_str() {
            "" | "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(format!("Invalid embed_signature: {}", raw)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressQuery {
    pub form_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}
