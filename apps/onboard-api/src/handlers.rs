//! HTTP handlers for the onboarding API

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use onboard_pdf::{
    assemble, decode_pdf_payload, resolve_printed_name, AssembleOptions, DocumentKind,
    SourceRecord,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{authorize, AuthUser, Capabilities, Role};
use crate::error::ApiError;
use crate::models::*;
use crate::state::AppState;

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "onboard-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn caller_role(state: &AppState, user: &AuthUser) -> Result<Option<Role>, ApiError> {
    let account = state.store.find_user(&user.user_id).await?;
    Ok(account.and_then(|account| account.role).and_then(|role| {
        role.parse::<Role>()
            .map_err(|e| tracing::warn!(user_id = %user.user_id, "{}", e))
            .ok()
    }))
}

/// Required `user_id` query value in canonical lowercase UUID form
fn target_user_id(raw: Option<&str>) -> Result<String, ApiError> {
    let raw = raw
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::InvalidRequest("user_id is required".to_string()))?;
    Uuid::parse_str(raw)
        .map(|id| id.to_string())
        .map_err(|_| ApiError::InvalidRequest(format!("Invalid user_id: {}", raw)))
}

/// Assembled onboarding packet for a user, for staff review
pub async fn get_user_pdf(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    query: Result<Query<UserPdfQuery>, QueryRejection>,
) -> Result<(StatusCode, [(String, String); 3], Vec<u8>), ApiError> {
    let role = caller_role(&state, &user).await?;
    let decision = authorize(&Capabilities::STAFF, role);
    if !decision.is_allowed() {
        tracing::warn!(user_id = %user.user_id, ?decision, "Denied packet access");
    }
    decision.into_result()?;

    let Query(query) = query.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;

    let target = target_user_id(query.user_id.as_deref())?;
    let embed_signature = query.embed_signature().map_err(ApiError::InvalidRequest)?;
    let only = query
        .document
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .map(str::parse::<DocumentKind>)
        .transpose()
        .map_err(ApiError::InvalidRequest)?;

    let row = state
        .store
        .find_user_pdf(&target)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No onboarding PDF for user {}", target)))?;

    let account = state.store.find_user(&target).await?;
    let profile_name = state.store.profile_name(&target).await?;
    let printed_name = resolve_printed_name(
        profile_name.as_deref(),
        account.as_ref().and_then(|a| a.name.as_deref()),
        account.as_ref().and_then(|a| a.email.as_deref()),
    );

    let options = AssembleOptions {
        embed_signature,
        printed_name,
        only,
        ..Default::default()
    };
    let record = SourceRecord::from(row);
    let offsets = Arc::clone(&state.offsets);

    let assembled = tokio::task::spawn_blocking(move || assemble(&record, &options, &offsets))
        .await
        .map_err(|e| ApiError::Internal(e.into()))??;

    let document_hash = hex::encode(Sha256::digest(&assembled.bytes));

    tracing::info!(
        reviewer = %user.user_id,
        user_id = %target,
        pages = assembled.page_count,
        hash = %document_hash,
        "Served onboarding PDF"
    );

    Ok((
        StatusCode::OK,
        [
            ("Content-Type".to_string(), "application/pdf".to_string()),
            (
                "Content-Disposition".to_string(),
                format!("inline; filename=\"onboarding-{}.pdf\"", target),
            ),
            ("X-Document-Sha256".to_string(), document_hash),
        ],
        assembled.bytes,
    ))
}

/// Store the caller's onboarding documents and signature
pub async fn save_pdf(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<SavePdfRequest>,
) -> Result<Json<SavePdfResponse>, ApiError> {
    let payloads = req.payloads();
    if payloads.is_empty() {
        return Err(ApiError::InvalidRequest(
            "At least one PDF payload is required".to_string(),
        ));
    }

    let mut upsert = UserPdfUpsert {
        user_id: user.user_id.clone(),
        signature: req.signature.clone().filter(|s| !s.trim().is_empty()),
        signature_type: req.signature_type.clone().filter(|s| !s.trim().is_empty()),
        ..Default::default()
    };
    for (kind, payload) in payloads {
        let decoded = decode_pdf_payload(payload.as_bytes())
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid {} payload: {}", kind, e)))?;
        tracing::debug!(
            document = %kind,
            encoding = ?decoded.encoding,
            bytes = decoded.bytes.len(),
            "Decoded upload"
        );
        upsert.set(kind, decoded.bytes);
    }

    let row = state.store.upsert_user_pdf(upsert).await?;

    tracing::info!(user_id = %row.user_id, stored = ?row.stored_kinds(), "Saved onboarding PDF");

    Ok(Json(SavePdfResponse {
        success: true,
        stored: row.stored_kinds(),
        user_id: row.user_id,
        updated_at: row.updated_at,
    }))
}

/// Save the caller's in-progress form
pub async fn save_progress(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<SaveProgressRequest>,
) -> Result<Json<ProgressResponse>, ApiError> {
    let form_name = required(req.form_name.as_deref(), "form_name")?;
    let payload = required(req.pdf_data.as_deref(), "pdf_data")?;

    let decoded = decode_pdf_payload(payload.as_bytes())
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid pdf_data: {}", e)))?;

    let row = state
        .store
        .upsert_progress(&user.user_id, form_name, decoded.bytes)
        .await?;

    tracing::info!(user_id = %user.user_id, form_name, "Saved form progress");

    Ok(Json(ProgressResponse {
        form_name: row.form_name,
        pdf_data: None,
        updated_at: row.updated_at,
    }))
}

/// The caller's saved progress for one form
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ProgressQuery>,
) -> Result<Json<ProgressResponse>, ApiError> {
    let form_name = required(query.form_name.as_deref(), "form_name")?;

    let row = state
        .store
        .find_progress(&user.user_id, form_name)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No saved progress for {}", form_name)))?;

    Ok(Json(ProgressResponse {
        form_name: row.form_name,
        pdf_data: Some(BASE64.encode(&row.pdf_data)),
        updated_at: row.updated_at,
    }))
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, ApiError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::InvalidRequest(format!("{} is required", name)))
}
