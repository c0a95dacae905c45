//! Bank webhook endpoint, parameterized by provider
//!
//! Order matters here: resolve the owning school first (the signature
//! secret is tenant-scoped), then authenticate, then normalize. Rejections
//! are only issued before authentication succeeds: unknown provider,
//! unroutable merchant account, bad signature, malformed payload. Past
//! that point the bank gets an acknowledgment even if processing fails,
//! and the failure is logged for the reconciliation sweep to catch.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::api::AppState;
use crate::ingest::adapter::bank_adapter;
use crate::ingest::notice::BankProvider;
use crate::ingest::{IngestOutcome, TenantScope};

fn signature_header(provider: BankProvider) -> &'static str {
    match provider {
        BankProvider::Equity => "x-jenga-signature",
        BankProvider::Kcb => "x-kcb-signature",
        BankProvider::Coop => "x-coop-signature",
    }
}

pub async fn receive(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let provider: BankProvider = match provider.parse() {
        Ok(provider) => provider,
        Err(_) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "success": false, "message": "Unsupported bank provider" })),
            )
                .into_response();
        }
    };

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(provider = %provider, error = %err, "Unparseable webhook body");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": "Invalid JSON payload" })),
            )
                .into_response();
        }
    };

    let adapter = bank_adapter(provider);

    // Identifier-based tenant resolution; an unroutable notice is rejected
    // outright since crediting a guessed school would corrupt balances.
    let routing_hint = adapter.routing_hint(&payload);
    let school = match state
        .resolver
        .resolve_bank(provider, routing_hint.as_deref())
        .await
    {
        Ok(school) => school,
        Err(err) => {
            warn!(provider = %provider, error = %err, "Webhook tenant resolution failed");
            return err.into_response();
        }
    };

    // Hard authentication boundary: nothing is persisted past a bad
    // signature.
    let signature = headers
        .get(signature_header(provider))
        .and_then(|value| value.to_str().ok());
    let Some(signature) = signature else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": "Missing signature header" })),
        )
            .into_response();
    };
    let Some(secret) = school.webhook_secret() else {
        error!(
            provider = %provider,
            school = %school.code,
            "School integration has no webhook secret configured"
        );
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": "Signature verification unavailable" })),
        )
            .into_response();
    };
    if !adapter.verify_signature(&body, signature, &secret) {
        warn!(provider = %provider, school = %school.code, "Webhook signature mismatch");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": "Invalid signature" })),
        )
            .into_response();
    }

    let notice = match adapter.normalize(&payload) {
        Ok(notice) => notice,
        Err(err) => {
            warn!(provider = %provider, error = %err, "Malformed webhook payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": err.to_string() })),
            )
                .into_response();
        }
    };

    let transaction_id = notice.transaction_id.clone();
    match state
        .pipeline
        .ingest(notice, TenantScope::Resolved(school))
        .await
    {
        Ok(IngestOutcome::Committed(entry)) => {
            info!(
                provider = %provider,
                transaction_id = %transaction_id,
                status = %entry.status,
                "Bank webhook processed"
            );
        }
        Ok(IngestOutcome::AlreadyProcessed) => {
            info!(
                provider = %provider,
                transaction_id = %transaction_id,
                "Bank webhook duplicate ignored"
            );
        }
        Err(err) => {
            // Authenticated but failed internally: acknowledge so the bank
            // stops retrying; the sweep surfaces anything lost.
            error!(
                provider = %provider,
                transaction_id = %transaction_id,
                error = %err,
                "Bank webhook failed internally"
            );
        }
    }

    (StatusCode::OK, Json(json!({ "status": "received" }))).into_response()
}
