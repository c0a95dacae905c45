//! Manual payment recording (operator-entered cash and bank slips)
//!
//! Unlike automated channels there is no suspense fallback here: the
//! operator is looking at the slip, so an unknown admission number is an
//! input error, not a payment to hold.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::context::SchoolContext;
use crate::api::AppState;
use crate::error::AppResult;
use crate::ingest::notice::Channel;
use crate::ingest::ManualPayment;

#[derive(Debug, Deserialize)]
pub struct BankPaymentRequest {
    pub transaction_id: String,
    pub amount: BigDecimal,
    pub reference: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub paid_by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CashPaymentRequest {
    pub amount: BigDecimal,
    pub reference: String,
    #[serde(default)]
    pub receipt_number: Option<String>,
    #[serde(default)]
    pub paid_by: Option<String>,
}

pub async fn record_bank(
    State(state): State<AppState>,
    SchoolContext(school): SchoolContext,
    Json(request): Json<BankPaymentRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let source = match request.source.as_deref() {
        Some("BANK_AGENT") => Channel::BankAgent,
        Some("CHEQUE") => Channel::Cheque,
        _ => Channel::BankTransfer,
    };

    let entry = state
        .pipeline
        .record_manual(
            &school,
            ManualPayment {
                transaction_id: Some(request.transaction_id),
                amount: request.amount,
                reference: request.reference,
                source,
                paid_by: request
                    .paid_by
                    .or_else(|| Some("Bank Transfer".to_string())),
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Bank payment recorded successfully",
            "data": entry,
        })),
    ))
}

pub async fn record_cash(
    State(state): State<AppState>,
    SchoolContext(school): SchoolContext,
    Json(request): Json<CashPaymentRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let entry = state
        .pipeline
        .record_manual(
            &school,
            ManualPayment {
                transaction_id: request.receipt_number,
                amount: request.amount,
                reference: request.reference,
                source: Channel::Cash,
                paid_by: request.paid_by,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": entry })),
    ))
}
