//! M-Pesa C2B callbacks
//!
//! Response contract: the validation probe is always affirmed (never
//! reject money at the gate; checks happen at confirmation), and the
//! confirmation is always acknowledged with ResultCode 0, duplicates and
//! internal failures included, because Safaricom retries on anything
//! else. Internal errors are logged, not surfaced.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::api::AppState;
use crate::ingest::adapter::ChannelAdapter;
use crate::ingest::providers::MpesaAdapter;
use crate::ingest::{IngestOutcome, TenantScope};

pub async fn validation(Json(payload): Json<Value>) -> Json<Value> {
    info!(payload = %payload, "M-Pesa validation received, accepting");
    Json(json!({ "ResultCode": 0, "ResultDesc": "Accepted" }))
}

pub async fn confirmation(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Json<Value> {
    let notice = match MpesaAdapter.normalize(&payload) {
        Ok(notice) => notice,
        Err(err) => {
            warn!(error = %err, "M-Pesa confirmation with missing/invalid fields");
            return Json(json!({ "ResultCode": 1, "ResultDesc": "Missing required fields" }));
        }
    };

    let transaction_id = notice.transaction_id.clone();
    match state.pipeline.ingest(notice, TenantScope::Unresolved).await {
        Ok(IngestOutcome::Committed(entry)) => {
            info!(
                transaction_id = %transaction_id,
                status = %entry.status,
                "M-Pesa confirmation processed"
            );
            Json(json!({ "ResultCode": 0, "ResultDesc": "Processed" }))
        }
        Ok(IngestOutcome::AlreadyProcessed) => {
            Json(json!({ "ResultCode": 0, "ResultDesc": "Duplicate" }))
        }
        Err(err) => {
            // Acknowledge anyway to stop the retry storm; the failure is
            // ours to chase down.
            error!(
                transaction_id = %transaction_id,
                error = %err,
                "M-Pesa confirmation failed internally"
            );
            Json(json!({ "ResultCode": 0, "ResultDesc": "Error but received" }))
        }
    }
}
