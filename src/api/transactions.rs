//! Transaction reversal (operator-facing)

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::context::SchoolContext;
use crate::api::AppState;
use crate::error::{AppError, AppResult, DomainError};

/// Transition an entry to REVERSED, inverting its balance effect. A
/// foreign school's entry is indistinguishable from a missing one.
pub async fn reverse(
    State(state): State<AppState>,
    SchoolContext(school): SchoolContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let entry = state.ledger.find_by_id(id).await?.ok_or_else(|| {
        AppError::domain(DomainError::EntryNotFound { id: id.to_string() })
    })?;

    if entry.school_id != Some(school.id) {
        return Err(AppError::domain(DomainError::EntryNotFound {
            id: id.to_string(),
        }));
    }

    let reversed = state.ledger.reverse(id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Transaction reversed successfully",
        "data": reversed,
    })))
}
