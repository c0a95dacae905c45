//! Reconciliation sweep trigger (operator-facing)

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::api::context::SchoolContext;
use crate::api::AppState;
use crate::error::{AppError, AppResult};
use crate::ingest::notice::BankProvider;
use crate::reconcile::{self, SweepReport};

#[derive(Debug, Deserialize)]
pub struct SweepWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

pub async fn sweep(
    State(state): State<AppState>,
    SchoolContext(school): SchoolContext,
    Path(provider): Path<String>,
    Query(window): Query<SweepWindow>,
) -> AppResult<Json<SweepReport>> {
    let provider: BankProvider = provider.parse()?;

    if window.from > window.to {
        return Err(AppError::validation("from must not be after to"));
    }

    let report = reconcile::reconcile(
        state.bank_source.as_ref(),
        state.ledger.as_ref(),
        &school,
        provider,
        window.from,
        window.to,
    )
    .await?;

    Ok(Json(report))
}
