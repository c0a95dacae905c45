//! Reconciliation sweeper
//!
//! Pulls a bank's authoritative transaction list for a window and diffs the
//! external ids against the ledger. Gaps are notifications that never
//! arrived, failed signature validation, or died silently. Detection only:
//! repair is re-ingesting the original payload through the normal pipeline.

pub mod gateway;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

use crate::database::school_repository::School;
use crate::error::AppResult;
use crate::ingest::notice::BankProvider;
use crate::ingest::traits::LedgerStore;

/// One row from a bank's transaction listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankTransaction {
    pub transaction_id: String,
    pub amount: BigDecimal,
    pub reference: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Source of a provider's authoritative transaction list
#[async_trait]
pub trait TransactionSource: Send + Sync {
    async fn fetch_transactions(
        &self,
        school: &School,
        provider: BankProvider,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<BankTransaction>>;
}

#[derive(Debug, Serialize)]
pub struct SweepReport {
    pub provider: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub bank_side_count: usize,
    pub ledger_side_count: usize,
    /// Present on the bank side, absent from the ledger
    pub missing_from_ledger: Vec<BankTransaction>,
}

/// Diff a provider's transaction list against the ledger for one school.
/// The window is inclusive of both dates. The future is dropped on caller
/// cancellation; nothing here writes, so aborting mid-fetch is safe.
pub async fn reconcile(
    source: &dyn TransactionSource,
    ledger: &dyn LedgerStore,
    school: &School,
    provider: BankProvider,
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<SweepReport> {
    let bank_side = source
        .fetch_transactions(school, provider, from, to)
        .await?;

    let window_start = from.and_time(NaiveTime::MIN).and_utc();
    let window_end = to.and_time(NaiveTime::MIN).and_utc() + Duration::days(1);
    let ledger_ids: HashSet<String> = ledger
        .transaction_ids_in_window(school.id, provider.as_str(), window_start, window_end)
        .await?
        .into_iter()
        .collect();

    let missing_from_ledger: Vec<BankTransaction> = bank_side
        .iter()
        .filter(|tx| !ledger_ids.contains(&tx.transaction_id))
        .cloned()
        .collect();

    info!(
        school = %school.code,
        provider = %provider,
        bank_side = bank_side.len(),
        ledger_side = ledger_ids.len(),
        missing = missing_from_ledger.len(),
        "Reconciliation sweep completed"
    );

    Ok(SweepReport {
        provider: provider.as_str().to_string(),
        from,
        to,
        bank_side_count: bank_side.len(),
        ledger_side_count: ledger_ids.len(),
        missing_from_ledger,
    })
}
