//! Storage seams for the ingestion pipeline
//!
//! The pipeline talks to the school/student directory and the ledger
//! through these traits so it can be exercised without Postgres. The sqlx
//! repositories in `database/` are the production implementations.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::ledger_repository::LedgerEntry;
use crate::database::school_repository::School;
use crate::database::student_repository::Student;
use crate::error::AppResult;
use crate::ingest::notice::{BankProvider, Channel, EntryStatus, EntryType, Provider};

#[async_trait]
pub trait SchoolDirectory: Send + Sync {
    async fn find_by_code(&self, code: &str) -> AppResult<Option<School>>;

    /// Routing-identifier lookup for bank channels; must only return
    /// schools whose integration for the provider is enabled and active.
    async fn find_by_bank_account(
        &self,
        provider: BankProvider,
        account_number: &str,
    ) -> AppResult<Option<School>>;
}

#[async_trait]
pub trait StudentDirectory: Send + Sync {
    /// Lookup scoped to a resolved school. `reference` is already
    /// normalized (trimmed, uppercased).
    async fn find_by_reference(
        &self,
        school_id: Uuid,
        reference: &str,
    ) -> AppResult<Option<Student>>;

    /// Cross-school lookup for tenant-agnostic channels.
    async fn find_by_reference_global(&self, reference: &str) -> AppResult<Option<Student>>;
}

/// Input record for a ledger commit
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub school_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
    pub transaction_id: String,
    pub amount: BigDecimal,
    pub source: Channel,
    pub provider: Option<Provider>,
    pub entry_type: EntryType,
    pub status: EntryStatus,
    pub reference: String,
    pub paid_by: Option<String>,
    pub phone_number: Option<String>,
    pub payload: serde_json::Value,
}

/// Result of a ledger commit attempt
#[derive(Debug)]
pub enum CommitOutcome {
    Committed {
        entry: LedgerEntry,
        /// Student balance after the entry's effect, when one was linked
        new_balance: Option<BigDecimal>,
    },
    /// Another delivery of the same external id already committed
    Duplicate,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Fast-path duplicate check; the commit's uniqueness constraint
    /// remains the authority under races.
    async fn exists(&self, school_id: Option<Uuid>, transaction_id: &str) -> AppResult<bool>;

    /// Atomically insert the entry and apply its balance effect. Both land
    /// or neither does.
    async fn commit(&self, entry: NewLedgerEntry) -> AppResult<CommitOutcome>;

    /// Single-shot transition to REVERSED, inverting the balance effect of
    /// the original entry when a student is linked.
    async fn reverse(&self, entry_id: Uuid) -> AppResult<LedgerEntry>;

    async fn find_by_id(&self, entry_id: Uuid) -> AppResult<Option<LedgerEntry>>;

    /// External ids committed for a school/provider inside a window
    /// (reconciliation support).
    async fn transaction_ids_in_window(
        &self,
        school_id: Uuid,
        provider: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<String>>;
}
