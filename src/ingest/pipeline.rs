//! Ingestion pipeline
//!
//! One inbound notice at a time: duplicate fast-path, student match,
//! atomic ledger commit, then fire-and-forget notification. Runs inside
//! the request task of whichever channel delivered the notice; many
//! pipelines run concurrently across deliveries.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::ledger_repository::LedgerEntry;
use crate::database::school_repository::School;
use crate::error::{AppError, AppResult, DomainError};
use crate::events::receipts::{format_receipt, ReceiptQueue};
use crate::events::{Notifier, PaymentEvent};
use crate::ingest::matcher::{normalize_reference, StudentMatcher};
use crate::ingest::notice::{Channel, EntryStatus, EntryType, PaymentNotice};
use crate::ingest::resolver::TenantScope;
use crate::ingest::traits::{CommitOutcome, LedgerStore, NewLedgerEntry, StudentDirectory};

/// Outcome returned to channel handlers. Duplicates are indistinguishable
/// from success to the provider; they only differ for logging.
#[derive(Debug)]
pub enum IngestOutcome {
    Committed(LedgerEntry),
    AlreadyProcessed,
}

/// Manual (operator-entered) payment
#[derive(Debug)]
pub struct ManualPayment {
    /// Receipt/slip number; generated when absent
    pub transaction_id: Option<String>,
    pub amount: bigdecimal::BigDecimal,
    pub reference: String,
    pub source: Channel,
    pub paid_by: Option<String>,
}

pub struct PaymentPipeline {
    matcher: StudentMatcher,
    ledger: Arc<dyn LedgerStore>,
    notifier: Notifier,
    receipts: ReceiptQueue,
}

impl PaymentPipeline {
    pub fn new(
        students: Arc<dyn StudentDirectory>,
        ledger: Arc<dyn LedgerStore>,
        notifier: Notifier,
        receipts: ReceiptQueue,
    ) -> Self {
        Self {
            matcher: StudentMatcher::new(students),
            ledger,
            notifier,
            receipts,
        }
    }

    /// Process a normalized notice from an automated channel. An unmatched
    /// reference is not an error: the entry lands in suspense and a
    /// suspense event is published.
    pub async fn ingest(
        &self,
        notice: PaymentNotice,
        scope: TenantScope,
    ) -> AppResult<IngestOutcome> {
        let reference = normalize_reference(&notice.reference);

        // Fast-path duplicate check; the insert's uniqueness constraint
        // still decides races.
        if self
            .ledger
            .exists(scope.school_id(), &notice.transaction_id)
            .await?
        {
            info!(
                transaction_id = %notice.transaction_id,
                provider = %notice.provider,
                "Duplicate delivery ignored"
            );
            return Ok(IngestOutcome::AlreadyProcessed);
        }

        let student = self.matcher.match_student(&scope, &reference).await?;
        if student.is_none() {
            warn!(
                reference = %reference,
                provider = %notice.provider,
                "No student matches reference; routing to suspense"
            );
        }

        // Deferred channels derive the tenant from the matched student.
        let school_id = scope
            .school_id()
            .or_else(|| student.as_ref().map(|s| s.school_id));

        let entry = NewLedgerEntry {
            school_id,
            student_id: student.as_ref().map(|s| s.id),
            transaction_id: notice.transaction_id.clone(),
            amount: notice.amount.clone(),
            source: notice.provider.channel(),
            provider: Some(notice.provider),
            entry_type: EntryType::Credit,
            status: if student.is_some() {
                EntryStatus::Completed
            } else {
                EntryStatus::Pending
            },
            reference,
            paid_by: Some(notice.paid_by.clone()),
            phone_number: notice.phone_number.clone(),
            payload: notice.payload.clone(),
        };

        match self.ledger.commit(entry).await? {
            CommitOutcome::Duplicate => Ok(IngestOutcome::AlreadyProcessed),
            CommitOutcome::Committed { entry, new_balance } => {
                match &student {
                    Some(student) => {
                        self.notifier.publish(PaymentEvent::payment_matched(
                            &entry,
                            &student.name,
                            &student.admission_number,
                        ));
                        if let (Some(phone), Some(balance)) =
                            (&notice.phone_number, &new_balance)
                        {
                            self.receipts.enqueue(
                                phone.clone(),
                                format_receipt(&entry, &student.name, balance),
                            );
                        }
                    }
                    None => {
                        self.notifier.publish(PaymentEvent::payment_suspense(&entry));
                    }
                }
                Ok(IngestOutcome::Committed(entry))
            }
        }
    }

    /// Record an operator-entered payment. Unlike automated channels this
    /// path has no suspense fallback: an unknown reference or duplicate id
    /// is a hard input error and nothing is persisted.
    pub async fn record_manual(
        &self,
        school: &School,
        payment: ManualPayment,
    ) -> AppResult<LedgerEntry> {
        if payment.amount < bigdecimal::BigDecimal::from(0) {
            return Err(AppError::validation("Amount must not be negative"));
        }

        let transaction_id = payment
            .transaction_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("CASH-{}", Uuid::new_v4().simple()));

        if self
            .ledger
            .exists(Some(school.id), &transaction_id)
            .await?
        {
            return Err(AppError::domain(DomainError::DuplicateTransaction {
                transaction_id,
            }));
        }

        let reference = normalize_reference(&payment.reference);
        let scope = TenantScope::Resolved(school.clone());
        let student = self
            .matcher
            .match_student(&scope, &reference)
            .await?
            .ok_or_else(|| {
                AppError::domain(DomainError::StudentNotFound {
                    reference: reference.clone(),
                })
            })?;

        let paid_by = payment.paid_by.unwrap_or_else(|| reference.clone());
        let entry = NewLedgerEntry {
            school_id: Some(school.id),
            student_id: Some(student.id),
            transaction_id: transaction_id.clone(),
            amount: payment.amount,
            source: payment.source,
            provider: None,
            entry_type: EntryType::Credit,
            status: EntryStatus::Completed,
            reference,
            paid_by: Some(paid_by),
            phone_number: None,
            payload: serde_json::json!({ "recorded_by": school.code }),
        };

        match self.ledger.commit(entry).await? {
            CommitOutcome::Duplicate => Err(AppError::domain(DomainError::DuplicateTransaction {
                transaction_id,
            })),
            CommitOutcome::Committed { entry, .. } => {
                self.notifier.publish(PaymentEvent::payment_matched(
                    &entry,
                    &student.name,
                    &student.admission_number,
                ));
                Ok(entry)
            }
        }
    }
}
