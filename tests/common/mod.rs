//! Shared test harness: in-memory implementations of the storage seams,
//! mirroring the Postgres repositories' semantics (uniqueness constraint,
//! atomic balance effect, single-shot reversal).

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use shulepay_backend::database::ledger_repository::LedgerEntry;
use shulepay_backend::database::school_repository::School;
use shulepay_backend::database::student_repository::Student;
use shulepay_backend::error::{AppError, AppResult, DomainError};
use shulepay_backend::events::receipts::ReceiptQueue;
use shulepay_backend::events::Notifier;
use shulepay_backend::ingest::notice::BankProvider;
use shulepay_backend::ingest::traits::{
    CommitOutcome, LedgerStore, NewLedgerEntry, SchoolDirectory, StudentDirectory,
};
use shulepay_backend::ingest::PaymentPipeline;

#[derive(Default)]
pub struct MemoryStore {
    pub schools: Mutex<Vec<School>>,
    pub students: Mutex<Vec<Student>>,
    pub entries: Mutex<Vec<LedgerEntry>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_school(&self, code: &str, provider: Option<&str>, account: &str, secret: &str) -> School {
        let school = School {
            id: Uuid::new_v4(),
            name: format!("{} School", code),
            code: code.to_string(),
            paybill_number: "522522".to_string(),
            contact_email: format!("fees@{}.ac.ke", code.to_lowercase()),
            contact_phone: "254700000000".to_string(),
            bank_provider: provider.map(|p| p.to_string()),
            bank_enabled: provider.is_some(),
            bank_active: provider.is_some(),
            bank_credentials: serde_json::json!({
                "api_secret": secret,
                "account_number": account,
                "consumer_key": "ck",
                "consumer_secret": "cs",
                "api_key": "ak",
            }),
            is_active: true,
            subscription_status: "ACTIVE".to_string(),
            subscription_expiry: None,
            max_students: 500,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.schools.lock().unwrap().push(school.clone());
        school
    }

    pub fn add_student(&self, school: &School, admission_number: &str, balance: &str) -> Student {
        let student = Student {
            id: Uuid::new_v4(),
            school_id: school.id,
            admission_number: admission_number.to_string(),
            name: format!("Student {}", admission_number),
            class_level: "Grade 11".to_string(),
            guardian_name: "Guardian".to_string(),
            guardian_phone: "254711111111".to_string(),
            current_balance: BigDecimal::from_str(balance).unwrap(),
            status: "ACTIVE".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.students.lock().unwrap().push(student.clone());
        student
    }

    pub fn balance_of(&self, student_id: Uuid) -> BigDecimal {
        self.students
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == student_id)
            .map(|s| s.current_balance.clone())
            .expect("student exists")
    }

    pub fn entry_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn entries_snapshot(&self) -> Vec<LedgerEntry> {
        self.entries.lock().unwrap().clone()
    }

    fn apply_delta(&self, student_id: Uuid, entry_type: &str, amount: &BigDecimal, invert: bool) -> BigDecimal {
        let mut students = self.students.lock().unwrap();
        let student = students
            .iter_mut()
            .find(|s| s.id == student_id)
            .expect("student exists");
        // CREDIT decreases the amount owed; reversal inverts.
        let decrease = (entry_type != "DEBIT") ^ invert;
        if decrease {
            student.current_balance = &student.current_balance - amount;
        } else {
            student.current_balance = &student.current_balance + amount;
        }
        student.current_balance.clone()
    }
}

#[async_trait]
impl SchoolDirectory for MemoryStore {
    async fn find_by_code(&self, code: &str) -> AppResult<Option<School>> {
        Ok(self
            .schools
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.code == code.to_uppercase())
            .cloned())
    }

    async fn find_by_bank_account(
        &self,
        provider: BankProvider,
        account_number: &str,
    ) -> AppResult<Option<School>> {
        Ok(self
            .schools
            .lock()
            .unwrap()
            .iter()
            .find(|s| {
                s.bank_provider.as_deref() == Some(provider.as_str())
                    && s.bank_enabled
                    && s.bank_active
                    && s.is_active
                    && s.bank_credentials["account_number"] == account_number
            })
            .cloned())
    }
}

#[async_trait]
impl StudentDirectory for MemoryStore {
    async fn find_by_reference(
        &self,
        school_id: Uuid,
        reference: &str,
    ) -> AppResult<Option<Student>> {
        Ok(self
            .students
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.school_id == school_id && s.admission_number == reference)
            .cloned())
    }

    async fn find_by_reference_global(&self, reference: &str) -> AppResult<Option<Student>> {
        Ok(self
            .students
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.admission_number == reference)
            .cloned())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn exists(&self, school_id: Option<Uuid>, transaction_id: &str) -> AppResult<bool> {
        Ok(self.entries.lock().unwrap().iter().any(|e| {
            e.transaction_id == transaction_id
                && match school_id {
                    Some(school_id) => e.school_id == Some(school_id),
                    None => true,
                }
        }))
    }

    async fn commit(&self, entry: NewLedgerEntry) -> AppResult<CommitOutcome> {
        // Check-and-insert under one lock, matching the database's
        // NULLS NOT DISTINCT uniqueness constraint.
        let committed = {
            let mut entries = self.entries.lock().unwrap();
            let duplicate = entries.iter().any(|e| {
                e.school_id == entry.school_id && e.transaction_id == entry.transaction_id
            });
            if duplicate {
                return Ok(CommitOutcome::Duplicate);
            }
            let committed = LedgerEntry {
                id: Uuid::new_v4(),
                school_id: entry.school_id,
                student_id: entry.student_id,
                transaction_id: entry.transaction_id.clone(),
                amount: entry.amount.clone(),
                source: entry.source.as_str().to_string(),
                provider: entry.provider.map(|p| p.as_str().to_string()),
                entry_type: entry.entry_type.as_str().to_string(),
                status: entry.status.as_str().to_string(),
                reference: entry.reference.clone(),
                paid_by: entry.paid_by.clone(),
                phone_number: entry.phone_number.clone(),
                payload: entry.payload.clone(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            entries.push(committed.clone());
            committed
        };

        let new_balance = committed.student_id.map(|student_id| {
            self.apply_delta(student_id, &committed.entry_type, &committed.amount, false)
        });

        Ok(CommitOutcome::Committed {
            entry: committed,
            new_balance,
        })
    }

    async fn reverse(&self, entry_id: Uuid) -> AppResult<LedgerEntry> {
        let entry = {
            let mut entries = self.entries.lock().unwrap();
            let entry = entries.iter_mut().find(|e| e.id == entry_id);
            match entry {
                None => {
                    return Err(AppError::domain(DomainError::EntryNotFound {
                        id: entry_id.to_string(),
                    }))
                }
                Some(entry) if entry.status == "REVERSED" => {
                    return Err(AppError::domain(DomainError::AlreadyReversed {
                        id: entry_id.to_string(),
                    }))
                }
                Some(entry) => {
                    entry.status = "REVERSED".to_string();
                    entry.updated_at = Utc::now();
                    entry.clone()
                }
            }
        };

        if let Some(student_id) = entry.student_id {
            self.apply_delta(student_id, &entry.entry_type, &entry.amount, true);
        }

        Ok(entry)
    }

    async fn find_by_id(&self, entry_id: Uuid) -> AppResult<Option<LedgerEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == entry_id)
            .cloned())
    }

    async fn transaction_ids_in_window(
        &self,
        school_id: Uuid,
        provider: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<String>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| {
                e.school_id == Some(school_id)
                    && e.provider.as_deref() == Some(provider)
                    && e.created_at >= from
                    && e.created_at < to
            })
            .map(|e| e.transaction_id.clone())
            .collect())
    }
}

/// Pipeline wired to a memory store, plus the receipt receiver for
/// asserting on queued receipts.
pub fn pipeline_over(
    store: &Arc<MemoryStore>,
    notifier: Notifier,
) -> (
    PaymentPipeline,
    tokio::sync::mpsc::UnboundedReceiver<shulepay_backend::events::receipts::ReceiptMessage>,
) {
    let (receipts, receipt_rx) = ReceiptQueue::new();
    let pipeline = PaymentPipeline::new(
        store.clone() as Arc<dyn StudentDirectory>,
        store.clone() as Arc<dyn LedgerStore>,
        notifier,
        receipts,
    );
    (pipeline, receipt_rx)
}
