//! Real-time payment events
//!
//! Publishing is decoupled from the commit path through a broadcast
//! channel: the ledger outcome never depends on a dashboard being
//! connected. Each event carries enough display data that subscribers can
//! render it without a follow-up query.

pub mod receipts;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::database::ledger_repository::LedgerEntry;

/// Default buffer for the broadcast channel; slow subscribers that lag
/// behind this many events start missing them rather than applying
/// backpressure to the ingestion path.
pub const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PaymentEvent {
    /// A payment was matched to a student and committed
    PaymentMatched {
        entry_id: Uuid,
        school_id: Option<Uuid>,
        student_name: String,
        admission_number: String,
        amount: BigDecimal,
        source: String,
        time: DateTime<Utc>,
    },
    /// A payment could not be matched and was committed into suspense
    PaymentSuspense {
        entry_id: Uuid,
        school_id: Option<Uuid>,
        reference: String,
        amount: BigDecimal,
        source: String,
        time: DateTime<Utc>,
    },
}

impl PaymentEvent {
    pub fn payment_matched(
        entry: &LedgerEntry,
        student_name: &str,
        admission_number: &str,
    ) -> Self {
        PaymentEvent::PaymentMatched {
            entry_id: entry.id,
            school_id: entry.school_id,
            student_name: student_name.to_string(),
            admission_number: admission_number.to_string(),
            amount: entry.amount.clone(),
            source: entry.source.clone(),
            time: entry.created_at,
        }
    }

    pub fn payment_suspense(entry: &LedgerEntry) -> Self {
        PaymentEvent::PaymentSuspense {
            entry_id: entry.id,
            school_id: entry.school_id,
            reference: entry.reference.clone(),
            amount: entry.amount.clone(),
            source: entry.source.clone(),
            time: entry.created_at,
        }
    }
}

/// Fire-and-forget event fan-out
#[derive(Clone)]
pub struct Notifier {
    sender: broadcast::Sender<PaymentEvent>,
}

impl Notifier {
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PaymentEvent> {
        self.sender.subscribe()
    }

    /// Publish to whoever is listening. No subscribers is a non-event;
    /// the committed outcome has already been decided.
    pub fn publish(&self, event: PaymentEvent) {
        if let Err(err) = self.sender.send(event) {
            debug!("No event subscribers connected: {}", err);
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(EVENT_BUFFER)
    }
}
