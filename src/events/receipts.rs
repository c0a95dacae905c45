//! Payment receipt queue
//!
//! Matched payments with a resolvable payer phone queue an SMS-style
//! receipt. Delivery is a separate concern: the worker drains the queue in
//! the background and hands messages to whatever gateway is wired in;
//! today it logs the dispatch. Nothing here can block or fail ingestion.

use bigdecimal::BigDecimal;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::database::ledger_repository::LedgerEntry;

#[derive(Debug, Clone)]
pub struct ReceiptMessage {
    pub phone_number: String,
    pub body: String,
}

pub fn format_receipt(entry: &LedgerEntry, student_name: &str, new_balance: &BigDecimal) -> String {
    format!(
        "Dear Parent, received KES {} for {}. New Balance: KES {}. Ref: {}.",
        entry.amount, student_name, new_balance, entry.transaction_id
    )
}

#[derive(Clone)]
pub struct ReceiptQueue {
    sender: mpsc::UnboundedSender<ReceiptMessage>,
}

impl ReceiptQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ReceiptMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Best-effort enqueue; a closed queue (worker gone during shutdown)
    /// only drops the receipt, never the payment.
    pub fn enqueue(&self, phone_number: String, body: String) {
        let message = ReceiptMessage { phone_number, body };
        if self.sender.send(message).is_err() {
            debug!("Receipt worker not running; receipt dropped");
        }
    }
}

/// Drain the receipt queue until shutdown is signalled.
pub async fn run_receipt_worker(
    mut receiver: mpsc::UnboundedReceiver<ReceiptMessage>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!("Receipt worker started");
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                info!("Shutdown signal received, stopping receipt worker");
                break;
            }
            message = receiver.recv() => {
                match message {
                    Some(message) => {
                        // SMS gateway integration lands here; for now the
                        // dispatch is recorded in the logs.
                        info!(
                            phone = %message.phone_number,
                            "Receipt queued for dispatch: {}",
                            message.body
                        );
                    }
                    None => break,
                }
            }
        }
    }
    info!("Receipt worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::str::FromStr;
    use uuid::Uuid;

    #[test]
    fn test_receipt_formatting() {
        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            school_id: None,
            student_id: None,
            transaction_id: "RKTQDM7W6S".to_string(),
            amount: BigDecimal::from_str("2500").unwrap(),
            source: "MPESA".to_string(),
            provider: Some("MPESA".to_string()),
            entry_type: "CREDIT".to_string(),
            status: "COMPLETED".to_string(),
            reference: "ADM001".to_string(),
            paid_by: None,
            phone_number: None,
            payload: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let body = format_receipt(&entry, "Asha Mwangi", &BigDecimal::from_str("7500").unwrap());
        assert_eq!(
            body,
            "Dear Parent, received KES 2500 for Asha Mwangi. New Balance: KES 7500. Ref: RKTQDM7W6S."
        );
    }

    #[tokio::test]
    async fn test_enqueue_and_drain() {
        let (queue, mut receiver) = ReceiptQueue::new();
        queue.enqueue("254712345678".to_string(), "hello".to_string());
        let message = receiver.recv().await.unwrap();
        assert_eq!(message.phone_number, "254712345678");
    }

    #[tokio::test]
    async fn test_enqueue_after_worker_gone_is_silent() {
        let (queue, receiver) = ReceiptQueue::new();
        drop(receiver);
        queue.enqueue("254712345678".to_string(), "hello".to_string());
    }
}
