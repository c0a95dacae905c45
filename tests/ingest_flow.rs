//! End-to-end pipeline behavior over in-memory stores: idempotency,
//! suspense routing, masked-phone safety, manual-path hard failures,
//! reversal inversion, and the balance invariant.

mod common;

use bigdecimal::BigDecimal;
use common::{pipeline_over, MemoryStore};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;

use shulepay_backend::error::{AppErrorKind, DomainError};
use shulepay_backend::events::{Notifier, PaymentEvent};
use shulepay_backend::ingest::adapter::ChannelAdapter;
use shulepay_backend::ingest::notice::Channel;
use shulepay_backend::ingest::providers::MpesaAdapter;
use shulepay_backend::ingest::{IngestOutcome, ManualPayment, TenantScope};

fn mpesa_payload(trans_id: &str, amount: &str, reference: &str, msisdn: &str) -> serde_json::Value {
    json!({
        "TransactionType": "Pay Bill",
        "TransID": trans_id,
        "TransTime": "20250620142533",
        "TransAmount": amount,
        "BusinessShortCode": "522522",
        "BillRefNumber": reference,
        "MSISDN": msisdn,
        "FirstName": "JOHN",
        "LastName": "DOE"
    })
}

#[tokio::test]
async fn matched_payment_commits_once_and_decreases_balance() {
    let store = MemoryStore::new();
    let school = store.add_school("MAKINI", None, "", "");
    let student = store.add_student(&school, "STU001", "10000");

    let notifier = Notifier::default();
    let mut events = notifier.subscribe();
    let (pipeline, _receipts) = pipeline_over(&store, notifier);

    // Payer typed the reference lowercase with a stray space
    let notice = MpesaAdapter
        .normalize(&mpesa_payload("TX1", "2500", " stu001", "2547 ***** 126"))
        .unwrap();
    let outcome = pipeline
        .ingest(notice, TenantScope::Unresolved)
        .await
        .unwrap();

    let entry = match outcome {
        IngestOutcome::Committed(entry) => entry,
        IngestOutcome::AlreadyProcessed => panic!("first delivery must commit"),
    };
    assert_eq!(entry.status, "COMPLETED");
    assert_eq!(entry.reference, "STU001");
    // Tenant derived from the matched student
    assert_eq!(entry.school_id, Some(school.id));
    assert_eq!(entry.student_id, Some(student.id));
    assert_eq!(
        store.balance_of(student.id),
        BigDecimal::from_str("7500").unwrap()
    );

    match events.recv().await.unwrap() {
        PaymentEvent::PaymentMatched {
            admission_number,
            amount,
            ..
        } => {
            assert_eq!(admission_number, "STU001");
            assert_eq!(amount, BigDecimal::from_str("2500").unwrap());
        }
        other => panic!("expected payment_matched, got {:?}", other),
    }
}

#[tokio::test]
async fn replayed_delivery_is_neutral() {
    let store = MemoryStore::new();
    let school = store.add_school("MAKINI", None, "", "");
    let student = store.add_student(&school, "STU001", "10000");
    let (pipeline, _receipts) = pipeline_over(&store, Notifier::default());

    let payload = mpesa_payload("TX1", "2500", "STU001", "2547 ***** 126");
    let first = MpesaAdapter.normalize(&payload).unwrap();
    let replay = MpesaAdapter.normalize(&payload).unwrap();

    pipeline
        .ingest(first, TenantScope::Unresolved)
        .await
        .unwrap();
    let outcome = pipeline
        .ingest(replay, TenantScope::Unresolved)
        .await
        .unwrap();

    assert!(matches!(outcome, IngestOutcome::AlreadyProcessed));
    assert_eq!(store.entry_count(), 1);
    assert_eq!(
        store.balance_of(student.id),
        BigDecimal::from_str("7500").unwrap()
    );
}

#[tokio::test]
async fn concurrent_duplicate_deliveries_commit_exactly_once() {
    let store = MemoryStore::new();
    let school = store.add_school("MAKINI", None, "", "");
    let student = store.add_student(&school, "STU001", "10000");
    let (pipeline, _receipts) = pipeline_over(&store, Notifier::default());
    let pipeline = Arc::new(pipeline);

    let payload = mpesa_payload("TX-RACE", "1000", "STU001", "2547 ***** 126");
    let a = MpesaAdapter.normalize(&payload).unwrap();
    let b = MpesaAdapter.normalize(&payload).unwrap();

    let (ra, rb) = tokio::join!(
        pipeline.ingest(a, TenantScope::Unresolved),
        pipeline.ingest(b, TenantScope::Unresolved),
    );

    let committed = [ra.unwrap(), rb.unwrap()]
        .iter()
        .filter(|o| matches!(o, IngestOutcome::Committed(_)))
        .count();
    assert_eq!(committed, 1, "exactly one delivery wins the race");
    assert_eq!(store.entry_count(), 1);
    assert_eq!(
        store.balance_of(student.id),
        BigDecimal::from_str("9000").unwrap()
    );
}

#[tokio::test]
async fn unmatched_reference_routes_to_suspense() {
    let store = MemoryStore::new();
    store.add_school("MAKINI", None, "", "");

    let notifier = Notifier::default();
    let mut events = notifier.subscribe();
    let (pipeline, _receipts) = pipeline_over(&store, notifier);

    let notice = MpesaAdapter
        .normalize(&mpesa_payload("TX2", "3000", "ADM999", "2547 ***** 126"))
        .unwrap();
    let outcome = pipeline
        .ingest(notice, TenantScope::Unresolved)
        .await
        .unwrap();

    let entry = match outcome {
        IngestOutcome::Committed(entry) => entry,
        IngestOutcome::AlreadyProcessed => panic!("must commit a suspense entry"),
    };
    assert_eq!(entry.status, "PENDING");
    assert_eq!(entry.school_id, None);
    assert_eq!(entry.student_id, None);

    match events.recv().await.unwrap() {
        PaymentEvent::PaymentSuspense { reference, .. } => assert_eq!(reference, "ADM999"),
        other => panic!("expected payment_suspense, got {:?}", other),
    }
}

#[tokio::test]
async fn masked_phone_is_stored_as_null() {
    let store = MemoryStore::new();
    let school = store.add_school("MAKINI", None, "", "");
    store.add_student(&school, "STU001", "10000");
    let (pipeline, _receipts) = pipeline_over(&store, Notifier::default());

    let notice = MpesaAdapter
        .normalize(&mpesa_payload("TX3", "500", "STU001", "2547 ***** 126"))
        .unwrap();
    pipeline
        .ingest(notice, TenantScope::Unresolved)
        .await
        .unwrap();

    let entries = store.entries_snapshot();
    assert_eq!(entries[0].phone_number, None);
    // The raw payload keeps the masked value for audit, the column never does
    assert_eq!(entries[0].payload["MSISDN"], "2547 ***** 126");
}

#[tokio::test]
async fn resolvable_phone_queues_a_receipt() {
    let store = MemoryStore::new();
    let school = store.add_school("MAKINI", None, "", "");
    store.add_student(&school, "STU001", "10000");
    let (pipeline, mut receipts) = pipeline_over(&store, Notifier::default());

    let notice = MpesaAdapter
        .normalize(&mpesa_payload("TX4", "2500", "STU001", "254712345678"))
        .unwrap();
    pipeline
        .ingest(notice, TenantScope::Unresolved)
        .await
        .unwrap();

    let receipt = receipts.recv().await.unwrap();
    assert_eq!(receipt.phone_number, "254712345678");
    assert!(receipt.body.contains("KES 2500"));
    assert!(receipt.body.contains("New Balance: KES 7500"));
}

#[tokio::test]
async fn manual_recording_requires_a_matched_student() {
    let store = MemoryStore::new();
    let school = store.add_school("MAKINI", None, "", "");
    let (pipeline, _receipts) = pipeline_over(&store, Notifier::default());

    let err = pipeline
        .record_manual(
            &school,
            ManualPayment {
                transaction_id: Some("SLIP-1".to_string()),
                amount: BigDecimal::from_str("1200").unwrap(),
                reference: "UNKNOWN01".to_string(),
                source: Channel::Cash,
                paid_by: None,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err.kind,
        AppErrorKind::Domain(DomainError::StudentNotFound { .. })
    ));
    assert_eq!(store.entry_count(), 0);
}

#[tokio::test]
async fn manual_duplicate_is_a_hard_error() {
    let store = MemoryStore::new();
    let school = store.add_school("MAKINI", None, "", "");
    store.add_student(&school, "STU001", "5000");
    let (pipeline, _receipts) = pipeline_over(&store, Notifier::default());

    let payment = || ManualPayment {
        transaction_id: Some("SLIP-9".to_string()),
        amount: BigDecimal::from_str("1000").unwrap(),
        reference: "STU001".to_string(),
        source: Channel::BankTransfer,
        paid_by: Some("Bank Transfer".to_string()),
    };

    pipeline.record_manual(&school, payment()).await.unwrap();
    let err = pipeline.record_manual(&school, payment()).await.unwrap_err();

    assert!(matches!(
        err.kind,
        AppErrorKind::Domain(DomainError::DuplicateTransaction { .. })
    ));
    assert_eq!(store.entry_count(), 1);
}

#[tokio::test]
async fn reversal_inverts_once_and_only_once() {
    let store = MemoryStore::new();
    let school = store.add_school("MAKINI", None, "", "");
    let student = store.add_student(&school, "STU001", "10000");
    let (pipeline, _receipts) = pipeline_over(&store, Notifier::default());

    let notice = MpesaAdapter
        .normalize(&mpesa_payload("TX1", "2500", "STU001", "2547 ***** 126"))
        .unwrap();
    let entry = match pipeline
        .ingest(notice, TenantScope::Unresolved)
        .await
        .unwrap()
    {
        IngestOutcome::Committed(entry) => entry,
        IngestOutcome::AlreadyProcessed => unreachable!(),
    };
    assert_eq!(
        store.balance_of(student.id),
        BigDecimal::from_str("7500").unwrap()
    );

    use shulepay_backend::ingest::traits::LedgerStore;
    let reversed = store.reverse(entry.id).await.unwrap();
    assert_eq!(reversed.status, "REVERSED");
    assert_eq!(
        store.balance_of(student.id),
        BigDecimal::from_str("10000").unwrap()
    );

    let err = store.reverse(entry.id).await.unwrap_err();
    assert!(matches!(
        err.kind,
        AppErrorKind::Domain(DomainError::AlreadyReversed { .. })
    ));
    assert_eq!(
        store.balance_of(student.id),
        BigDecimal::from_str("10000").unwrap()
    );
}

#[tokio::test]
async fn balance_equals_initial_plus_non_reversed_entries() {
    let store = MemoryStore::new();
    let school = store.add_school("MAKINI", None, "", "");
    let student = store.add_student(&school, "STU001", "20000");
    let (pipeline, _receipts) = pipeline_over(&store, Notifier::default());

    let mut committed = Vec::new();
    for (id, amount) in [("A1", "1000"), ("A2", "2500"), ("A3", "400")] {
        let notice = MpesaAdapter
            .normalize(&mpesa_payload(id, amount, "STU001", "2547 ***** 126"))
            .unwrap();
        if let IngestOutcome::Committed(entry) = pipeline
            .ingest(notice, TenantScope::Unresolved)
            .await
            .unwrap()
        {
            committed.push(entry);
        }
    }

    use shulepay_backend::ingest::traits::LedgerStore;
    store.reverse(committed[1].id).await.unwrap();

    // initial 20000, minus non-reversed credits 1000 + 400
    let expected = BigDecimal::from_str("20000").unwrap()
        - BigDecimal::from_str("1000").unwrap()
        - BigDecimal::from_str("400").unwrap();
    assert_eq!(store.balance_of(student.id), expected);
}
