//! Shulepay backend
//!
//! Multi-tenant school fee collection: schools register, students accrue
//! balances, and payments arrive through M-Pesa C2B callbacks, bank
//! webhooks, and manual operator entry. The core of the crate is the
//! ingestion pipeline (normalize, resolve tenant, guard idempotency,
//! match student, commit atomically, notify) plus a reconciliation
//! sweeper that diffs the ledger against each bank's own records.

pub mod api;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod ingest;
pub mod reconcile;
