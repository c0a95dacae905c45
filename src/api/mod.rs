//! HTTP surface
//!
//! Two kinds of endpoints with opposite error contracts: provider-facing
//! callbacks (M-Pesa, bank webhooks) acknowledge receipt even when
//! processing fails internally, because providers retry on anything else;
//! operator-facing endpoints propagate errors with descriptive messages.

pub mod bank_webhook;
pub mod context;
pub mod events;
pub mod health;
pub mod mpesa;
pub mod payments;
pub mod reconcile;
pub mod transactions;

use axum::routing::{get, post, put};
use axum::Router;
use http::HeaderName;
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::events::Notifier;
use crate::ingest::resolver::SchoolResolver;
use crate::ingest::traits::{LedgerStore, SchoolDirectory};
use crate::ingest::PaymentPipeline;
use crate::reconcile::TransactionSource;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pool: PgPool,
    pub schools: Arc<dyn SchoolDirectory>,
    pub resolver: Arc<SchoolResolver>,
    pub pipeline: Arc<PaymentPipeline>,
    pub ledger: Arc<dyn LedgerStore>,
    pub notifier: Notifier,
    pub bank_source: Arc<dyn TransactionSource>,
}

pub fn router(state: AppState) -> Router {
    let request_id = HeaderName::from_static("x-request-id");

    Router::new()
        .route("/health", get(health::health_check))
        // Provider callbacks (no auth; see each handler's response policy)
        .route("/api/mpesa/validation", post(mpesa::validation))
        .route("/api/mpesa/confirmation", post(mpesa::confirmation))
        .route("/api/webhooks/bank/:provider", post(bank_webhook::receive))
        // Operator endpoints (tenant-scoped via x-school-code)
        .route("/api/payments/bank", post(payments::record_bank))
        .route("/api/payments/cash", post(payments::record_cash))
        .route("/api/transactions/:id/reverse", put(transactions::reverse))
        .route("/api/reconcile/:provider", post(reconcile::sweep))
        .route("/api/events/ws", get(events::subscribe))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id)),
        )
        .with_state(state)
}
