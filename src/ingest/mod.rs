//! Payment ingestion core
//!
//! Adapter → resolver → matcher → ledger → notifier, one notice per task.

pub mod adapter;
pub mod matcher;
pub mod notice;
pub mod pipeline;
pub mod providers;
pub mod resolver;
pub mod traits;

pub use notice::{BankProvider, Channel, PaymentNotice, Provider};
pub use pipeline::{IngestOutcome, ManualPayment, PaymentPipeline};
pub use resolver::{SchoolResolver, TenantScope};
