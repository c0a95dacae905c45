//! Channel adapter contract
//!
//! One implementation per inbound payment channel. Adapters own the two
//! provider-specific concerns the rest of the pipeline must never see:
//! wire-format field names and the signing scheme.

use serde_json::Value;

use crate::error::AppResult;
use crate::ingest::notice::{BankProvider, PaymentNotice, Provider};
use crate::ingest::providers::{CoopAdapter, EquityAdapter, KcbAdapter};

pub trait ChannelAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    /// The merchant/account identifier the provider embeds in its payload,
    /// used for identifier-based tenant routing. None for channels that
    /// resolve the tenant through the matched account instead.
    fn routing_hint(&self, payload: &Value) -> Option<String>;

    /// Authenticity check over the raw request body using the tenant's
    /// secret. Must run before any state is touched.
    fn verify_signature(&self, payload: &[u8], signature: &str, secret: &str) -> bool;

    /// Translate the provider payload into a normalized notice.
    fn normalize(&self, payload: &Value) -> AppResult<PaymentNotice>;
}

/// Adapter registry for bank webhook channels
pub fn bank_adapter(provider: BankProvider) -> Box<dyn ChannelAdapter> {
    match provider {
        BankProvider::Equity => Box::new(EquityAdapter),
        BankProvider::Kcb => Box::new(KcbAdapter),
        BankProvider::Coop => Box::new(CoopAdapter),
    }
}

/// Constant-time digest comparison; a length mismatch fails immediately
/// without leaking position information.
pub(crate) fn constant_time_eq(computed: &str, provided: &str) -> bool {
    if computed.len() != provided.len() {
        return false;
    }
    computed
        .as_bytes()
        .iter()
        .zip(provided.as_bytes().iter())
        .fold(0, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Pull a string field out of a JSON payload, tolerating numeric values
/// (some providers send ids and references unquoted).
pub(crate) fn field_as_string(payload: &Value, field: &str) -> Option<String> {
    match payload.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
