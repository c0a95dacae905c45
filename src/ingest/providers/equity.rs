//! Equity Bank (Jenga) webhook adapter
//!
//! Credit notifications signed with HMAC-SHA256 over the raw body, hex
//! digest in the `x-jenga-signature` header.

use chrono::DateTime;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use crate::error::{AppError, AppResult};
use crate::ingest::adapter::{constant_time_eq, field_as_string, ChannelAdapter};
use crate::ingest::notice::{normalize_msisdn, parse_amount, PaymentNotice, Provider};

type HmacSha256 = Hmac<Sha256>;

pub struct EquityAdapter;

impl ChannelAdapter for EquityAdapter {
    fn provider(&self) -> Provider {
        Provider::Equity
    }

    fn routing_hint(&self, payload: &Value) -> Option<String> {
        field_as_string(payload, "merchantAccount")
    }

    fn verify_signature(&self, payload: &[u8], signature: &str, secret: &str) -> bool {
        let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(payload);
        let computed = hex::encode(mac.finalize().into_bytes());
        constant_time_eq(&computed, signature.trim())
    }

    fn normalize(&self, payload: &Value) -> AppResult<PaymentNotice> {
        let transaction_id = field_as_string(payload, "transactionReference").ok_or_else(|| {
            AppError::validation("Missing required field: transactionReference")
        })?;
        // accountNumber carries what the payer keyed in (the admission
        // number), not the merchant account.
        let reference = field_as_string(payload, "accountNumber")
            .ok_or_else(|| AppError::validation("Missing required field: accountNumber"))?;
        let amount = parse_amount(
            payload
                .get("amount")
                .ok_or_else(|| AppError::validation("Missing required field: amount"))?,
        )?;

        let paid_by = field_as_string(payload, "senderName").unwrap_or_else(|| "Unknown".into());
        let phone_number = normalize_msisdn(field_as_string(payload, "senderMobile").as_deref());
        let occurred_at = field_as_string(payload, "timestamp")
            .and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
            .map(|dt| dt.to_utc());

        Ok(PaymentNotice {
            provider: Provider::Equity,
            transaction_id,
            amount,
            reference,
            paid_by,
            phone_number,
            occurred_at,
            payload: payload.clone(),
        })
    }
}
