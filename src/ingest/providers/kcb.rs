//! KCB Bank webhook adapter
//!
//! Same HMAC-SHA256 scheme as the other banks but the digest is delivered
//! base64-encoded, and the payload uses snake_case field names.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::DateTime;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use crate::error::{AppError, AppResult};
use crate::ingest::adapter::{constant_time_eq, field_as_string, ChannelAdapter};
use crate::ingest::notice::{normalize_msisdn, parse_amount, PaymentNotice, Provider};

type HmacSha256 = Hmac<Sha256>;

pub struct KcbAdapter;

impl ChannelAdapter for KcbAdapter {
    fn provider(&self) -> Provider {
        Provider::Kcb
    }

    fn routing_hint(&self, payload: &Value) -> Option<String> {
        field_as_string(payload, "merchant_account")
    }

    fn verify_signature(&self, payload: &[u8], signature: &str, secret: &str) -> bool {
        let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(payload);
        let computed = BASE64.encode(mac.finalize().into_bytes());
        constant_time_eq(&computed, signature.trim())
    }

    fn normalize(&self, payload: &Value) -> AppResult<PaymentNotice> {
        let transaction_id = field_as_string(payload, "transaction_reference").ok_or_else(|| {
            AppError::validation("Missing required field: transaction_reference")
        })?;
        let reference = field_as_string(payload, "account_reference")
            .ok_or_else(|| AppError::validation("Missing required field: account_reference"))?;
        let amount = parse_amount(
            payload
                .get("transaction_amount")
                .ok_or_else(|| AppError::validation("Missing required field: transaction_amount"))?,
        )?;

        let paid_by = field_as_string(payload, "sender_name").unwrap_or_else(|| "Unknown".into());
        let phone_number = normalize_msisdn(field_as_string(payload, "sender_phone").as_deref());
        let occurred_at = field_as_string(payload, "transaction_date")
            .and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
            .map(|dt| dt.to_utc());

        Ok(PaymentNotice {
            provider: Provider::Kcb,
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
