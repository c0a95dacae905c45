//! Co-operative Bank webhook adapter
//!
//! PascalCase payloads close to the M-Pesa C2B shape, HMAC-SHA256 hex
//! digest. The MSISDN may arrive masked, same as M-Pesa.

use chrono::NaiveDateTime;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use crate::error::{AppError, AppResult};
use crate::ingest::adapter::{constant_time_eq, field_as_string, ChannelAdapter};
use crate::ingest::notice::{normalize_msisdn, parse_amount, PaymentNotice, Provider};

type HmacSha256 = Hmac<Sha256>;

pub struct CoopAdapter;

impl ChannelAdapter for CoopAdapter {
    fn provider(&self) -> Provider {
        Provider::Coop
    }

    fn routing_hint(&self, payload: &Value) -> Option<String> {
        field_as_string(payload, "MerchantAccount")
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
        let transaction_id = field_as_string(payload, "TransactionID")
            .ok_or_else(|| AppError::validation("Missing required field: TransactionID"))?;
        let reference = field_as_string(payload, "BillRefNumber")
            .ok_or_else(|| AppError::validation("Missing required field: BillRefNumber"))?;
        let amount = parse_amount(
            payload
                .get("TransAmount")
                .ok_or_else(|| AppError::validation("Missing required field: TransAmount"))?,
        )?;

        let paid_by = field_as_string(payload, "SenderName").unwrap_or_else(|| "Unknown".into());
        let phone_number = normalize_msisdn(field_as_string(payload, "MSISDN").as_deref());
        let occurred_at = field_as_string(payload, "TransTime")
            .and_then(|t| NaiveDateTime::parse_from_str(&t, "%Y%m%d%H%M%S").ok())
            .map(|naive| naive.and_utc());

        Ok(PaymentNotice {
            provider: Provider::Coop,
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
