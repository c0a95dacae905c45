//! M-Pesa (Daraja C2B) adapter
//!
//! Safaricom delivers two callbacks: a validation probe (always accepted
//! upstream, see the API layer) and a confirmation carrying the payment.
//! The confirmation MSISDN is masked for privacy and must never be stored
//! verbatim.

use chrono::NaiveDateTime;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::ingest::adapter::{field_as_string, ChannelAdapter};
use crate::ingest::notice::{normalize_msisdn, parse_amount, PaymentNotice, Provider};

pub struct MpesaAdapter;

impl ChannelAdapter for MpesaAdapter {
    fn provider(&self) -> Provider {
        Provider::Mpesa
    }

    fn routing_hint(&self, _payload: &Value) -> Option<String> {
        // The paybill is shared across schools in this design; the tenant
        // is resolved through the matched student, not the shortcode.
        None
    }

    fn verify_signature(&self, _payload: &[u8], _signature: &str, _secret: &str) -> bool {
        // Daraja C2B callbacks carry no signature; authenticity rests on
        // the registered confirmation URL.
        true
    }

    fn normalize(&self, payload: &Value) -> AppResult<PaymentNotice> {
        let transaction_id = field_as_string(payload, "TransID")
            .ok_or_else(|| AppError::validation("Missing required field: TransID"))?;
        let reference = field_as_string(payload, "BillRefNumber")
            .ok_or_else(|| AppError::validation("Missing required field: BillRefNumber"))?;
        let amount = parse_amount(
            payload
                .get("TransAmount")
                .ok_or_else(|| AppError::validation("Missing required field: TransAmount"))?,
        )?;

        let paid_by = ["FirstName", "MiddleName", "LastName"]
            .iter()
            .filter_map(|field| field_as_string(payload, field))
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let paid_by = if paid_by.is_empty() {
            "Unknown".to_string()
        } else {
            paid_by
        };

        let phone_number = normalize_msisdn(field_as_string(payload, "MSISDN").as_deref());

        // TransTime arrives as yyyymmddHHMMSS
        let occurred_at = field_as_string(payload, "TransTime")
            .and_then(|t| NaiveDateTime::parse_from_str(&t, "%Y%m%d%H%M%S").ok())
            .map(|naive| naive.and_utc());

        Ok(PaymentNotice {
            provider: Provider::Mpesa,
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
