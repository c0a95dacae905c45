//! Normalized payment notice and the shared channel vocabulary
//!
//! Every inbound channel (M-Pesa C2B, bank webhooks) is reduced to a
//! [`PaymentNotice`] before the pipeline sees it. The notice is a value
//! object: produced by one adapter, consumed once, never persisted as-is.

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::{AppError, AppResult};

/// Inbound payment channel, tagged on every ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provider {
    Mpesa,
    Equity,
    Kcb,
    Coop,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Mpesa => "MPESA",
            Provider::Equity => "EQUITY",
            Provider::Kcb => "KCB",
            Provider::Coop => "COOP",
        }
    }

    /// The ledger `source` tag this channel writes
    pub fn channel(&self) -> Channel {
        match self {
            Provider::Mpesa => Channel::Mpesa,
            Provider::Equity | Provider::Kcb | Provider::Coop => Channel::BankTransfer,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bank providers with a webhook + reconciliation integration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BankProvider {
    Equity,
    Kcb,
    Coop,
}

impl BankProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            BankProvider::Equity => "EQUITY",
            BankProvider::Kcb => "KCB",
            BankProvider::Coop => "COOP",
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            BankProvider::Equity => Provider::Equity,
            BankProvider::Kcb => Provider::Kcb,
            BankProvider::Coop => Provider::Coop,
        }
    }
}

impl FromStr for BankProvider {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "EQUITY" => Ok(BankProvider::Equity),
            "KCB" => Ok(BankProvider::Kcb),
            "COOP" => Ok(BankProvider::Coop),
            other => Err(AppError::validation(format!(
                "Unsupported bank provider: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for BankProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment source recorded on a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    Mpesa,
    BankTransfer,
    BankAgent,
    Cash,
    Cheque,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Mpesa => "MPESA",
            Channel::BankTransfer => "BANK_TRANSFER",
            Channel::BankAgent => "BANK_AGENT",
            Channel::Cash => "CASH",
            Channel::Cheque => "CHEQUE",
        }
    }
}

/// Credit = payment in, debit = reversal/charge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Credit,
    Debit,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Credit => "CREDIT",
            EntryType::Debit => "DEBIT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Completed,
    Pending,
    Failed,
    Reversed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Completed => "COMPLETED",
            EntryStatus::Pending => "PENDING",
            EntryStatus::Failed => "FAILED",
            EntryStatus::Reversed => "REVERSED",
        }
    }
}

/// Normalized output of a channel adapter
#[derive(Debug, Clone)]
pub struct PaymentNotice {
    pub provider: Provider,
    /// External transaction id in the provider's namespace
    pub transaction_id: String,
    pub amount: BigDecimal,
    /// The account reference as the payer typed it (not yet normalized)
    pub reference: String,
    pub paid_by: String,
    /// Fully-resolved payer phone, or None when masked/invalid
    pub phone_number: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
    /// Full raw payload, kept for the audit trail
    pub payload: serde_json::Value,
}

/// Coerce a JSON amount field (string or number) into a decimal.
/// Non-numeric and negative values are rejected; there is no currency
/// conversion at this layer.
pub fn parse_amount(value: &serde_json::Value) -> AppResult<BigDecimal> {
    let parsed = match value {
        serde_json::Value::String(s) => BigDecimal::from_str(s.trim()).ok(),
        serde_json::Value::Number(n) => BigDecimal::from_str(&n.to_string()).ok(),
        _ => None,
    };

    match parsed {
        Some(amount) if amount >= BigDecimal::zero() => Ok(amount),
        Some(_) => Err(AppError::validation("Amount must not be negative")),
        None => Err(AppError::validation(format!(
            "Amount is not numeric: {}",
            value
        ))),
    }
}

fn msisdn_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^254\d{9}$").expect("static pattern"))
}

/// Normalize a payer phone number.
///
/// Providers mask the MSISDN for privacy (e.g. "2547 ***** 126"); a masked
/// value must never be stored, so anything containing the masking marker
/// becomes None. Only a full `254XXXXXXXXX` number survives.
pub fn normalize_msisdn(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    if raw.contains('*') {
        return None;
    }
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if msisdn_pattern().is_match(&cleaned) {
        Some(cleaned)
    } else {
        None
    }
}
