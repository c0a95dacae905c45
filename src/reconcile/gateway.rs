//! Bank API gateway
//!
//! Talks to each bank's transaction API for reconciliation sweeps. Bearer
//! tokens are tenant-scoped and short-lived; they live in the cache with an
//! explicit expiry and are handed to each call, never held as adapter
//! state.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{keys, Cache};
use crate::config::BankApiConfig;
use crate::database::school_repository::{BankCredentials, School};
use crate::error::{AppError, AppErrorKind, AppResult, ExternalError};
use crate::ingest::adapter::field_as_string;
use crate::ingest::notice::{parse_amount, BankProvider};
use crate::reconcile::{BankTransaction, TransactionSource};

/// Cached bearer token with explicit expiry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl ProviderToken {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// (school, provider)-keyed token store over the cache layer
pub struct TokenStore {
    cache: Arc<dyn Cache<ProviderToken>>,
}

impl TokenStore {
    pub fn new(cache: Arc<dyn Cache<ProviderToken>>) -> Self {
        Self { cache }
    }

    pub async fn get(&self, school_id: Uuid, provider: BankProvider) -> Option<ProviderToken> {
        let key = keys::provider_token(school_id, provider.as_str());
        match self.cache.get(&key).await {
            Ok(Some(token)) if !token.is_expired() => Some(token),
            Ok(_) => None,
            Err(e) => {
                warn!("Token cache read failed: {}", e);
                None
            }
        }
    }

    pub async fn put(&self, school_id: Uuid, provider: BankProvider, token: ProviderToken) {
        let key = keys::provider_token(school_id, provider.as_str());
        let ttl = (token.expires_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        if ttl.is_zero() {
            return;
        }
        if let Err(e) = self.cache.set(&key, &token, Some(ttl)).await {
            warn!("Token cache write failed: {}", e);
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

pub struct BankGateway {
    http: reqwest::Client,
    config: BankApiConfig,
    tokens: TokenStore,
}

impl BankGateway {
    pub fn new(config: BankApiConfig, tokens: TokenStore) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            config,
            tokens,
        })
    }

    fn bank_api_error(provider: BankProvider, message: String, is_retryable: bool) -> AppError {
        AppError::new(AppErrorKind::External(ExternalError::BankApi {
            provider: provider.as_str().to_string(),
            message,
            is_retryable,
        }))
    }

    fn credentials_for(&self, school: &School, provider: BankProvider) -> AppResult<BankCredentials> {
        let creds = school.bank_credentials()?;
        if school.bank_provider.as_deref() != Some(provider.as_str()) {
            return Err(AppError::configuration(format!(
                "School {} has no {} integration",
                school.code, provider
            )));
        }
        Ok(creds)
    }

    /// Send a request with bounded retry on rate limits and server errors
    async fn request_json<F>(&self, provider: BankProvider, build: F) -> AppResult<serde_json::Value>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json().await.map_err(|e| {
                            Self::bank_api_error(
                                provider,
                                format!("Invalid response format: {}", e),
                                false,
                            )
                        });
                    }
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if retryable && attempt < self.config.max_retries {
                        let backoff = 2_u64.pow(attempt);
                        warn!(
                            "{} returned {}, retrying after {}s (attempt {})",
                            provider,
                            status,
                            backoff,
                            attempt + 1
                        );
                        tokio::time::sleep(Duration::from_secs(backoff)).await;
                        attempt += 1;
                        continue;
                    }
                    let body = response.text().await.unwrap_or_default();
                    return Err(Self::bank_api_error(
                        provider,
                        format!("HTTP {}: {}", status, body),
                        retryable,
                    ));
                }
                Err(e) => {
                    if attempt < self.config.max_retries {
                        let backoff = 2_u64.pow(attempt);
                        warn!(
                            "{} request error, retrying after {}s (attempt {}): {}",
                            provider,
                            backoff,
                            attempt + 1,
                            e
                        );
                        tokio::time::sleep(Duration::from_secs(backoff)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(Self::bank_api_error(
                        provider,
                        format!("Request failed after {} retries: {}", attempt, e),
                        true,
                    ));
                }
            }
        }
    }

    /// Acquire (or reuse) the bearer token for a school's integration
    async fn access_token(&self, school: &School, provider: BankProvider) -> AppResult<String> {
        if let Some(token) = self.tokens.get(school.id, provider).await {
            debug!(school = %school.code, provider = %provider, "Using cached bank token");
            return Ok(token.access_token);
        }

        let creds = self.credentials_for(school, provider)?;
        let missing = |field: &str| {
            AppError::configuration(format!(
                "School {} is missing {} credential '{}'",
                school.code, provider, field
            ))
        };

        let value = match provider {
            BankProvider::Equity => {
                let consumer_key = creds.consumer_key.clone().ok_or_else(|| missing("consumer_key"))?;
                let consumer_secret = creds
                    .consumer_secret
                    .clone()
                    .ok_or_else(|| missing("consumer_secret"))?;
                let url = format!("{}/identity/v2/token", self.config.equity_base_url);
                self.request_json(provider, || {
                    self.http
                        .post(&url)
                        .basic_auth(&consumer_key, Some(&consumer_secret))
                        .form(&[("grant_type", "client_credentials")])
                })
                .await?
            }
            BankProvider::Kcb => {
                let client_id = creds.api_key.clone().ok_or_else(|| missing("api_key"))?;
                let client_secret = creds.api_secret.clone().ok_or_else(|| missing("api_secret"))?;
                let url = format!("{}/v1/token", self.config.kcb_base_url);
                self.request_json(provider, || {
                    self.http.post(&url).json(&serde_json::json!({
                        "grant_type": "client_credentials",
                        "client_id": client_id,
                        "client_secret": client_secret,
                    }))
                })
                .await?
            }
            BankProvider::Coop => {
                let consumer_key = creds.consumer_key.clone().ok_or_else(|| missing("consumer_key"))?;
                let consumer_secret = creds
                    .consumer_secret
                    .clone()
                    .ok_or_else(|| missing("consumer_secret"))?;
                let url = format!("{}/token", self.config.coop_base_url);
                self.request_json(provider, || {
                    self.http
                        .post(&url)
                        .basic_auth(&consumer_key, Some(&consumer_secret))
                        .form(&[("grant_type", "client_credentials")])
                })
                .await?
            }
        };

        let token: TokenResponse = serde_json::from_value(value).map_err(|e| {
            Self::bank_api_error(provider, format!("Invalid token response: {}", e), false)
        })?;

        // One-minute buffer so a token never expires mid-request
        let expires_at =
            Utc::now() + ChronoDuration::seconds(token.expires_in.saturating_sub(60) as i64);
        let cached = ProviderToken {
            access_token: token.access_token.clone(),
            expires_at,
        };
        self.tokens.put(school.id, provider, cached).await;

        Ok(token.access_token)
    }

    fn parse_listing(
        provider: BankProvider,
        items: &[serde_json::Value],
    ) -> Vec<BankTransaction> {
        let (id_field, amount_field, reference_field) = match provider {
            BankProvider::Equity => ("transactionReference", "amount", "accountNumber"),
            BankProvider::Kcb => ("transaction_reference", "transaction_amount", "account_reference"),
            BankProvider::Coop => ("TransactionID", "TransAmount", "BillRefNumber"),
        };

        items
            .iter()
            .filter_map(|item| {
                let transaction_id = match field_as_string(item, id_field) {
                    Some(id) => id,
                    None => {
                        warn!("Skipping {} listing row without {}", provider, id_field);
                        return None;
                    }
                };
                let amount = item
                    .get(amount_field)
                    .and_then(|v| parse_amount(v).ok())
                    .unwrap_or_default();
                Some(BankTransaction {
                    transaction_id,
                    amount,
                    reference: field_as_string(item, reference_field),
                    occurred_at: None,
                })
            })
            .collect()
    }
}

#[async_trait]
impl TransactionSource for BankGateway {
    async fn fetch_transactions(
        &self,
        school: &School,
        provider: BankProvider,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<BankTransaction>> {
        let token = self.access_token(school, provider).await?;
        let creds = self.credentials_for(school, provider)?;
        let account_number = creds.account_number.ok_or_else(|| {
            AppError::configuration(format!(
                "School {} is missing {} credential 'account_number'",
                school.code, provider
            ))
        })?;
        let from_str = from.format("%Y-%m-%d").to_string();
        let to_str = to.format("%Y-%m-%d").to_string();

        let (value, items_field) = match provider {
            BankProvider::Equity => {
                let url = format!(
                    "{}/transaction/v2/accounts/transactions/query",
                    self.config.equity_base_url
                );
                let body = serde_json::json!({
                    "accountNumber": account_number,
                    "fromDate": from_str,
                    "toDate": to_str,
                });
                (
                    self.request_json(provider, || {
                        self.http.post(&url).bearer_auth(&token).json(&body)
                    })
                    .await?,
                    "transactions",
                )
            }
            BankProvider::Kcb => {
                let url = format!(
                    "{}/v1/accounts/{}/transactions",
                    self.config.kcb_base_url, account_number
                );
                (
                    self.request_json(provider, || {
                        self.http
                            .get(&url)
                            .bearer_auth(&token)
                            .query(&[("from_date", &from_str), ("to_date", &to_str)])
                    })
                    .await?,
                    "transactions",
                )
            }
            BankProvider::Coop => {
                let url = format!(
                    "{}/AccountBalance/1.0.0/AccountMiniStatement",
                    self.config.coop_base_url
                );
                let body = serde_json::json!({
                    "AccountNumber": account_number,
                    "StartDate": from_str,
                    "EndDate": to_str,
                });
                (
                    self.request_json(provider, || {
                        self.http.post(&url).bearer_auth(&token).json(&body)
                    })
                    .await?,
                    "Transactions",
                )
            }
        };

        let items = value
            .get(items_field)
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(Self::parse_listing(provider, &items))
    }
}
