use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::error::DatabaseError;
use crate::error::AppResult;
use crate::ingest::notice::BankProvider;
use crate::ingest::traits::SchoolDirectory;

/// School (tenant) entity
#[derive(Debug, Clone, FromRow)]
pub struct School {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    /// M-Pesa paybill shortcode payments arrive through
    pub paybill_number: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub bank_provider: Option<String>,
    pub bank_enabled: bool,
    pub bank_active: bool,
    pub bank_credentials: serde_json::Value,
    pub is_active: bool,
    pub subscription_status: String,
    pub subscription_expiry: Option<DateTime<Utc>>,
    pub max_students: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-school bank API credentials, stored as JSONB
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BankCredentials {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub consumer_key: Option<String>,
    #[serde(default)]
    pub consumer_secret: Option<String>,
    #[serde(default)]
    pub merchant_id: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub callback_url: Option<String>,
}

impl School {
    /// Subscription gate: SUSPENDED/EXPIRED or past expiry means no access
    pub fn is_subscription_valid(&self) -> bool {
        if self.subscription_status == "SUSPENDED" || self.subscription_status == "EXPIRED" {
            return false;
        }
        if let Some(expiry) = self.subscription_expiry {
            if expiry < Utc::now() {
                return false;
            }
        }
        true
    }

    pub fn bank_credentials(&self) -> Result<BankCredentials, DatabaseError> {
        serde_json::from_value(self.bank_credentials.clone()).map_err(|e| {
            DatabaseError::new(crate::database::error::DatabaseErrorKind::QueryError {
                message: format!("Malformed bank credentials for school {}: {}", self.code, e),
            })
        })
    }

    /// The HMAC secret this school's bank webhooks are signed with
    pub fn webhook_secret(&self) -> Option<String> {
        self.bank_credentials().ok().and_then(|c| c.api_secret)
    }
}

const SCHOOL_COLUMNS: &str = "id, name, code, paybill_number, contact_email, contact_phone, \
     bank_provider, bank_enabled, bank_active, bank_credentials, is_active, \
     subscription_status, subscription_expiry, max_students, created_at, updated_at";

/// Repository for school (tenant) records
pub struct SchoolRepository {
    pool: PgPool,
}

impl SchoolRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<School>, DatabaseError> {
        sqlx::query_as::<_, School>(&format!(
            "SELECT {} FROM schools WHERE id = $1",
            SCHOOL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<School>, DatabaseError> {
        sqlx::query_as::<_, School>(&format!(
            "SELECT {} FROM schools WHERE code = $1",
            SCHOOL_COLUMNS
        ))
        .bind(code.to_uppercase())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Identifier-based routing for bank webhooks: the merchant account
    /// embedded in the payload must match a school whose integration for
    /// that provider is enabled and active.
    pub async fn find_by_bank_account(
        &self,
        provider: BankProvider,
        account_number: &str,
    ) -> Result<Option<School>, DatabaseError> {
        sqlx::query_as::<_, School>(&format!(
            "SELECT {} FROM schools \
             WHERE bank_provider = $1 \
               AND bank_enabled = TRUE \
               AND bank_active = TRUE \
               AND is_active = TRUE \
               AND bank_credentials ->> 'account_number' = $2",
            SCHOOL_COLUMNS
        ))
        .bind(provider.as_str())
        .bind(account_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

#[async_trait]
impl SchoolDirectory for SchoolRepository {
    async fn find_by_code(&self, code: &str) -> AppResult<Option<School>> {
        Ok(SchoolRepository::find_by_code(self, code).await?)
    }

    async fn find_by_bank_account(
        &self,
        provider: BankProvider,
        account_number: &str,
    ) -> AppResult<Option<School>> {
        Ok(SchoolRepository::find_by_bank_account(self, provider, account_number).await?)
    }
}
