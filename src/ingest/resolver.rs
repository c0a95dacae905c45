//! Tenant resolution
//!
//! Bank channels identify the owning school up front through the merchant
//! account embedded in the payload. M-Pesa cannot: the paybill is shared,
//! so the scope stays `Unresolved` and the school is derived from whichever
//! student the matcher finds.

use std::sync::Arc;
use uuid::Uuid;

use crate::database::school_repository::School;
use crate::error::{AppError, AppResult, DomainError};
use crate::ingest::notice::BankProvider;
use crate::ingest::traits::SchoolDirectory;

/// Explicit scope instead of a nullable tenant, so every consumer handles
/// the suspense case.
#[derive(Debug, Clone)]
pub enum TenantScope {
    Resolved(School),
    Unresolved,
}

impl TenantScope {
    pub fn school_id(&self) -> Option<Uuid> {
        match self {
            TenantScope::Resolved(school) => Some(school.id),
            TenantScope::Unresolved => None,
        }
    }

    pub fn school(&self) -> Option<&School> {
        match self {
            TenantScope::Resolved(school) => Some(school),
            TenantScope::Unresolved => None,
        }
    }
}

pub struct SchoolResolver {
    schools: Arc<dyn SchoolDirectory>,
}

impl SchoolResolver {
    pub fn new(schools: Arc<dyn SchoolDirectory>) -> Self {
        Self { schools }
    }

    /// Identifier-based resolution for bank webhooks. Zero matches means
    /// the channel is misconfigured: crediting a guessed school would risk
    /// cross-tenant balance corruption, so the notice is rejected before
    /// any entry is created.
    pub async fn resolve_bank(
        &self,
        provider: BankProvider,
        routing_hint: Option<&str>,
    ) -> AppResult<School> {
        let account = routing_hint.ok_or_else(|| {
            AppError::validation(format!(
                "{} payload carries no merchant account identifier",
                provider
            ))
        })?;

        self.schools
            .find_by_bank_account(provider, account)
            .await?
            .ok_or_else(|| {
                AppError::domain(DomainError::ChannelNotConfigured {
                    provider: provider.as_str().to_string(),
                    account: account.to_string(),
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppErrorKind;
    use async_trait::async_trait;
    use chrono::Utc;

    struct OneSchool(School);

    #[async_trait]
    impl SchoolDirectory for OneSchool {
        async fn find_by_code(&self, code: &str) -> AppResult<Option<School>> {
            Ok((self.0.code == code).then(|| self.0.clone()))
        }

        async fn find_by_bank_account(
            &self,
            provider: BankProvider,
            account_number: &str,
        ) -> AppResult<Option<School>> {
            let matches = self.0.bank_provider.as_deref() == Some(provider.as_str())
                && self.0.bank_enabled
                && self.0.bank_active
                && self.0.bank_credentials["account_number"] == account_number;
            Ok(matches.then(|| self.0.clone()))
        }
    }

    fn school() -> School {
        School {
            id: Uuid::new_v4(),
            name: "Tumaini Academy".to_string(),
            code: "TUMAINI".to_string(),
            paybill_number: "600100".to_string(),
            contact_email: "fees@tumaini.ac.ke".to_string(),
            contact_phone: "254711000000".to_string(),
            bank_provider: Some("KCB".to_string()),
            bank_enabled: true,
            bank_active: true,
            bank_credentials: serde_json::json!({"account_number": "1104999888"}),
            is_active: true,
            subscription_status: "ACTIVE".to_string(),
            subscription_expiry: None,
            max_students: 500,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_bank_resolution_by_merchant_account() {
        let resolver = SchoolResolver::new(Arc::new(OneSchool(school())));
        let resolved = resolver
            .resolve_bank(BankProvider::Kcb, Some("1104999888"))
            .await
            .unwrap();
        assert_eq!(resolved.code, "TUMAINI");
    }

    #[tokio::test]
    async fn test_unknown_account_is_channel_misconfiguration() {
        let resolver = SchoolResolver::new(Arc::new(OneSchool(school())));
        let err = resolver
            .resolve_bank(BankProvider::Kcb, Some("0000000000"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.kind,
            AppErrorKind::Domain(DomainError::ChannelNotConfigured { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_hint_rejected() {
        let resolver = SchoolResolver::new(Arc::new(OneSchool(school())));
        assert!(resolver
            .resolve_bank(BankProvider::Kcb, None)
            .await
            .is_err());
    }
}
