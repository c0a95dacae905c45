//! Tenant context extractor
//!
//! Operator endpoints are scoped to one school. Session/token issuance is
//! handled upstream; this extractor takes the authenticated school code
//! from the `x-school-code` header and enforces the data-isolation gates:
//! the school must exist, be active, and hold a valid subscription.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::api::AppState;
use crate::database::school_repository::School;
use crate::error::{AppError, DomainError};

pub struct SchoolContext(pub School);

#[async_trait]
impl FromRequestParts<AppState> for SchoolContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let code = parts
            .headers
            .get("x-school-code")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::authentication("Missing x-school-code header"))?
            .to_string();

        let school = state
            .schools
            .find_by_code(&code)
            .await?
            .ok_or_else(|| AppError::domain(DomainError::SchoolNotFound { code: code.clone() }))?;

        if !school.is_active {
            return Err(AppError::domain(DomainError::SchoolInactive { code }));
        }

        if !school.is_subscription_valid() {
            return Err(AppError::domain(DomainError::SubscriptionLapsed { code }));
        }

        Ok(SchoolContext(school))
    }
}
