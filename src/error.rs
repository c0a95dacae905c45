//! Application error taxonomy
//!
//! One error type for the whole service, split by concern: validation,
//! authentication, domain rules, infrastructure, and external services.
//! Operator-facing handlers convert these into JSON responses; provider-facing
//! webhook handlers log them and acknowledge anyway (see `api` module).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

use crate::database::error::DatabaseError;

/// Result type used across the application
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub context: Option<String>,
}

#[derive(Debug)]
pub enum AppErrorKind {
    /// Input failed validation before any state was touched
    Validation { message: String },
    /// Signature/credential check failed; a hard boundary, not a warning
    Authentication { message: String },
    /// A business rule rejected the operation
    Domain(DomainError),
    /// Our own plumbing failed (configuration, storage)
    Infrastructure(InfrastructureError),
    /// A third-party service failed
    External(ExternalError),
}

#[derive(Debug)]
pub enum DomainError {
    SchoolNotFound { code: String },
    SchoolInactive { code: String },
    SubscriptionLapsed { code: String },
    StudentNotFound { reference: String },
    EntryNotFound { id: String },
    AlreadyReversed { id: String },
    DuplicateTransaction { transaction_id: String },
    /// Identifier-based routing matched no enabled integration
    ChannelNotConfigured { provider: String, account: String },
}

#[derive(Debug)]
pub enum InfrastructureError {
    Configuration { message: String },
    Database(DatabaseError),
    Cache { message: String },
}

#[derive(Debug)]
pub enum ExternalError {
    BankApi {
        provider: String,
        message: String,
        is_retryable: bool,
    },
    RateLimit {
        service: String,
        retry_after: Option<u64>,
    },
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::new(AppErrorKind::Validation {
            message: message.into(),
        })
    }

    pub fn authentication<S: Into<String>>(message: S) -> Self {
        Self::new(AppErrorKind::Authentication {
            message: message.into(),
        })
    }

    pub fn domain(error: DomainError) -> Self {
        Self::new(AppErrorKind::Domain(error))
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::new(AppErrorKind::Infrastructure(
            InfrastructureError::Configuration {
                message: message.into(),
            },
        ))
    }

    /// Status code this error maps to on operator-facing endpoints
    pub fn status_code(&self) -> StatusCode {
        match &self.kind {
            AppErrorKind::Validation { .. } => StatusCode::BAD_REQUEST,
            AppErrorKind::Authentication { .. } => StatusCode::UNAUTHORIZED,
            AppErrorKind::Domain(domain) => match domain {
                DomainError::SchoolNotFound { .. }
                | DomainError::StudentNotFound { .. }
                | DomainError::EntryNotFound { .. }
                | DomainError::ChannelNotConfigured { .. } => StatusCode::NOT_FOUND,
                DomainError::SchoolInactive { .. } | DomainError::SubscriptionLapsed { .. } => {
                    StatusCode::FORBIDDEN
                }
                DomainError::AlreadyReversed { .. } | DomainError::DuplicateTransaction { .. } => {
                    StatusCode::BAD_REQUEST
                }
            },
            AppErrorKind::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppErrorKind::External(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match &self.kind {
            AppErrorKind::Validation { message } => message.clone(),
            AppErrorKind::Authentication { message } => message.clone(),
            AppErrorKind::Domain(domain) => domain.to_string(),
            AppErrorKind::Infrastructure(infra) => infra.to_string(),
            AppErrorKind::External(external) => external.to_string(),
        };
        if let Some(context) = &self.context {
            write!(f, "{} ({})", message, context)
        } else {
            write!(f, "{}", message)
        }
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::SchoolNotFound { code } => {
                write!(f, "School '{}' not found", code)
            }
            DomainError::SchoolInactive { code } => {
                write!(f, "School '{}' is inactive. Please contact support.", code)
            }
            DomainError::SubscriptionLapsed { code } => {
                write!(
                    f,
                    "Subscription for school '{}' has expired. Please renew to continue.",
                    code
                )
            }
            DomainError::StudentNotFound { reference } => {
                write!(f, "Student not found with admission number '{}'", reference)
            }
            DomainError::EntryNotFound { id } => {
                write!(f, "Transaction '{}' not found", id)
            }
            DomainError::AlreadyReversed { id } => {
                write!(f, "Transaction '{}' already reversed", id)
            }
            DomainError::DuplicateTransaction { transaction_id } => {
                write!(f, "Transaction '{}' already recorded", transaction_id)
            }
            DomainError::ChannelNotConfigured { provider, account } => {
                write!(
                    f,
                    "No enabled {} integration matches account '{}'",
                    provider, account
                )
            }
        }
    }
}

impl fmt::Display for InfrastructureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfrastructureError::Configuration { message } => {
                write!(f, "Configuration error: {}", message)
            }
            InfrastructureError::Database(error) => write!(f, "{}", error),
            InfrastructureError::Cache { message } => write!(f, "Cache error: {}", message),
        }
    }
}

impl fmt::Display for ExternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalError::BankApi {
                provider, message, ..
            } => write!(f, "{} API error: {}", provider, message),
            ExternalError::RateLimit { service, .. } => {
                write!(f, "{} rate limit exceeded", service)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl From<DatabaseError> for AppError {
    fn from(error: DatabaseError) -> Self {
        AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database(
            error,
        )))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Internal details stay in the logs, not in the response body.
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        let body = Json(json!({ "success": false, "message": message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_map_to_client_codes() {
        let err = AppError::domain(DomainError::StudentNotFound {
            reference: "ADM001".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = AppError::domain(DomainError::AlreadyReversed {
            id: "abc".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = AppError::authentication("bad signature");
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_context_is_appended() {
        let err = AppError::validation("amount must be numeric").with_context("EQUITY webhook");
        assert_eq!(
            err.to_string(),
            "amount must be numeric (EQUITY webhook)"
        );
    }
}
