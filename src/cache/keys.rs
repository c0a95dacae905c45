//! Cache key builders
//!
//! All keys are namespaced under `shulepay:` so the instance can share a
//! Redis with other services.

use uuid::Uuid;

/// Bearer token for a school's bank API integration
pub fn provider_token(school_id: Uuid, provider: &str) -> String {
    format!("shulepay:token:{}:{}", school_id, provider)
}
