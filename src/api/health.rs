use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::database;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub database: String,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match database::health_check(&state.pool).await {
        Ok(()) => "up",
        Err(_) => "down",
    };

    Json(HealthResponse {
        status: if database == "up" { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.server.environment.clone(),
        database: database.to_string(),
    })
}
