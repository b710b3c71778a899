//! Scope vocabulary handler

use axum::Json;
use domain::KNOWN_SCOPES;
use serde::Serialize;

/// Scope vocabulary response
#[derive(Debug, Serialize)]
pub struct ScopesResponse {
    pub scopes: &'static [&'static str],
}

/// List every scope a key may be granted
pub async fn list_scopes() -> Json<ScopesResponse> {
    Json(ScopesResponse {
        scopes: KNOWN_SCOPES,
    })
}
