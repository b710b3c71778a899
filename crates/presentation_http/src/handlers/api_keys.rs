//! API key management handlers
//!
//! Session-authenticated admin endpoints. Responses never include the key
//! digest; the plaintext is returned exactly once, from `create`.

use application::ApiKeyUpdate;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use domain::{ApiKey, ApiKeyId};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{error::ApiError, middleware::ValidatedJson, state::AppState};

/// An API key record as returned to admins
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyResponse {
    pub id: String,
    pub name: String,
    pub prefix: String,
    pub scopes: Vec<String>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub active: bool,
}

impl From<&ApiKey> for ApiKeyResponse {
    fn from(key: &ApiKey) -> Self {
        Self {
            id: key.id.to_string(),
            name: key.name.clone(),
            prefix: key.key_prefix.clone(),
            scopes: key.scopes.iter().map(ToString::to_string).collect(),
            last_used_at: key.last_used_at,
            created_at: key.created_at,
            revoked_at: key.revoked_at(),
            active: key.is_active(),
        }
    }
}

/// Query parameters for listing keys
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub include_revoked: bool,
}

/// Issue request body
#[derive(Debug, Deserialize, Validate)]
pub struct CreateApiKeyRequest {
    #[validate(length(min = 1, max = 100, message = "must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(length(min = 1, message = "at least one scope is required"))]
    pub scopes: Vec<String>,
}

/// Issue response: the one-time plaintext plus the stored record
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApiKeyResponse {
    pub key: String,
    pub api_key: ApiKeyResponse,
}

/// Partial update body
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateApiKeyRequest {
    #[validate(length(min = 1, max = 100, message = "must be between 1 and 100 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "at least one scope is required"))]
    pub scopes: Option<Vec<String>>,
}

/// Revocation outcome
#[derive(Debug, Serialize)]
pub struct RevokeResponse {
    /// `false` when the key had already been revoked
    pub revoked: bool,
}

fn parse_id(raw: &str) -> Result<ApiKeyId, ApiError> {
    ApiKeyId::parse(raw).map_err(|_| ApiError::NotFound(format!("API key not found: {raw}")))
}

/// List keys, newest first
pub async fn list_api_keys(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ApiKeyResponse>>, ApiError> {
    let keys = state.api_keys.list(params.include_revoked).await?;
    Ok(Json(keys.iter().map(ApiKeyResponse::from).collect()))
}

/// Issue a new key
pub async fn create_api_key(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateApiKeyRequest>,
) -> Result<(StatusCode, Json<CreateApiKeyResponse>), ApiError> {
    let issued = state.api_keys.issue(&request.name, &request.scopes).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateApiKeyResponse {
            key: issued.plaintext.expose_secret().to_string(),
            api_key: ApiKeyResponse::from(&issued.key),
        }),
    ))
}

/// Get one key
pub async fn get_api_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let id = parse_id(&id)?;
    let key = state
        .api_keys
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("API key not found: {id}")))?;
    Ok(Json(ApiKeyResponse::from(&key)))
}

/// Rename a key or replace its scopes
pub async fn update_api_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<UpdateApiKeyRequest>,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let id = parse_id(&id)?;
    let key = state
        .api_keys
        .update(
            &id,
            ApiKeyUpdate {
                name: request.name,
                scopes: request.scopes,
            },
        )
        .await?;
    Ok(Json(ApiKeyResponse::from(&key)))
}

/// Revoke a key; revoking twice is not an error
pub async fn revoke_api_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RevokeResponse>, ApiError> {
    let id = parse_id(&id)?;
    let revoked = state.api_keys.revoke(&id).await?;
    Ok(Json(RevokeResponse { revoked }))
}

/// Permanently delete a key
pub async fn delete_api_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    if state.api_keys.delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("API key not found: {id}")))
    }
}
