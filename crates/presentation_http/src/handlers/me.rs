//! Identity of the calling API key

use application::RequestContext;
use axum::{Extension, Json};
use serde::Serialize;

use crate::error::ApiError;

/// The calling key, without its digest
#[derive(Debug, Serialize)]
pub struct KeyIdentityResponse {
    pub id: String,
    pub name: String,
    pub prefix: String,
    pub scopes: Vec<String>,
}

/// Describe the API key that authenticated this request
pub async fn whoami(
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<KeyIdentityResponse>, ApiError> {
    let key = ctx.api_key().ok_or(ApiError::MissingCredential)?;
    Ok(Json(KeyIdentityResponse {
        id: key.id.to_string(),
        name: key.name.clone(),
        prefix: key.key_prefix.clone(),
        scopes: key.scopes.iter().map(ToString::to_string).collect(),
    }))
}
