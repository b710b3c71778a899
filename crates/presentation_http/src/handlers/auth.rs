//! Admin login, logout and session introspection

use application::RequestContext;
use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode, header::USER_AGENT},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use domain::{Principal, SessionMetadata};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::{
    error::ApiError,
    middleware::{ClientIp, ValidatedJson, append_cookie, clear_session_cookie, session_cookie},
    state::AppState,
};

/// Longest accepted `User-Agent` value stored with a session
const MAX_USER_AGENT_LEN: usize = 512;

/// Login request body
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    pub password: SecretString,
    #[serde(default)]
    pub remember_me: bool,
}

/// Principal as shown to the admin UI
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalResponse {
    pub id: String,
    pub email: String,
    pub display_name: String,
}

impl From<&Principal> for PrincipalResponse {
    fn from(principal: &Principal) -> Self {
        Self {
            id: principal.id.to_string(),
            email: principal.email.clone(),
            display_name: principal.display_name.clone(),
        }
    }
}

/// Session state returned by login and `me`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub principal: PrincipalResponse,
    pub expires_at: DateTime<Utc>,
    pub remember_me: bool,
}

/// Verify admin credentials and start a session
///
/// The token only travels in the `Set-Cookie` header, never in the body.
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Response, ApiError> {
    let metadata = SessionMetadata {
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|ua| ua.chars().take(MAX_USER_AGENT_LEN).collect()),
        ip_address: Some(ip),
    };

    let (created, principal) = state
        .sessions
        .login(
            &request.email,
            &request.password,
            request.remember_me,
            metadata,
        )
        .await?;

    let session = &created.session;
    info!(session_id = %session.id, user_id = %principal.id, "Admin logged in");

    let max_age = (session.expires_at - session.created_at).num_seconds();
    let cookie = session_cookie(
        &state.config.session.cookie_name,
        created.token.expose_secret(),
        max_age,
        state.config.session.secure_cookie,
    );

    let mut response = Json(SessionResponse {
        principal: PrincipalResponse::from(&principal),
        expires_at: session.expires_at,
        remember_me: request.remember_me,
    })
    .into_response();
    append_cookie(&mut response, &cookie);
    Ok(response)
}

/// End the current session and clear its cookie
pub async fn logout(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, ApiError> {
    let session = ctx.session().ok_or_else(ApiError::unauthorized)?;
    state.sessions.destroy(&session.session_id).await?;

    let mut response = StatusCode::NO_CONTENT.into_response();
    append_cookie(
        &mut response,
        &clear_session_cookie(
            &state.config.session.cookie_name,
            state.config.session.secure_cookie,
        ),
    );
    Ok(response)
}

/// Describe the current session
pub async fn me(
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = ctx.session().ok_or_else(ApiError::unauthorized)?;
    Ok(Json(SessionResponse {
        principal: PrincipalResponse::from(&session.principal),
        expires_at: session.expires_at,
        remember_me: session.duration == domain::SessionDuration::Extended,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_request_accepts_camel_case_and_defaults_remember_me() {
        let request: LoginRequest =
            serde_json::from_str(r#"{"email": "ops@octocrm.test", "password": "pw"}"#).unwrap();
        assert!(!request.remember_me);
        assert!(request.validate().is_ok());

        let request: LoginRequest = serde_json::from_str(
            r#"{"email": "not-an-email", "password": "pw", "rememberMe": true}"#,
        )
        .unwrap();
        assert!(request.remember_me);
        assert!(request.validate().is_err());
    }

    #[test]
    fn login_request_debug_hides_password() {
        let request: LoginRequest =
            serde_json::from_str(r#"{"email": "ops@octocrm.test", "password": "hunter2"}"#)
                .unwrap();
        assert!(!format!("{request:?}").contains("hunter2"));
    }
}
