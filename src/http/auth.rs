use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::CookieJar;

use crate::app::auth::AuthService;
use crate::http::AppError;
use crate::AppState;

pub const SESSION_COOKIE: &str = "session";

/// The logged-in user. Anonymous requests are redirected to the login page.
///
/// Use `Option<AuthUser>` on views that anyone may see.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let target = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path(), |target| target.as_str());
        let token =
            session_token(&parts.headers).ok_or_else(|| AppError::login_required(target))?;

        let service = AuthService::new(
            state.db.clone(),
            state.session_key,
            state.session_ttl_hours,
        );
        let session = service.authenticate_session(&token).map_err(|err| {
            tracing::warn!(error = ?err, "rejected session token");
            AppError::login_required(target)
        })?;

        let session = session.ok_or_else(|| AppError::login_required(target))?;
        Ok(AuthUser {
            user_id: session.user_id,
            username: session.username,
        })
    }
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}
