use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Extension, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use service::accounts::{
    domain::{AccountView, AuthToken, LoginInput, RegisterInput},
    AccountError, AccountService,
};
use service::context::RequestContext;
use tracing::debug;

use crate::errors::ApiError;

pub const AUTH_COOKIE: &str = "auth_token";

/// Unreadable bodies (bad JSON, missing fields, wrong content type) are
/// caller input errors like any other.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(v)| v).map_err(|rejection| {
        debug!(status = %rejection.status(), "request body rejected");
        ApiError(AccountError::Validation(rejection.body_text()))
    })
}

fn session_cookie(value: String) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(false)
        .same_site(SameSite::Lax)
        .build()
}

#[derive(Clone)]
pub struct ServerState {
    pub accounts: Arc<AccountService>,
    pub request_timeout: Duration,
}

impl ServerState {
    /// Fresh context whose deadline is the configured request timeout.
    pub fn request_context(&self) -> RequestContext {
        RequestContext::with_timeout(self.request_timeout)
    }
}

#[utoipa::path(post, path = "/auth/register", tag = "auth", request_body = crate::openapi::RegisterRequest, responses((status = 201, description = "Registered", body = crate::openapi::AccountViewDoc), (status = 400, description = "Bad Request"), (status = 409, description = "Conflict")))]
pub async fn register(
    State(state): State<ServerState>,
    body: Result<Json<RegisterInput>, JsonRejection>,
) -> Result<(StatusCode, Json<AccountView>), ApiError> {
    let input = json_body(body)?;
    let ctx = state.request_context();
    let user = state.accounts.register(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(AccountView::from(user))))
}

#[utoipa::path(post, path = "/auth/login", tag = "auth", request_body = crate::openapi::LoginRequest, responses((status = 200, description = "Logged In", body = crate::openapi::AuthTokenDoc), (status = 401, description = "Unauthorized")))]
pub async fn login(
    State(state): State<ServerState>,
    jar: CookieJar,
    body: Result<Json<LoginInput>, JsonRejection>,
) -> Result<(CookieJar, Json<AuthToken>), ApiError> {
    let input = json_body(body)?;
    let ctx = state.request_context();
    let token = state.accounts.login(&ctx, input).await?;
    Ok((jar.add(session_cookie(token.token.clone())), Json(token)))
}

#[utoipa::path(post, path = "/auth/logout", tag = "auth", responses((status = 204, description = "Cookie cleared")))]
pub async fn logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    // Always sent, with the login cookie's path, so the browser drops it.
    let mut expired = session_cookie(String::new());
    expired.make_removal();
    (jar.add(expired), StatusCode::NO_CONTENT)
}

#[utoipa::path(get, path = "/auth/me", tag = "auth", responses((status = 200, description = "Current account", body = crate::openapi::AccountViewDoc), (status = 401, description = "Unauthorized")))]
pub async fn me(Extension(account): Extension<AccountView>) -> Json<AccountView> {
    Json(account)
}

/// Middleware: resolve `Authorization: Bearer <token>` (or the `auth_token`
/// cookie) to an account and expose it as a request extension. Missing,
/// malformed, expired and foreign tokens all answer 401.
pub async fn require_bearer_token(
    State(state): State<ServerState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = bearer_token(req.headers()) else {
        debug!(path = %req.uri().path(), "missing bearer token");
        return Err(ApiError(AccountError::InvalidCredentials));
    };
    let ctx = state.request_context();
    let account = state.accounts.authenticate(&ctx, &token).await?;
    req.extensions_mut().insert(account);
    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(AUTHORIZATION) {
        // A present but malformed header does not fall back to the cookie.
        return value
            .to_str()
            .ok()
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
    }
    CookieJar::from_headers(headers)
        .get(AUTH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn bearer_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::COOKIE, HeaderValue::from_static("theme=dark; auth_token=tok123"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("tok123"));
    }

    #[test]
    fn wrong_scheme_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwdw=="));
        headers.insert(axum::http::header::COOKIE, HeaderValue::from_static("auth_token=tok123"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn nothing_present() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
