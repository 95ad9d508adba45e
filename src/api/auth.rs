//! Authentication endpoints
//!
//! - GET  /login            - Login page
//! - POST /login            - Login form (sets cookie, redirects to /)
//! - POST /logout           - Logout form (clears cookie, redirects to /login)
//! - POST /api/auth/login   - JSON login
//! - POST /api/auth/logout  - JSON logout
//! - GET  /api/auth/me      - Current usuario

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tera::Context as TeraContext;

use crate::api::middleware::{
    extract_session_token, ApiError, ApiJson, AppState, AuthenticatedUser, ClientIp,
};
use crate::models::{Sesion, Usuario};
use crate::services::UsuarioServiceError;
use crate::views::Aviso;

/// Login body, shared by the form and the JSON endpoint
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub correo: String,
    pub password: String,
}

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub usuario: Usuario,
    pub token: String,
    pub expires_at: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginPageQuery {
    pub auth_required: Option<String>,
}

/// Routes reachable without a session
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login_form))
        .route("/api/auth/login", post(login))
}

/// Routes that need a session (wrapped by `require_auth`)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout_form))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}

/// Check the rate limits, verify the credentials and record the outcome
async fn autenticar(
    state: &AppState,
    ip: ClientIp,
    body: &LoginRequest,
) -> Result<(Sesion, Usuario), ApiError> {
    let correo = body.correo.trim().to_lowercase();

    if let ClientIp(Some(ip)) = ip {
        if state.rate_limiter.is_ip_limited(ip).await {
            tracing::warn!(%ip, "Login rate limited by IP");
            return Err(ApiError::rate_limited(
                "Demasiadas solicitudes, intenta de nuevo en un minuto",
                60,
            ));
        }
        state.rate_limiter.record_ip_request(ip).await;
    }

    if state.rate_limiter.is_correo_limited(&correo).await {
        tracing::warn!(correo = %correo, "Login rate limited by correo");
        return Err(ApiError::rate_limited(
            "Demasiados intentos fallidos, espera unos minutos",
            state.rate_limiter.window_seconds(),
        ));
    }

    match state.usuario_service.login(&correo, &body.password).await {
        Ok(result) => {
            state.rate_limiter.clear_correo_attempts(&correo).await;
            Ok(result)
        }
        Err(e) => {
            if matches!(e, UsuarioServiceError::AuthenticationError(_)) {
                state.rate_limiter.record_failed_attempt(&correo).await;
            }
            Err(e.into())
        }
    }
}

/// GET /login
async fn login_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LoginPageQuery>,
) -> Result<Response, ApiError> {
    if let Some(token) = extract_session_token(&headers) {
        if state.usuario_service.validar_sesion(&token).await.is_ok() {
            return Ok(Redirect::to("/").into_response());
        }
    }

    let mut ctx = TeraContext::new();
    if query.auth_required.is_some() {
        ctx.insert("aviso", &Aviso::error("Inicia sesión para continuar"));
    }
    Ok(Html(state.views.render("login.html", None, ctx)?).into_response())
}

/// POST /login
async fn login_form(
    State(state): State<AppState>,
    ip: ClientIp,
    Form(body): Form<LoginRequest>,
) -> Result<Response, ApiError> {
    match autenticar(&state, ip, &body).await {
        Ok((sesion, usuario)) => {
            tracing::info!(usuario_id = usuario.id, "Login");
            let cookie = HeaderValue::from_str(&state.session_cookie(&sesion.id))
                .map_err(ApiError::internal)?;
            Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/")).into_response())
        }
        Err(e) if e.error.code == "INTERNAL_ERROR" => Err(e),
        Err(e) => {
            let mut ctx = TeraContext::new();
            ctx.insert("aviso", &Aviso::error(e.error.message.clone()));
            ctx.insert("correo", body.correo.trim());
            let html = state.views.render("login.html", None, ctx)?;
            Ok((e.status(), Html(html)).into_response())
        }
    }
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    ip: ClientIp,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (sesion, usuario) = autenticar(&state, ip, &body).await?;
    tracing::info!(usuario_id = usuario.id, "Login");

    let cookie =
        HeaderValue::from_str(&state.session_cookie(&sesion.id)).map_err(ApiError::internal)?;
    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::SET_COOKIE, cookie);

    Ok((
        response_headers,
        Json(AuthResponse {
            usuario,
            expires_at: sesion.expires_at.to_rfc3339(),
            token: sesion.id,
        }),
    ))
}

async fn cerrar_sesion(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    if let Some(token) = extract_session_token(headers) {
        state.usuario_service.logout(&token).await?;
    }
    Ok(())
}

/// POST /logout
async fn logout_form(
    State(state): State<AppState>,
    _usuario: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    cerrar_sesion(&state, &headers).await?;
    Ok(([(header::SET_COOKIE, state.clear_session_cookie())], Redirect::to("/login")).into_response())
}

/// POST /api/auth/logout
async fn logout(
    State(state): State<AppState>,
    _usuario: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    cerrar_sesion(&state, &headers).await?;
    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, state.clear_session_cookie())],
    ))
}

/// GET /api/auth/me
async fn me(usuario: AuthenticatedUser) -> Json<Usuario> {
    Json(usuario.0)
}
