//! API middleware
//!
//! Contains:
//! - `AppState`, the shared services handed to every handler
//! - `ApiError`, the JSON error envelope and its mapping from service errors
//! - Authentication (session cookie or bearer token) for JSON and HTML routes
//! - Role guards for coordinador and admin routes

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        ConnectInfo, FromRequest, FromRequestParts, Path, Query, Request, State,
    },
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::cache::MemoryCache;
use crate::config::{Config, UploadConfig};
use crate::db::repositories::{
    SqlxCatalogoRepository, SqlxColaboradorRepository, SqlxDocumentoRepository,
    SqlxSesionRepository, SqlxUsuarioRepository,
};
use crate::db::DynDatabasePool;
use crate::models::Usuario;
use crate::services::{
    AnalyticsService, AnalyticsServiceError, CatalogoService, CatalogoServiceError,
    ColaboradorService, ColaboradorServiceError, DocumentoService, DocumentoServiceError,
    LoginRateLimiter, UsuarioService, UsuarioServiceError,
};
use crate::views::{ViewEngine, ViewError};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub usuario_service: Arc<UsuarioService>,
    pub colaborador_service: Arc<ColaboradorService>,
    pub catalogo_service: Arc<CatalogoService>,
    pub documento_service: Arc<DocumentoService>,
    pub analytics_service: Arc<AnalyticsService>,
    pub views: Arc<ViewEngine>,
    pub upload_config: Arc<UploadConfig>,
    pub rate_limiter: Arc<LoginRateLimiter>,
    /// Honour X-Forwarded-For / X-Real-IP for the client IP
    pub trust_proxy_headers: bool,
    pub secure_cookies: bool,
}

impl AppState {
    /// Wire repositories and services on top of an open pool
    pub fn new(pool: DynDatabasePool, config: &Config, cache: Arc<MemoryCache>) -> anyhow::Result<Self> {
        let usuario_repo = SqlxUsuarioRepository::boxed(pool.clone());
        let sesion_repo = SqlxSesionRepository::boxed(pool.clone());
        let catalogo_repo = SqlxCatalogoRepository::boxed(pool.clone());
        let colaborador_repo = SqlxColaboradorRepository::boxed(pool.clone());
        let documento_repo = SqlxDocumentoRepository::boxed(pool.clone());

        let usuario_service = Arc::new(UsuarioService::with_session_expiration(
            usuario_repo,
            sesion_repo,
            config.auth.session_expiration_days,
        ));
        let analytics_service = Arc::new(AnalyticsService::new(
            colaborador_repo.clone(),
            catalogo_repo.clone(),
            cache,
        ));
        let colaborador_service = Arc::new(ColaboradorService::new(
            colaborador_repo.clone(),
            catalogo_repo.clone(),
            documento_repo.clone(),
            analytics_service.clone(),
        ));
        let catalogo_service = Arc::new(CatalogoService::new(catalogo_repo));
        let documento_service = Arc::new(DocumentoService::new(
            documento_repo,
            colaborador_repo,
            config.upload.clone(),
        ));

        Ok(Self {
            pool,
            usuario_service,
            colaborador_service,
            catalogo_service,
            documento_service,
            analytics_service,
            views: Arc::new(ViewEngine::new()?),
            upload_config: Arc::new(config.upload.clone()),
            rate_limiter: Arc::new(LoginRateLimiter::from_config(&config.auth)),
            trust_proxy_headers: config.server.trust_proxy_headers,
            secure_cookies: config.server.secure_cookies,
        })
    }

    /// `Set-Cookie` value for a fresh session
    pub fn session_cookie(&self, token: &str) -> String {
        cookie_de_sesion(
            token,
            self.usuario_service.session_expiration_days() * 24 * 60 * 60,
            self.secure_cookies,
        )
    }

    /// `Set-Cookie` value that removes the session cookie
    pub fn clear_session_cookie(&self) -> HeaderValue {
        if self.secure_cookies {
            HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0; Secure")
        } else {
            HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
        }
    }
}

fn cookie_de_sesion(token: &str, max_age: i64, secure: bool) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        SESSION_COOKIE,
        token,
        max_age,
        if secure { "; Secure" } else { "" }
    )
}

/// Authenticated usuario extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Usuario);

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after: u64) -> Self {
        Self::with_details(
            "RATE_LIMIT",
            message,
            serde_json::json!({ "retry_after": retry_after }),
        )
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new("PAYLOAD_TOO_LARGE", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    /// Log the real cause and answer with a generic message
    pub fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {}", err);
        Self::internal_error("Error interno del servidor")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
            "PAYLOAD_TOO_LARGE" => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<UsuarioServiceError> for ApiError {
    fn from(err: UsuarioServiceError) -> Self {
        match err {
            UsuarioServiceError::AuthenticationError(msg) => Self::unauthorized(msg),
            UsuarioServiceError::SessionExpired => Self::unauthorized("La sesión expiró"),
            UsuarioServiceError::SessionNotFound => Self::unauthorized("Sesión inválida"),
            UsuarioServiceError::ValidationError(msg) => Self::validation_error(msg),
            UsuarioServiceError::NotFound(msg) => Self::not_found(msg),
            UsuarioServiceError::Conflict(msg) => Self::conflict(msg),
            UsuarioServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<ColaboradorServiceError> for ApiError {
    fn from(err: ColaboradorServiceError) -> Self {
        match err {
            ColaboradorServiceError::ValidationError(msg) => Self::validation_error(msg),
            ColaboradorServiceError::NotFound(msg) => Self::not_found(msg),
            ColaboradorServiceError::Conflict(msg) => Self::conflict(msg),
            ColaboradorServiceError::Duplicados(ref duplicados) => Self::with_details(
                "CONFLICT",
                err.to_string(),
                serde_json::json!({ "duplicados": duplicados }),
            ),
            ColaboradorServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<CatalogoServiceError> for ApiError {
    fn from(err: CatalogoServiceError) -> Self {
        match err {
            CatalogoServiceError::ValidationError(msg) => Self::validation_error(msg),
            CatalogoServiceError::NotFound(msg) => Self::not_found(msg),
            CatalogoServiceError::Conflict(msg) => Self::conflict(msg),
            CatalogoServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<DocumentoServiceError> for ApiError {
    fn from(err: DocumentoServiceError) -> Self {
        match err {
            DocumentoServiceError::ValidationError(msg) => Self::validation_error(msg),
            DocumentoServiceError::NotFound(msg) => Self::not_found(msg),
            DocumentoServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<AnalyticsServiceError> for ApiError {
    fn from(err: AnalyticsServiceError) -> Self {
        match err {
            AnalyticsServiceError::ValidationError(msg) => Self::validation_error(msg),
            AnalyticsServiceError::NotFound(msg) => Self::not_found(msg),
            AnalyticsServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<ViewError> for ApiError {
    fn from(err: ViewError) -> Self {
        Self::internal(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Self::payload_too_large("El cuerpo de la petición es demasiado grande");
        }
        Self::validation_error(format!("JSON inválido: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation_error(format!("Parámetros inválidos: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::validation_error(format!("Ruta inválida: {}", rejection.body_text()))
    }
}

/// `Json` whose rejection uses the error envelope
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// `Query` whose rejection uses the error envelope
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// `Path` whose rejection uses the error envelope
#[derive(Debug, Clone, Copy)]
pub struct ApiPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    Path<T>: FromRequestParts<S, Rejection = PathRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// Extract session token from the bearer header or the session cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                let cookie = cookie.trim();
                if let Some(token) = cookie.strip_prefix("session=") {
                    if !token.is_empty() {
                        return Some(token.to_string());
                    }
                }
            }
        }
    }

    None
}

// Takes the token by value: the request itself must not be held across the await
async fn usuario_por_token(state: &AppState, token: Option<String>) -> Result<Usuario, ApiError> {
    let token = token.ok_or_else(|| ApiError::unauthorized("Se requiere iniciar sesión"))?;
    Ok(state.usuario_service.validar_sesion(&token).await?)
}

/// Authentication middleware for JSON routes (401 on failure)
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers());
    let usuario = usuario_por_token(&state, token).await?;
    request.extensions_mut().insert(AuthenticatedUser(usuario));
    Ok(next.run(request).await)
}

/// Authentication middleware for HTML pages (redirects to the login page)
pub async fn require_page_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = extract_session_token(request.headers());
    match usuario_por_token(&state, token).await {
        Ok(usuario) => {
            request.extensions_mut().insert(AuthenticatedUser(usuario));
            next.run(request).await
        }
        Err(e) if e.status() == StatusCode::UNAUTHORIZED => {
            Redirect::to("/login?auth_required=1").into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Coordinador or admin authorization middleware
pub async fn require_editor(request: Request, next: Next) -> Result<Response, ApiError> {
    let usuario = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Se requiere iniciar sesión"))?;

    if !usuario.0.puede_editar() {
        return Err(ApiError::forbidden("Tu rol no permite modificar colaboradores"));
    }

    Ok(next.run(request).await)
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let usuario = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Se requiere iniciar sesión"))?;

    if !usuario.0.is_admin() {
        return Err(ApiError::forbidden("Se requieren privilegios de administrador"));
    }

    Ok(next.run(request).await)
}

// Extractor for AuthenticatedUser from request extensions
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Se requiere iniciar sesión"))
    }
}

/// Client address used for rate limiting
///
/// The socket address, unless `server.trust_proxy_headers` is set and the
/// request carries a proxy header.
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub Option<IpAddr>);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let socket = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());
        Ok(ClientIp(ip_cliente(&parts.headers, socket, state.trust_proxy_headers)))
    }
}

fn ip_cliente(headers: &HeaderMap, socket: Option<IpAddr>, trust_proxy_headers: bool) -> Option<IpAddr> {
    if trust_proxy_headers {
        ip_de_headers(headers).or(socket)
    } else {
        socket
    }
}

fn ip_de_headers(headers: &HeaderMap) -> Option<IpAddr> {
    // First hop of X-Forwarded-For, then X-Real-IP
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(ip) = forwarded.split(',').next().and_then(|ip| ip.trim().parse().ok()) {
            return Some(ip);
        }
    }
    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|ip| ip.trim().parse().ok())
}

/// True when the client asked for JSON
pub fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_token_from_cookie_and_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("tema=claro; session=abc123"));
        assert_eq!(extract_session_token(&headers).as_deref(), Some("abc123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(extract_session_token(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn test_empty_session_cookie_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session="));
        assert!(extract_session_token(&headers).is_none());
    }

    #[test]
    fn test_status_from_code() {
        assert_eq!(ApiError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::rate_limited("x", 60).status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::validation_error("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::new("OTRO", "x").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_internal_errors_are_generic() {
        let err: ApiError =
            UsuarioServiceError::InternalError(anyhow::anyhow!("db exploded")).into();
        assert_eq!(err.error.code, "INTERNAL_ERROR");
        assert!(!err.error.message.contains("db exploded"));
    }

    #[test]
    fn test_duplicados_keep_details() {
        use crate::models::{Duplicado, EstadoColaborador};
        let err: ApiError = ColaboradorServiceError::Duplicados(vec![Duplicado {
            id: 4,
            nombre: "Ana López".to_string(),
            rfc: "LOAA900101AB1".to_string(),
            estado: EstadoColaborador::Baja,
            campos: vec!["rfc".to_string()],
        }])
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        let details = err.error.details.unwrap();
        assert_eq!(details["duplicados"][0]["id"], 4);
        assert_eq!(details["duplicados"][0]["campos"][0], "rfc");
    }

    #[test]
    fn test_ip_from_proxy_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.7, 172.16.0.1"));
        assert_eq!(ip_de_headers(&headers), "10.0.0.7".parse().ok());

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.2"));
        assert_eq!(ip_de_headers(&headers), "192.168.1.2".parse().ok());
    }

    #[test]
    fn test_proxy_headers_ignored_unless_trusted() {
        let socket: Option<IpAddr> = "203.0.113.9".parse().ok();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.7"));

        assert_eq!(ip_cliente(&headers, socket, false), socket);
        assert_eq!(ip_cliente(&headers, socket, true), "10.0.0.7".parse().ok());
        assert_eq!(ip_cliente(&HeaderMap::new(), socket, true), socket);
        assert_eq!(ip_cliente(&headers, None, false), None);
    }

    #[test]
    fn test_session_cookie_secure_flag() {
        let plano = cookie_de_sesion("abc", 3600, false);
        assert_eq!(plano, "session=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=3600");

        let seguro = cookie_de_sesion("abc", 3600, true);
        assert!(seguro.ends_with("; Secure"));
        assert!(seguro.contains("HttpOnly"));
    }

    #[test]
    fn test_payload_too_large_status() {
        assert_eq!(
            ApiError::payload_too_large("x").status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn test_wants_json() {
        let mut headers = HeaderMap::new();
        assert!(!wants_json(&headers));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json, text/plain"));
        assert!(wants_json(&headers));
    }
}
