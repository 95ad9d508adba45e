//! Admin API endpoints for usuario management
//!
//! - GET  /api/admin/usuarios                   - List usuarios
//! - POST /api/admin/usuarios                   - Create usuario
//! - POST /api/admin/usuarios/{id}/password     - Reset password
//! - POST /api/admin/usuarios/{id}/desactivar   - Deactivate and close sessions

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, ApiJson, ApiPath, AppState, AuthenticatedUser};
use crate::models::{NuevoUsuario, Usuario};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/usuarios", get(listar).post(crear))
        .route("/api/admin/usuarios/{id}/password", post(restablecer_password))
        .route("/api/admin/usuarios/{id}/desactivar", post(desactivar))
}

#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct DesactivarResponse {
    pub usuario_id: i64,
    pub sesiones_cerradas: u64,
}

/// GET /api/admin/usuarios
async fn listar(State(state): State<AppState>) -> Result<Json<Vec<Usuario>>, ApiError> {
    Ok(Json(state.usuario_service.listar().await?))
}

/// POST /api/admin/usuarios
async fn crear(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    ApiJson(body): ApiJson<NuevoUsuario>,
) -> Result<(StatusCode, Json<Usuario>), ApiError> {
    let usuario = state.usuario_service.crear_usuario(body).await?;
    tracing::info!(usuario_id = usuario.id, admin_id = admin.0.id, "Usuario created by admin");
    Ok((StatusCode::CREATED, Json(usuario)))
}

/// POST /api/admin/usuarios/{id}/password
async fn restablecer_password(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<PasswordRequest>,
) -> Result<Json<Usuario>, ApiError> {
    Ok(Json(
        state
            .usuario_service
            .restablecer_password(id, &body.password)
            .await?,
    ))
}

/// POST /api/admin/usuarios/{id}/desactivar
async fn desactivar(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<DesactivarResponse>, ApiError> {
    if admin.0.id == id {
        return Err(ApiError::validation_error("No puedes desactivar tu propia cuenta"));
    }
    let sesiones_cerradas = state.usuario_service.desactivar(id).await?;
    Ok(Json(DesactivarResponse {
        usuario_id: id,
        sesiones_cerradas,
    }))
}
