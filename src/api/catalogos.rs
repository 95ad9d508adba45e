//! Catalog endpoints
//!
//! - GET  /puestos/{area_id}                 - Puestos of an área
//! - GET  /api/catalogos                     - Every catalog the alta form needs
//! - GET  /api/ti/recursos                   - TI resource catalog
//! - GET  /api/ti/equipos                    - TI resources assigned to collaborators
//! - POST /api/admin/areas                   - Create área (admin)
//! - POST /api/admin/areas/{id}/puestos      - Create puesto (admin)
//! - POST /api/admin/catalogos/{catalogo}    - Add a catalog entry (admin)

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, ApiJson, ApiPath, AppState};
use crate::models::{Area, AsignacionRecurso, Catalogo, CatalogoItem, Puesto};
use crate::services::Catalogos;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/puestos/{area_id}", get(puestos_por_area))
        .route("/api/catalogos", get(todos))
        .route("/api/ti/recursos", get(recursos_ti))
        .route("/api/ti/equipos", get(equipos_asignados))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/areas", post(crear_area))
        .route("/api/admin/areas/{id}/puestos", post(crear_puesto))
        .route("/api/admin/catalogos/{catalogo}", post(crear_item))
}

/// Body for every catalog creation endpoint
#[derive(Debug, Deserialize)]
pub struct NombreRequest {
    #[serde(default)]
    pub nombre: String,
}

/// GET /puestos/{area_id}
async fn puestos_por_area(
    State(state): State<AppState>,
    ApiPath(area_id): ApiPath<i64>,
) -> Result<Json<Vec<Puesto>>, ApiError> {
    Ok(Json(state.catalogo_service.puestos_por_area(area_id).await?))
}

/// GET /api/catalogos
async fn todos(State(state): State<AppState>) -> Result<Json<Catalogos>, ApiError> {
    Ok(Json(state.catalogo_service.todos().await?))
}

/// GET /api/ti/recursos
async fn recursos_ti(State(state): State<AppState>) -> Result<Json<Vec<CatalogoItem>>, ApiError> {
    Ok(Json(state.catalogo_service.listar(Catalogo::RecursosTi).await?))
}

/// GET /api/ti/equipos
async fn equipos_asignados(
    State(state): State<AppState>,
) -> Result<Json<Vec<AsignacionRecurso>>, ApiError> {
    Ok(Json(state.colaborador_service.asignaciones_ti().await?))
}

/// POST /api/admin/areas
async fn crear_area(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NombreRequest>,
) -> Result<(StatusCode, Json<Area>), ApiError> {
    let area = state.catalogo_service.crear_area(&body.nombre).await?;
    Ok((StatusCode::CREATED, Json(area)))
}

/// POST /api/admin/areas/{id}/puestos
async fn crear_puesto(
    State(state): State<AppState>,
    ApiPath(area_id): ApiPath<i64>,
    ApiJson(body): ApiJson<NombreRequest>,
) -> Result<(StatusCode, Json<Puesto>), ApiError> {
    let puesto = state.catalogo_service.crear_puesto(area_id, &body.nombre).await?;
    Ok((StatusCode::CREATED, Json(puesto)))
}

/// POST /api/admin/catalogos/{catalogo}
async fn crear_item(
    State(state): State<AppState>,
    ApiPath(catalogo): ApiPath<String>,
    ApiJson(body): ApiJson<NombreRequest>,
) -> Result<(StatusCode, Json<CatalogoItem>), ApiError> {
    let catalogo: Catalogo = catalogo
        .parse()
        .map_err(|_| ApiError::not_found(format!("Catálogo {}", catalogo)))?;
    let item = state.catalogo_service.crear_item(catalogo, &body.nombre).await?;
    Ok((StatusCode::CREATED, Json(item)))
}
