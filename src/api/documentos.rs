//! Document endpoints
//!
//! - GET    /api/colaboradores/{id}/documentos  - List a collaborator's documents
//! - POST   /api/colaboradores/{id}/documentos  - Upload (multipart)
//! - GET    /documento/{id}                     - Download as attachment
//! - DELETE /api/admin/documentos/{id}          - Delete row and file (admin)

use axum::{
    body::Body,
    extract::{multipart::Field, Multipart, State},
    http::{header, StatusCode},
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};

use crate::api::middleware::{ApiError, ApiPath, AppState, AuthenticatedUser};
use crate::models::Documento;
use crate::services::ArchivoSubido;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/colaboradores/{id}/documentos", get(listar))
        .route("/documento/{id}", get(descargar))
}

pub fn editor_router() -> Router<AppState> {
    Router::new().route("/api/colaboradores/{id}/documentos", post(subir))
}

pub fn admin_router() -> Router<AppState> {
    Router::new().route("/api/admin/documentos/{id}", delete(eliminar))
}

/// File fields of a multipart form.
///
/// Files arrive either as `documentos[]` or as `documentos_archivos[]`
/// paired by position with `documentos_nombres[]` labels.
#[derive(Debug, Default)]
pub struct Adjuntos {
    etiquetas: Vec<String>,
    con_etiqueta: Vec<Option<ArchivoSubido>>,
    sueltos: Vec<ArchivoSubido>,
}

impl Adjuntos {
    pub fn es_campo(name: &str) -> bool {
        matches!(
            name,
            "documentos[]" | "documentos_archivos[]" | "documentos_nombres[]"
        )
    }

    pub async fn leer(&mut self, field: Field<'_>) -> Result<(), ApiError> {
        let name = field.name().unwrap_or("").to_string();
        if name == "documentos_nombres[]" {
            let etiqueta = field
                .text()
                .await
                .map_err(|e| ApiError::validation_error(format!("Campo {} inválido: {}", name, e)))?;
            self.etiquetas.push(etiqueta);
            return Ok(());
        }

        let nombre = field.file_name().unwrap_or("").to_string();
        let datos = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("No se pudo leer el archivo: {}", e)))?;
        // Browsers send empty file inputs too
        let archivo = (!nombre.is_empty() || !datos.is_empty()).then(|| ArchivoSubido {
            nombre,
            tipo: None,
            datos: datos.to_vec(),
        });

        if name == "documentos[]" {
            self.sueltos.extend(archivo);
        } else {
            self.con_etiqueta.push(archivo);
        }
        Ok(())
    }

    pub fn archivos(self) -> Vec<ArchivoSubido> {
        let Adjuntos {
            etiquetas,
            con_etiqueta,
            mut sueltos,
        } = self;
        for (i, archivo) in con_etiqueta.into_iter().enumerate() {
            if let Some(mut archivo) = archivo {
                archivo.tipo = etiquetas.get(i).cloned();
                sueltos.push(archivo);
            }
        }
        sueltos
    }
}

/// GET /api/colaboradores/{id}/documentos
async fn listar(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Vec<Documento>>, ApiError> {
    Ok(Json(state.documento_service.listar(id).await?))
}

/// POST /api/colaboradores/{id}/documentos
async fn subir(
    State(state): State<AppState>,
    usuario: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<Documento>>), ApiError> {
    let mut adjuntos = Adjuntos::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Formulario inválido: {}", e)))?
    {
        if Adjuntos::es_campo(field.name().unwrap_or("")) {
            adjuntos.leer(field).await?;
        }
    }

    let archivos = adjuntos.archivos();
    if archivos.is_empty() {
        return Err(ApiError::validation_error("No se recibió ningún archivo"));
    }

    let documentos = state.documento_service.subir(id, archivos).await?;
    tracing::info!(
        colaborador_id = id,
        usuario_id = usuario.0.id,
        documentos = documentos.len(),
        "Documentos uploaded"
    );
    Ok((StatusCode::CREATED, Json(documentos)))
}

/// GET /documento/{id}
async fn descargar(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Response, ApiError> {
    let (documento, datos) = state.documento_service.descargar(id).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type(&documento.nombre_archivo))
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", documento.nombre_archivo),
        )
        .header(header::CONTENT_LENGTH, datos.len())
        .body(Body::from(datos))
        .map_err(ApiError::internal)
}

/// DELETE /api/admin/documentos/{id}
async fn eliminar(
    State(state): State<AppState>,
    usuario: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let documento = state.documento_service.eliminar(id).await?;
    tracing::info!(
        documento_id = id,
        colaborador_id = documento.colaborador_id,
        usuario_id = usuario.0.id,
        "Documento deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

fn content_type(nombre: &str) -> &'static str {
    match nombre.rsplit('.').next().unwrap_or("").to_lowercase().as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}
