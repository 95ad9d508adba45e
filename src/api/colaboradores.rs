//! Collaborator endpoints
//!
//! - POST /alta-colaborador                       - Multipart alta form
//! - GET  /api/verificar-rfc?rfc=                 - RFC lookup
//! - GET  /api/colaboradores                      - Filtered, paginated list
//! - GET  /api/colaboradores/{id}                 - Detail
//! - GET  /api/colaboradores/{id}/cambios-area    - Transfer history
//! - POST /api/colaboradores/{id}/baja            - Termination
//! - POST /api/colaboradores/{id}/cambio-area     - Área transfer

use axum::{
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::documentos::Adjuntos;
use crate::api::middleware::{
    wants_json, ApiError, ApiJson, ApiPath, ApiQuery, AppState, AuthenticatedUser,
};
use crate::models::{
    AltaColaboradorInput, CambioArea, Colaborador, ColaboradorResumen, Documento,
    FiltroColaboradores, PagedResult,
};
use crate::services::{ArchivoSubido, BajaInput, CambioAreaInput, ColaboradorDetalle, VerificacionRfc};

/// Read-only routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/verificar-rfc", get(verificar_rfc))
        .route("/api/colaboradores", get(listar))
        .route("/api/colaboradores/{id}", get(detalle))
        .route("/api/colaboradores/{id}/cambios-area", get(historial_cambios))
}

/// Routes for coordinador and admin
pub fn editor_router() -> Router<AppState> {
    Router::new()
        .route("/alta-colaborador", post(alta))
        .route("/api/colaboradores/{id}/baja", post(baja))
        .route("/api/colaboradores/{id}/cambio-area", post(cambio_area))
}

/// Response of a successful alta
#[derive(Debug, Serialize)]
pub struct AltaResponse {
    pub colaborador: Colaborador,
    pub documentos: Vec<Documento>,
}

/// Alta form decoded from multipart
#[derive(Debug, Default)]
pub struct AltaForm {
    pub input: AltaColaboradorInput,
    pub permitir_duplicados: bool,
    pub archivos: Vec<ArchivoSubido>,
}

impl AltaForm {
    /// Decode every field of the multipart body
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = AltaForm::default();
        let mut adjuntos = Adjuntos::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::validation_error(format!("Formulario inválido: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();
            if Adjuntos::es_campo(&name) {
                adjuntos.leer(field).await?;
                continue;
            }

            let valor = field
                .text()
                .await
                .map_err(|e| ApiError::validation_error(format!("Campo {} inválido: {}", name, e)))?;
            form.campo(&name, valor)?;
        }

        form.archivos = adjuntos.archivos();
        Ok(form)
    }

    fn campo(&mut self, name: &str, valor: String) -> Result<(), ApiError> {
        let input = &mut self.input;
        match name {
            "nombre" => input.nombre = valor,
            "apellido" => input.apellido = valor,
            "correo" => input.correo = texto(valor),
            "edad" => input.edad = numero(name, &valor)?,
            "estado_civil" => input.estado_civil = texto(valor),
            "domicilio" => input.domicilio = texto(valor),
            "telefono" => input.telefono = texto(valor),
            "rfc" => input.rfc = valor,
            "curp" => input.curp = texto(valor),
            "nss" => input.nss = texto(valor),
            "fecha_alta" => input.fecha_alta = fecha(name, &valor)?,
            "sueldo" => input.sueldo = numero(name, &valor)?,
            "comentarios" => input.comentarios = texto(valor),
            "rol_comercial" => input.rol_comercial = texto(valor),
            "comisionista" => input.comisionista = casilla(&valor),
            "metodo_pago_id" => input.metodo_pago_id = numero(name, &valor)?,
            "banco_id" => input.banco_id = numero(name, &valor)?,
            "banco_string" => input.banco_string = texto(valor),
            "reclutador_id" => input.reclutador_id = numero(name, &valor)?,
            "numero_cuenta" => input.numero_cuenta = texto(valor),
            "numero_comisiones" => input.numero_comisiones = numero(name, &valor)?,
            "tiene_infonavit" => input.tiene_infonavit = casilla(&valor),
            "infonavit_credito" => input.infonavit_credito = texto(valor),
            "tiene_fonacot" => input.tiene_fonacot = casilla(&valor),
            "fonacot_credito" => input.fonacot_credito = texto(valor),
            "area_id" => {
                input.area_id = numero(name, &valor)?
                    .ok_or_else(|| ApiError::validation_error("El área es obligatoria"))?
            }
            "puesto_id" => input.puesto_id = numero(name, &valor)?,
            "puesto_comercial" => input.puesto_comercial = texto(valor),
            "equipo[]" | "recursos[]" => input.recursos.extend(numero::<i64>(name, &valor)?),
            "programas[]" => input.programas.extend(numero::<i64>(name, &valor)?),
            "permitir_duplicados" => self.permitir_duplicados = casilla(&valor),
            _ => tracing::debug!(campo = name, "Ignoring unknown alta field"),
        }
        Ok(())
    }
}

fn texto(valor: String) -> Option<String> {
    let valor = valor.trim();
    (!valor.is_empty()).then(|| valor.to_string())
}

/// Empty means absent; anything else must parse
pub(crate) fn numero<T: std::str::FromStr>(campo: &str, valor: &str) -> Result<Option<T>, ApiError> {
    let valor = valor.trim();
    if valor.is_empty() {
        return Ok(None);
    }
    valor
        .parse()
        .map(Some)
        .map_err(|_| ApiError::validation_error(format!("El campo {} no es un número válido", campo)))
}

/// `YYYY-MM-DD`, empty means absent
pub(crate) fn fecha(campo: &str, valor: &str) -> Result<Option<NaiveDate>, ApiError> {
    let valor = valor.trim();
    if valor.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(valor, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| ApiError::validation_error(format!("El campo {} no es una fecha válida", campo)))
}

fn casilla(valor: &str) -> bool {
    matches!(
        valor.trim().to_lowercase().as_str(),
        "1" | "on" | "true" | "si" | "sí" | "yes"
    )
}

/// POST /alta-colaborador
///
/// Answers JSON when the client accepts it, otherwise redirects to the
/// collaborator list.
async fn alta(
    State(state): State<AppState>,
    usuario: AuthenticatedUser,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = AltaForm::from_multipart(multipart).await?;
    state.documento_service.validar_archivos(&form.archivos)?;

    let colaborador = state
        .colaborador_service
        .alta(form.input, form.permitir_duplicados)
        .await?;

    let documentos = if form.archivos.is_empty() {
        Vec::new()
    } else {
        state
            .documento_service
            .subir(colaborador.id, form.archivos)
            .await?
    };

    tracing::info!(
        colaborador_id = colaborador.id,
        usuario_id = usuario.0.id,
        documentos = documentos.len(),
        "Alta registered"
    );

    if wants_json(&headers) {
        Ok((
            StatusCode::CREATED,
            Json(AltaResponse {
                colaborador,
                documentos,
            }),
        )
            .into_response())
    } else {
        Ok(Redirect::to("/dashboard").into_response())
    }
}

#[derive(Debug, Deserialize)]
pub struct RfcQuery {
    #[serde(default)]
    pub rfc: String,
}

/// GET /api/verificar-rfc
async fn verificar_rfc(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RfcQuery>,
) -> Result<Json<VerificacionRfc>, ApiError> {
    Ok(Json(state.colaborador_service.verificar_rfc(&query.rfc).await?))
}

/// GET /api/colaboradores
async fn listar(
    State(state): State<AppState>,
    ApiQuery(filtro): ApiQuery<FiltroColaboradores>,
) -> Result<Json<PagedResult<ColaboradorResumen>>, ApiError> {
    Ok(Json(state.colaborador_service.listar(&filtro).await?))
}

/// GET /api/colaboradores/{id}
async fn detalle(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ColaboradorDetalle>, ApiError> {
    Ok(Json(state.colaborador_service.detalle(id).await?))
}

/// GET /api/colaboradores/{id}/cambios-area
async fn historial_cambios(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Vec<CambioArea>>, ApiError> {
    Ok(Json(state.colaborador_service.historial_cambios(id).await?))
}

/// POST /api/colaboradores/{id}/baja
async fn baja(
    State(state): State<AppState>,
    usuario: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<BajaInput>,
) -> Result<Json<Colaborador>, ApiError> {
    let colaborador = state.colaborador_service.baja(id, body).await?;
    tracing::info!(colaborador_id = id, usuario_id = usuario.0.id, "Baja registered");
    Ok(Json(colaborador))
}

/// POST /api/colaboradores/{id}/cambio-area
async fn cambio_area(
    State(state): State<AppState>,
    usuario: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<CambioAreaInput>,
) -> Result<(StatusCode, Json<CambioArea>), ApiError> {
    let cambio = state
        .colaborador_service
        .cambio_area(id, body, Some(usuario.0.id))
        .await?;
    Ok((StatusCode::CREATED, Json(cambio)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_campo_parses_typed_values() {
        let mut form = AltaForm::default();
        form.campo("edad", "31".to_string()).unwrap();
        form.campo("sueldo", " 15000.50 ".to_string()).unwrap();
        form.campo("fecha_alta", "2024-03-01".to_string()).unwrap();
        form.campo("equipo[]", "1".to_string()).unwrap();
        form.campo("equipo[]", "3".to_string()).unwrap();
        form.campo("comisionista", "on".to_string()).unwrap();
        form.campo("permitir_duplicados", "1".to_string()).unwrap();
        form.campo("correo", "   ".to_string()).unwrap();

        assert_eq!(form.input.edad, Some(31));
        assert_eq!(form.input.sueldo, Some(15000.50));
        assert_eq!(form.input.fecha_alta, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(form.input.recursos, vec![1, 3]);
        assert!(form.input.comisionista);
        assert!(form.permitir_duplicados);
        assert!(form.input.correo.is_none());
    }

    #[test]
    fn test_campo_rejects_garbage() {
        let mut form = AltaForm::default();
        assert!(form.campo("edad", "treinta".to_string()).is_err());
        assert!(form.campo("fecha_alta", "01/03/2024".to_string()).is_err());
        assert!(form.campo("area_id", "".to_string()).is_err());
    }

    #[test]
    fn test_empty_optional_numbers_are_absent() {
        let mut form = AltaForm::default();
        form.campo("banco_id", "".to_string()).unwrap();
        form.campo("programas[]", "".to_string()).unwrap();
        assert!(form.input.banco_id.is_none());
        assert!(form.input.programas.is_empty());
    }

    #[test]
    fn test_casilla() {
        assert!(casilla("sí"));
        assert!(casilla("TRUE"));
        assert!(!casilla("0"));
        assert!(!casilla(""));
    }
}
