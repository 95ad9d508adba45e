//! Server-rendered pages
//!
//! - GET      /                          - Alta form
//! - GET      /dashboard                 - Collaborator list
//! - GET      /dashboard-bi              - BI dashboard
//! - GET/POST /baja-colaboradores        - Termination form (coordinador, admin)
//! - GET/POST /cambio-area-colaborador   - Área transfer form (coordinador, admin)

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Form, Router,
};
use serde::{Deserialize, Serialize};
use tera::Context as TeraContext;

use crate::api::analytics::PeriodoQuery;
use crate::api::colaboradores::{fecha, numero};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{ColaboradorResumen, EstadoColaborador, FiltroColaboradores};
use crate::services::analytics::{nombre_mes, MESES};
use crate::services::{BajaInput, CambioAreaInput};
use crate::views::Aviso;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(alta_page))
        .route("/dashboard", get(dashboard))
        .route("/dashboard-bi", get(dashboard_bi))
}

pub fn editor_router() -> Router<AppState> {
    Router::new()
        .route("/baja-colaboradores", get(baja_page).post(baja_form))
        .route(
            "/cambio-area-colaborador",
            get(cambio_area_page).post(cambio_area_form),
        )
}

fn render(
    state: &AppState,
    template: &str,
    usuario: &AuthenticatedUser,
    ctx: TeraContext,
) -> Result<Html<String>, ApiError> {
    Ok(Html(state.views.render(template, Some(&usuario.0), ctx)?))
}

/// GET /
async fn alta_page(
    State(state): State<AppState>,
    usuario: AuthenticatedUser,
) -> Result<Html<String>, ApiError> {
    let mut ctx = TeraContext::new();
    ctx.insert("catalogos", &state.catalogo_service.todos().await?);
    render(&state, "alta.html", &usuario, ctx)
}

/// Dashboard filters as sent by the HTML form (empty values mean "any")
#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    pub buscar: String,
    #[serde(default)]
    pub estado: String,
    #[serde(default)]
    pub area_id: String,
    #[serde(default)]
    pub page: String,
}

impl DashboardQuery {
    fn filtro(&self) -> Result<FiltroColaboradores, ApiError> {
        let estado = match self.estado.trim() {
            "" => None,
            valor => Some(
                valor
                    .parse::<EstadoColaborador>()
                    .map_err(|_| ApiError::validation_error(format!("Estado inválido: {}", valor)))?,
            ),
        };
        Ok(FiltroColaboradores {
            estado,
            area_id: numero("area_id", &self.area_id)?,
            buscar: Some(self.buscar.clone()),
            page: numero("page", &self.page)?,
            per_page: None,
        })
    }

    /// Query string without the page, for pagination links
    fn query_base(&self) -> String {
        format!(
            "buscar={}&estado={}&area_id={}",
            urlencoding::encode(self.buscar.trim()),
            urlencoding::encode(self.estado.trim()),
            urlencoding::encode(self.area_id.trim())
        )
    }
}

/// GET /dashboard
async fn dashboard(
    State(state): State<AppState>,
    usuario: AuthenticatedUser,
    Query(query): Query<DashboardQuery>,
) -> Result<Html<String>, ApiError> {
    let filtro = query.filtro()?;
    let resultado = state.colaborador_service.listar(&filtro).await?;

    let mut ctx = TeraContext::new();
    ctx.insert("total_pages", &resultado.total_pages());
    ctx.insert("resultado", &resultado);
    ctx.insert("areas", &state.catalogo_service.listar_areas().await?);
    ctx.insert("buscar", query.buscar.trim());
    ctx.insert("estado", query.estado.trim());
    ctx.insert("area_id", &filtro.area_id);
    ctx.insert("query_base", &query.query_base());
    render(&state, "dashboard.html", &usuario, ctx)
}

/// Monthly row of the BI page: hires and terminations side by side
#[derive(Debug, Serialize)]
struct FilaDashboard {
    mes: String,
    gestion: i64,
    comercial: i64,
    total: i64,
    bajas: i64,
}

/// GET /dashboard-bi
async fn dashboard_bi(
    State(state): State<AppState>,
    usuario: AuthenticatedUser,
    Query(q): Query<PeriodoQuery>,
) -> Result<Html<String>, ApiError> {
    let year = q.year()?;
    let month = q.month()?;
    let incluir_bajas = q.incluir_bajas();
    let analytics = &state.analytics_service;

    let (kpis, contrataciones, bajas, por_reclutador, por_area) = futures::try_join!(
        analytics.kpis(year, month),
        analytics.contrataciones(year, month, incluir_bajas),
        analytics.bajas(year, month),
        analytics.por_reclutador(year, month, incluir_bajas),
        analytics.por_area(year, month),
    )?;
    let filas: Vec<FilaDashboard> = contrataciones
        .into_iter()
        .zip(bajas)
        .map(|(alta, baja)| FilaDashboard {
            mes: alta.mes,
            gestion: alta.gestion,
            comercial: alta.comercial,
            total: alta.total,
            bajas: baja.total,
        })
        .collect();

    let mut ctx = TeraContext::new();
    ctx.insert("year", &year);
    ctx.insert("month", &month);
    ctx.insert("nombre_mes", month.map(nombre_mes).unwrap_or(""));
    ctx.insert("meses", &MESES);
    ctx.insert("incluir_bajas", &incluir_bajas);
    ctx.insert("kpis", &kpis);
    ctx.insert("contrataciones", &filas);
    ctx.insert("por_reclutador", &por_reclutador);
    ctx.insert("por_area", &por_area);
    render(&state, "dashboard_bi.html", &usuario, ctx)
}

/// Active collaborators for the form dropdowns
async fn activos(state: &AppState) -> Result<Vec<ColaboradorResumen>, ApiError> {
    let filtro = FiltroColaboradores {
        estado: Some(EstadoColaborador::Activo),
        per_page: Some(100),
        ..Default::default()
    };
    Ok(state.colaborador_service.listar(&filtro).await?.items)
}

/// Re-render a form page with a message. Internal errors propagate.
async fn form_page(
    state: &AppState,
    usuario: &AuthenticatedUser,
    template: &str,
    resultado: Result<String, ApiError>,
) -> Result<Response, ApiError> {
    let (status, aviso) = match resultado {
        Ok(mensaje) => (StatusCode::OK, Aviso::exito(mensaje)),
        Err(e) if e.error.code == "INTERNAL_ERROR" => return Err(e),
        Err(e) => (e.status(), Aviso::error(e.error.message)),
    };

    let mut ctx = TeraContext::new();
    ctx.insert("activos", &activos(state).await?);
    if template == "cambio_area.html" {
        ctx.insert("areas", &state.catalogo_service.listar_areas().await?);
    }
    ctx.insert("aviso", &aviso);
    Ok((status, render(state, template, usuario, ctx)?).into_response())
}

/// GET /baja-colaboradores
async fn baja_page(
    State(state): State<AppState>,
    usuario: AuthenticatedUser,
) -> Result<Html<String>, ApiError> {
    let mut ctx = TeraContext::new();
    ctx.insert("activos", &activos(&state).await?);
    render(&state, "baja.html", &usuario, ctx)
}

#[derive(Debug, Deserialize)]
pub struct BajaForm {
    #[serde(default)]
    pub colaborador_id: String,
    #[serde(default)]
    pub fecha_baja: String,
    #[serde(default)]
    pub motivo: String,
}

async fn registrar_baja(
    state: &AppState,
    usuario: &AuthenticatedUser,
    form: BajaForm,
) -> Result<String, ApiError> {
    let id = numero::<i64>("colaborador_id", &form.colaborador_id)?
        .ok_or_else(|| ApiError::validation_error("Selecciona un colaborador"))?;
    let input = BajaInput {
        fecha_baja: fecha("fecha_baja", &form.fecha_baja)?,
        motivo: form.motivo,
    };
    let colaborador = state.colaborador_service.baja(id, input).await?;
    tracing::info!(colaborador_id = id, usuario_id = usuario.0.id, "Baja registered");
    Ok(format!("Baja registrada para {}", colaborador.nombre_completo()))
}

/// POST /baja-colaboradores
async fn baja_form(
    State(state): State<AppState>,
    usuario: AuthenticatedUser,
    Form(form): Form<BajaForm>,
) -> Result<Response, ApiError> {
    let resultado = registrar_baja(&state, &usuario, form).await;
    form_page(&state, &usuario, "baja.html", resultado).await
}

/// GET /cambio-area-colaborador
async fn cambio_area_page(
    State(state): State<AppState>,
    usuario: AuthenticatedUser,
) -> Result<Html<String>, ApiError> {
    let mut ctx = TeraContext::new();
    ctx.insert("activos", &activos(&state).await?);
    ctx.insert("areas", &state.catalogo_service.listar_areas().await?);
    render(&state, "cambio_area.html", &usuario, ctx)
}

#[derive(Debug, Deserialize)]
pub struct CambioAreaForm {
    #[serde(default)]
    pub colaborador_id: String,
    #[serde(default)]
    pub area_id: String,
    #[serde(default)]
    pub puesto_id: String,
    #[serde(default)]
    pub motivo: String,
    #[serde(default)]
    pub fecha_efectiva: String,
}

async fn registrar_cambio_area(
    state: &AppState,
    usuario: &AuthenticatedUser,
    form: CambioAreaForm,
) -> Result<String, ApiError> {
    let id = numero::<i64>("colaborador_id", &form.colaborador_id)?
        .ok_or_else(|| ApiError::validation_error("Selecciona un colaborador"))?;
    let input = CambioAreaInput {
        area_id: numero("area_id", &form.area_id)?
            .ok_or_else(|| ApiError::validation_error("Selecciona el área destino"))?,
        puesto_id: numero("puesto_id", &form.puesto_id)?,
        motivo: Some(form.motivo),
        fecha_efectiva: fecha("fecha_efectiva", &form.fecha_efectiva)?,
    };
    state
        .colaborador_service
        .cambio_area(id, input, Some(usuario.0.id))
        .await?;
    Ok("Cambio de área registrado".to_string())
}

/// POST /cambio-area-colaborador
async fn cambio_area_form(
    State(state): State<AppState>,
    usuario: AuthenticatedUser,
    Form(form): Form<CambioAreaForm>,
) -> Result<Response, ApiError> {
    let resultado = registrar_cambio_area(&state, &usuario, form).await;
    form_page(&state, &usuario, "cambio_area.html", resultado).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_query_empty_means_any() {
        let filtro = DashboardQuery::default().filtro().unwrap();
        assert!(filtro.estado.is_none());
        assert!(filtro.area_id.is_none());
        assert!(filtro.patron_busqueda().is_none());
        assert_eq!(filtro.params().page, 1);
    }

    #[test]
    fn test_dashboard_query_parses_values() {
        let query = DashboardQuery {
            buscar: "López".to_string(),
            estado: "baja".to_string(),
            area_id: "3".to_string(),
            page: "2".to_string(),
        };
        let filtro = query.filtro().unwrap();
        assert_eq!(filtro.estado, Some(EstadoColaborador::Baja));
        assert_eq!(filtro.area_id, Some(3));
        assert_eq!(filtro.params().page, 2);
        assert_eq!(query.query_base(), "buscar=L%C3%B3pez&estado=baja&area_id=3");

        let invalido = DashboardQuery {
            estado: "suspendido".to_string(),
            ..Default::default()
        };
        assert!(invalido.filtro().is_err());
    }
}
