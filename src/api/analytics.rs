//! BI dashboard endpoints
//!
//! Every endpoint takes `year` (default: current year) and most take an
//! optional `month` (1..=12) and `incluir_bajas` (default true).

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use chrono::{Datelike, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::api::colaboradores::numero;
use crate::api::middleware::{ApiError, ApiPath, ApiQuery, AppState};
use crate::models::CatalogoItem;
use crate::services::analytics::{
    DetalleReclutador, FilaMensual, Kpis, ReclutadorComercial, ResumenArea, TotalMensual,
    TotalReclutador,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/kpis", get(kpis))
        .route("/api/contrataciones", get(contrataciones))
        .route("/api/bajas", get(bajas))
        .route("/api/contrataciones/comparativa", get(comparativa))
        .route("/api/contrataciones/reclutador", get(por_reclutador))
        .route(
            "/api/contrataciones/detalle-reclutador/{id}",
            get(detalle_reclutador),
        )
        .route("/api/reclutadores/comercial", get(reclutadores_comercial))
        .route("/api/buscar-reclutador", get(buscar_reclutador))
        .route("/api/areas/resumen", get(por_area))
}

/// Period filter as sent by the dashboard.
///
/// Values stay strings so an empty `month=` from a form means "whole year".
#[derive(Debug, Default, Deserialize)]
pub struct PeriodoQuery {
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub month: Option<String>,
    #[serde(default)]
    pub incluir_bajas: Option<String>,
}

impl PeriodoQuery {
    pub fn year(&self) -> Result<i32, ApiError> {
        Ok(numero("year", self.year.as_deref().unwrap_or(""))?.unwrap_or_else(|| Utc::now().year()))
    }

    pub fn month(&self) -> Result<Option<u32>, ApiError> {
        numero("month", self.month.as_deref().unwrap_or(""))
    }

    pub fn incluir_bajas(&self) -> bool {
        !matches!(
            self.incluir_bajas.as_deref().map(|v| v.trim().to_lowercase()).as_deref(),
            Some("false" | "0" | "no")
        )
    }
}

/// GET /api/kpis
async fn kpis(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<PeriodoQuery>,
) -> Result<Json<Kpis>, ApiError> {
    Ok(Json(state.analytics_service.kpis(q.year()?, q.month()?).await?))
}

/// GET /api/contrataciones
async fn contrataciones(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<PeriodoQuery>,
) -> Result<Json<Vec<FilaMensual>>, ApiError> {
    Ok(Json(
        state
            .analytics_service
            .contrataciones(q.year()?, q.month()?, q.incluir_bajas())
            .await?,
    ))
}

/// GET /api/bajas
async fn bajas(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<PeriodoQuery>,
) -> Result<Json<Vec<FilaMensual>>, ApiError> {
    Ok(Json(state.analytics_service.bajas(q.year()?, q.month()?).await?))
}

/// Years of the comparison: `years[]=2023&years[]=2024`, repeated
/// `years=` keys, or a comma separated `years=2023,2024`
#[derive(Debug, Default)]
pub struct ComparativaQuery {
    pub years: Vec<String>,
}

impl ComparativaQuery {
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        Self {
            years: pairs
                .into_iter()
                .filter(|(key, _)| key == "years" || key == "years[]")
                .map(|(_, value)| value)
                .collect(),
        }
    }

    fn years(&self) -> Result<Vec<i32>, ApiError> {
        self.years
            .iter()
            .flat_map(|value| value.split(','))
            .filter_map(|y| numero::<i32>("years", y).transpose())
            .collect()
    }
}

/// GET /api/contrataciones/comparativa
async fn comparativa(
    State(state): State<AppState>,
    ApiQuery(pairs): ApiQuery<Vec<(String, String)>>,
) -> Result<Json<BTreeMap<String, Vec<TotalMensual>>>, ApiError> {
    let years = ComparativaQuery::from_pairs(pairs).years()?;
    Ok(Json(state.analytics_service.comparativa(&years).await?))
}

/// GET /api/contrataciones/reclutador
async fn por_reclutador(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<PeriodoQuery>,
) -> Result<Json<Vec<TotalReclutador>>, ApiError> {
    Ok(Json(
        state
            .analytics_service
            .por_reclutador(q.year()?, q.month()?, q.incluir_bajas())
            .await?,
    ))
}

/// GET /api/contrataciones/detalle-reclutador/{id}
async fn detalle_reclutador(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiQuery(q): ApiQuery<PeriodoQuery>,
) -> Result<Json<DetalleReclutador>, ApiError> {
    Ok(Json(state.analytics_service.detalle_reclutador(id, q.year()?).await?))
}

/// GET /api/reclutadores/comercial
async fn reclutadores_comercial(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<PeriodoQuery>,
) -> Result<Json<Vec<ReclutadorComercial>>, ApiError> {
    Ok(Json(
        state
            .analytics_service
            .reclutadores_comercial(q.year()?, q.month()?)
            .await?,
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct BuscarQuery {
    #[serde(default)]
    pub nombre: String,
}

/// GET /api/buscar-reclutador
async fn buscar_reclutador(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<BuscarQuery>,
) -> Result<Json<Vec<CatalogoItem>>, ApiError> {
    Ok(Json(state.catalogo_service.buscar_reclutador(&q.nombre).await?))
}

/// GET /api/areas/resumen
async fn por_area(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<PeriodoQuery>,
) -> Result<Json<Vec<ResumenArea>>, ApiError> {
    Ok(Json(state.analytics_service.por_area(q.year()?, q.month()?).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(year: &str, month: &str, incluir: Option<&str>) -> PeriodoQuery {
        PeriodoQuery {
            year: Some(year.to_string()),
            month: Some(month.to_string()),
            incluir_bajas: incluir.map(str::to_string),
        }
    }

    #[test]
    fn test_periodo_query_defaults() {
        let q = PeriodoQuery::default();
        assert_eq!(q.year().unwrap(), Utc::now().year());
        assert_eq!(q.month().unwrap(), None);
        assert!(q.incluir_bajas());
    }

    #[test]
    fn test_periodo_query_parsing() {
        let q = query("2024", "", Some("false"));
        assert_eq!(q.year().unwrap(), 2024);
        assert_eq!(q.month().unwrap(), None);
        assert!(!q.incluir_bajas());

        let q = query("2024", "7", Some("true"));
        assert_eq!(q.month().unwrap(), Some(7));
        assert!(q.incluir_bajas());

        assert!(query("dos mil", "", None).year().is_err());
        assert!(query("2024", "-1", None).month().is_err());
    }

    #[test]
    fn test_comparativa_years() {
        let pares = |pairs: &[(&str, &str)]| {
            ComparativaQuery::from_pairs(
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            )
        };

        let q = pares(&[("years", "2023, 2024,,")]);
        assert_eq!(q.years().unwrap(), vec![2023, 2024]);

        let q = pares(&[("years[]", "2015"), ("otro", "9"), ("years[]", "2016")]);
        assert_eq!(q.years().unwrap(), vec![2015, 2016]);

        let q = pares(&[("years", "2015"), ("years", "2016,2017")]);
        assert_eq!(q.years().unwrap(), vec![2015, 2016, 2017]);

        assert!(ComparativaQuery::default().years().unwrap().is_empty());
        assert!(pares(&[("years", "2023,abc")]).years().is_err());
    }
}
