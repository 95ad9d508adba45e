//! Hiring analytics for the BI dashboard
//!
//! Aggregations are pure functions over [`Movimiento`] rows so they can be
//! tested without a database. [`AnalyticsService`] loads the rows for a
//! period, aggregates and caches the result under `analytics:*`.
//!
//! Hires are keyed by `fecha_alta`, terminations by `fecha_baja`. A
//! collaborator hired in March and terminated in May counts as a March hire
//! and a May baja.

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::{CatalogoRepository, ColaboradorRepository};
use crate::models::{Area, Catalogo, EstadoColaborador, Movimiento, Segmento};
use anyhow::Context;
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Spanish month names, January first
pub const MESES: [&str; 12] = [
    "Enero",
    "Febrero",
    "Marzo",
    "Abril",
    "Mayo",
    "Junio",
    "Julio",
    "Agosto",
    "Septiembre",
    "Octubre",
    "Noviembre",
    "Diciembre",
];

pub const YEAR_MIN: i32 = 2000;
pub const YEAR_MAX: i32 = 2100;

/// Most years a comparison may request
pub const MAX_COMPARATIVA_YEARS: usize = 10;

/// Label for hires without a recruiter
pub const SIN_ASIGNAR: &str = "Sin asignar";

/// Prefix shared by every analytics cache key
pub const CACHE_PREFIX: &str = "analytics:";

#[derive(Debug, thiserror::Error)]
pub enum AnalyticsServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Name of a month (1-based); empty for out-of-range values
pub fn nombre_mes(mes: u32) -> &'static str {
    mes.checked_sub(1)
        .and_then(|i| MESES.get(i as usize))
        .copied()
        .unwrap_or("")
}

/// A year, or one month of it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Periodo {
    pub year: i32,
    pub month: Option<u32>,
    desde: NaiveDate,
    hasta: NaiveDate,
}

impl Periodo {
    pub fn new(year: i32, month: Option<u32>) -> Result<Self, AnalyticsServiceError> {
        if !(YEAR_MIN..=YEAR_MAX).contains(&year) {
            return Err(AnalyticsServiceError::ValidationError(format!(
                "El año debe estar entre {} y {}",
                YEAR_MIN, YEAR_MAX
            )));
        }

        let (desde, hasta) = match month {
            None => (fecha(year, 1, 1)?, fecha(year, 12, 31)?),
            Some(m) if (1..=12).contains(&m) => {
                let siguiente = if m == 12 {
                    fecha(year + 1, 1, 1)?
                } else {
                    fecha(year, m + 1, 1)?
                };
                let ultimo = siguiente.pred_opt().ok_or_else(|| {
                    AnalyticsServiceError::ValidationError("Fecha fuera de rango".to_string())
                })?;
                (fecha(year, m, 1)?, ultimo)
            }
            Some(_) => {
                return Err(AnalyticsServiceError::ValidationError(
                    "El mes debe estar entre 1 y 12".to_string(),
                ))
            }
        };

        Ok(Self {
            year,
            month,
            desde,
            hasta,
        })
    }

    /// Whole year
    pub fn anual(year: i32) -> Result<Self, AnalyticsServiceError> {
        Self::new(year, None)
    }

    pub fn desde(&self) -> NaiveDate {
        self.desde
    }

    pub fn hasta(&self) -> NaiveDate {
        self.hasta
    }

    pub fn contiene(&self, fecha: NaiveDate) -> bool {
        fecha >= self.desde && fecha <= self.hasta
    }

    /// Month numbers covered, in order
    pub fn meses(&self) -> Vec<u32> {
        match self.month {
            Some(m) => vec![m],
            None => (1..=12).collect(),
        }
    }

    /// `2024:all` or `2024:3`
    fn clave(&self) -> String {
        match self.month {
            Some(m) => format!("{}:{}", self.year, m),
            None => format!("{}:all", self.year),
        }
    }
}

fn fecha(year: i32, month: u32, day: u32) -> Result<NaiveDate, AnalyticsServiceError> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| AnalyticsServiceError::ValidationError("Fecha fuera de rango".to_string()))
}

// ============================================================================
// Result rows
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub total: i64,
    pub gestion: i64,
    pub comercial: i64,
    pub bajas_gestion: i64,
    pub bajas_comercial: i64,
    pub activos: i64,
    /// activos / total × 100, one decimal
    pub retencion: f64,
}

/// Monthly count split by segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilaMensual {
    pub mes_num: u32,
    pub mes: String,
    pub gestion: i64,
    pub comercial: i64,
    pub total: i64,
}

impl FilaMensual {
    fn vacia(mes_num: u32) -> Self {
        Self {
            mes_num,
            mes: nombre_mes(mes_num).to_string(),
            gestion: 0,
            comercial: 0,
            total: 0,
        }
    }

    fn sumar(&mut self, segmento: Segmento) {
        match segmento {
            Segmento::Gestion => self.gestion += 1,
            Segmento::Comercial => self.comercial += 1,
        }
        self.total += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalMensual {
    pub mes_num: u32,
    pub mes: String,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalReclutador {
    /// `None` groups hires without a recruiter
    pub id: Option<i64>,
    pub reclutador: String,
    pub total_anual: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetalleReclutador {
    pub id: i64,
    pub reclutador: String,
    pub total_anual: i64,
    pub contratos: Vec<TotalMensual>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReclutadorComercial {
    pub id: Option<i64>,
    pub nombre: String,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumenArea {
    pub area_id: i64,
    pub area: String,
    pub contrataciones: i64,
    pub bajas: i64,
    pub activos: i64,
}

// ============================================================================
// Aggregations
// ============================================================================

fn contratado_en(m: &Movimiento, periodo: &Periodo) -> bool {
    periodo.contiene(m.fecha_alta)
}

fn baja_en(m: &Movimiento, periodo: &Periodo) -> bool {
    m.fecha_baja.is_some_and(|f| periodo.contiene(f))
}

fn activo(m: &Movimiento) -> bool {
    m.estado == EstadoColaborador::Activo
}

pub fn kpis(movimientos: &[Movimiento], periodo: &Periodo) -> Kpis {
    let mut k = Kpis {
        total: 0,
        gestion: 0,
        comercial: 0,
        bajas_gestion: 0,
        bajas_comercial: 0,
        activos: 0,
        retencion: 0.0,
    };

    for m in movimientos {
        if contratado_en(m, periodo) {
            k.total += 1;
            match m.segmento {
                Segmento::Gestion => k.gestion += 1,
                Segmento::Comercial => k.comercial += 1,
            }
            if activo(m) {
                k.activos += 1;
            }
        }
        if baja_en(m, periodo) {
            match m.segmento {
                Segmento::Gestion => k.bajas_gestion += 1,
                Segmento::Comercial => k.bajas_comercial += 1,
            }
        }
    }

    k.retencion = retencion(k.activos, k.total);
    k
}

/// Percentage rounded to one decimal; zero when there is nothing to retain
pub fn retencion(activos: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    (activos as f64 / total as f64 * 1000.0).round() / 10.0
}

/// Hires per month. With `incluir_bajas = false` collaborators now in baja are left out.
pub fn contrataciones(
    movimientos: &[Movimiento],
    periodo: &Periodo,
    incluir_bajas: bool,
) -> Vec<FilaMensual> {
    por_mes(
        movimientos
            .iter()
            .filter(|m| contratado_en(m, periodo) && (incluir_bajas || activo(m)))
            .map(|m| (m.fecha_alta, m.segmento)),
        periodo,
    )
}

/// Terminations per month, keyed by fecha_baja
pub fn bajas(movimientos: &[Movimiento], periodo: &Periodo) -> Vec<FilaMensual> {
    por_mes(
        movimientos.iter().filter_map(|m| {
            m.fecha_baja
                .filter(|f| periodo.contiene(*f))
                .map(|f| (f, m.segmento))
        }),
        periodo,
    )
}

fn por_mes(
    fechas: impl Iterator<Item = (NaiveDate, Segmento)>,
    periodo: &Periodo,
) -> Vec<FilaMensual> {
    let mut filas: Vec<FilaMensual> = periodo.meses().into_iter().map(FilaMensual::vacia).collect();
    for (fecha, segmento) in fechas {
        if let Some(fila) = filas.iter_mut().find(|f| f.mes_num == fecha.month()) {
            fila.sumar(segmento);
        }
    }
    filas
}

/// Twelve monthly hire totals for one year
fn totales_mensuales<'a>(movimientos: impl Iterator<Item = &'a Movimiento>, year: i32) -> Vec<TotalMensual> {
    let mut totales = [0i64; 12];
    for m in movimientos {
        if m.fecha_alta.year() == year {
            totales[m.fecha_alta.month0() as usize] += 1;
        }
    }
    totales
        .iter()
        .enumerate()
        .map(|(i, total)| TotalMensual {
            mes_num: i as u32 + 1,
            mes: MESES[i].to_string(),
            total: *total,
        })
        .collect()
}

/// Normalize the years of a comparison.
///
/// Out-of-range years are dropped and duplicates removed; an empty request
/// means the current year and the two before it.
pub fn years_comparativa(years: &[i32], actual: i32) -> Result<Vec<i32>, AnalyticsServiceError> {
    if years.is_empty() {
        return Ok(vec![actual - 2, actual - 1, actual]);
    }

    let mut validos: Vec<i32> = years
        .iter()
        .copied()
        .filter(|y| (YEAR_MIN..=YEAR_MAX).contains(y))
        .collect();
    validos.sort_unstable();
    validos.dedup();

    if validos.len() > MAX_COMPARATIVA_YEARS {
        return Err(AnalyticsServiceError::ValidationError(format!(
            "Se permiten como máximo {} años en la comparativa",
            MAX_COMPARATIVA_YEARS
        )));
    }
    Ok(validos)
}

/// Monthly hire totals per year, keyed by the year as a string
pub fn comparativa(movimientos: &[Movimiento], years: &[i32]) -> BTreeMap<String, Vec<TotalMensual>> {
    years
        .iter()
        .map(|year| (year.to_string(), totales_mensuales(movimientos.iter(), *year)))
        .collect()
}

/// Group hires by recruiter, largest first, ties by name
fn agrupar_reclutador<'a>(
    movimientos: impl Iterator<Item = &'a Movimiento>,
) -> Vec<(Option<i64>, String, i64)> {
    let mut grupos: HashMap<Option<i64>, (String, i64)> = HashMap::new();
    for m in movimientos {
        let nombre = match (m.reclutador_id, m.reclutador.as_deref()) {
            (Some(_), Some(nombre)) => nombre.to_string(),
            (Some(id), None) => format!("Reclutador {}", id),
            (None, _) => SIN_ASIGNAR.to_string(),
        };
        grupos.entry(m.reclutador_id).or_insert((nombre, 0)).1 += 1;
    }

    let mut filas: Vec<(Option<i64>, String, i64)> = grupos
        .into_iter()
        .map(|(id, (nombre, total))| (id, nombre, total))
        .collect();
    filas.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.1.cmp(&b.1)));
    filas
}

pub fn por_reclutador(
    movimientos: &[Movimiento],
    periodo: &Periodo,
    incluir_bajas: bool,
) -> Vec<TotalReclutador> {
    agrupar_reclutador(
        movimientos
            .iter()
            .filter(|m| contratado_en(m, periodo) && (incluir_bajas || activo(m))),
    )
    .into_iter()
    .map(|(id, reclutador, total_anual)| TotalReclutador {
        id,
        reclutador,
        total_anual,
    })
    .collect()
}

pub fn detalle_reclutador(
    movimientos: &[Movimiento],
    id: i64,
    nombre: &str,
    year: i32,
) -> DetalleReclutador {
    let contratos = totales_mensuales(
        movimientos.iter().filter(|m| m.reclutador_id == Some(id)),
        year,
    );
    DetalleReclutador {
        id,
        reclutador: nombre.to_string(),
        total_anual: contratos.iter().map(|c| c.total).sum(),
        contratos,
    }
}

/// Commercial-segment hires per recruiter
pub fn reclutadores_comercial(movimientos: &[Movimiento], periodo: &Periodo) -> Vec<ReclutadorComercial> {
    agrupar_reclutador(
        movimientos
            .iter()
            .filter(|m| m.segmento == Segmento::Comercial && contratado_en(m, periodo)),
    )
    .into_iter()
    .map(|(id, nombre, total)| ReclutadorComercial { id, nombre, total })
    .collect()
}

/// One row per área, in catalog order, including áreas without movement
pub fn por_area(movimientos: &[Movimiento], periodo: &Periodo, areas: &[Area]) -> Vec<ResumenArea> {
    areas
        .iter()
        .map(|area| {
            let mut fila = ResumenArea {
                area_id: area.id,
                area: area.nombre.clone(),
                contrataciones: 0,
                bajas: 0,
                activos: 0,
            };
            for m in movimientos.iter().filter(|m| m.area_id == area.id) {
                if contratado_en(m, periodo) {
                    fila.contrataciones += 1;
                    if activo(m) {
                        fila.activos += 1;
                    }
                }
                if baja_en(m, periodo) {
                    fila.bajas += 1;
                }
            }
            fila
        })
        .collect()
}

// ============================================================================
// Service
// ============================================================================

/// Cached dashboard aggregates
pub struct AnalyticsService {
    colaboradores: Arc<dyn ColaboradorRepository>,
    catalogos: Arc<dyn CatalogoRepository>,
    cache: Arc<MemoryCache>,
    /// Bumped by every invalidation; results computed under an older
    /// generation are not cached
    generacion: AtomicU64,
}

impl AnalyticsService {
    pub fn new(
        colaboradores: Arc<dyn ColaboradorRepository>,
        catalogos: Arc<dyn CatalogoRepository>,
        cache: Arc<MemoryCache>,
    ) -> Self {
        Self {
            colaboradores,
            catalogos,
            cache,
            generacion: AtomicU64::new(0),
        }
    }

    pub async fn kpis(&self, year: i32, month: Option<u32>) -> Result<Kpis, AnalyticsServiceError> {
        let periodo = Periodo::new(year, month)?;
        let key = format!("{}kpis:{}", CACHE_PREFIX, periodo.clave());
        if let Some(cached) = self.cache.get::<Kpis>(&key).await.ok().flatten() {
            return Ok(cached);
        }

        let generacion = self.generacion();
        let movimientos = self.movimientos(periodo.desde(), periodo.hasta()).await?;
        let result = kpis(&movimientos, &periodo);
        self.guardar(&key, generacion, &result).await;
        Ok(result)
    }

    pub async fn contrataciones(
        &self,
        year: i32,
        month: Option<u32>,
        incluir_bajas: bool,
    ) -> Result<Vec<FilaMensual>, AnalyticsServiceError> {
        let periodo = Periodo::new(year, month)?;
        let key = format!(
            "{}contrataciones:{}:{}",
            CACHE_PREFIX,
            periodo.clave(),
            incluir_bajas
        );
        if let Some(cached) = self.cache.get::<Vec<FilaMensual>>(&key).await.ok().flatten() {
            return Ok(cached);
        }

        let generacion = self.generacion();
        let movimientos = self.movimientos(periodo.desde(), periodo.hasta()).await?;
        let result = contrataciones(&movimientos, &periodo, incluir_bajas);
        self.guardar(&key, generacion, &result).await;
        Ok(result)
    }

    pub async fn bajas(&self, year: i32, month: Option<u32>) -> Result<Vec<FilaMensual>, AnalyticsServiceError> {
        let periodo = Periodo::new(year, month)?;
        let key = format!("{}bajas:{}", CACHE_PREFIX, periodo.clave());
        if let Some(cached) = self.cache.get::<Vec<FilaMensual>>(&key).await.ok().flatten() {
            return Ok(cached);
        }

        let generacion = self.generacion();
        let movimientos = self.movimientos(periodo.desde(), periodo.hasta()).await?;
        let result = bajas(&movimientos, &periodo);
        self.guardar(&key, generacion, &result).await;
        Ok(result)
    }

    pub async fn comparativa(
        &self,
        years: &[i32],
    ) -> Result<BTreeMap<String, Vec<TotalMensual>>, AnalyticsServiceError> {
        let years = years_comparativa(years, Utc::now().year())?;
        let (Some(primero), Some(ultimo)) = (years.first(), years.last()) else {
            return Ok(BTreeMap::new());
        };

        let key = format!(
            "{}comparativa:{}",
            CACHE_PREFIX,
            years.iter().map(|y| y.to_string()).collect::<Vec<_>>().join(",")
        );
        if let Some(cached) = self
            .cache
            .get::<BTreeMap<String, Vec<TotalMensual>>>(&key)
            .await
            .ok()
            .flatten()
        {
            return Ok(cached);
        }

        let desde = Periodo::anual(*primero)?.desde();
        let hasta = Periodo::anual(*ultimo)?.hasta();
        let generacion = self.generacion();
        let movimientos = self.movimientos(desde, hasta).await?;
        let result = comparativa(&movimientos, &years);
        self.guardar(&key, generacion, &result).await;
        Ok(result)
    }

    pub async fn por_reclutador(
        &self,
        year: i32,
        month: Option<u32>,
        incluir_bajas: bool,
    ) -> Result<Vec<TotalReclutador>, AnalyticsServiceError> {
        let periodo = Periodo::new(year, month)?;
        let key = format!(
            "{}reclutador:{}:{}",
            CACHE_PREFIX,
            periodo.clave(),
            incluir_bajas
        );
        if let Some(cached) = self.cache.get::<Vec<TotalReclutador>>(&key).await.ok().flatten() {
            return Ok(cached);
        }

        let generacion = self.generacion();
        let movimientos = self.movimientos(periodo.desde(), periodo.hasta()).await?;
        let result = por_reclutador(&movimientos, &periodo, incluir_bajas);
        self.guardar(&key, generacion, &result).await;
        Ok(result)
    }

    pub async fn detalle_reclutador(
        &self,
        id: i64,
        year: i32,
    ) -> Result<DetalleReclutador, AnalyticsServiceError> {
        let periodo = Periodo::anual(year)?;
        let reclutador = self
            .catalogos
            .get_item(Catalogo::Reclutadores, id)
            .await
            .context("Failed to get reclutador")?
            .ok_or_else(|| AnalyticsServiceError::NotFound(format!("Reclutador {}", id)))?;

        let key = format!("{}detalle-reclutador:{}:{}", CACHE_PREFIX, id, year);
        if let Some(cached) = self.cache.get::<DetalleReclutador>(&key).await.ok().flatten() {
            return Ok(cached);
        }

        let generacion = self.generacion();
        let movimientos = self.movimientos(periodo.desde(), periodo.hasta()).await?;
        let result = detalle_reclutador(&movimientos, id, &reclutador.nombre, year);
        self.guardar(&key, generacion, &result).await;
        Ok(result)
    }

    pub async fn reclutadores_comercial(
        &self,
        year: i32,
        month: Option<u32>,
    ) -> Result<Vec<ReclutadorComercial>, AnalyticsServiceError> {
        let periodo = Periodo::new(year, month)?;
        let key = format!("{}reclutadores-comercial:{}", CACHE_PREFIX, periodo.clave());
        if let Some(cached) = self.cache.get::<Vec<ReclutadorComercial>>(&key).await.ok().flatten() {
            return Ok(cached);
        }

        let generacion = self.generacion();
        let movimientos = self.movimientos(periodo.desde(), periodo.hasta()).await?;
        let result = reclutadores_comercial(&movimientos, &periodo);
        self.guardar(&key, generacion, &result).await;
        Ok(result)
    }

    pub async fn por_area(&self, year: i32, month: Option<u32>) -> Result<Vec<ResumenArea>, AnalyticsServiceError> {
        let periodo = Periodo::new(year, month)?;
        let key = format!("{}areas:{}", CACHE_PREFIX, periodo.clave());
        if let Some(cached) = self.cache.get::<Vec<ResumenArea>>(&key).await.ok().flatten() {
            return Ok(cached);
        }

        let generacion = self.generacion();
        let areas = self.catalogos.list_areas().await.context("Failed to list areas")?;
        let movimientos = self.movimientos(periodo.desde(), periodo.hasta()).await?;
        let result = por_area(&movimientos, &periodo, &areas);
        self.guardar(&key, generacion, &result).await;
        Ok(result)
    }

    /// Drop every cached aggregate. Called after alta, baja and cambio de área.
    pub async fn invalidar(&self) {
        self.generacion.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.cache.delete_pattern(&format!("{}*", CACHE_PREFIX)).await {
            tracing::warn!("Failed to invalidate analytics cache: {}", e);
        }
    }

    fn generacion(&self) -> u64 {
        self.generacion.load(Ordering::SeqCst)
    }

    /// Cache `value` unless an invalidation ran since `generacion` was read
    async fn guardar<T: Serialize + Send + Sync>(&self, key: &str, generacion: u64, value: &T) {
        if self.generacion() != generacion {
            return;
        }
        if let Err(e) = self.cache.set_default(key, value).await {
            tracing::warn!("Failed to cache {}: {}", key, e);
            return;
        }
        // An invalidation may have slipped in between the check and the write
        if self.generacion() != generacion {
            let _ = self.cache.delete(key).await;
        }
    }

    async fn movimientos(
        &self,
        desde: NaiveDate,
        hasta: NaiveDate,
    ) -> Result<Vec<Movimiento>, AnalyticsServiceError> {
        Ok(self
            .colaboradores
            .list_movimientos(desde, hasta)
            .await
            .context("Failed to load movimientos")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fecha(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date")
    }

    fn mov(
        id: i64,
        alta: &str,
        baja: Option<&str>,
        segmento: Segmento,
        reclutador: Option<(i64, &str)>,
    ) -> Movimiento {
        let area_id = match segmento {
            Segmento::Comercial => 2,
            Segmento::Gestion => 3,
        };
        Movimiento {
            colaborador_id: id,
            fecha_alta: fecha(alta),
            fecha_baja: baja.map(fecha),
            estado: if baja.is_some() {
                EstadoColaborador::Baja
            } else {
                EstadoColaborador::Activo
            },
            area_id,
            area: if area_id == 2 { "Comercial" } else { "TI" }.to_string(),
            segmento,
            reclutador_id: reclutador.map(|r| r.0),
            reclutador: reclutador.map(|r| r.1.to_string()),
        }
    }

    fn muestra() -> Vec<Movimiento> {
        vec![
            mov(1, "2024-01-10", None, Segmento::Gestion, Some((1, "Laura"))),
            mov(2, "2024-01-20", Some("2024-03-05"), Segmento::Comercial, Some((1, "Laura"))),
            mov(3, "2024-03-01", None, Segmento::Comercial, Some((2, "Beto"))),
            mov(4, "2024-03-15", None, Segmento::Comercial, None),
            mov(5, "2023-11-02", Some("2024-01-31"), Segmento::Gestion, Some((2, "Beto"))),
            mov(6, "2023-06-01", None, Segmento::Gestion, None),
        ]
    }

    #[test]
    fn test_periodo_validation() {
        assert!(Periodo::new(1999, None).is_err());
        assert!(Periodo::new(2101, None).is_err());
        assert!(Periodo::new(2024, Some(0)).is_err());
        assert!(Periodo::new(2024, Some(13)).is_err());

        let feb = Periodo::new(2024, Some(2)).unwrap();
        assert_eq!(feb.desde(), fecha("2024-02-01"));
        assert_eq!(feb.hasta(), fecha("2024-02-29"));

        let dic = Periodo::new(2024, Some(12)).unwrap();
        assert_eq!(dic.hasta(), fecha("2024-12-31"));
        assert_eq!(dic.meses(), vec![12]);
    }

    #[test]
    fn test_kpis_year() {
        let periodo = Periodo::anual(2024).unwrap();
        let k = kpis(&muestra(), &periodo);

        assert_eq!(k.total, 4);
        assert_eq!(k.gestion, 1);
        assert_eq!(k.comercial, 3);
        assert_eq!(k.bajas_gestion, 1);
        assert_eq!(k.bajas_comercial, 1);
        assert_eq!(k.activos, 3);
        assert_eq!(k.retencion, 75.0);
    }

    #[test]
    fn test_kpis_month_and_empty() {
        let marzo = Periodo::new(2024, Some(3)).unwrap();
        let k = kpis(&muestra(), &marzo);
        assert_eq!(k.total, 2);
        assert_eq!(k.bajas_comercial, 1);
        assert_eq!(k.retencion, 100.0);

        let vacio = kpis(&[], &marzo);
        assert_eq!(vacio.total, 0);
        assert_eq!(vacio.retencion, 0.0);
    }

    #[test]
    fn test_retencion_rounding() {
        assert_eq!(retencion(2, 3), 66.7);
        assert_eq!(retencion(1, 3), 33.3);
        assert_eq!(retencion(0, 0), 0.0);
    }

    #[test]
    fn test_contrataciones_incluir_bajas() {
        let periodo = Periodo::anual(2024).unwrap();
        let con = contrataciones(&muestra(), &periodo, true);
        assert_eq!(con.len(), 12);
        assert_eq!(con[0].mes, "Enero");
        assert_eq!(con[0].total, 2);
        assert_eq!(con[0].gestion, 1);
        assert_eq!(con[0].comercial, 1);
        assert_eq!(con[2].total, 2);

        let sin = contrataciones(&muestra(), &periodo, false);
        assert_eq!(sin[0].total, 1);
        assert_eq!(sin[0].comercial, 0);
    }

    #[test]
    fn test_contrataciones_single_month() {
        let periodo = Periodo::new(2024, Some(3)).unwrap();
        let filas = contrataciones(&muestra(), &periodo, true);
        assert_eq!(filas.len(), 1);
        assert_eq!(filas[0].mes_num, 3);
        assert_eq!(filas[0].mes, "Marzo");
        assert_eq!(filas[0].comercial, 2);
    }

    #[test]
    fn test_bajas_keyed_by_fecha_baja() {
        let periodo = Periodo::anual(2024).unwrap();
        let filas = bajas(&muestra(), &periodo);
        assert_eq!(filas[0].gestion, 1);
        assert_eq!(filas[2].comercial, 1);
        assert_eq!(filas.iter().map(|f| f.total).sum::<i64>(), 2);
    }

    #[test]
    fn test_years_comparativa() {
        assert_eq!(years_comparativa(&[], 2024).unwrap(), vec![2022, 2023, 2024]);
        assert_eq!(
            years_comparativa(&[2024, 1990, 2023, 2024, 3000], 2024).unwrap(),
            vec![2023, 2024]
        );
        let muchos: Vec<i32> = (2000..2011).collect();
        assert!(years_comparativa(&muchos, 2024).is_err());
    }

    #[test]
    fn test_comparativa() {
        let result = comparativa(&muestra(), &[2023, 2024]);
        assert_eq!(result.len(), 2);
        assert_eq!(result["2023"].len(), 12);
        assert_eq!(result["2023"][10].total, 1);
        assert_eq!(result["2023"][5].total, 1);
        assert_eq!(result["2024"].iter().map(|m| m.total).sum::<i64>(), 4);
    }

    #[test]
    fn test_por_reclutador_sin_asignar_and_order() {
        let periodo = Periodo::anual(2024).unwrap();
        let filas = por_reclutador(&muestra(), &periodo, true);
        assert_eq!(filas[0].reclutador, "Laura");
        assert_eq!(filas[0].total_anual, 2);
        assert_eq!(filas[1].reclutador, "Beto");
        assert_eq!(filas[2].reclutador, SIN_ASIGNAR);
        assert_eq!(filas[2].id, None);

        let activos = por_reclutador(&muestra(), &periodo, false);
        assert_eq!(activos.iter().map(|f| f.total_anual).sum::<i64>(), 3);
        assert_eq!(activos[0].total_anual, 1);
    }

    #[test]
    fn test_detalle_reclutador() {
        let detalle = detalle_reclutador(&muestra(), 2, "Beto", 2023);
        assert_eq!(detalle.total_anual, 1);
        assert_eq!(detalle.contratos.len(), 12);
        assert_eq!(detalle.contratos[10].total, 1);
        assert_eq!(detalle.contratos[10].mes, "Noviembre");
    }

    #[test]
    fn test_reclutadores_comercial() {
        let periodo = Periodo::anual(2024).unwrap();
        let filas = reclutadores_comercial(&muestra(), &periodo);
        assert_eq!(filas.len(), 3);
        assert_eq!(filas.iter().map(|f| f.total).sum::<i64>(), 3);
        assert!(filas.iter().any(|f| f.id.is_none() && f.nombre == SIN_ASIGNAR));
    }

    #[test]
    fn test_por_area() {
        let areas = vec![
            Area {
                id: 2,
                nombre: "Comercial".to_string(),
                nombre_normalizado: "comercial".to_string(),
            },
            Area {
                id: 3,
                nombre: "TI".to_string(),
                nombre_normalizado: "ti".to_string(),
            },
            Area {
                id: 6,
                nombre: "Operaciones".to_string(),
                nombre_normalizado: "operaciones".to_string(),
            },
        ];
        let periodo = Periodo::anual(2024).unwrap();
        let filas = por_area(&muestra(), &periodo, &areas);

        assert_eq!(filas.len(), 3);
        assert_eq!(filas[0].contrataciones, 3);
        assert_eq!(filas[0].bajas, 1);
        assert_eq!(filas[0].activos, 2);
        assert_eq!(filas[1].contrataciones, 1);
        assert_eq!(filas[1].bajas, 1);
        assert_eq!(filas[2].contrataciones, 0);
    }

    #[test]
    fn test_nombre_mes() {
        assert_eq!(nombre_mes(1), "Enero");
        assert_eq!(nombre_mes(12), "Diciembre");
        assert_eq!(nombre_mes(0), "");
        assert_eq!(nombre_mes(13), "");
    }

    async fn servicio() -> AnalyticsService {
        use crate::db::repositories::{SqlxCatalogoRepository, SqlxColaboradorRepository};
        use crate::db::{create_test_pool, migrations};

        let pool = create_test_pool().await.expect("pool");
        migrations::run_migrations(&pool).await.expect("migrations");
        AnalyticsService::new(
            SqlxColaboradorRepository::boxed(pool.clone()),
            SqlxCatalogoRepository::boxed(pool),
            Arc::new(MemoryCache::new()),
        )
    }

    #[tokio::test]
    async fn test_result_loaded_before_invalidation_is_not_cached() {
        let service = servicio().await;
        let key = "analytics:kpis:2024";

        let antes = service.generacion();
        service.invalidar().await;
        service.guardar(key, antes, &1u32).await;
        assert_eq!(service.cache.get::<u32>(key).await.expect("get"), None);

        let actual = service.generacion();
        service.guardar(key, actual, &2u32).await;
        assert_eq!(service.cache.get::<u32>(key).await.expect("get"), Some(2));

        service.invalidar().await;
        assert_eq!(service.cache.get::<u32>(key).await.expect("get"), None);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn movimiento_strategy() -> impl Strategy<Value = Movimiento> {
            (
                1i64..10_000,
                0i64..1_096,
                proptest::option::of(0i64..400),
                any::<bool>(),
                proptest::option::of(1i64..5),
            )
                .prop_map(|(id, dias, baja, comercial, reclutador)| {
                    let base = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
                    let alta = base + chrono::Duration::days(dias);
                    let fecha_baja = baja.map(|d| alta + chrono::Duration::days(d));
                    let segmento = if comercial {
                        Segmento::Comercial
                    } else {
                        Segmento::Gestion
                    };
                    Movimiento {
                        colaborador_id: id,
                        fecha_alta: alta,
                        fecha_baja,
                        estado: if fecha_baja.is_some() {
                            EstadoColaborador::Baja
                        } else {
                            EstadoColaborador::Activo
                        },
                        area_id: if comercial { 2 } else { 3 },
                        area: String::new(),
                        segmento,
                        reclutador_id: reclutador,
                        reclutador: reclutador.map(|r| format!("R{}", r)),
                    }
                })
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(50))]

            #[test]
            fn monthly_hires_add_up_to_kpi_total(
                movimientos in proptest::collection::vec(movimiento_strategy(), 0..60),
                year in 2023i32..=2025,
            ) {
                let periodo = Periodo::anual(year).unwrap();
                let k = kpis(&movimientos, &periodo);
                let filas = contrataciones(&movimientos, &periodo, true);

                prop_assert_eq!(filas.iter().map(|f| f.total).sum::<i64>(), k.total);
                prop_assert_eq!(k.gestion + k.comercial, k.total);
                for f in &filas {
                    prop_assert_eq!(f.gestion + f.comercial, f.total);
                }
            }

            #[test]
            fn excluding_bajas_counts_only_active(
                movimientos in proptest::collection::vec(movimiento_strategy(), 0..60),
                year in 2023i32..=2025,
            ) {
                let periodo = Periodo::anual(year).unwrap();
                let k = kpis(&movimientos, &periodo);
                let activos: i64 = contrataciones(&movimientos, &periodo, false)
                    .iter()
                    .map(|f| f.total)
                    .sum();

                prop_assert_eq!(activos, k.activos);
                prop_assert!(k.retencion >= 0.0 && k.retencion <= 100.0);
            }

            #[test]
            fn recruiter_totals_cover_every_hire(
                movimientos in proptest::collection::vec(movimiento_strategy(), 0..60),
                year in 2023i32..=2025,
                incluir_bajas in any::<bool>(),
            ) {
                let periodo = Periodo::anual(year).unwrap();
                let filas = por_reclutador(&movimientos, &periodo, incluir_bajas);
                let total: i64 = contrataciones(&movimientos, &periodo, incluir_bajas)
                    .iter()
                    .map(|f| f.total)
                    .sum();

                prop_assert_eq!(filas.iter().map(|f| f.total_anual).sum::<i64>(), total);
                for par in filas.windows(2) {
                    prop_assert!(par[0].total_anual >= par[1].total_anual);
                }
            }

            #[test]
            fn months_of_a_year_partition_the_year(
                movimientos in proptest::collection::vec(movimiento_strategy(), 0..40),
                year in 2023i32..=2025,
            ) {
                let anual = kpis(&movimientos, &Periodo::anual(year).unwrap());
                let mut total = 0;
                let mut bajas_total = 0;
                for mes in 1..=12 {
                    let k = kpis(&movimientos, &Periodo::new(year, Some(mes)).unwrap());
                    total += k.total;
                    bajas_total += k.bajas_gestion + k.bajas_comercial;
                }
                prop_assert_eq!(total, anual.total);
                prop_assert_eq!(bajas_total, anual.bajas_gestion + anual.bajas_comercial);
            }
        }
    }
}
