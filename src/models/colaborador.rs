//! Collaborator model
//!
//! This module provides:
//! - `Colaborador` entity and its `EstadoColaborador`
//! - `AltaColaboradorInput` (raw form/JSON data) and `NuevoColaborador` (validated row)
//! - `CambioArea` history rows
//! - `AsignacionRecurso`, TI equipment handed to a collaborator
//! - `Movimiento`, the flattened hire/termination record used by the dashboard
//! - Pagination types for list queries

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::catalogo::es_area_comercial;

/// Collaborator entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Colaborador {
    pub id: i64,
    pub nombre: String,
    pub apellido: String,
    pub correo: Option<String>,
    pub edad: Option<i64>,
    pub estado_civil: Option<String>,
    pub domicilio: Option<String>,
    pub telefono: Option<String>,
    pub rfc: String,
    pub curp: Option<String>,
    pub nss: Option<String>,
    pub fecha_alta: NaiveDate,
    pub sueldo: Option<f64>,
    pub comentarios: Option<String>,
    pub rol_comercial: Option<String>,
    pub comisionista: bool,
    pub metodo_pago_id: Option<i64>,
    pub banco_id: Option<i64>,
    pub reclutador_id: Option<i64>,
    pub numero_cuenta: Option<String>,
    pub numero_comisiones: Option<i64>,
    pub tiene_infonavit: bool,
    pub infonavit_credito: Option<String>,
    pub tiene_fonacot: bool,
    pub fonacot_credito: Option<String>,
    pub area_id: i64,
    pub puesto_id: Option<i64>,
    pub estado: EstadoColaborador,
    pub fecha_baja: Option<NaiveDate>,
    pub motivo_baja: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Colaborador {
    pub fn nombre_completo(&self) -> String {
        format!("{} {}", self.nombre, self.apellido)
    }

    pub fn is_activo(&self) -> bool {
        self.estado == EstadoColaborador::Activo
    }
}

/// Employment state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EstadoColaborador {
    #[default]
    Activo,
    Baja,
}

impl fmt::Display for EstadoColaborador {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstadoColaborador::Activo => write!(f, "activo"),
            EstadoColaborador::Baja => write!(f, "baja"),
        }
    }
}

impl FromStr for EstadoColaborador {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "activo" => Ok(EstadoColaborador::Activo),
            "baja" => Ok(EstadoColaborador::Baja),
            _ => Err(anyhow::anyhow!("Invalid collaborator state: {}", s)),
        }
    }
}

/// Dashboard segment: sales staff versus everybody else
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Segmento {
    Gestion,
    Comercial,
}

impl Segmento {
    pub fn de_area(nombre_area: &str) -> Self {
        if es_area_comercial(nombre_area) {
            Segmento::Comercial
        } else {
            Segmento::Gestion
        }
    }
}

/// Raw alta data as received from the form or the JSON API.
///
/// Nothing here is trusted; the colaborador service validates and
/// normalizes it into a [`NuevoColaborador`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AltaColaboradorInput {
    pub nombre: String,
    pub apellido: String,
    pub correo: Option<String>,
    pub edad: Option<i64>,
    pub estado_civil: Option<String>,
    pub domicilio: Option<String>,
    pub telefono: Option<String>,
    pub rfc: String,
    pub curp: Option<String>,
    pub nss: Option<String>,
    /// Defaults to today when absent
    pub fecha_alta: Option<NaiveDate>,
    pub sueldo: Option<f64>,
    pub comentarios: Option<String>,
    pub rol_comercial: Option<String>,
    pub comisionista: bool,
    pub metodo_pago_id: Option<i64>,
    pub banco_id: Option<i64>,
    /// Free-text bank name, created on demand
    pub banco_string: Option<String>,
    pub reclutador_id: Option<i64>,
    pub numero_cuenta: Option<String>,
    pub numero_comisiones: Option<i64>,
    pub tiene_infonavit: bool,
    pub infonavit_credito: Option<String>,
    pub tiene_fonacot: bool,
    pub fonacot_credito: Option<String>,
    pub area_id: i64,
    pub puesto_id: Option<i64>,
    /// Free-text puesto name inside the área, created on demand
    pub puesto_comercial: Option<String>,
    pub recursos: Vec<i64>,
    pub programas: Vec<i64>,
}

/// Validated collaborator ready to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NuevoColaborador {
    pub nombre: String,
    pub apellido: String,
    pub correo: Option<String>,
    pub edad: Option<i64>,
    pub estado_civil: Option<String>,
    pub domicilio: Option<String>,
    pub telefono: Option<String>,
    pub rfc: String,
    pub curp: Option<String>,
    pub nss: Option<String>,
    pub fecha_alta: NaiveDate,
    pub sueldo: Option<f64>,
    pub comentarios: Option<String>,
    pub rol_comercial: Option<String>,
    pub comisionista: bool,
    pub metodo_pago_id: Option<i64>,
    pub banco_id: Option<i64>,
    pub reclutador_id: Option<i64>,
    pub numero_cuenta: Option<String>,
    pub numero_comisiones: Option<i64>,
    pub tiene_infonavit: bool,
    pub infonavit_credito: Option<String>,
    pub tiene_fonacot: bool,
    pub fonacot_credito: Option<String>,
    pub area_id: i64,
    pub puesto_id: Option<i64>,
    pub recursos: Vec<i64>,
    pub programas: Vec<i64>,
}

/// Existing collaborator sharing an identifier with a new alta
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Duplicado {
    pub id: i64,
    pub nombre: String,
    pub rfc: String,
    pub estado: EstadoColaborador,
    /// Fields that matched: rfc, curp, nss, correo
    pub campos: Vec<String>,
}

/// Filter for collaborator listings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FiltroColaboradores {
    pub estado: Option<EstadoColaborador>,
    pub area_id: Option<i64>,
    /// Substring matched against nombre, apellido and rfc
    pub buscar: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl FiltroColaboradores {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page.unwrap_or(1), self.per_page.unwrap_or(20))
    }

    /// Search text wrapped for a LIKE clause, if any
    pub fn patron_busqueda(&self) -> Option<String> {
        self.buscar
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s))
    }
}

/// Pagination parameters for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

impl ListParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 {
            return 0;
        }
        (self.total.max(0) as u32).div_ceil(self.per_page)
    }
}

/// Row of a collaborator listing, joined with área and puesto names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColaboradorResumen {
    pub id: i64,
    pub nombre: String,
    pub apellido: String,
    pub rfc: String,
    pub correo: Option<String>,
    pub area_id: i64,
    pub area: String,
    pub puesto: Option<String>,
    pub fecha_alta: NaiveDate,
    pub estado: EstadoColaborador,
    pub fecha_baja: Option<NaiveDate>,
}

/// Área transfer history row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CambioArea {
    pub id: i64,
    pub colaborador_id: i64,
    pub area_anterior_id: i64,
    pub puesto_anterior_id: Option<i64>,
    pub area_nueva_id: i64,
    pub puesto_nuevo_id: Option<i64>,
    pub motivo: Option<String>,
    pub fecha_efectiva: NaiveDate,
    pub usuario_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Validated área transfer
#[derive(Debug, Clone)]
pub struct NuevoCambioArea {
    pub colaborador_id: i64,
    pub area_anterior_id: i64,
    pub puesto_anterior_id: Option<i64>,
    pub area_nueva_id: i64,
    pub puesto_nuevo_id: Option<i64>,
    pub motivo: Option<String>,
    pub fecha_efectiva: NaiveDate,
    pub usuario_id: Option<i64>,
    /// Drop rol_comercial, comisionista and numero_comisiones
    pub limpiar_comercial: bool,
}

/// Hire/termination record fed to the dashboard aggregations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Movimiento {
    pub colaborador_id: i64,
    pub fecha_alta: NaiveDate,
    pub fecha_baja: Option<NaiveDate>,
    pub estado: EstadoColaborador,
    pub area_id: i64,
    pub area: String,
    pub segmento: Segmento,
    pub reclutador_id: Option<i64>,
    pub reclutador: Option<String>,
}

/// TI resource assigned to a collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AsignacionRecurso {
    pub colaborador_id: i64,
    pub colaborador: String,
    pub estado: EstadoColaborador,
    pub recurso_id: i64,
    pub recurso: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estado_display_and_parse() {
        assert_eq!(EstadoColaborador::Activo.to_string(), "activo");
        assert_eq!(EstadoColaborador::Baja.to_string(), "baja");
        assert_eq!(
            EstadoColaborador::from_str("BAJA").unwrap(),
            EstadoColaborador::Baja
        );
        assert!(EstadoColaborador::from_str("suspendido").is_err());
    }

    #[test]
    fn test_segmento_de_area() {
        assert_eq!(Segmento::de_area("Comercial"), Segmento::Comercial);
        assert_eq!(Segmento::de_area("TI"), Segmento::Gestion);
    }

    #[test]
    fn test_list_params_clamped() {
        let params = ListParams::new(0, 500);
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 100);
        assert_eq!(params.offset(), 0);

        let params = ListParams::new(3, 20);
        assert_eq!(params.offset(), 40);
        assert_eq!(params.limit(), 20);
    }

    #[test]
    fn test_paged_result_total_pages() {
        let params = ListParams::new(1, 20);
        let result: PagedResult<i64> = PagedResult::new(vec![], 41, &params);
        assert_eq!(result.total_pages(), 3);
    }

    #[test]
    fn test_filtro_patron_busqueda() {
        let filtro = FiltroColaboradores {
            buscar: Some("  lopez ".to_string()),
            ..Default::default()
        };
        assert_eq!(filtro.patron_busqueda().as_deref(), Some("%lopez%"));

        let vacio = FiltroColaboradores {
            buscar: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(vacio.patron_busqueda().is_none());
    }

    #[test]
    fn test_alta_input_deserializes_with_defaults() {
        let input: AltaColaboradorInput = serde_json::from_str(
            r#"{"nombre":"Ana","apellido":"López","rfc":"LOAA900101AB1","area_id":3}"#,
        )
        .unwrap();
        assert_eq!(input.area_id, 3);
        assert!(!input.comisionista);
        assert!(input.recursos.is_empty());
        assert!(input.fecha_alta.is_none());
    }
}
