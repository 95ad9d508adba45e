//! Colaborador service
//!
//! Implements the collaborator lifecycle:
//! - Alta with field validation, catalog checks and duplicate detection
//! - RFC lookup for the alta form
//! - Listing and detail
//! - Baja (termination)
//! - Cambio de área with history
//!
//! Every state change invalidates the cached dashboard aggregates.

use crate::db::repositories::{CatalogoRepository, ColaboradorRepository, DocumentoRepository};
use crate::models::{
    AltaColaboradorInput, Area, AsignacionRecurso, CambioArea, Catalogo, CatalogoItem, Colaborador,
    ColaboradorResumen, Documento, Duplicado, EstadoColaborador, FiltroColaboradores,
    NuevoCambioArea, NuevoColaborador, PagedResult, Puesto,
};
use crate::services::analytics::AnalyticsService;
use crate::services::catalogo::{CatalogoService, CatalogoServiceError};
use crate::services::validacion;
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Error types for collaborator operations
#[derive(Debug, thiserror::Error)]
pub enum ColaboradorServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// State conflict, e.g. terminating an already terminated collaborator
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Identifiers already registered for other collaborators
    #[error("Duplicate collaborator: {}", campos_duplicados(.0))]
    Duplicados(Vec<Duplicado>),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

fn campos_duplicados(duplicados: &[Duplicado]) -> String {
    let mut campos: Vec<&str> = duplicados
        .iter()
        .flat_map(|d| d.campos.iter().map(String::as_str))
        .collect();
    campos.sort_unstable();
    campos.dedup();
    campos.join(", ")
}

impl From<CatalogoServiceError> for ColaboradorServiceError {
    fn from(err: CatalogoServiceError) -> Self {
        match err {
            CatalogoServiceError::ValidationError(msg) => Self::ValidationError(msg),
            CatalogoServiceError::NotFound(msg) => Self::NotFound(msg),
            CatalogoServiceError::Conflict(msg) => Self::Conflict(msg),
            CatalogoServiceError::InternalError(e) => Self::InternalError(e),
        }
    }
}

fn invalido(msg: String) -> ColaboradorServiceError {
    ColaboradorServiceError::ValidationError(msg)
}

/// Answer of the RFC lookup used by the alta form
#[derive(Debug, Clone, Serialize)]
pub struct VerificacionRfc {
    pub existe: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colaborador: Option<RfcRegistrado>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RfcRegistrado {
    pub id: i64,
    pub nombre: String,
    pub rfc: String,
    pub correo: Option<String>,
    pub area: String,
    pub estado: EstadoColaborador,
    pub puesto: Option<String>,
}

/// Collaborator with everything the detail view shows
#[derive(Debug, Clone, Serialize)]
pub struct ColaboradorDetalle {
    #[serde(flatten)]
    pub colaborador: Colaborador,
    pub area: Area,
    pub puesto: Option<Puesto>,
    pub recursos: Vec<CatalogoItem>,
    pub programas: Vec<CatalogoItem>,
    pub documentos: Vec<Documento>,
}

/// Termination request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BajaInput {
    /// Defaults to today
    #[serde(default)]
    pub fecha_baja: Option<NaiveDate>,
    #[serde(default)]
    pub motivo: String,
}

/// Área transfer request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CambioAreaInput {
    pub area_id: i64,
    #[serde(default)]
    pub puesto_id: Option<i64>,
    #[serde(default)]
    pub motivo: Option<String>,
    /// Defaults to today
    #[serde(default)]
    pub fecha_efectiva: Option<NaiveDate>,
}

pub struct ColaboradorService {
    repo: Arc<dyn ColaboradorRepository>,
    documentos: Arc<dyn DocumentoRepository>,
    catalogos: CatalogoService,
    analytics: Arc<AnalyticsService>,
}

impl ColaboradorService {
    pub fn new(
        repo: Arc<dyn ColaboradorRepository>,
        catalogo_repo: Arc<dyn CatalogoRepository>,
        documentos: Arc<dyn DocumentoRepository>,
        analytics: Arc<AnalyticsService>,
    ) -> Self {
        Self {
            repo,
            documentos,
            catalogos: CatalogoService::new(catalogo_repo),
            analytics,
        }
    }

    /// Register a new collaborator
    ///
    /// # Errors
    /// - `ValidationError` for malformed fields or unknown catalog ids
    /// - `Duplicados` when RFC, CURP, NSS or correo are already registered
    ///   and `permitir_duplicados` is false
    pub async fn alta(
        &self,
        input: AltaColaboradorInput,
        permitir_duplicados: bool,
    ) -> Result<Colaborador, ColaboradorServiceError> {
        let mut nuevo = self.validar_alta(&input).await?;

        let duplicados = self
            .repo
            .find_duplicados(
                &nuevo.rfc,
                nuevo.curp.as_deref(),
                nuevo.nss.as_deref(),
                nuevo.correo.as_deref(),
            )
            .await
            .context("Failed to check duplicates")?;
        if !duplicados.is_empty() {
            if !permitir_duplicados {
                return Err(ColaboradorServiceError::Duplicados(duplicados));
            }
            tracing::warn!(
                rfc = %nuevo.rfc,
                campos = %campos_duplicados(&duplicados),
                "Alta continues despite duplicate identifiers"
            );
        }

        // Free-text catalog entries are created only once the alta is accepted
        if let Some(banco) = validacion::texto_opcional(input.banco_string.as_deref()) {
            nuevo.banco_id = Some(self.catalogos.obtener_o_crear(Catalogo::Bancos, &banco).await?.id);
        }
        if let Some(puesto) = validacion::texto_opcional(input.puesto_comercial.as_deref()) {
            nuevo.puesto_id = Some(
                self.catalogos
                    .obtener_o_crear_puesto(nuevo.area_id, &puesto)
                    .await?
                    .id,
            );
        }

        let colaborador = self
            .repo
            .create(&nuevo)
            .await
            .context("Failed to create colaborador")?;

        tracing::info!(
            colaborador_id = colaborador.id,
            area_id = colaborador.area_id,
            "Colaborador registered"
        );
        self.analytics.invalidar().await;
        Ok(colaborador)
    }

    /// Look up the collaborator holding an RFC, preferring active ones
    pub async fn verificar_rfc(&self, rfc: &str) -> Result<VerificacionRfc, ColaboradorServiceError> {
        let rfc = rfc.trim().to_uppercase();
        if rfc.is_empty() {
            return Err(invalido("El RFC es obligatorio".to_string()));
        }

        let Some(colaborador) = self
            .repo
            .get_by_rfc(&rfc)
            .await
            .context("Failed to look up RFC")?
        else {
            return Ok(VerificacionRfc {
                existe: false,
                colaborador: None,
            });
        };

        let area = self.catalogos.area(colaborador.area_id).await?;
        let puesto = match colaborador.puesto_id {
            Some(id) => self.catalogos.puesto(id).await?.map(|p| p.nombre),
            None => None,
        };

        Ok(VerificacionRfc {
            existe: true,
            colaborador: Some(RfcRegistrado {
                id: colaborador.id,
                nombre: colaborador.nombre_completo(),
                rfc: colaborador.rfc,
                correo: colaborador.correo,
                area: area.nombre,
                estado: colaborador.estado,
                puesto,
            }),
        })
    }

    pub async fn listar(
        &self,
        filtro: &FiltroColaboradores,
    ) -> Result<PagedResult<ColaboradorResumen>, ColaboradorServiceError> {
        let params = filtro.params();
        let (items, total) = self
            .repo
            .list(filtro)
            .await
            .context("Failed to list colaboradores")?;
        Ok(PagedResult::new(items, total, &params))
    }

    pub async fn get(&self, id: i64) -> Result<Colaborador, ColaboradorServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get colaborador")?
            .ok_or_else(|| ColaboradorServiceError::NotFound(format!("Colaborador {}", id)))
    }

    pub async fn detalle(&self, id: i64) -> Result<ColaboradorDetalle, ColaboradorServiceError> {
        let colaborador = self.get(id).await?;
        let area = self.catalogos.area(colaborador.area_id).await?;
        let puesto = match colaborador.puesto_id {
            Some(puesto_id) => self.catalogos.puesto(puesto_id).await?,
            None => None,
        };
        let recursos = self
            .repo
            .list_recursos(id)
            .await
            .context("Failed to list recursos")?;
        let programas = self
            .repo
            .list_programas(id)
            .await
            .context("Failed to list programas")?;
        let documentos = self
            .documentos
            .list_by_colaborador(id)
            .await
            .context("Failed to list documentos")?;

        Ok(ColaboradorDetalle {
            colaborador,
            area,
            puesto,
            recursos,
            programas,
            documentos,
        })
    }

    /// Terminate an active collaborator
    pub async fn baja(&self, id: i64, input: BajaInput) -> Result<Colaborador, ColaboradorServiceError> {
        let colaborador = self.get(id).await?;
        if !colaborador.is_activo() {
            return Err(ColaboradorServiceError::Conflict(format!(
                "{} ya fue dado de baja",
                colaborador.nombre_completo()
            )));
        }

        let motivo = validacion::texto_opcional(Some(&input.motivo))
            .ok_or_else(|| invalido("El motivo de la baja es obligatorio".to_string()))?;
        let fecha_baja = input.fecha_baja.unwrap_or_else(hoy);
        if fecha_baja < colaborador.fecha_alta {
            return Err(invalido(format!(
                "La fecha de baja no puede ser anterior a la fecha de alta ({})",
                colaborador.fecha_alta
            )));
        }

        let registrada = self
            .repo
            .registrar_baja(id, fecha_baja, &motivo)
            .await
            .context("Failed to register baja")?;
        if !registrada {
            return Err(ColaboradorServiceError::Conflict(
                "El colaborador ya no está activo".to_string(),
            ));
        }

        tracing::info!(colaborador_id = id, %fecha_baja, "Colaborador terminated");
        self.analytics.invalidar().await;
        self.get(id).await
    }

    /// Move an active collaborator to another área and/or puesto
    pub async fn cambio_area(
        &self,
        id: i64,
        input: CambioAreaInput,
        usuario_id: Option<i64>,
    ) -> Result<CambioArea, ColaboradorServiceError> {
        let colaborador = self.get(id).await?;
        if !colaborador.is_activo() {
            return Err(ColaboradorServiceError::Conflict(
                "Solo se puede cambiar de área a colaboradores activos".to_string(),
            ));
        }

        let area_nueva = self.area_existente(input.area_id).await?;
        if let Some(puesto_id) = input.puesto_id {
            self.puesto_de_area(puesto_id, area_nueva.id).await?;
        }

        if area_nueva.id == colaborador.area_id && input.puesto_id == colaborador.puesto_id {
            return Err(invalido(
                "El colaborador ya pertenece a esa área y puesto".to_string(),
            ));
        }

        let fecha_efectiva = input.fecha_efectiva.unwrap_or_else(hoy);
        if fecha_efectiva < colaborador.fecha_alta {
            return Err(invalido(format!(
                "La fecha efectiva no puede ser anterior a la fecha de alta ({})",
                colaborador.fecha_alta
            )));
        }

        let area_anterior = self.catalogos.area(colaborador.area_id).await?;
        let cambio = NuevoCambioArea {
            colaborador_id: id,
            area_anterior_id: colaborador.area_id,
            puesto_anterior_id: colaborador.puesto_id,
            area_nueva_id: area_nueva.id,
            puesto_nuevo_id: input.puesto_id,
            motivo: validacion::texto_opcional(input.motivo.as_deref()),
            fecha_efectiva,
            usuario_id,
            limpiar_comercial: area_anterior.es_comercial() && !area_nueva.es_comercial(),
        };

        let registrado = self
            .repo
            .cambiar_area(&cambio)
            .await
            .context("Failed to change area")?
            .ok_or_else(|| {
                ColaboradorServiceError::Conflict(
                    "El colaborador ya no está activo o cambió de área".to_string(),
                )
            })?;

        tracing::info!(
            colaborador_id = id,
            desde = cambio.area_anterior_id,
            hacia = cambio.area_nueva_id,
            "Colaborador moved"
        );
        self.analytics.invalidar().await;
        Ok(registrado)
    }

    /// Transfer history, newest first
    pub async fn historial_cambios(&self, id: i64) -> Result<Vec<CambioArea>, ColaboradorServiceError> {
        self.get(id).await?;
        Ok(self
            .repo
            .list_cambios(id)
            .await
            .context("Failed to list cambios de area")?)
    }

    /// TI resources handed to collaborators
    pub async fn asignaciones_ti(&self) -> Result<Vec<AsignacionRecurso>, ColaboradorServiceError> {
        Ok(self
            .repo
            .list_asignaciones()
            .await
            .context("Failed to list asignaciones")?)
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    /// Validate and normalize alta input without touching the database state
    async fn validar_alta(
        &self,
        input: &AltaColaboradorInput,
    ) -> Result<NuevoColaborador, ColaboradorServiceError> {
        let nombre = validacion::texto_requerido("nombre", &input.nombre).map_err(invalido)?;
        let apellido = validacion::texto_requerido("apellido", &input.apellido).map_err(invalido)?;
        let rfc = validacion::rfc(&input.rfc).map_err(invalido)?;

        let curp = opcional(input.curp.as_deref(), validacion::curp)?;
        let nss = opcional(input.nss.as_deref(), validacion::nss)?;
        let correo = opcional(input.correo.as_deref(), validacion::correo)?;
        let telefono = opcional(input.telefono.as_deref(), validacion::telefono)?;
        let numero_cuenta = opcional(input.numero_cuenta.as_deref(), validacion::numero_cuenta)?;
        let edad = input.edad.map(validacion::edad).transpose().map_err(invalido)?;
        let sueldo = input.sueldo.map(validacion::sueldo).transpose().map_err(invalido)?;

        let area = self.area_existente(input.area_id).await?;
        let puesto_id = match input.puesto_id {
            Some(puesto_id) if validacion::texto_opcional(input.puesto_comercial.as_deref()).is_none() => {
                Some(self.puesto_de_area(puesto_id, area.id).await?.id)
            }
            _ => None,
        };

        let reclutador_id = self.item_existente(Catalogo::Reclutadores, input.reclutador_id).await?;
        let banco_id = self.item_existente(Catalogo::Bancos, input.banco_id).await?;
        let metodo_pago_id = self.item_existente(Catalogo::MetodosPago, input.metodo_pago_id).await?;

        let recursos = self.ids_existentes(Catalogo::RecursosTi, &input.recursos).await?;
        let programas = self.ids_existentes(Catalogo::Programas, &input.programas).await?;

        let comercial = area.es_comercial();
        let numero_comisiones = match input.numero_comisiones {
            Some(n) if n < 0 => {
                return Err(invalido("El número de comisiones no puede ser negativo".to_string()))
            }
            n => n.filter(|_| comercial),
        };

        let infonavit_credito = credito(
            "INFONAVIT",
            input.tiene_infonavit,
            input.infonavit_credito.as_deref(),
        )?;
        let fonacot_credito = credito(
            "FONACOT",
            input.tiene_fonacot,
            input.fonacot_credito.as_deref(),
        )?;

        Ok(NuevoColaborador {
            nombre,
            apellido,
            correo,
            edad,
            estado_civil: validacion::texto_opcional(input.estado_civil.as_deref()),
            domicilio: validacion::texto_opcional(input.domicilio.as_deref()),
            telefono,
            rfc,
            curp,
            nss,
            fecha_alta: input.fecha_alta.unwrap_or_else(hoy),
            sueldo,
            comentarios: validacion::texto_opcional(input.comentarios.as_deref()),
            rol_comercial: validacion::texto_opcional(input.rol_comercial.as_deref())
                .filter(|_| comercial),
            comisionista: comercial && input.comisionista,
            metodo_pago_id,
            banco_id,
            reclutador_id,
            numero_cuenta,
            numero_comisiones,
            tiene_infonavit: input.tiene_infonavit,
            infonavit_credito,
            tiene_fonacot: input.tiene_fonacot,
            fonacot_credito,
            area_id: area.id,
            puesto_id,
            recursos,
            programas,
        })
    }

    async fn area_existente(&self, area_id: i64) -> Result<Area, ColaboradorServiceError> {
        match self.catalogos.area(area_id).await {
            Ok(area) => Ok(area),
            Err(CatalogoServiceError::NotFound(_)) => {
                Err(invalido("El área seleccionada no existe".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn puesto_de_area(&self, puesto_id: i64, area_id: i64) -> Result<Puesto, ColaboradorServiceError> {
        self.catalogos
            .puesto(puesto_id)
            .await?
            .filter(|p| p.area_id == area_id)
            .ok_or_else(|| invalido("El puesto no pertenece al área seleccionada".to_string()))
    }

    async fn item_existente(
        &self,
        catalogo: Catalogo,
        id: Option<i64>,
    ) -> Result<Option<i64>, ColaboradorServiceError> {
        let Some(id) = id else {
            return Ok(None);
        };
        match self.catalogos.item(catalogo, id).await? {
            Some(item) => Ok(Some(item.id)),
            None => Err(invalido(format!("{} {} no existe", catalogo.etiqueta(), id))),
        }
    }

    async fn ids_existentes(
        &self,
        catalogo: Catalogo,
        ids: &[i64],
    ) -> Result<Vec<i64>, ColaboradorServiceError> {
        let mut unicos = ids.to_vec();
        unicos.sort_unstable();
        unicos.dedup();
        for id in &unicos {
            self.item_existente(catalogo, Some(*id)).await?;
        }
        Ok(unicos)
    }
}

fn hoy() -> NaiveDate {
    Utc::now().date_naive()
}

/// Validate an optional field; blank counts as absent
fn opcional(
    valor: Option<&str>,
    validar: fn(&str) -> Result<String, String>,
) -> Result<Option<String>, ColaboradorServiceError> {
    validacion::texto_opcional(valor)
        .map(|v| validar(&v))
        .transpose()
        .map_err(invalido)
}

/// Credit number: required when the program applies, dropped otherwise
fn credito(
    programa: &str,
    aplica: bool,
    numero: Option<&str>,
) -> Result<Option<String>, ColaboradorServiceError> {
    if !aplica {
        return Ok(None);
    }
    validacion::texto_opcional(numero)
        .map(Some)
        .ok_or_else(|| invalido(format!("El número de crédito {} es obligatorio", programa)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{
        SqlxCatalogoRepository, SqlxColaboradorRepository, SqlxDocumentoRepository,
    };
    use crate::db::{create_test_pool, migrations};

    struct Fixture {
        service: ColaboradorService,
        analytics: Arc<AnalyticsService>,
        catalogos: CatalogoService,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let colaboradores = SqlxColaboradorRepository::boxed(pool.clone());
        let catalogo_repo = SqlxCatalogoRepository::boxed(pool.clone());
        let analytics = Arc::new(AnalyticsService::new(
            colaboradores.clone(),
            catalogo_repo.clone(),
            Arc::new(MemoryCache::new()),
        ));
        let service = ColaboradorService::new(
            colaboradores,
            catalogo_repo.clone(),
            SqlxDocumentoRepository::boxed(pool.clone()),
            analytics.clone(),
        );
        Fixture {
            service,
            analytics,
            catalogos: CatalogoService::new(catalogo_repo),
        }
    }

    fn input(rfc: &str) -> AltaColaboradorInput {
        AltaColaboradorInput {
            nombre: " Ana ".to_string(),
            apellido: "López".to_string(),
            rfc: rfc.to_string(),
            area_id: 3,
            puesto_id: Some(6),
            fecha_alta: NaiveDate::from_ymd_opt(2024, 1, 15),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_alta_minimal() {
        let f = setup().await;
        let colaborador = f
            .service
            .alta(input("loaa900101ab1"), false)
            .await
            .expect("Failed to register");

        assert_eq!(colaborador.nombre, "Ana");
        assert_eq!(colaborador.rfc, "LOAA900101AB1");
        assert_eq!(colaborador.estado, EstadoColaborador::Activo);
        assert_eq!(colaborador.puesto_id, Some(6));
    }

    #[tokio::test]
    async fn test_alta_validation_errors() {
        let f = setup().await;

        let mut sin_nombre = input("LOAA900101AB1");
        sin_nombre.nombre = "  ".to_string();
        assert!(matches!(
            f.service.alta(sin_nombre, false).await,
            Err(ColaboradorServiceError::ValidationError(_))
        ));

        let mut mal_rfc = input("LOAA9001");
        mal_rfc.rfc = "XYZ".to_string();
        assert!(matches!(
            f.service.alta(mal_rfc, false).await,
            Err(ColaboradorServiceError::ValidationError(_))
        ));

        let mut menor = input("LOAA900101AB1");
        menor.edad = Some(15);
        assert!(matches!(
            f.service.alta(menor, false).await,
            Err(ColaboradorServiceError::ValidationError(_))
        ));

        let mut puesto_ajeno = input("LOAA900101AB1");
        puesto_ajeno.puesto_id = Some(1);
        assert!(matches!(
            f.service.alta(puesto_ajeno, false).await,
            Err(ColaboradorServiceError::ValidationError(_))
        ));

        let mut sin_area = input("LOAA900101AB1");
        sin_area.area_id = 999;
        assert!(matches!(
            f.service.alta(sin_area, false).await,
            Err(ColaboradorServiceError::ValidationError(_))
        ));

        let mut recurso_invalido = input("LOAA900101AB1");
        recurso_invalido.recursos = vec![1, 999];
        assert!(matches!(
            f.service.alta(recurso_invalido, false).await,
            Err(ColaboradorServiceError::ValidationError(_))
        ));

        let mut infonavit = input("LOAA900101AB1");
        infonavit.tiene_infonavit = true;
        assert!(matches!(
            f.service.alta(infonavit, false).await,
            Err(ColaboradorServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_alta_clears_commercial_fields_outside_comercial() {
        let f = setup().await;
        let mut datos = input("LOAA900101AB1");
        datos.rol_comercial = Some("Cerrador".to_string());
        datos.comisionista = true;
        datos.numero_comisiones = Some(3);
        datos.tiene_fonacot = false;
        datos.fonacot_credito = Some("F-1".to_string());

        let colaborador = f.service.alta(datos, false).await.expect("register");
        assert_eq!(colaborador.rol_comercial, None);
        assert!(!colaborador.comisionista);
        assert_eq!(colaborador.numero_comisiones, None);
        assert_eq!(colaborador.fonacot_credito, None);
    }

    #[tokio::test]
    async fn test_alta_comercial_with_free_text_catalogs() {
        let f = setup().await;
        let mut datos = input("LOAA900101AB1");
        datos.area_id = 2;
        datos.puesto_id = None;
        datos.puesto_comercial = Some("Ejecutivo Senior".to_string());
        datos.banco_string = Some("Banco del Bajío".to_string());
        datos.rol_comercial = Some("Cerrador".to_string());
        datos.comisionista = true;
        datos.numero_comisiones = Some(2);
        datos.recursos = vec![1, 3, 1];
        datos.programas = vec![3];

        let colaborador = f.service.alta(datos, false).await.expect("register");
        assert_eq!(colaborador.rol_comercial.as_deref(), Some("Cerrador"));
        assert!(colaborador.comisionista);

        let puesto_id = colaborador.puesto_id.expect("puesto");
        let puestos = f.catalogos.puestos_por_area(2).await.expect("puestos");
        assert!(puestos.iter().any(|p| p.id == puesto_id && p.nombre == "Ejecutivo Senior"));

        let banco = f
            .catalogos
            .item(Catalogo::Bancos, colaborador.banco_id.expect("banco"))
            .await
            .expect("banco")
            .expect("row");
        assert_eq!(banco.nombre, "Banco del Bajío");

        let detalle = f.service.detalle(colaborador.id).await.expect("detalle");
        assert_eq!(detalle.recursos.len(), 2);
        assert_eq!(detalle.programas.len(), 1);
        assert_eq!(detalle.area.nombre, "Comercial");
    }

    #[tokio::test]
    async fn test_alta_duplicates() {
        let f = setup().await;
        let mut primero = input("LOAA900101AB1");
        primero.correo = Some("ana@empresa.mx".to_string());
        f.service.alta(primero, false).await.expect("register");

        let mut segundo = input("LOAA900101AB1");
        segundo.correo = Some("ANA@empresa.mx".to_string());
        match f.service.alta(segundo.clone(), false).await {
            Err(ColaboradorServiceError::Duplicados(dups)) => {
                assert_eq!(dups.len(), 1);
                assert!(dups[0].campos.contains(&"rfc".to_string()));
                assert!(dups[0].campos.contains(&"correo".to_string()));
            }
            other => panic!("unexpected result: {:?}", other.map(|c| c.id)),
        }

        let forzado = f.service.alta(segundo, true).await.expect("forced alta");
        assert_eq!(forzado.rfc, "LOAA900101AB1");
    }

    #[tokio::test]
    async fn test_verificar_rfc() {
        let f = setup().await;
        let vacio = f.service.verificar_rfc("LOAA900101AB1").await.expect("lookup");
        assert!(!vacio.existe);

        f.service.alta(input("LOAA900101AB1"), false).await.expect("register");
        let encontrado = f.service.verificar_rfc(" loaa900101ab1 ").await.expect("lookup");
        assert!(encontrado.existe);
        let colaborador = encontrado.colaborador.expect("colaborador");
        assert_eq!(colaborador.nombre, "Ana López");
        assert_eq!(colaborador.area, "TI");
        assert_eq!(colaborador.puesto.as_deref(), Some("Desarrollador"));

        assert!(f.service.verificar_rfc("  ").await.is_err());
    }

    #[tokio::test]
    async fn test_baja_rules() {
        let f = setup().await;
        let colaborador = f.service.alta(input("LOAA900101AB1"), false).await.expect("register");

        let sin_motivo = f
            .service
            .baja(colaborador.id, BajaInput {
                fecha_baja: NaiveDate::from_ymd_opt(2024, 3, 1),
                motivo: " ".to_string(),
            })
            .await;
        assert!(matches!(sin_motivo, Err(ColaboradorServiceError::ValidationError(_))));

        let antes_de_alta = f
            .service
            .baja(colaborador.id, BajaInput {
                fecha_baja: NaiveDate::from_ymd_opt(2023, 12, 31),
                motivo: "Renuncia".to_string(),
            })
            .await;
        assert!(matches!(antes_de_alta, Err(ColaboradorServiceError::ValidationError(_))));

        let baja = f
            .service
            .baja(colaborador.id, BajaInput {
                fecha_baja: NaiveDate::from_ymd_opt(2024, 3, 1),
                motivo: "Renuncia".to_string(),
            })
            .await
            .expect("baja");
        assert_eq!(baja.estado, EstadoColaborador::Baja);
        assert_eq!(baja.motivo_baja.as_deref(), Some("Renuncia"));

        let otra = f
            .service
            .baja(colaborador.id, BajaInput {
                fecha_baja: None,
                motivo: "Renuncia".to_string(),
            })
            .await;
        assert!(matches!(otra, Err(ColaboradorServiceError::Conflict(_))));

        assert!(matches!(
            f.service.baja(999, BajaInput::default()).await,
            Err(ColaboradorServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cambio_area_from_comercial_clears_fields() {
        let f = setup().await;
        let mut datos = input("LOAA900101AB1");
        datos.area_id = 2;
        datos.puesto_id = Some(3);
        datos.rol_comercial = Some("Cerrador".to_string());
        datos.comisionista = true;
        let colaborador = f.service.alta(datos, false).await.expect("register");

        let mismo = f
            .service
            .cambio_area(colaborador.id, CambioAreaInput {
                area_id: 2,
                puesto_id: Some(3),
                ..Default::default()
            }, None)
            .await;
        assert!(matches!(mismo, Err(ColaboradorServiceError::ValidationError(_))));

        let puesto_ajeno = f
            .service
            .cambio_area(colaborador.id, CambioAreaInput {
                area_id: 3,
                puesto_id: Some(1),
                ..Default::default()
            }, None)
            .await;
        assert!(matches!(puesto_ajeno, Err(ColaboradorServiceError::ValidationError(_))));

        let cambio = f
            .service
            .cambio_area(colaborador.id, CambioAreaInput {
                area_id: 3,
                puesto_id: Some(6),
                motivo: Some("Reestructura".to_string()),
                fecha_efectiva: NaiveDate::from_ymd_opt(2024, 6, 1),
            }, None)
            .await
            .expect("cambio");
        assert_eq!(cambio.area_anterior_id, 2);
        assert_eq!(cambio.area_nueva_id, 3);

        let movido = f.service.get(colaborador.id).await.expect("get");
        assert_eq!(movido.area_id, 3);
        assert_eq!(movido.rol_comercial, None);
        assert!(!movido.comisionista);

        let historial = f.service.historial_cambios(colaborador.id).await.expect("historial");
        assert_eq!(historial.len(), 1);
        assert_eq!(historial[0].motivo.as_deref(), Some("Reestructura"));
    }

    #[tokio::test]
    async fn test_cambio_area_requires_active() {
        let f = setup().await;
        let colaborador = f.service.alta(input("LOAA900101AB1"), false).await.expect("register");
        f.service
            .baja(colaborador.id, BajaInput {
                fecha_baja: NaiveDate::from_ymd_opt(2024, 2, 1),
                motivo: "Renuncia".to_string(),
            })
            .await
            .expect("baja");

        let result = f
            .service
            .cambio_area(colaborador.id, CambioAreaInput {
                area_id: 4,
                ..Default::default()
            }, None)
            .await;
        assert!(matches!(result, Err(ColaboradorServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_cambio_area_rejects_fecha_before_alta() {
        let f = setup().await;
        let colaborador = f.service.alta(input("LOAA900101AB1"), false).await.expect("register");

        let result = f
            .service
            .cambio_area(colaborador.id, CambioAreaInput {
                area_id: 4,
                fecha_efectiva: NaiveDate::from_ymd_opt(2024, 1, 14),
                ..Default::default()
            }, None)
            .await;
        assert!(matches!(result, Err(ColaboradorServiceError::ValidationError(_))));

        let mismo_dia = f
            .service
            .cambio_area(colaborador.id, CambioAreaInput {
                area_id: 4,
                fecha_efectiva: NaiveDate::from_ymd_opt(2024, 1, 15),
                ..Default::default()
            }, None)
            .await
            .expect("cambio");
        assert_eq!(mismo_dia.area_nueva_id, 4);
        assert!(f
            .service
            .historial_cambios(colaborador.id)
            .await
            .expect("historial")
            .iter()
            .all(|c| c.fecha_efectiva >= colaborador.fecha_alta));
    }

    #[tokio::test]
    async fn test_alta_credit_numbers() {
        let f = setup().await;

        let mut sin_fonacot = input("AAAA900101AB1");
        sin_fonacot.tiene_fonacot = true;
        sin_fonacot.fonacot_credito = Some("   ".to_string());
        assert!(matches!(
            f.service.alta(sin_fonacot, false).await,
            Err(ColaboradorServiceError::ValidationError(_))
        ));

        let mut con_creditos = input("BBBB900101AB1");
        con_creditos.tiene_infonavit = true;
        con_creditos.infonavit_credito = Some(" 1234567890 ".to_string());
        con_creditos.tiene_fonacot = true;
        con_creditos.fonacot_credito = Some("F-99".to_string());
        let colaborador = f.service.alta(con_creditos, false).await.expect("register");
        assert!(colaborador.tiene_infonavit);
        assert_eq!(colaborador.infonavit_credito.as_deref(), Some("1234567890"));
        assert_eq!(colaborador.fonacot_credito.as_deref(), Some("F-99"));

        let mut sin_programa = input("CCCC900101AB1");
        sin_programa.tiene_infonavit = false;
        sin_programa.infonavit_credito = Some("1234567890".to_string());
        let colaborador = f.service.alta(sin_programa, false).await.expect("register");
        assert!(!colaborador.tiene_infonavit);
        assert_eq!(colaborador.infonavit_credito, None);
    }

    #[tokio::test]
    async fn test_state_changes_invalidate_dashboard_cache() {
        let f = setup().await;
        let antes = f.analytics.kpis(2024, None).await.expect("kpis");
        assert_eq!(antes.total, 0);

        let colaborador = f.service.alta(input("LOAA900101AB1"), false).await.expect("register");
        let despues = f.analytics.kpis(2024, None).await.expect("kpis");
        assert_eq!(despues.total, 1);
        assert_eq!(despues.activos, 1);

        f.service
            .baja(colaborador.id, BajaInput {
                fecha_baja: NaiveDate::from_ymd_opt(2024, 5, 1),
                motivo: "Renuncia".to_string(),
            })
            .await
            .expect("baja");
        let final_ = f.analytics.kpis(2024, None).await.expect("kpis");
        assert_eq!(final_.activos, 0);
        assert_eq!(final_.bajas_gestion, 1);
    }

    #[tokio::test]
    async fn test_listar_paginates() {
        let f = setup().await;
        for rfc in ["AAAA900101AB1", "BBBB900101AB1", "CCCC900101AB1"] {
            f.service.alta(input(rfc), false).await.expect("register");
        }

        let filtro = FiltroColaboradores {
            per_page: Some(2),
            ..Default::default()
        };
        let pagina = f.service.listar(&filtro).await.expect("list");
        assert_eq!(pagina.total, 3);
        assert_eq!(pagina.items.len(), 2);
        assert_eq!(pagina.total_pages(), 2);
    }
}
