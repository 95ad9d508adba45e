//! Catalog service
//!
//! Áreas, puestos and the simple lookup catalogs. Names are unique by their
//! normalized form, so "Dirección" and "direccion" are the same entry.

use crate::db::repositories::CatalogoRepository;
use crate::models::{normalizar_texto, Area, Catalogo, CatalogoItem, Puesto};
use crate::services::validacion;
use anyhow::Context;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Error types for catalog operations
#[derive(Debug, thiserror::Error)]
pub enum CatalogoServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Normalized name already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Every catalog the alta form needs, in one payload
#[derive(Debug, Clone, Serialize)]
pub struct Catalogos {
    pub areas: Vec<Area>,
    pub reclutadores: Vec<CatalogoItem>,
    pub bancos: Vec<CatalogoItem>,
    pub metodos_pago: Vec<CatalogoItem>,
    pub recursos_ti: Vec<CatalogoItem>,
    pub programas: Vec<CatalogoItem>,
}

pub struct CatalogoService {
    repo: Arc<dyn CatalogoRepository>,
}

impl CatalogoService {
    pub fn new(repo: Arc<dyn CatalogoRepository>) -> Self {
        Self { repo }
    }

    pub async fn listar_areas(&self) -> Result<Vec<Area>, CatalogoServiceError> {
        Ok(self.repo.list_areas().await.context("Failed to list areas")?)
    }

    pub async fn area(&self, id: i64) -> Result<Area, CatalogoServiceError> {
        self.repo
            .get_area(id)
            .await
            .context("Failed to get area")?
            .ok_or_else(|| CatalogoServiceError::NotFound(format!("Área {}", id)))
    }

    pub async fn crear_area(&self, nombre: &str) -> Result<Area, CatalogoServiceError> {
        let nombre = validar_nombre(nombre)?;
        let normalizado = normalizar_texto(&nombre);

        if self
            .repo
            .get_area_by_normalizado(&normalizado)
            .await
            .context("Failed to check area name")?
            .is_some()
        {
            return Err(CatalogoServiceError::Conflict(format!(
                "El área '{}' ya existe",
                nombre
            )));
        }

        let area = match self.repo.create_area(&nombre, &normalizado).await {
            Ok(area) => area,
            Err(e) if es_duplicado(&e) => {
                return Err(CatalogoServiceError::Conflict(format!(
                    "El área '{}' ya existe",
                    nombre
                )))
            }
            Err(e) => return Err(e.context("Failed to create area").into()),
        };
        tracing::info!(area_id = area.id, nombre = %area.nombre, "Área created");
        Ok(area)
    }

    /// Puestos of an área; the área must exist
    pub async fn puestos_por_area(&self, area_id: i64) -> Result<Vec<Puesto>, CatalogoServiceError> {
        self.area(area_id).await?;
        Ok(self
            .repo
            .list_puestos(area_id)
            .await
            .context("Failed to list puestos")?)
    }

    pub async fn puesto(&self, id: i64) -> Result<Option<Puesto>, CatalogoServiceError> {
        Ok(self.repo.get_puesto(id).await.context("Failed to get puesto")?)
    }

    pub async fn crear_puesto(&self, area_id: i64, nombre: &str) -> Result<Puesto, CatalogoServiceError> {
        let nombre = validar_nombre(nombre)?;
        let existentes = self.puestos_por_area(area_id).await?;
        let normalizado = normalizar_texto(&nombre);

        if existentes
            .iter()
            .any(|p| normalizar_texto(&p.nombre) == normalizado)
        {
            return Err(CatalogoServiceError::Conflict(format!(
                "El puesto '{}' ya existe en el área",
                nombre
            )));
        }

        let puesto = match self.repo.create_puesto(area_id, &nombre).await {
            Ok(puesto) => puesto,
            Err(e) if es_duplicado(&e) => {
                return Err(CatalogoServiceError::Conflict(format!(
                    "El puesto '{}' ya existe en el área",
                    nombre
                )))
            }
            Err(e) => return Err(e.context("Failed to create puesto").into()),
        };
        tracing::info!(puesto_id = puesto.id, area_id, "Puesto created");
        Ok(puesto)
    }

    /// Reuse a puesto of the área with the same normalized name, or create it
    pub async fn obtener_o_crear_puesto(
        &self,
        area_id: i64,
        nombre: &str,
    ) -> Result<Puesto, CatalogoServiceError> {
        let nombre = validar_nombre(nombre)?;
        let normalizado = normalizar_texto(&nombre);
        let existente = self
            .puestos_por_area(area_id)
            .await?
            .into_iter()
            .find(|p| normalizar_texto(&p.nombre) == normalizado);

        if let Some(puesto) = existente {
            return Ok(puesto);
        }

        match self.repo.create_puesto(area_id, &nombre).await {
            Ok(puesto) => Ok(puesto),
            // Created concurrently under the same name
            Err(e) if es_duplicado(&e) => self
                .puestos_por_area(area_id)
                .await?
                .into_iter()
                .find(|p| normalizar_texto(&p.nombre) == normalizado)
                .ok_or_else(|| e.context("Failed to create puesto").into()),
            Err(e) => Err(e.context("Failed to create puesto").into()),
        }
    }

    pub async fn listar(&self, catalogo: Catalogo) -> Result<Vec<CatalogoItem>, CatalogoServiceError> {
        Ok(self
            .repo
            .list_items(catalogo)
            .await
            .with_context(|| format!("Failed to list {}", catalogo))?)
    }

    pub async fn item(
        &self,
        catalogo: Catalogo,
        id: i64,
    ) -> Result<Option<CatalogoItem>, CatalogoServiceError> {
        Ok(self
            .repo
            .get_item(catalogo, id)
            .await
            .with_context(|| format!("Failed to get {} item", catalogo))?)
    }

    pub async fn crear_item(
        &self,
        catalogo: Catalogo,
        nombre: &str,
    ) -> Result<CatalogoItem, CatalogoServiceError> {
        let nombre = validar_nombre(nombre)?;
        let normalizado = normalizar_texto(&nombre);

        if self
            .repo
            .get_item_by_normalizado(catalogo, &normalizado)
            .await
            .with_context(|| format!("Failed to check {} name", catalogo))?
            .is_some()
        {
            return Err(CatalogoServiceError::Conflict(format!(
                "{} '{}' ya existe",
                catalogo.etiqueta(),
                nombre
            )));
        }

        let item = match self.repo.create_item(catalogo, &nombre, &normalizado).await {
            Ok(item) => item,
            Err(e) if es_duplicado(&e) => {
                return Err(CatalogoServiceError::Conflict(format!(
                    "{} '{}' ya existe",
                    catalogo.etiqueta(),
                    nombre
                )))
            }
            Err(e) => {
                return Err(e
                    .context(format!("Failed to create {} item", catalogo))
                    .into())
            }
        };
        tracing::info!(catalogo = %catalogo, id = item.id, "Catalog item created");
        Ok(item)
    }

    /// Reuse the entry with the same normalized name, or create it.
    ///
    /// Used by the alta form when a free-text bank name is sent.
    pub async fn obtener_o_crear(
        &self,
        catalogo: Catalogo,
        nombre: &str,
    ) -> Result<CatalogoItem, CatalogoServiceError> {
        let nombre = validar_nombre(nombre)?;
        let normalizado = normalizar_texto(&nombre);

        if let Some(item) = self
            .repo
            .get_item_by_normalizado(catalogo, &normalizado)
            .await
            .with_context(|| format!("Failed to look up {} item", catalogo))?
        {
            return Ok(item);
        }

        match self.repo.create_item(catalogo, &nombre, &normalizado).await {
            Ok(item) => Ok(item),
            // Created concurrently under the same normalized name
            Err(e) if es_duplicado(&e) => self
                .repo
                .get_item_by_normalizado(catalogo, &normalizado)
                .await
                .with_context(|| format!("Failed to look up {} item", catalogo))?
                .ok_or_else(|| e.context(format!("Failed to create {} item", catalogo)).into()),
            Err(e) => Err(e
                .context(format!("Failed to create {} item", catalogo))
                .into()),
        }
    }

    /// Accent- and case-insensitive substring search over reclutadores
    pub async fn buscar_reclutador(&self, nombre: &str) -> Result<Vec<CatalogoItem>, CatalogoServiceError> {
        let buscado = normalizar_texto(nombre);
        let reclutadores = self.listar(Catalogo::Reclutadores).await?;
        if buscado.is_empty() {
            return Ok(reclutadores);
        }
        Ok(reclutadores
            .into_iter()
            .filter(|r| normalizar_texto(&r.nombre).contains(&buscado))
            .collect())
    }

    /// True when the área exists and is a sales department
    pub async fn es_comercial(&self, area_id: i64) -> Result<bool, CatalogoServiceError> {
        Ok(self.area(area_id).await?.es_comercial())
    }

    /// Áreas plus every simple catalog
    pub async fn todos(&self) -> Result<Catalogos, CatalogoServiceError> {
        let areas = self.listar_areas().await?;
        let mut items: HashMap<Catalogo, Vec<CatalogoItem>> = HashMap::new();
        for catalogo in Catalogo::ALL {
            items.insert(catalogo, self.listar(catalogo).await?);
        }
        let mut take = |catalogo: Catalogo| items.remove(&catalogo).unwrap_or_default();

        Ok(Catalogos {
            areas,
            reclutadores: take(Catalogo::Reclutadores),
            bancos: take(Catalogo::Bancos),
            metodos_pago: take(Catalogo::MetodosPago),
            recursos_ti: take(Catalogo::RecursosTi),
            programas: take(Catalogo::Programas),
        })
    }
}

fn validar_nombre(nombre: &str) -> Result<String, CatalogoServiceError> {
    validacion::texto_requerido("nombre", nombre).map_err(CatalogoServiceError::ValidationError)
}

/// True when the insert lost against a unique index
fn es_duplicado(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db)) if db.is_unique_violation()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxCatalogoRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_service() -> CatalogoService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        CatalogoService::new(SqlxCatalogoRepository::boxed(pool))
    }

    #[tokio::test]
    async fn test_seeded_areas() {
        let service = setup_test_service().await;
        let areas = service.listar_areas().await.expect("list");
        assert_eq!(areas.len(), 6);
        assert!(service.es_comercial(2).await.expect("area"));
        assert!(!service.es_comercial(3).await.expect("area"));
    }

    #[tokio::test]
    async fn test_crear_area_conflict_on_normalized_name() {
        let service = setup_test_service().await;
        let area = service.crear_area("Logística").await.expect("create");
        assert_eq!(area.nombre, "Logística");

        let result = service.crear_area("  LOGISTICA ").await;
        assert!(matches!(result, Err(CatalogoServiceError::Conflict(_))));

        let result = service.crear_area("   ").await;
        assert!(matches!(result, Err(CatalogoServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_crear_area_conflict_on_decomposed_accents() {
        let service = setup_test_service().await;
        for nombre in ["Operacio\u{301}nes", "Administracio\u{301}n"] {
            let result = service.crear_area(nombre).await;
            assert!(matches!(result, Err(CatalogoServiceError::Conflict(_))), "{}", nombre);
        }
        assert_eq!(service.listar_areas().await.expect("list").len(), 6);
    }

    #[tokio::test]
    async fn test_unique_violation_detected() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxCatalogoRepository::boxed(pool);

        // Lost race: the row appeared after the existence check
        let err = repo
            .create_area("Operaciones", "operaciones")
            .await
            .expect_err("duplicate");
        assert!(es_duplicado(&err));
        repo.create_item(Catalogo::Bancos, "Otro", "otro")
            .await
            .expect("create");
        let err = repo
            .create_item(Catalogo::Bancos, "OTRO", "otro")
            .await
            .expect_err("duplicate");
        assert!(es_duplicado(&err));

        assert!(!es_duplicado(&anyhow::anyhow!("connection reset")));
    }

    #[tokio::test]
    async fn test_puestos_por_area() {
        let service = setup_test_service().await;
        let puestos = service.puestos_por_area(3).await.expect("list");
        assert!(puestos.iter().any(|p| p.nombre == "Desarrollador"));
        assert!(puestos.iter().all(|p| p.area_id == 3));

        let result = service.puestos_por_area(999).await;
        assert!(matches!(result, Err(CatalogoServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_crear_puesto_and_reuse() {
        let service = setup_test_service().await;
        let puesto = service.crear_puesto(2, "Ejecutivo de Ventas").await.expect("create");
        let reused = service
            .obtener_o_crear_puesto(2, "ejecutivo de ventas")
            .await
            .expect("reuse");
        assert_eq!(puesto.id, reused.id);

        let result = service.crear_puesto(2, "EJECUTIVO DE VENTAS").await;
        assert!(matches!(result, Err(CatalogoServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_obtener_o_crear_banco() {
        let service = setup_test_service().await;
        let antes = service.listar(Catalogo::Bancos).await.expect("list").len();

        let nuevo = service
            .obtener_o_crear(Catalogo::Bancos, "Banco Regional")
            .await
            .expect("create");
        let mismo = service
            .obtener_o_crear(Catalogo::Bancos, "banco   regional")
            .await
            .expect("reuse");
        assert_eq!(nuevo.id, mismo.id);
        assert_eq!(service.listar(Catalogo::Bancos).await.expect("list").len(), antes + 1);
    }

    #[tokio::test]
    async fn test_buscar_reclutador() {
        let service = setup_test_service().await;
        service
            .crear_item(Catalogo::Reclutadores, "María Pérez")
            .await
            .expect("create");
        service
            .crear_item(Catalogo::Reclutadores, "José Martínez")
            .await
            .expect("create");

        let found = service.buscar_reclutador("PEREZ").await.expect("search");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].nombre, "María Pérez");

        let all = service.buscar_reclutador("").await.expect("search");
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_todos() {
        let service = setup_test_service().await;
        let catalogos = service.todos().await.expect("catalogs");
        assert_eq!(catalogos.areas.len(), 6);
        assert_eq!(catalogos.metodos_pago.len(), 3);
        assert!(catalogos.recursos_ti.iter().any(|r| r.nombre == "Laptop"));
        assert!(catalogos.reclutadores.is_empty());
    }
}
