//! Catalog repository
//!
//! Áreas, puestos and the simple `{id, nombre, nombre_normalizado}` catalogs.
//! Table names come from [`Catalogo::table`], never from user input.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Area, Catalogo, CatalogoItem, Puesto};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Catalog repository trait
#[async_trait]
pub trait CatalogoRepository: Send + Sync {
    async fn list_areas(&self) -> Result<Vec<Area>>;

    async fn get_area(&self, id: i64) -> Result<Option<Area>>;

    async fn get_area_by_normalizado(&self, normalizado: &str) -> Result<Option<Area>>;

    async fn create_area(&self, nombre: &str, normalizado: &str) -> Result<Area>;

    /// Puestos of one área ordered by nombre
    async fn list_puestos(&self, area_id: i64) -> Result<Vec<Puesto>>;

    async fn get_puesto(&self, id: i64) -> Result<Option<Puesto>>;

    async fn create_puesto(&self, area_id: i64, nombre: &str) -> Result<Puesto>;

    async fn list_items(&self, catalogo: Catalogo) -> Result<Vec<CatalogoItem>>;

    async fn get_item(&self, catalogo: Catalogo, id: i64) -> Result<Option<CatalogoItem>>;

    async fn get_item_by_normalizado(
        &self,
        catalogo: Catalogo,
        normalizado: &str,
    ) -> Result<Option<CatalogoItem>>;

    async fn create_item(
        &self,
        catalogo: Catalogo,
        nombre: &str,
        normalizado: &str,
    ) -> Result<CatalogoItem>;
}

/// SQLx-based catalog repository implementation
pub struct SqlxCatalogoRepository {
    pool: DynDatabasePool,
}

impl SqlxCatalogoRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CatalogoRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CatalogoRepository for SqlxCatalogoRepository {
    async fn list_areas(&self) -> Result<Vec<Area>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => list_areas_sqlite(p).await,
            Backend::Mysql(p) => list_areas_mysql(p).await,
        }
    }

    async fn get_area(&self, id: i64) -> Result<Option<Area>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_area_sqlite(p, id).await,
            Backend::Mysql(p) => get_area_mysql(p, id).await,
        }
    }

    async fn get_area_by_normalizado(&self, normalizado: &str) -> Result<Option<Area>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_area_by_normalizado_sqlite(p, normalizado).await,
            Backend::Mysql(p) => get_area_by_normalizado_mysql(p, normalizado).await,
        }
    }

    async fn create_area(&self, nombre: &str, normalizado: &str) -> Result<Area> {
        let id = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(
                "INSERT INTO areas (nombre, nombre_normalizado) VALUES (?, ?)",
            )
            .bind(nombre)
            .bind(normalizado)
            .execute(p)
            .await
            .context("Failed to create area")?
            .last_insert_rowid(),
            Backend::Mysql(p) => sqlx::query(
                "INSERT INTO areas (nombre, nombre_normalizado) VALUES (?, ?)",
            )
            .bind(nombre)
            .bind(normalizado)
            .execute(p)
            .await
            .context("Failed to create area")?
            .last_insert_id() as i64,
        };

        Ok(Area {
            id,
            nombre: nombre.to_string(),
            nombre_normalizado: normalizado.to_string(),
        })
    }

    async fn list_puestos(&self, area_id: i64) -> Result<Vec<Puesto>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => list_puestos_sqlite(p, area_id).await,
            Backend::Mysql(p) => list_puestos_mysql(p, area_id).await,
        }
    }

    async fn get_puesto(&self, id: i64) -> Result<Option<Puesto>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_puesto_sqlite(p, id).await,
            Backend::Mysql(p) => get_puesto_mysql(p, id).await,
        }
    }

    async fn create_puesto(&self, area_id: i64, nombre: &str) -> Result<Puesto> {
        let id = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query("INSERT INTO puestos (nombre, area_id) VALUES (?, ?)")
                .bind(nombre)
                .bind(area_id)
                .execute(p)
                .await
                .context("Failed to create puesto")?
                .last_insert_rowid(),
            Backend::Mysql(p) => sqlx::query("INSERT INTO puestos (nombre, area_id) VALUES (?, ?)")
                .bind(nombre)
                .bind(area_id)
                .execute(p)
                .await
                .context("Failed to create puesto")?
                .last_insert_id() as i64,
        };

        Ok(Puesto {
            id,
            nombre: nombre.to_string(),
            area_id,
        })
    }

    async fn list_items(&self, catalogo: Catalogo) -> Result<Vec<CatalogoItem>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => list_items_sqlite(p, catalogo).await,
            Backend::Mysql(p) => list_items_mysql(p, catalogo).await,
        }
    }

    async fn get_item(&self, catalogo: Catalogo, id: i64) -> Result<Option<CatalogoItem>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_item_sqlite(p, catalogo, id).await,
            Backend::Mysql(p) => get_item_mysql(p, catalogo, id).await,
        }
    }

    async fn get_item_by_normalizado(
        &self,
        catalogo: Catalogo,
        normalizado: &str,
    ) -> Result<Option<CatalogoItem>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_item_by_normalizado_sqlite(p, catalogo, normalizado).await,
            Backend::Mysql(p) => get_item_by_normalizado_mysql(p, catalogo, normalizado).await,
        }
    }

    async fn create_item(
        &self,
        catalogo: Catalogo,
        nombre: &str,
        normalizado: &str,
    ) -> Result<CatalogoItem> {
        let sql = format!(
            "INSERT INTO {} (nombre, nombre_normalizado) VALUES (?, ?)",
            catalogo.table()
        );
        let id = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(&sql)
                .bind(nombre)
                .bind(normalizado)
                .execute(p)
                .await
                .with_context(|| format!("Failed to create {} item", catalogo))?
                .last_insert_rowid(),
            Backend::Mysql(p) => sqlx::query(&sql)
                .bind(nombre)
                .bind(normalizado)
                .execute(p)
                .await
                .with_context(|| format!("Failed to create {} item", catalogo))?
                .last_insert_id() as i64,
        };

        Ok(CatalogoItem {
            id,
            nombre: nombre.to_string(),
        })
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_areas_sqlite(pool: &SqlitePool) -> Result<Vec<Area>> {
    let rows = sqlx::query("SELECT id, nombre, nombre_normalizado FROM areas ORDER BY nombre")
        .fetch_all(pool)
        .await
        .context("Failed to list areas")?;

    Ok(rows.iter().map(row_to_area_sqlite).collect())
}

async fn get_area_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Area>> {
    let row = sqlx::query("SELECT id, nombre, nombre_normalizado FROM areas WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get area")?;

    Ok(row.as_ref().map(row_to_area_sqlite))
}

async fn get_area_by_normalizado_sqlite(
    pool: &SqlitePool,
    normalizado: &str,
) -> Result<Option<Area>> {
    let row = sqlx::query(
        "SELECT id, nombre, nombre_normalizado FROM areas WHERE nombre_normalizado = ?",
    )
    .bind(normalizado)
    .fetch_optional(pool)
    .await
    .context("Failed to get area by name")?;

    Ok(row.as_ref().map(row_to_area_sqlite))
}

fn row_to_area_sqlite(row: &sqlx::sqlite::SqliteRow) -> Area {
    Area {
        id: row.get("id"),
        nombre: row.get("nombre"),
        nombre_normalizado: row.get("nombre_normalizado"),
    }
}

async fn list_puestos_sqlite(pool: &SqlitePool, area_id: i64) -> Result<Vec<Puesto>> {
    let rows = sqlx::query("SELECT id, nombre, area_id FROM puestos WHERE area_id = ? ORDER BY nombre")
        .bind(area_id)
        .fetch_all(pool)
        .await
        .context("Failed to list puestos")?;

    Ok(rows
        .iter()
        .map(|row| Puesto {
            id: row.get("id"),
            nombre: row.get("nombre"),
            area_id: row.get("area_id"),
        })
        .collect())
}

async fn get_puesto_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Puesto>> {
    let row = sqlx::query("SELECT id, nombre, area_id FROM puestos WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get puesto")?;

    Ok(row.map(|row| Puesto {
        id: row.get("id"),
        nombre: row.get("nombre"),
        area_id: row.get("area_id"),
    }))
}

async fn list_items_sqlite(pool: &SqlitePool, catalogo: Catalogo) -> Result<Vec<CatalogoItem>> {
    let sql = format!("SELECT id, nombre FROM {} ORDER BY nombre", catalogo.table());
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to list {}", catalogo))?;

    Ok(rows
        .iter()
        .map(|row| CatalogoItem {
            id: row.get("id"),
            nombre: row.get("nombre"),
        })
        .collect())
}

async fn get_item_sqlite(
    pool: &SqlitePool,
    catalogo: Catalogo,
    id: i64,
) -> Result<Option<CatalogoItem>> {
    let sql = format!("SELECT id, nombre FROM {} WHERE id = ?", catalogo.table());
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get {} item", catalogo))?;

    Ok(row.map(|row| CatalogoItem {
        id: row.get("id"),
        nombre: row.get("nombre"),
    }))
}

async fn get_item_by_normalizado_sqlite(
    pool: &SqlitePool,
    catalogo: Catalogo,
    normalizado: &str,
) -> Result<Option<CatalogoItem>> {
    let sql = format!(
        "SELECT id, nombre FROM {} WHERE nombre_normalizado = ?",
        catalogo.table()
    );
    let row = sqlx::query(&sql)
        .bind(normalizado)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get {} item by name", catalogo))?;

    Ok(row.map(|row| CatalogoItem {
        id: row.get("id"),
        nombre: row.get("nombre"),
    }))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_areas_mysql(pool: &MySqlPool) -> Result<Vec<Area>> {
    let rows = sqlx::query("SELECT id, nombre, nombre_normalizado FROM areas ORDER BY nombre")
        .fetch_all(pool)
        .await
        .context("Failed to list areas")?;

    Ok(rows.iter().map(row_to_area_mysql).collect())
}

async fn get_area_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Area>> {
    let row = sqlx::query("SELECT id, nombre, nombre_normalizado FROM areas WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get area")?;

    Ok(row.as_ref().map(row_to_area_mysql))
}

async fn get_area_by_normalizado_mysql(
    pool: &MySqlPool,
    normalizado: &str,
) -> Result<Option<Area>> {
    let row = sqlx::query(
        "SELECT id, nombre, nombre_normalizado FROM areas WHERE nombre_normalizado = ?",
    )
    .bind(normalizado)
    .fetch_optional(pool)
    .await
    .context("Failed to get area by name")?;

    Ok(row.as_ref().map(row_to_area_mysql))
}

fn row_to_area_mysql(row: &sqlx::mysql::MySqlRow) -> Area {
    Area {
        id: row.get("id"),
        nombre: row.get("nombre"),
        nombre_normalizado: row.get("nombre_normalizado"),
    }
}

async fn list_puestos_mysql(pool: &MySqlPool, area_id: i64) -> Result<Vec<Puesto>> {
    let rows = sqlx::query("SELECT id, nombre, area_id FROM puestos WHERE area_id = ? ORDER BY nombre")
        .bind(area_id)
        .fetch_all(pool)
        .await
        .context("Failed to list puestos")?;

    Ok(rows
        .iter()
        .map(|row| Puesto {
            id: row.get("id"),
            nombre: row.get("nombre"),
            area_id: row.get("area_id"),
        })
        .collect())
}

async fn get_puesto_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Puesto>> {
    let row = sqlx::query("SELECT id, nombre, area_id FROM puestos WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get puesto")?;

    Ok(row.map(|row| Puesto {
        id: row.get("id"),
        nombre: row.get("nombre"),
        area_id: row.get("area_id"),
    }))
}

async fn list_items_mysql(pool: &MySqlPool, catalogo: Catalogo) -> Result<Vec<CatalogoItem>> {
    let sql = format!("SELECT id, nombre FROM {} ORDER BY nombre", catalogo.table());
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to list {}", catalogo))?;

    Ok(rows
        .iter()
        .map(|row| CatalogoItem {
            id: row.get("id"),
            nombre: row.get("nombre"),
        })
        .collect())
}

async fn get_item_mysql(
    pool: &MySqlPool,
    catalogo: Catalogo,
    id: i64,
) -> Result<Option<CatalogoItem>> {
    let sql = format!("SELECT id, nombre FROM {} WHERE id = ?", catalogo.table());
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get {} item", catalogo))?;

    Ok(row.map(|row| CatalogoItem {
        id: row.get("id"),
        nombre: row.get("nombre"),
    }))
}

async fn get_item_by_normalizado_mysql(
    pool: &MySqlPool,
    catalogo: Catalogo,
    normalizado: &str,
) -> Result<Option<CatalogoItem>> {
    let sql = format!(
        "SELECT id, nombre FROM {} WHERE nombre_normalizado = ?",
        catalogo.table()
    );
    let row = sqlx::query(&sql)
        .bind(normalizado)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get {} item by name", catalogo))?;

    Ok(row.map(|row| CatalogoItem {
        id: row.get("id"),
        nombre: row.get("nombre"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxCatalogoRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxCatalogoRepository::new(pool)
    }

    #[tokio::test]
    async fn test_seeded_areas() {
        let repo = setup_test_repo().await;
        let areas = repo.list_areas().await.expect("Failed to list areas");
        assert_eq!(areas.len(), 6);

        let comercial = repo
            .get_area_by_normalizado("comercial")
            .await
            .expect("query")
            .expect("Comercial seeded");
        assert_eq!(comercial.id, 2);
        assert!(comercial.es_comercial());
    }

    #[tokio::test]
    async fn test_create_area_and_puesto() {
        let repo = setup_test_repo().await;

        let area = repo
            .create_area("Logística", "logistica")
            .await
            .expect("Failed to create area");
        let puesto = repo
            .create_puesto(area.id, "Almacenista")
            .await
            .expect("Failed to create puesto");

        let puestos = repo.list_puestos(area.id).await.expect("list");
        assert_eq!(puestos, vec![puesto.clone()]);
        assert_eq!(
            repo.get_puesto(puesto.id).await.expect("get"),
            Some(puesto)
        );

        assert!(repo.create_area("Logistica", "logistica").await.is_err());
    }

    #[tokio::test]
    async fn test_items_per_catalog() {
        let repo = setup_test_repo().await;

        let bancos = repo.list_items(Catalogo::Bancos).await.expect("list");
        assert_eq!(bancos.len(), 8);
        assert!(repo
            .list_items(Catalogo::Reclutadores)
            .await
            .expect("list")
            .is_empty());

        let item = repo
            .create_item(Catalogo::Reclutadores, "María Pérez", "maria perez")
            .await
            .expect("Failed to create item");
        assert_eq!(
            repo.get_item(Catalogo::Reclutadores, item.id)
                .await
                .expect("get"),
            Some(item.clone())
        );
        assert_eq!(
            repo.get_item_by_normalizado(Catalogo::Reclutadores, "maria perez")
                .await
                .expect("get"),
            Some(item)
        );
        assert!(repo
            .get_item(Catalogo::Programas, 999)
            .await
            .expect("get")
            .is_none());
    }
}
