//! Documento repository
//!
//! Metadata of files uploaded for collaborators. The files themselves live
//! under the upload root and are handled by the documento service.

use crate::db::{Backend, DynDatabasePool};
use crate::models::Documento;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Documento repository trait
#[async_trait]
pub trait DocumentoRepository: Send + Sync {
    async fn create(&self, documento: &Documento) -> Result<Documento>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Documento>>;

    /// Documents of one collaborator, oldest first
    async fn list_by_colaborador(&self, colaborador_id: i64) -> Result<Vec<Documento>>;

    async fn delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based documento repository implementation
pub struct SqlxDocumentoRepository {
    pool: DynDatabasePool,
}

impl SqlxDocumentoRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn DocumentoRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl DocumentoRepository for SqlxDocumentoRepository {
    async fn create(&self, documento: &Documento) -> Result<Documento> {
        match self.pool.backend() {
            Backend::Sqlite(p) => create_documento_sqlite(p, documento).await,
            Backend::Mysql(p) => create_documento_mysql(p, documento).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Documento>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_documento_sqlite(p, id).await,
            Backend::Mysql(p) => get_documento_mysql(p, id).await,
        }
    }

    async fn list_by_colaborador(&self, colaborador_id: i64) -> Result<Vec<Documento>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => list_documentos_sqlite(p, colaborador_id).await,
            Backend::Mysql(p) => list_documentos_mysql(p, colaborador_id).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query("DELETE FROM documentos WHERE id = ?")
                    .bind(id)
                    .execute(p)
                    .await
                    .context("Failed to delete documento")?;
            }
            Backend::Mysql(p) => {
                sqlx::query("DELETE FROM documentos WHERE id = ?")
                    .bind(id)
                    .execute(p)
                    .await
                    .context("Failed to delete documento")?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_documento_sqlite(pool: &SqlitePool, documento: &Documento) -> Result<Documento> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO documentos (colaborador_id, nombre_archivo, ruta_archivo, tipo, tamano, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(documento.colaborador_id)
    .bind(&documento.nombre_archivo)
    .bind(&documento.ruta_archivo)
    .bind(&documento.tipo)
    .bind(documento.tamano)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create documento")?;

    Ok(Documento {
        id: result.last_insert_rowid(),
        created_at: now,
        ..documento.clone()
    })
}

async fn get_documento_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Documento>> {
    let row = sqlx::query(
        r#"
        SELECT id, colaborador_id, nombre_archivo, ruta_archivo, tipo, tamano, created_at
        FROM documentos
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get documento")?;

    Ok(row.as_ref().map(row_to_documento_sqlite))
}

async fn list_documentos_sqlite(pool: &SqlitePool, colaborador_id: i64) -> Result<Vec<Documento>> {
    let rows = sqlx::query(
        r#"
        SELECT id, colaborador_id, nombre_archivo, ruta_archivo, tipo, tamano, created_at
        FROM documentos
        WHERE colaborador_id = ?
        ORDER BY created_at, id
        "#,
    )
    .bind(colaborador_id)
    .fetch_all(pool)
    .await
    .context("Failed to list documentos")?;

    Ok(rows.iter().map(row_to_documento_sqlite).collect())
}

fn row_to_documento_sqlite(row: &sqlx::sqlite::SqliteRow) -> Documento {
    Documento {
        id: row.get("id"),
        colaborador_id: row.get("colaborador_id"),
        nombre_archivo: row.get("nombre_archivo"),
        ruta_archivo: row.get("ruta_archivo"),
        tipo: row.get("tipo"),
        tamano: row.get("tamano"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_documento_mysql(pool: &MySqlPool, documento: &Documento) -> Result<Documento> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO documentos (colaborador_id, nombre_archivo, ruta_archivo, tipo, tamano, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(documento.colaborador_id)
    .bind(&documento.nombre_archivo)
    .bind(&documento.ruta_archivo)
    .bind(&documento.tipo)
    .bind(documento.tamano)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create documento")?;

    Ok(Documento {
        id: result.last_insert_id() as i64,
        created_at: now,
        ..documento.clone()
    })
}

async fn get_documento_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Documento>> {
    let row = sqlx::query(
        r#"
        SELECT id, colaborador_id, nombre_archivo, ruta_archivo, tipo, tamano, created_at
        FROM documentos
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get documento")?;

    Ok(row.as_ref().map(row_to_documento_mysql))
}

async fn list_documentos_mysql(pool: &MySqlPool, colaborador_id: i64) -> Result<Vec<Documento>> {
    let rows = sqlx::query(
        r#"
        SELECT id, colaborador_id, nombre_archivo, ruta_archivo, tipo, tamano, created_at
        FROM documentos
        WHERE colaborador_id = ?
        ORDER BY created_at, id
        "#,
    )
    .bind(colaborador_id)
    .fetch_all(pool)
    .await
    .context("Failed to list documentos")?;

    Ok(rows.iter().map(row_to_documento_mysql).collect())
}

fn row_to_documento_mysql(row: &sqlx::mysql::MySqlRow) -> Documento {
    Documento {
        id: row.get("id"),
        colaborador_id: row.get("colaborador_id"),
        nombre_archivo: row.get("nombre_archivo"),
        ruta_archivo: row.get("ruta_archivo"),
        tipo: row.get("tipo"),
        tamano: row.get("tamano"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxDocumentoRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool.execute(
            "INSERT INTO colaboradores (id, nombre, apellido, rfc, fecha_alta, area_id) \
             VALUES (1, 'Ana', 'López', 'LOAA900101AB1', '2024-01-15', 3)",
        )
        .await
        .expect("Failed to create colaborador");
        SqlxDocumentoRepository::new(pool)
    }

    fn documento(nombre: &str) -> Documento {
        Documento {
            id: 0,
            colaborador_id: 1,
            nombre_archivo: nombre.to_string(),
            ruta_archivo: format!("colaborador_1/{}", nombre),
            tipo: "INE".to_string(),
            tamano: 1024,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_list_delete() {
        let repo = setup_test_repo().await;

        let a = repo.create(&documento("ine.pdf")).await.expect("create");
        let b = repo.create(&documento("curp.pdf")).await.expect("create");
        assert!(b.id > a.id);

        let docs = repo.list_by_colaborador(1).await.expect("list");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].nombre_archivo, "ine.pdf");

        let found = repo.get_by_id(a.id).await.expect("get").expect("row");
        assert_eq!(found.ruta_archivo, "colaborador_1/ine.pdf");
        assert_eq!(found.tamano, 1024);

        repo.delete(a.id).await.expect("delete");
        assert!(repo.get_by_id(a.id).await.expect("get").is_none());
        assert!(repo.list_by_colaborador(2).await.expect("list").is_empty());
    }
}
