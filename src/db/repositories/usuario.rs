//! Usuario repository
//!
//! Database operations for internal users.
//!
//! This module provides:
//! - `UsuarioRepository` trait defining the interface for usuario data access
//! - `SqlxUsuarioRepository` implementing the trait for SQLite and MySQL

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Rol, Usuario};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

const USUARIO_COLUMNS: &str =
    "id, correo, nombre, password_hash, area_id, rol, activo, created_at, updated_at";

/// Usuario repository trait
#[async_trait]
pub trait UsuarioRepository: Send + Sync {
    /// Create a new usuario
    async fn create(&self, usuario: &Usuario) -> Result<Usuario>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Usuario>>;

    /// Get usuario by correo (expects a lowercase correo)
    async fn get_by_correo(&self, correo: &str) -> Result<Option<Usuario>>;

    /// Update nombre, password hash, área, rol and activo
    async fn update(&self, usuario: &Usuario) -> Result<Usuario>;

    /// List every usuario ordered by correo
    async fn list(&self) -> Result<Vec<Usuario>>;

    async fn count(&self) -> Result<i64>;
}

/// SQLx-based usuario repository implementation
pub struct SqlxUsuarioRepository {
    pool: DynDatabasePool,
}

impl SqlxUsuarioRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UsuarioRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UsuarioRepository for SqlxUsuarioRepository {
    async fn create(&self, usuario: &Usuario) -> Result<Usuario> {
        match self.pool.backend() {
            Backend::Sqlite(p) => create_usuario_sqlite(p, usuario).await,
            Backend::Mysql(p) => create_usuario_mysql(p, usuario).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Usuario>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_usuario_by_id_sqlite(p, id).await,
            Backend::Mysql(p) => get_usuario_by_id_mysql(p, id).await,
        }
    }

    async fn get_by_correo(&self, correo: &str) -> Result<Option<Usuario>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_usuario_by_correo_sqlite(p, correo).await,
            Backend::Mysql(p) => get_usuario_by_correo_mysql(p, correo).await,
        }
    }

    async fn update(&self, usuario: &Usuario) -> Result<Usuario> {
        match self.pool.backend() {
            Backend::Sqlite(p) => update_usuario_sqlite(p, usuario).await,
            Backend::Mysql(p) => update_usuario_mysql(p, usuario).await,
        }
    }

    async fn list(&self) -> Result<Vec<Usuario>> {
        let sql = format!("SELECT {} FROM usuarios ORDER BY correo", USUARIO_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let rows = sqlx::query(&sql)
                    .fetch_all(p)
                    .await
                    .context("Failed to list usuarios")?;
                rows.iter().map(row_to_usuario_sqlite).collect()
            }
            Backend::Mysql(p) => {
                let rows = sqlx::query(&sql)
                    .fetch_all(p)
                    .await
                    .context("Failed to list usuarios")?;
                rows.iter().map(row_to_usuario_mysql).collect()
            }
        }
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query_scalar("SELECT COUNT(*) FROM usuarios")
                .fetch_one(p)
                .await
                .context("Failed to count usuarios")?,
            Backend::Mysql(p) => sqlx::query_scalar("SELECT COUNT(*) FROM usuarios")
                .fetch_one(p)
                .await
                .context("Failed to count usuarios")?,
        };
        Ok(count)
    }
}

fn parse_rol(rol: &str) -> Result<Rol> {
    Rol::from_str(rol).with_context(|| format!("Invalid role in database: {}", rol))
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_usuario_sqlite(pool: &SqlitePool, usuario: &Usuario) -> Result<Usuario> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO usuarios (correo, nombre, password_hash, area_id, rol, activo, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&usuario.correo)
    .bind(&usuario.nombre)
    .bind(&usuario.password_hash)
    .bind(usuario.area_id)
    .bind(usuario.rol.to_string())
    .bind(usuario.activo)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create usuario")?;

    Ok(Usuario {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..usuario.clone()
    })
}

async fn get_usuario_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Usuario>> {
    let sql = format!("SELECT {} FROM usuarios WHERE id = ?", USUARIO_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get usuario by ID")?;

    row.as_ref().map(row_to_usuario_sqlite).transpose()
}

async fn get_usuario_by_correo_sqlite(pool: &SqlitePool, correo: &str) -> Result<Option<Usuario>> {
    let sql = format!("SELECT {} FROM usuarios WHERE correo = ?", USUARIO_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(correo)
        .fetch_optional(pool)
        .await
        .context("Failed to get usuario by correo")?;

    row.as_ref().map(row_to_usuario_sqlite).transpose()
}

async fn update_usuario_sqlite(pool: &SqlitePool, usuario: &Usuario) -> Result<Usuario> {
    sqlx::query(
        r#"
        UPDATE usuarios
        SET nombre = ?, password_hash = ?, area_id = ?, rol = ?, activo = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&usuario.nombre)
    .bind(&usuario.password_hash)
    .bind(usuario.area_id)
    .bind(usuario.rol.to_string())
    .bind(usuario.activo)
    .bind(Utc::now())
    .bind(usuario.id)
    .execute(pool)
    .await
    .context("Failed to update usuario")?;

    get_usuario_by_id_sqlite(pool, usuario.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Usuario not found after update"))
}

fn row_to_usuario_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Usuario> {
    let rol: String = row.get("rol");
    Ok(Usuario {
        id: row.get("id"),
        correo: row.get("correo"),
        nombre: row.get("nombre"),
        password_hash: row.get("password_hash"),
        area_id: row.get("area_id"),
        rol: parse_rol(&rol)?,
        activo: row.get("activo"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_usuario_mysql(pool: &MySqlPool, usuario: &Usuario) -> Result<Usuario> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO usuarios (correo, nombre, password_hash, area_id, rol, activo, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&usuario.correo)
    .bind(&usuario.nombre)
    .bind(&usuario.password_hash)
    .bind(usuario.area_id)
    .bind(usuario.rol.to_string())
    .bind(usuario.activo)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create usuario")?;

    Ok(Usuario {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..usuario.clone()
    })
}

async fn get_usuario_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Usuario>> {
    let sql = format!("SELECT {} FROM usuarios WHERE id = ?", USUARIO_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get usuario by ID")?;

    row.as_ref().map(row_to_usuario_mysql).transpose()
}

async fn get_usuario_by_correo_mysql(pool: &MySqlPool, correo: &str) -> Result<Option<Usuario>> {
    let sql = format!("SELECT {} FROM usuarios WHERE correo = ?", USUARIO_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(correo)
        .fetch_optional(pool)
        .await
        .context("Failed to get usuario by correo")?;

    row.as_ref().map(row_to_usuario_mysql).transpose()
}

async fn update_usuario_mysql(pool: &MySqlPool, usuario: &Usuario) -> Result<Usuario> {
    sqlx::query(
        r#"
        UPDATE usuarios
        SET nombre = ?, password_hash = ?, area_id = ?, rol = ?, activo = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&usuario.nombre)
    .bind(&usuario.password_hash)
    .bind(usuario.area_id)
    .bind(usuario.rol.to_string())
    .bind(usuario.activo)
    .bind(Utc::now())
    .bind(usuario.id)
    .execute(pool)
    .await
    .context("Failed to update usuario")?;

    get_usuario_by_id_mysql(pool, usuario.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Usuario not found after update"))
}

fn row_to_usuario_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Usuario> {
    let rol: String = row.get("rol");
    Ok(Usuario {
        id: row.get("id"),
        correo: row.get("correo"),
        nombre: row.get("nombre"),
        password_hash: row.get("password_hash"),
        area_id: row.get("area_id"),
        rol: parse_rol(&rol)?,
        activo: row.get("activo"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxUsuarioRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxUsuarioRepository::new(pool)
    }

    fn usuario(correo: &str, rol: Rol) -> Usuario {
        let now = Utc::now();
        Usuario {
            id: 0,
            correo: correo.to_string(),
            nombre: "Prueba".to_string(),
            password_hash: "hash".to_string(),
            area_id: Some(4),
            rol,
            activo: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_usuario() {
        let repo = setup_test_repo().await;

        let created = repo
            .create(&usuario("rh@empresa.mx", Rol::Coordinador))
            .await
            .expect("Failed to create usuario");
        assert!(created.id > 0);

        let by_id = repo
            .get_by_id(created.id)
            .await
            .expect("Failed to get usuario")
            .expect("Usuario not found");
        assert_eq!(by_id.correo, "rh@empresa.mx");
        assert_eq!(by_id.rol, Rol::Coordinador);
        assert_eq!(by_id.area_id, Some(4));
        assert!(by_id.activo);

        let by_correo = repo
            .get_by_correo("rh@empresa.mx")
            .await
            .expect("Failed to get usuario");
        assert_eq!(by_correo.map(|u| u.id), Some(created.id));
    }

    #[tokio::test]
    async fn test_duplicate_correo_fails() {
        let repo = setup_test_repo().await;
        repo.create(&usuario("rh@empresa.mx", Rol::Admin))
            .await
            .expect("Failed to create usuario");

        let result = repo.create(&usuario("rh@empresa.mx", Rol::Consulta)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_update_usuario() {
        let repo = setup_test_repo().await;
        let mut created = repo
            .create(&usuario("rh@empresa.mx", Rol::Consulta))
            .await
            .expect("Failed to create usuario");

        created.activo = false;
        created.rol = Rol::Admin;
        created.password_hash = "nuevo".to_string();
        let updated = repo.update(&created).await.expect("Failed to update");

        assert!(!updated.activo);
        assert_eq!(updated.rol, Rol::Admin);
        assert_eq!(updated.password_hash, "nuevo");
    }

    #[tokio::test]
    async fn test_list_and_count() {
        let repo = setup_test_repo().await;
        assert_eq!(repo.count().await.expect("count"), 0);

        repo.create(&usuario("b@empresa.mx", Rol::Consulta))
            .await
            .expect("create");
        repo.create(&usuario("a@empresa.mx", Rol::Admin))
            .await
            .expect("create");

        let list = repo.list().await.expect("list");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].correo, "a@empresa.mx");
        assert_eq!(repo.count().await.expect("count"), 2);
    }
}
