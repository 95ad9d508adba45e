//! Session repository
//!
//! Database operations for usuario sessions.
//!
//! This module provides:
//! - `SesionRepository` trait defining the interface for session data access
//! - `SqlxSesionRepository` implementing the trait for SQLite and MySQL

use crate::db::{Backend, DynDatabasePool};
use crate::models::Sesion;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Session repository trait
#[async_trait]
pub trait SesionRepository: Send + Sync {
    /// Create a new session
    async fn create(&self, sesion: &Sesion) -> Result<Sesion>;

    /// Get session by ID (token)
    async fn get_by_id(&self, id: &str) -> Result<Option<Sesion>>;

    /// Delete a session
    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete all sessions for a usuario
    async fn delete_by_usuario(&self, usuario_id: i64) -> Result<u64>;

    /// Delete expired sessions
    async fn delete_expired(&self) -> Result<u64>;
}

/// SQLx-based session repository implementation
pub struct SqlxSesionRepository {
    pool: DynDatabasePool,
}

impl SqlxSesionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SesionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SesionRepository for SqlxSesionRepository {
    async fn create(&self, sesion: &Sesion) -> Result<Sesion> {
        match self.pool.backend() {
            Backend::Sqlite(p) => create_sesion_sqlite(p, sesion).await,
            Backend::Mysql(p) => create_sesion_mysql(p, sesion).await,
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Sesion>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_sesion_by_id_sqlite(p, id).await,
            Backend::Mysql(p) => get_sesion_by_id_mysql(p, id).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query("DELETE FROM sesiones WHERE id = ?")
                    .bind(id)
                    .execute(p)
                    .await
                    .context("Failed to delete session")?;
            }
            Backend::Mysql(p) => {
                sqlx::query("DELETE FROM sesiones WHERE id = ?")
                    .bind(id)
                    .execute(p)
                    .await
                    .context("Failed to delete session")?;
            }
        }
        Ok(())
    }

    async fn delete_by_usuario(&self, usuario_id: i64) -> Result<u64> {
        match self.pool.backend() {
            Backend::Sqlite(p) => delete_sesiones_by_usuario_sqlite(p, usuario_id).await,
            Backend::Mysql(p) => delete_sesiones_by_usuario_mysql(p, usuario_id).await,
        }
    }

    async fn delete_expired(&self) -> Result<u64> {
        match self.pool.backend() {
            Backend::Sqlite(p) => delete_expired_sesiones_sqlite(p).await,
            Backend::Mysql(p) => delete_expired_sesiones_mysql(p).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sesion_sqlite(pool: &SqlitePool, sesion: &Sesion) -> Result<Sesion> {
    sqlx::query(
        r#"
        INSERT INTO sesiones (id, usuario_id, expires_at, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&sesion.id)
    .bind(sesion.usuario_id)
    .bind(sesion.expires_at)
    .bind(sesion.created_at)
    .execute(pool)
    .await
    .context("Failed to create session")?;

    Ok(sesion.clone())
}

async fn get_sesion_by_id_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<Sesion>> {
    let row = sqlx::query(
        r#"
        SELECT id, usuario_id, expires_at, created_at
        FROM sesiones
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get session by ID")?;

    Ok(row.map(|row| Sesion {
        id: row.get("id"),
        usuario_id: row.get("usuario_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }))
}

async fn delete_sesiones_by_usuario_sqlite(pool: &SqlitePool, usuario_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sesiones WHERE usuario_id = ?")
        .bind(usuario_id)
        .execute(pool)
        .await
        .context("Failed to delete sessions by usuario")?;

    Ok(result.rows_affected())
}

async fn delete_expired_sesiones_sqlite(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sesiones WHERE expires_at < ?")
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to delete expired sessions")?;

    Ok(result.rows_affected())
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_sesion_mysql(pool: &MySqlPool, sesion: &Sesion) -> Result<Sesion> {
    sqlx::query(
        r#"
        INSERT INTO sesiones (id, usuario_id, expires_at, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&sesion.id)
    .bind(sesion.usuario_id)
    .bind(sesion.expires_at)
    .bind(sesion.created_at)
    .execute(pool)
    .await
    .context("Failed to create session")?;

    Ok(sesion.clone())
}

async fn get_sesion_by_id_mysql(pool: &MySqlPool, id: &str) -> Result<Option<Sesion>> {
    let row = sqlx::query(
        r#"
        SELECT id, usuario_id, expires_at, created_at
        FROM sesiones
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get session by ID")?;

    Ok(row.map(|row| Sesion {
        id: row.get("id"),
        usuario_id: row.get("usuario_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }))
}

async fn delete_sesiones_by_usuario_mysql(pool: &MySqlPool, usuario_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sesiones WHERE usuario_id = ?")
        .bind(usuario_id)
        .execute(pool)
        .await
        .context("Failed to delete sessions by usuario")?;

    Ok(result.rows_affected())
}

async fn delete_expired_sesiones_mysql(pool: &MySqlPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sesiones WHERE expires_at < ?")
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to delete expired sessions")?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;
    use uuid::Uuid;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxSesionRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxSesionRepository::new(pool.clone());
        (pool, repo)
    }

    fn nueva_sesion(usuario_id: i64, expires_in_days: i64) -> Sesion {
        let now = Utc::now();
        Sesion {
            id: Uuid::new_v4().to_string(),
            usuario_id,
            expires_at: now + Duration::days(expires_in_days),
            created_at: now,
        }
    }

    // Sessions reference usuarios through a foreign key.
    async fn crear_usuario(pool: &DynDatabasePool, id: i64) {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO usuarios (id, correo, nombre, password_hash, rol, activo, created_at, updated_at)
            VALUES (?, ?, ?, 'hash', 'consulta', 1, ?, ?)
            "#,
        )
        .bind(id)
        .bind(format!("usuario{}@empresa.mx", id))
        .bind(format!("Usuario {}", id))
        .bind(now)
        .bind(now)
        .execute(pool.as_sqlite().expect("sqlite pool"))
        .await
        .expect("Failed to create test usuario");
    }

    #[tokio::test]
    async fn test_create_and_get_sesion() {
        let (pool, repo) = setup_test_repo().await;
        crear_usuario(&pool, 1).await;

        let sesion = nueva_sesion(1, 7);
        repo.create(&sesion).await.expect("Failed to create session");

        let found = repo
            .get_by_id(&sesion.id)
            .await
            .expect("Failed to get session")
            .expect("Session not found");
        assert_eq!(found.id, sesion.id);
        assert_eq!(found.usuario_id, 1);
        assert!(!found.is_expired());
    }

    #[tokio::test]
    async fn test_get_sesion_not_found() {
        let (_pool, repo) = setup_test_repo().await;
        let found = repo.get_by_id("no-existe").await.expect("Failed to query");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_delete_sesion() {
        let (pool, repo) = setup_test_repo().await;
        crear_usuario(&pool, 1).await;

        let sesion = nueva_sesion(1, 7);
        repo.create(&sesion).await.expect("Failed to create session");
        repo.delete(&sesion.id).await.expect("Failed to delete session");

        assert!(repo.get_by_id(&sesion.id).await.expect("query").is_none());
    }

    #[tokio::test]
    async fn test_delete_by_usuario() {
        let (pool, repo) = setup_test_repo().await;
        crear_usuario(&pool, 1).await;
        crear_usuario(&pool, 2).await;

        let s1 = nueva_sesion(1, 7);
        let s2 = nueva_sesion(1, 7);
        let s3 = nueva_sesion(2, 7);
        for s in [&s1, &s2, &s3] {
            repo.create(s).await.expect("Failed to create session");
        }

        let deleted = repo.delete_by_usuario(1).await.expect("Failed to delete");
        assert_eq!(deleted, 2);
        assert!(repo.get_by_id(&s1.id).await.expect("query").is_none());
        assert!(repo.get_by_id(&s3.id).await.expect("query").is_some());
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let (pool, repo) = setup_test_repo().await;
        crear_usuario(&pool, 1).await;

        let now = Utc::now();
        let vencida = Sesion {
            id: Uuid::new_v4().to_string(),
            usuario_id: 1,
            expires_at: now - Duration::days(1),
            created_at: now - Duration::days(8),
        };
        let vigente = nueva_sesion(1, 7);
        repo.create(&vencida).await.expect("Failed to create session");
        repo.create(&vigente).await.expect("Failed to create session");

        assert_eq!(repo.delete_expired().await.expect("Failed to delete"), 1);
        assert!(repo.get_by_id(&vencida.id).await.expect("query").is_none());
        assert!(repo.get_by_id(&vigente.id).await.expect("query").is_some());
    }
}
