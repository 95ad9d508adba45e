//! Database migrations
//!
//! Migrations are embedded in the binary as SQL strings, one variant per
//! dialect, and tracked in the `_migrations` table.
//!
//! ```ignore
//! use alta_colaboradores::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};

use super::{Backend, DynDatabasePool};

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_catalogs",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS areas (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                nombre VARCHAR(100) NOT NULL,
                nombre_normalizado VARCHAR(100) NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS puestos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                nombre VARCHAR(100) NOT NULL,
                area_id INTEGER NOT NULL REFERENCES areas(id),
                UNIQUE (area_id, nombre)
            );
            CREATE INDEX IF NOT EXISTS idx_puestos_area ON puestos(area_id);
            CREATE TABLE IF NOT EXISTS reclutadores (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                nombre VARCHAR(100) NOT NULL,
                nombre_normalizado VARCHAR(100) NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS bancos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                nombre VARCHAR(100) NOT NULL,
                nombre_normalizado VARCHAR(100) NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS metodos_pago (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                nombre VARCHAR(100) NOT NULL,
                nombre_normalizado VARCHAR(100) NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS recursos_ti (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                nombre VARCHAR(100) NOT NULL,
                nombre_normalizado VARCHAR(100) NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS programas (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                nombre VARCHAR(100) NOT NULL,
                nombre_normalizado VARCHAR(100) NOT NULL UNIQUE
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS areas (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                nombre VARCHAR(100) NOT NULL,
                nombre_normalizado VARCHAR(100) NOT NULL UNIQUE
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
            CREATE TABLE IF NOT EXISTS puestos (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                nombre VARCHAR(100) NOT NULL,
                area_id BIGINT NOT NULL,
                UNIQUE KEY uq_puestos_area_nombre (area_id, nombre),
                INDEX idx_puestos_area (area_id),
                FOREIGN KEY (area_id) REFERENCES areas(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
            CREATE TABLE IF NOT EXISTS reclutadores (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                nombre VARCHAR(100) NOT NULL,
                nombre_normalizado VARCHAR(100) NOT NULL UNIQUE
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
            CREATE TABLE IF NOT EXISTS bancos (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                nombre VARCHAR(100) NOT NULL,
                nombre_normalizado VARCHAR(100) NOT NULL UNIQUE
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
            CREATE TABLE IF NOT EXISTS metodos_pago (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                nombre VARCHAR(100) NOT NULL,
                nombre_normalizado VARCHAR(100) NOT NULL UNIQUE
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
            CREATE TABLE IF NOT EXISTS recursos_ti (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                nombre VARCHAR(100) NOT NULL,
                nombre_normalizado VARCHAR(100) NOT NULL UNIQUE
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
            CREATE TABLE IF NOT EXISTS programas (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                nombre VARCHAR(100) NOT NULL,
                nombre_normalizado VARCHAR(100) NOT NULL UNIQUE
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
        "#,
    },
    Migration {
        version: 2,
        name: "create_colaboradores",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS colaboradores (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                nombre VARCHAR(100) NOT NULL,
                apellido VARCHAR(100) NOT NULL,
                correo VARCHAR(255),
                edad INTEGER,
                estado_civil VARCHAR(30),
                domicilio VARCHAR(255),
                telefono VARCHAR(20),
                rfc VARCHAR(13) NOT NULL,
                curp VARCHAR(18),
                nss VARCHAR(15),
                fecha_alta DATE NOT NULL,
                sueldo REAL,
                comentarios TEXT,
                rol_comercial VARCHAR(100),
                comisionista BOOLEAN NOT NULL DEFAULT 0,
                metodo_pago_id INTEGER REFERENCES metodos_pago(id),
                banco_id INTEGER REFERENCES bancos(id),
                reclutador_id INTEGER REFERENCES reclutadores(id),
                numero_cuenta VARCHAR(18),
                numero_comisiones INTEGER,
                tiene_infonavit BOOLEAN NOT NULL DEFAULT 0,
                infonavit_credito VARCHAR(50),
                tiene_fonacot BOOLEAN NOT NULL DEFAULT 0,
                fonacot_credito VARCHAR(50),
                area_id INTEGER NOT NULL REFERENCES areas(id),
                puesto_id INTEGER REFERENCES puestos(id),
                estado VARCHAR(10) NOT NULL DEFAULT 'activo',
                fecha_baja DATE,
                motivo_baja TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_colaboradores_rfc ON colaboradores(rfc);
            CREATE INDEX IF NOT EXISTS idx_colaboradores_fecha_alta ON colaboradores(fecha_alta);
            CREATE INDEX IF NOT EXISTS idx_colaboradores_fecha_baja ON colaboradores(fecha_baja);
            CREATE INDEX IF NOT EXISTS idx_colaboradores_area ON colaboradores(area_id);
            CREATE TABLE IF NOT EXISTS colaborador_recurso (
                colaborador_id INTEGER NOT NULL REFERENCES colaboradores(id) ON DELETE CASCADE,
                recurso_id INTEGER NOT NULL REFERENCES recursos_ti(id),
                PRIMARY KEY (colaborador_id, recurso_id)
            );
            CREATE TABLE IF NOT EXISTS colaborador_programa (
                colaborador_id INTEGER NOT NULL REFERENCES colaboradores(id) ON DELETE CASCADE,
                programa_id INTEGER NOT NULL REFERENCES programas(id),
                PRIMARY KEY (colaborador_id, programa_id)
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS colaboradores (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                nombre VARCHAR(100) NOT NULL,
                apellido VARCHAR(100) NOT NULL,
                correo VARCHAR(255),
                edad BIGINT,
                estado_civil VARCHAR(30),
                domicilio VARCHAR(255),
                telefono VARCHAR(20),
                rfc VARCHAR(13) NOT NULL,
                curp VARCHAR(18),
                nss VARCHAR(15),
                fecha_alta DATE NOT NULL,
                sueldo DOUBLE,
                comentarios TEXT,
                rol_comercial VARCHAR(100),
                comisionista BOOLEAN NOT NULL DEFAULT FALSE,
                metodo_pago_id BIGINT,
                banco_id BIGINT,
                reclutador_id BIGINT,
                numero_cuenta VARCHAR(18),
                numero_comisiones BIGINT,
                tiene_infonavit BOOLEAN NOT NULL DEFAULT FALSE,
                infonavit_credito VARCHAR(50),
                tiene_fonacot BOOLEAN NOT NULL DEFAULT FALSE,
                fonacot_credito VARCHAR(50),
                area_id BIGINT NOT NULL,
                puesto_id BIGINT,
                estado VARCHAR(10) NOT NULL DEFAULT 'activo',
                fecha_baja DATE,
                motivo_baja TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                INDEX idx_colaboradores_rfc (rfc),
                INDEX idx_colaboradores_fecha_alta (fecha_alta),
                INDEX idx_colaboradores_fecha_baja (fecha_baja),
                INDEX idx_colaboradores_area (area_id),
                FOREIGN KEY (metodo_pago_id) REFERENCES metodos_pago(id),
                FOREIGN KEY (banco_id) REFERENCES bancos(id),
                FOREIGN KEY (reclutador_id) REFERENCES reclutadores(id),
                FOREIGN KEY (area_id) REFERENCES areas(id),
                FOREIGN KEY (puesto_id) REFERENCES puestos(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
            CREATE TABLE IF NOT EXISTS colaborador_recurso (
                colaborador_id BIGINT NOT NULL,
                recurso_id BIGINT NOT NULL,
                PRIMARY KEY (colaborador_id, recurso_id),
                FOREIGN KEY (colaborador_id) REFERENCES colaboradores(id) ON DELETE CASCADE,
                FOREIGN KEY (recurso_id) REFERENCES recursos_ti(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
            CREATE TABLE IF NOT EXISTS colaborador_programa (
                colaborador_id BIGINT NOT NULL,
                programa_id BIGINT NOT NULL,
                PRIMARY KEY (colaborador_id, programa_id),
                FOREIGN KEY (colaborador_id) REFERENCES colaboradores(id) ON DELETE CASCADE,
                FOREIGN KEY (programa_id) REFERENCES programas(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
        "#,
    },
    Migration {
        version: 3,
        name: "create_documentos_and_cambios_area",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS documentos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                colaborador_id INTEGER NOT NULL REFERENCES colaboradores(id) ON DELETE CASCADE,
                nombre_archivo VARCHAR(255) NOT NULL,
                ruta_archivo VARCHAR(500) NOT NULL,
                tipo VARCHAR(100) NOT NULL DEFAULT 'General',
                tamano INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_documentos_colaborador ON documentos(colaborador_id);
            CREATE TABLE IF NOT EXISTS cambios_area (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                colaborador_id INTEGER NOT NULL REFERENCES colaboradores(id) ON DELETE CASCADE,
                area_anterior_id INTEGER NOT NULL REFERENCES areas(id),
                puesto_anterior_id INTEGER REFERENCES puestos(id),
                area_nueva_id INTEGER NOT NULL REFERENCES areas(id),
                puesto_nuevo_id INTEGER REFERENCES puestos(id),
                motivo TEXT,
                fecha_efectiva DATE NOT NULL,
                usuario_id INTEGER,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_cambios_area_colaborador ON cambios_area(colaborador_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS documentos (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                colaborador_id BIGINT NOT NULL,
                nombre_archivo VARCHAR(255) NOT NULL,
                ruta_archivo VARCHAR(500) NOT NULL,
                tipo VARCHAR(100) NOT NULL DEFAULT 'General',
                tamano BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                INDEX idx_documentos_colaborador (colaborador_id),
                FOREIGN KEY (colaborador_id) REFERENCES colaboradores(id) ON DELETE CASCADE
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
            CREATE TABLE IF NOT EXISTS cambios_area (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                colaborador_id BIGINT NOT NULL,
                area_anterior_id BIGINT NOT NULL,
                puesto_anterior_id BIGINT,
                area_nueva_id BIGINT NOT NULL,
                puesto_nuevo_id BIGINT,
                motivo TEXT,
                fecha_efectiva DATE NOT NULL,
                usuario_id BIGINT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                INDEX idx_cambios_area_colaborador (colaborador_id),
                FOREIGN KEY (colaborador_id) REFERENCES colaboradores(id) ON DELETE CASCADE,
                FOREIGN KEY (area_anterior_id) REFERENCES areas(id),
                FOREIGN KEY (area_nueva_id) REFERENCES areas(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
        "#,
    },
    Migration {
        version: 4,
        name: "create_usuarios_and_sesiones",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS usuarios (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                correo VARCHAR(255) NOT NULL UNIQUE,
                nombre VARCHAR(100) NOT NULL,
                password_hash VARCHAR(255) NOT NULL,
                area_id INTEGER REFERENCES areas(id),
                rol VARCHAR(20) NOT NULL DEFAULT 'consulta',
                activo BOOLEAN NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS sesiones (
                id VARCHAR(64) PRIMARY KEY,
                usuario_id INTEGER NOT NULL REFERENCES usuarios(id) ON DELETE CASCADE,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_sesiones_usuario ON sesiones(usuario_id);
            CREATE INDEX IF NOT EXISTS idx_sesiones_expires ON sesiones(expires_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS usuarios (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                correo VARCHAR(255) NOT NULL UNIQUE,
                nombre VARCHAR(100) NOT NULL,
                password_hash VARCHAR(255) NOT NULL,
                area_id BIGINT,
                rol VARCHAR(20) NOT NULL DEFAULT 'consulta',
                activo BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                FOREIGN KEY (area_id) REFERENCES areas(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
            CREATE TABLE IF NOT EXISTS sesiones (
                id VARCHAR(64) PRIMARY KEY,
                usuario_id BIGINT NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                INDEX idx_sesiones_usuario (usuario_id),
                INDEX idx_sesiones_expires (expires_at),
                FOREIGN KEY (usuario_id) REFERENCES usuarios(id) ON DELETE CASCADE
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
        "#,
    },
    Migration {
        version: 5,
        name: "seed_catalogs",
        up_sqlite: r#"
            INSERT OR IGNORE INTO areas (id, nombre, nombre_normalizado) VALUES
                (1, 'Dirección General', 'direccion general'),
                (2, 'Comercial', 'comercial'),
                (3, 'TI', 'ti'),
                (4, 'Recursos Humanos', 'recursos humanos'),
                (5, 'Administración', 'administracion'),
                (6, 'Operaciones', 'operaciones');
            INSERT OR IGNORE INTO puestos (nombre, area_id) VALUES
                ('Director General', 1),
                ('Asistente de Dirección', 1),
                ('Asesor Comercial', 2),
                ('Coordinador Comercial', 2),
                ('Gerente Comercial', 2),
                ('Desarrollador', 3),
                ('Soporte Técnico', 3),
                ('Coordinador TI', 3),
                ('Reclutador', 4),
                ('Coordinador RH', 4),
                ('Contador', 5),
                ('Auxiliar Administrativo', 5),
                ('Supervisor de Operaciones', 6);
            INSERT OR IGNORE INTO bancos (nombre, nombre_normalizado) VALUES
                ('BBVA', 'bbva'),
                ('Banorte', 'banorte'),
                ('Santander', 'santander'),
                ('HSBC', 'hsbc'),
                ('Banamex', 'banamex'),
                ('Scotiabank', 'scotiabank'),
                ('Banco Azteca', 'banco azteca'),
                ('Inbursa', 'inbursa');
            INSERT OR IGNORE INTO metodos_pago (nombre, nombre_normalizado) VALUES
                ('Transferencia', 'transferencia'),
                ('Efectivo', 'efectivo'),
                ('Cheque', 'cheque');
            INSERT OR IGNORE INTO recursos_ti (nombre, nombre_normalizado) VALUES
                ('Laptop', 'laptop'),
                ('Computadora de escritorio', 'computadora de escritorio'),
                ('Monitor', 'monitor'),
                ('Teléfono celular', 'telefono celular'),
                ('Correo corporativo', 'correo corporativo'),
                ('Diadema', 'diadema');
            INSERT OR IGNORE INTO programas (nombre, nombre_normalizado) VALUES
                ('Microsoft Office', 'microsoft office'),
                ('Google Workspace', 'google workspace'),
                ('CRM', 'crm'),
                ('ERP', 'erp'),
                ('Antivirus', 'antivirus');
        "#,
        up_mysql: r#"
            INSERT IGNORE INTO areas (id, nombre, nombre_normalizado) VALUES
                (1, 'Dirección General', 'direccion general'),
                (2, 'Comercial', 'comercial'),
                (3, 'TI', 'ti'),
                (4, 'Recursos Humanos', 'recursos humanos'),
                (5, 'Administración', 'administracion'),
                (6, 'Operaciones', 'operaciones');
            INSERT IGNORE INTO puestos (nombre, area_id) VALUES
                ('Director General', 1),
                ('Asistente de Dirección', 1),
                ('Asesor Comercial', 2),
                ('Coordinador Comercial', 2),
                ('Gerente Comercial', 2),
                ('Desarrollador', 3),
                ('Soporte Técnico', 3),
                ('Coordinador TI', 3),
                ('Reclutador', 4),
                ('Coordinador RH', 4),
                ('Contador', 5),
                ('Auxiliar Administrativo', 5),
                ('Supervisor de Operaciones', 6);
            INSERT IGNORE INTO bancos (nombre, nombre_normalizado) VALUES
                ('BBVA', 'bbva'),
                ('Banorte', 'banorte'),
                ('Santander', 'santander'),
                ('HSBC', 'hsbc'),
                ('Banamex', 'banamex'),
                ('Scotiabank', 'scotiabank'),
                ('Banco Azteca', 'banco azteca'),
                ('Inbursa', 'inbursa');
            INSERT IGNORE INTO metodos_pago (nombre, nombre_normalizado) VALUES
                ('Transferencia', 'transferencia'),
                ('Efectivo', 'efectivo'),
                ('Cheque', 'cheque');
            INSERT IGNORE INTO recursos_ti (nombre, nombre_normalizado) VALUES
                ('Laptop', 'laptop'),
                ('Computadora de escritorio', 'computadora de escritorio'),
                ('Monitor', 'monitor'),
                ('Teléfono celular', 'telefono celular'),
                ('Correo corporativo', 'correo corporativo'),
                ('Diadema', 'diadema');
            INSERT IGNORE INTO programas (nombre, nombre_normalizado) VALUES
                ('Microsoft Office', 'microsoft office'),
                ('Google Workspace', 'google workspace'),
                ('CRM', 'crm'),
                ('ERP', 'erp'),
                ('Antivirus', 'antivirus');
        "#,
    },
];

/// Run all pending migrations
///
/// Returns the number of migrations applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Create the migrations tracking table if it doesn't exist
async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.backend() {
        Backend::Sqlite(_) => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        Backend::Mysql(_) => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

/// Get list of already applied migrations
async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    match pool.backend() {
        Backend::Sqlite(p) => get_applied_migrations_sqlite(p).await,
        Backend::Mysql(p) => get_applied_migrations_mysql(p).await,
    }
}

async fn get_applied_migrations_sqlite(pool: &SqlitePool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await
        .context("Failed to list applied migrations")?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn get_applied_migrations_mysql(pool: &MySqlPool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await
        .context("Failed to list applied migrations")?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

/// Apply a single migration
async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    match pool.backend() {
        Backend::Sqlite(p) => apply_migration_sqlite(p, migration).await,
        Backend::Mysql(p) => apply_migration_mysql(p, migration).await,
    }
}

async fn apply_migration_sqlite(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin migration")?;

    for statement in split_sql_statements(migration.up_sqlite) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(&mut *tx)
        .await?;

    tx.commit().await.context("Failed to commit migration")?;
    Ok(())
}

// MySQL commits DDL implicitly, so statements run one by one.
async fn apply_migration_mysql(pool: &MySqlPool, migration: &Migration) -> Result<()> {
    for statement in split_sql_statements(migration.up_mysql) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(pool)
        .await?;

    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements, skipping comment-only fragments.
///
/// Semicolons inside single-quoted literals do not end a statement.
fn split_sql_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut current_start = 0;
    let mut in_quote = false;

    for (i, c) in sql.char_indices() {
        match c {
            '\'' => in_quote = !in_quote,
            ';' if !in_quote => {
                let stmt = sql[current_start..i].trim();
                if !stmt.is_empty() && !is_comment_only(stmt) {
                    statements.push(stmt);
                }
                current_start = i + 1;
            }
            _ => {}
        }
    }

    let stmt = sql[current_start..].trim();
    if !stmt.is_empty() && !is_comment_only(stmt) {
        statements.push(stmt);
    }

    statements
}

/// Check if a string contains only SQL comments
fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Check if migrations are up to date
pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    Ok(pending_count(pool).await? == 0)
}

/// Get pending migrations count
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    Ok(MIGRATIONS
        .iter()
        .filter(|m| !applied.iter().any(|a| a.version == m.version as i64))
        .count())
}
