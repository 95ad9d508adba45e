//! Colaborador repository
//!
//! Database operations for collaborators, their TI resources and programs,
//! terminations and área transfers.
//!
//! This module provides:
//! - `ColaboradorRepository` trait defining the interface for collaborator data access
//! - `SqlxColaboradorRepository` implementing the trait for SQLite and MySQL

use crate::db::{Backend, DynDatabasePool};
use crate::models::{
    AsignacionRecurso, CambioArea, CatalogoItem, Colaborador, ColaboradorResumen, Duplicado,
    EstadoColaborador, FiltroColaboradores, Movimiento, NuevoCambioArea, NuevoColaborador,
    Segmento,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

const COLABORADOR_COLUMNS: &str = r#"
    id, nombre, apellido, correo, edad, estado_civil, domicilio, telefono, rfc, curp, nss,
    fecha_alta, sueldo, comentarios, rol_comercial, comisionista, metodo_pago_id, banco_id,
    reclutador_id, numero_cuenta, numero_comisiones, tiene_infonavit, infonavit_credito,
    tiene_fonacot, fonacot_credito, area_id, puesto_id, estado, fecha_baja, motivo_baja,
    created_at, updated_at
"#;

const INSERT_COLABORADOR: &str = r#"
    INSERT INTO colaboradores (
        nombre, apellido, correo, edad, estado_civil, domicilio, telefono, rfc, curp, nss,
        fecha_alta, sueldo, comentarios, rol_comercial, comisionista, metodo_pago_id, banco_id,
        reclutador_id, numero_cuenta, numero_comisiones, tiene_infonavit, infonavit_credito,
        tiene_fonacot, fonacot_credito, area_id, puesto_id, estado, created_at, updated_at
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'activo', ?, ?)
"#;

const RESUMEN_FROM: &str = r#"
    FROM colaboradores c
    JOIN areas a ON a.id = c.area_id
    LEFT JOIN puestos p ON p.id = c.puesto_id
    WHERE (? IS NULL OR c.estado = ?)
      AND (? IS NULL OR c.area_id = ?)
      AND (? IS NULL OR c.nombre LIKE ? OR c.apellido LIKE ? OR c.rfc LIKE ?)
"#;

const MOVIMIENTOS_SQL: &str = r#"
    SELECT c.id, c.fecha_alta, c.fecha_baja, c.estado, c.area_id, a.nombre AS area,
           c.reclutador_id, r.nombre AS reclutador
    FROM colaboradores c
    JOIN areas a ON a.id = c.area_id
    LEFT JOIN reclutadores r ON r.id = c.reclutador_id
    WHERE (c.fecha_alta BETWEEN ? AND ?) OR (c.fecha_baja BETWEEN ? AND ?)
    ORDER BY c.fecha_alta, c.id
"#;

const ASIGNACIONES_SQL: &str = r#"
    SELECT c.id AS colaborador_id, c.nombre, c.apellido, c.estado,
           r.id AS recurso_id, r.nombre AS recurso
    FROM colaborador_recurso cr
    JOIN colaboradores c ON c.id = cr.colaborador_id
    JOIN recursos_ti r ON r.id = cr.recurso_id
    ORDER BY c.apellido, c.nombre, r.nombre
"#;

/// Colaborador repository trait
#[async_trait]
pub trait ColaboradorRepository: Send + Sync {
    /// Insert a collaborator and link its recursos and programas in one transaction
    async fn create(&self, nuevo: &NuevoColaborador) -> Result<Colaborador>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Colaborador>>;

    /// Collaborator with this RFC, preferring active ones
    async fn get_by_rfc(&self, rfc: &str) -> Result<Option<Colaborador>>;

    /// Filtered, paginated listing joined with área and puesto names
    async fn list(&self, filtro: &FiltroColaboradores) -> Result<(Vec<ColaboradorResumen>, i64)>;

    /// Collaborators sharing any of the given identifiers
    async fn find_duplicados(
        &self,
        rfc: &str,
        curp: Option<&str>,
        nss: Option<&str>,
        correo: Option<&str>,
    ) -> Result<Vec<Duplicado>>;

    async fn list_recursos(&self, colaborador_id: i64) -> Result<Vec<CatalogoItem>>;

    async fn list_programas(&self, colaborador_id: i64) -> Result<Vec<CatalogoItem>>;

    /// Mark an active collaborator as terminated. Returns false if no active row matched.
    async fn registrar_baja(&self, id: i64, fecha_baja: NaiveDate, motivo: &str) -> Result<bool>;

    /// Move a collaborator and record the history row in one transaction.
    ///
    /// Returns `None` (and writes nothing) when the collaborator is no longer
    /// active or no longer in `area_anterior_id`.
    async fn cambiar_area(&self, cambio: &NuevoCambioArea) -> Result<Option<CambioArea>>;

    /// Transfer history, newest first
    async fn list_cambios(&self, colaborador_id: i64) -> Result<Vec<CambioArea>>;

    /// Hires or terminations dated within `[desde, hasta]`
    async fn list_movimientos(&self, desde: NaiveDate, hasta: NaiveDate)
        -> Result<Vec<Movimiento>>;

    /// Every TI resource currently linked to a collaborator
    async fn list_asignaciones(&self) -> Result<Vec<AsignacionRecurso>>;
}

/// SQLx-based colaborador repository implementation
pub struct SqlxColaboradorRepository {
    pool: DynDatabasePool,
}

impl SqlxColaboradorRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ColaboradorRepository> {
        Arc::new(Self::new(pool))
    }
}

macro_rules! bind_nuevo_colaborador {
    ($query:expr, $n:expr, $now:expr) => {
        $query
            .bind(&$n.nombre)
            .bind(&$n.apellido)
            .bind(&$n.correo)
            .bind($n.edad)
            .bind(&$n.estado_civil)
            .bind(&$n.domicilio)
            .bind(&$n.telefono)
            .bind(&$n.rfc)
            .bind(&$n.curp)
            .bind(&$n.nss)
            .bind($n.fecha_alta)
            .bind($n.sueldo)
            .bind(&$n.comentarios)
            .bind(&$n.rol_comercial)
            .bind($n.comisionista)
            .bind($n.metodo_pago_id)
            .bind($n.banco_id)
            .bind($n.reclutador_id)
            .bind(&$n.numero_cuenta)
            .bind($n.numero_comisiones)
            .bind($n.tiene_infonavit)
            .bind(&$n.infonavit_credito)
            .bind($n.tiene_fonacot)
            .bind(&$n.fonacot_credito)
            .bind($n.area_id)
            .bind($n.puesto_id)
            .bind($now)
            .bind($now)
    };
}

macro_rules! row_to_colaborador {
    ($row:expr) => {{
        let row = $row;
        let estado: String = row.get("estado");
        Ok::<_, anyhow::Error>(Colaborador {
            id: row.get("id"),
            nombre: row.get("nombre"),
            apellido: row.get("apellido"),
            correo: row.get("correo"),
            edad: row.get("edad"),
            estado_civil: row.get("estado_civil"),
            domicilio: row.get("domicilio"),
            telefono: row.get("telefono"),
            rfc: row.get("rfc"),
            curp: row.get("curp"),
            nss: row.get("nss"),
            fecha_alta: row.get("fecha_alta"),
            sueldo: row.get("sueldo"),
            comentarios: row.get("comentarios"),
            rol_comercial: row.get("rol_comercial"),
            comisionista: row.get("comisionista"),
            metodo_pago_id: row.get("metodo_pago_id"),
            banco_id: row.get("banco_id"),
            reclutador_id: row.get("reclutador_id"),
            numero_cuenta: row.get("numero_cuenta"),
            numero_comisiones: row.get("numero_comisiones"),
            tiene_infonavit: row.get("tiene_infonavit"),
            infonavit_credito: row.get("infonavit_credito"),
            tiene_fonacot: row.get("tiene_fonacot"),
            fonacot_credito: row.get("fonacot_credito"),
            area_id: row.get("area_id"),
            puesto_id: row.get("puesto_id"),
            estado: parse_estado(&estado)?,
            fecha_baja: row.get("fecha_baja"),
            motivo_baja: row.get("motivo_baja"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }};
}

macro_rules! row_to_resumen {
    ($row:expr) => {{
        let row = $row;
        let estado: String = row.get("estado");
        Ok::<_, anyhow::Error>(ColaboradorResumen {
            id: row.get("id"),
            nombre: row.get("nombre"),
            apellido: row.get("apellido"),
            rfc: row.get("rfc"),
            correo: row.get("correo"),
            area_id: row.get("area_id"),
            area: row.get("area"),
            puesto: row.get("puesto"),
            fecha_alta: row.get("fecha_alta"),
            estado: parse_estado(&estado)?,
            fecha_baja: row.get("fecha_baja"),
        })
    }};
}

macro_rules! row_to_cambio {
    ($row:expr) => {{
        let row = $row;
        CambioArea {
            id: row.get("id"),
            colaborador_id: row.get("colaborador_id"),
            area_anterior_id: row.get("area_anterior_id"),
            puesto_anterior_id: row.get("puesto_anterior_id"),
            area_nueva_id: row.get("area_nueva_id"),
            puesto_nuevo_id: row.get("puesto_nuevo_id"),
            motivo: row.get("motivo"),
            fecha_efectiva: row.get("fecha_efectiva"),
            usuario_id: row.get("usuario_id"),
            created_at: row.get("created_at"),
        }
    }};
}

macro_rules! row_to_movimiento {
    ($row:expr) => {{
        let row = $row;
        let estado: String = row.get("estado");
        let area: String = row.get("area");
        Ok::<_, anyhow::Error>(Movimiento {
            colaborador_id: row.get("id"),
            fecha_alta: row.get("fecha_alta"),
            fecha_baja: row.get("fecha_baja"),
            estado: parse_estado(&estado)?,
            area_id: row.get("area_id"),
            segmento: Segmento::de_area(&area),
            area,
            reclutador_id: row.get("reclutador_id"),
            reclutador: row.get("reclutador"),
        })
    }};
}

macro_rules! row_to_asignacion {
    ($row:expr) => {{
        let row = $row;
        let estado: String = row.get("estado");
        let nombre: String = row.get("nombre");
        let apellido: String = row.get("apellido");
        Ok::<_, anyhow::Error>(AsignacionRecurso {
            colaborador_id: row.get("colaborador_id"),
            colaborador: format!("{} {}", nombre, apellido),
            estado: parse_estado(&estado)?,
            recurso_id: row.get("recurso_id"),
            recurso: row.get("recurso"),
        })
    }};
}

macro_rules! bind_filtro {
    ($query:expr, $filtro:expr, $patron:expr) => {{
        let estado = $filtro.estado.map(|e| e.to_string());
        $query
            .bind(estado.clone())
            .bind(estado)
            .bind($filtro.area_id)
            .bind($filtro.area_id)
            .bind($patron.clone())
            .bind($patron.clone())
            .bind($patron.clone())
            .bind($patron.clone())
    }};
}

fn parse_estado(estado: &str) -> Result<EstadoColaborador> {
    EstadoColaborador::from_str(estado)
        .with_context(|| format!("Invalid collaborator state in database: {}", estado))
}

/// Which identifiers of `existente` match the candidate ones
fn campos_coincidentes(
    existente: (&str, Option<&str>, Option<&str>, Option<&str>),
    rfc: &str,
    curp: Option<&str>,
    nss: Option<&str>,
    correo: Option<&str>,
) -> Vec<String> {
    let (e_rfc, e_curp, e_nss, e_correo) = existente;
    let mut campos = Vec::new();
    if e_rfc == rfc {
        campos.push("rfc".to_string());
    }
    if curp.is_some() && e_curp == curp {
        campos.push("curp".to_string());
    }
    if nss.is_some() && e_nss == nss {
        campos.push("nss".to_string());
    }
    if let (Some(c), Some(e)) = (correo, e_correo) {
        if c.eq_ignore_ascii_case(e) {
            campos.push("correo".to_string());
        }
    }
    campos
}

const DUPLICADOS_SQL: &str = r#"
    SELECT id, nombre, apellido, rfc, curp, nss, correo, estado
    FROM colaboradores
    WHERE rfc = ?
       OR (? IS NOT NULL AND curp = ?)
       OR (? IS NOT NULL AND nss = ?)
       OR (? IS NOT NULL AND LOWER(correo) = ?)
    ORDER BY id
"#;

macro_rules! row_to_duplicado {
    ($row:expr, $rfc:expr, $curp:expr, $nss:expr, $correo:expr) => {{
        let row = $row;
        let estado: String = row.get("estado");
        let e_rfc: String = row.get("rfc");
        let e_curp: Option<String> = row.get("curp");
        let e_nss: Option<String> = row.get("nss");
        let e_correo: Option<String> = row.get("correo");
        let nombre: String = row.get("nombre");
        let apellido: String = row.get("apellido");
        Ok::<_, anyhow::Error>(Duplicado {
            id: row.get("id"),
            nombre: format!("{} {}", nombre, apellido),
            campos: campos_coincidentes(
                (&e_rfc, e_curp.as_deref(), e_nss.as_deref(), e_correo.as_deref()),
                $rfc,
                $curp,
                $nss,
                $correo,
            ),
            rfc: e_rfc,
            estado: parse_estado(&estado)?,
        })
    }};
}

#[async_trait]
impl ColaboradorRepository for SqlxColaboradorRepository {
    async fn create(&self, nuevo: &NuevoColaborador) -> Result<Colaborador> {
        let id = match self.pool.backend() {
            Backend::Sqlite(p) => create_colaborador_sqlite(p, nuevo).await?,
            Backend::Mysql(p) => create_colaborador_mysql(p, nuevo).await?,
        };
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Colaborador not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Colaborador>> {
        let sql = format!("SELECT {} FROM colaboradores WHERE id = ?", COLABORADOR_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(p)
                    .await
                    .context("Failed to get colaborador by ID")?;
                row.map(|row| row_to_colaborador!(&row)).transpose()
            }
            Backend::Mysql(p) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(p)
                    .await
                    .context("Failed to get colaborador by ID")?;
                row.map(|row| row_to_colaborador!(&row)).transpose()
            }
        }
    }

    async fn get_by_rfc(&self, rfc: &str) -> Result<Option<Colaborador>> {
        let sql = format!(
            "SELECT {} FROM colaboradores WHERE rfc = ? \
             ORDER BY CASE WHEN estado = 'activo' THEN 0 ELSE 1 END, id DESC LIMIT 1",
            COLABORADOR_COLUMNS
        );
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let row = sqlx::query(&sql)
                    .bind(rfc)
                    .fetch_optional(p)
                    .await
                    .context("Failed to get colaborador by RFC")?;
                row.map(|row| row_to_colaborador!(&row)).transpose()
            }
            Backend::Mysql(p) => {
                let row = sqlx::query(&sql)
                    .bind(rfc)
                    .fetch_optional(p)
                    .await
                    .context("Failed to get colaborador by RFC")?;
                row.map(|row| row_to_colaborador!(&row)).transpose()
            }
        }
    }

    async fn list(&self, filtro: &FiltroColaboradores) -> Result<(Vec<ColaboradorResumen>, i64)> {
        match self.pool.backend() {
            Backend::Sqlite(p) => list_colaboradores_sqlite(p, filtro).await,
            Backend::Mysql(p) => list_colaboradores_mysql(p, filtro).await,
        }
    }

    async fn find_duplicados(
        &self,
        rfc: &str,
        curp: Option<&str>,
        nss: Option<&str>,
        correo: Option<&str>,
    ) -> Result<Vec<Duplicado>> {
        let correo_lower = correo.map(str::to_lowercase);
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let rows = sqlx::query(DUPLICADOS_SQL)
                    .bind(rfc)
                    .bind(curp)
                    .bind(curp)
                    .bind(nss)
                    .bind(nss)
                    .bind(&correo_lower)
                    .bind(&correo_lower)
                    .fetch_all(p)
                    .await
                    .context("Failed to search duplicates")?;
                rows.iter()
                    .map(|row| row_to_duplicado!(row, rfc, curp, nss, correo))
                    .collect()
            }
            Backend::Mysql(p) => {
                let rows = sqlx::query(DUPLICADOS_SQL)
                    .bind(rfc)
                    .bind(curp)
                    .bind(curp)
                    .bind(nss)
                    .bind(nss)
                    .bind(&correo_lower)
                    .bind(&correo_lower)
                    .fetch_all(p)
                    .await
                    .context("Failed to search duplicates")?;
                rows.iter()
                    .map(|row| row_to_duplicado!(row, rfc, curp, nss, correo))
                    .collect()
            }
        }
    }

    async fn list_recursos(&self, colaborador_id: i64) -> Result<Vec<CatalogoItem>> {
        self.list_links(
            "SELECT r.id, r.nombre FROM colaborador_recurso cr \
             JOIN recursos_ti r ON r.id = cr.recurso_id \
             WHERE cr.colaborador_id = ? ORDER BY r.nombre",
            colaborador_id,
        )
        .await
        .context("Failed to list recursos of colaborador")
    }

    async fn list_programas(&self, colaborador_id: i64) -> Result<Vec<CatalogoItem>> {
        self.list_links(
            "SELECT pr.id, pr.nombre FROM colaborador_programa cp \
             JOIN programas pr ON pr.id = cp.programa_id \
             WHERE cp.colaborador_id = ? ORDER BY pr.nombre",
            colaborador_id,
        )
        .await
        .context("Failed to list programas of colaborador")
    }

    async fn registrar_baja(&self, id: i64, fecha_baja: NaiveDate, motivo: &str) -> Result<bool> {
        let sql = r#"
            UPDATE colaboradores
            SET estado = 'baja', fecha_baja = ?, motivo_baja = ?, updated_at = ?
            WHERE id = ? AND estado = 'activo'
        "#;
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql)
                .bind(fecha_baja)
                .bind(motivo)
                .bind(Utc::now())
                .bind(id)
                .execute(p)
                .await
                .context("Failed to register baja")?
                .rows_affected(),
            Backend::Mysql(p) => sqlx::query(sql)
                .bind(fecha_baja)
                .bind(motivo)
                .bind(Utc::now())
                .bind(id)
                .execute(p)
                .await
                .context("Failed to register baja")?
                .rows_affected(),
        };
        Ok(affected == 1)
    }

    async fn cambiar_area(&self, cambio: &NuevoCambioArea) -> Result<Option<CambioArea>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => cambiar_area_sqlite(p, cambio).await,
            Backend::Mysql(p) => cambiar_area_mysql(p, cambio).await,
        }
    }

    async fn list_cambios(&self, colaborador_id: i64) -> Result<Vec<CambioArea>> {
        let sql = r#"
            SELECT id, colaborador_id, area_anterior_id, puesto_anterior_id, area_nueva_id,
                   puesto_nuevo_id, motivo, fecha_efectiva, usuario_id, created_at
            FROM cambios_area
            WHERE colaborador_id = ?
            ORDER BY fecha_efectiva DESC, id DESC
        "#;
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let rows = sqlx::query(sql)
                    .bind(colaborador_id)
                    .fetch_all(p)
                    .await
                    .context("Failed to list cambios de area")?;
                Ok(rows.iter().map(|row| row_to_cambio!(row)).collect())
            }
            Backend::Mysql(p) => {
                let rows = sqlx::query(sql)
                    .bind(colaborador_id)
                    .fetch_all(p)
                    .await
                    .context("Failed to list cambios de area")?;
                Ok(rows.iter().map(|row| row_to_cambio!(row)).collect())
            }
        }
    }

    async fn list_movimientos(
        &self,
        desde: NaiveDate,
        hasta: NaiveDate,
    ) -> Result<Vec<Movimiento>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let rows = sqlx::query(MOVIMIENTOS_SQL)
                    .bind(desde)
                    .bind(hasta)
                    .bind(desde)
                    .bind(hasta)
                    .fetch_all(p)
                    .await
                    .context("Failed to list movimientos")?;
                rows.iter().map(|row| row_to_movimiento!(row)).collect()
            }
            Backend::Mysql(p) => {
                let rows = sqlx::query(MOVIMIENTOS_SQL)
                    .bind(desde)
                    .bind(hasta)
                    .bind(desde)
                    .bind(hasta)
                    .fetch_all(p)
                    .await
                    .context("Failed to list movimientos")?;
                rows.iter().map(|row| row_to_movimiento!(row)).collect()
            }
        }
    }

    async fn list_asignaciones(&self) -> Result<Vec<AsignacionRecurso>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let rows = sqlx::query(ASIGNACIONES_SQL)
                    .fetch_all(p)
                    .await
                    .context("Failed to list TI assignments")?;
                rows.iter().map(|row| row_to_asignacion!(row)).collect()
            }
            Backend::Mysql(p) => {
                let rows = sqlx::query(ASIGNACIONES_SQL)
                    .fetch_all(p)
                    .await
                    .context("Failed to list TI assignments")?;
                rows.iter().map(|row| row_to_asignacion!(row)).collect()
            }
        }
    }
}

impl SqlxColaboradorRepository {
    async fn list_links(&self, sql: &str, colaborador_id: i64) -> Result<Vec<CatalogoItem>> {
        let items: Vec<CatalogoItem> = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql)
                .bind(colaborador_id)
                .fetch_all(p)
                .await?
                .iter()
                .map(|row| CatalogoItem {
                    id: row.get("id"),
                    nombre: row.get("nombre"),
                })
                .collect(),
            Backend::Mysql(p) => sqlx::query(sql)
                .bind(colaborador_id)
                .fetch_all(p)
                .await?
                .iter()
                .map(|row| CatalogoItem {
                    id: row.get("id"),
                    nombre: row.get("nombre"),
                })
                .collect(),
        };
        Ok(items)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_colaborador_sqlite(pool: &SqlitePool, nuevo: &NuevoColaborador) -> Result<i64> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let id = bind_nuevo_colaborador!(sqlx::query(INSERT_COLABORADOR), nuevo, now)
        .execute(&mut *tx)
        .await
        .context("Failed to create colaborador")?
        .last_insert_rowid();

    for recurso_id in &nuevo.recursos {
        sqlx::query("INSERT INTO colaborador_recurso (colaborador_id, recurso_id) VALUES (?, ?)")
            .bind(id)
            .bind(recurso_id)
            .execute(&mut *tx)
            .await
            .context("Failed to link recurso")?;
    }
    for programa_id in &nuevo.programas {
        sqlx::query("INSERT INTO colaborador_programa (colaborador_id, programa_id) VALUES (?, ?)")
            .bind(id)
            .bind(programa_id)
            .execute(&mut *tx)
            .await
            .context("Failed to link programa")?;
    }

    tx.commit().await.context("Failed to commit colaborador")?;
    Ok(id)
}

async fn list_colaboradores_sqlite(
    pool: &SqlitePool,
    filtro: &FiltroColaboradores,
) -> Result<(Vec<ColaboradorResumen>, i64)> {
    let params = filtro.params();
    let patron = filtro.patron_busqueda();

    let sql = format!(
        "SELECT c.id, c.nombre, c.apellido, c.rfc, c.correo, c.area_id, a.nombre AS area, \
         p.nombre AS puesto, c.fecha_alta, c.estado, c.fecha_baja {} \
         ORDER BY c.fecha_alta DESC, c.id DESC LIMIT ? OFFSET ?",
        RESUMEN_FROM
    );
    let rows = bind_filtro!(sqlx::query(&sql), filtro, patron)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list colaboradores")?;
    let items = rows
        .iter()
        .map(|row| row_to_resumen!(row))
        .collect::<Result<Vec<_>>>()?;

    let count_sql = format!("SELECT COUNT(*) {}", RESUMEN_FROM);
    let total: i64 = bind_filtro!(sqlx::query_scalar(&count_sql), filtro, patron)
        .fetch_one(pool)
        .await
        .context("Failed to count colaboradores")?;

    Ok((items, total))
}

async fn cambiar_area_sqlite(pool: &SqlitePool, cambio: &NuevoCambioArea) -> Result<Option<CambioArea>> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    // Only an active row still in the área the caller saw may move
    let movidos = sqlx::query(
        "UPDATE colaboradores SET area_id = ?, puesto_id = ?, updated_at = ? \
         WHERE id = ? AND estado = 'activo' AND area_id = ?",
    )
    .bind(cambio.area_nueva_id)
    .bind(cambio.puesto_nuevo_id)
    .bind(now)
    .bind(cambio.colaborador_id)
    .bind(cambio.area_anterior_id)
    .execute(&mut *tx)
    .await
    .context("Failed to move colaborador")?
    .rows_affected();
    if movidos != 1 {
        tx.rollback().await.context("Failed to roll back cambio de area")?;
        return Ok(None);
    }

    let id = sqlx::query(
        r#"
        INSERT INTO cambios_area (colaborador_id, area_anterior_id, puesto_anterior_id,
            area_nueva_id, puesto_nuevo_id, motivo, fecha_efectiva, usuario_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(cambio.colaborador_id)
    .bind(cambio.area_anterior_id)
    .bind(cambio.puesto_anterior_id)
    .bind(cambio.area_nueva_id)
    .bind(cambio.puesto_nuevo_id)
    .bind(&cambio.motivo)
    .bind(cambio.fecha_efectiva)
    .bind(cambio.usuario_id)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to record cambio de area")?
    .last_insert_rowid();

    if cambio.limpiar_comercial {
        sqlx::query(
            "UPDATE colaboradores SET rol_comercial = NULL, comisionista = ?, \
             numero_comisiones = NULL WHERE id = ?",
        )
        .bind(false)
        .bind(cambio.colaborador_id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear commercial fields")?;
    }

    tx.commit().await.context("Failed to commit cambio de area")?;
    Ok(Some(nuevo_cambio_registrado(id, cambio, now)))
}

fn nuevo_cambio_registrado(
    id: i64,
    cambio: &NuevoCambioArea,
    created_at: chrono::DateTime<Utc>,
) -> CambioArea {
    CambioArea {
        id,
        colaborador_id: cambio.colaborador_id,
        area_anterior_id: cambio.area_anterior_id,
        puesto_anterior_id: cambio.puesto_anterior_id,
        area_nueva_id: cambio.area_nueva_id,
        puesto_nuevo_id: cambio.puesto_nuevo_id,
        motivo: cambio.motivo.clone(),
        fecha_efectiva: cambio.fecha_efectiva,
        usuario_id: cambio.usuario_id,
        created_at,
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_colaborador_mysql(pool: &MySqlPool, nuevo: &NuevoColaborador) -> Result<i64> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let id = bind_nuevo_colaborador!(sqlx::query(INSERT_COLABORADOR), nuevo, now)
        .execute(&mut *tx)
        .await
        .context("Failed to create colaborador")?
        .last_insert_id() as i64;

    for recurso_id in &nuevo.recursos {
        sqlx::query("INSERT INTO colaborador_recurso (colaborador_id, recurso_id) VALUES (?, ?)")
            .bind(id)
            .bind(recurso_id)
            .execute(&mut *tx)
            .await
            .context("Failed to link recurso")?;
    }
    for programa_id in &nuevo.programas {
        sqlx::query("INSERT INTO colaborador_programa (colaborador_id, programa_id) VALUES (?, ?)")
            .bind(id)
            .bind(programa_id)
            .execute(&mut *tx)
            .await
            .context("Failed to link programa")?;
    }

    tx.commit().await.context("Failed to commit colaborador")?;
    Ok(id)
}

async fn list_colaboradores_mysql(
    pool: &MySqlPool,
    filtro: &FiltroColaboradores,
) -> Result<(Vec<ColaboradorResumen>, i64)> {
    let params = filtro.params();
    let patron = filtro.patron_busqueda();

    let sql = format!(
        "SELECT c.id, c.nombre, c.apellido, c.rfc, c.correo, c.area_id, a.nombre AS area, \
         p.nombre AS puesto, c.fecha_alta, c.estado, c.fecha_baja {} \
         ORDER BY c.fecha_alta DESC, c.id DESC LIMIT ? OFFSET ?",
        RESUMEN_FROM
    );
    let rows = bind_filtro!(sqlx::query(&sql), filtro, patron)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list colaboradores")?;
    let items = rows
        .iter()
        .map(|row| row_to_resumen!(row))
        .collect::<Result<Vec<_>>>()?;

    let count_sql = format!("SELECT COUNT(*) {}", RESUMEN_FROM);
    let total: i64 = bind_filtro!(sqlx::query_scalar(&count_sql), filtro, patron)
        .fetch_one(pool)
        .await
        .context("Failed to count colaboradores")?;

    Ok((items, total))
}

async fn cambiar_area_mysql(pool: &MySqlPool, cambio: &NuevoCambioArea) -> Result<Option<CambioArea>> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    // Only an active row still in the área the caller saw may move
    let movidos = sqlx::query(
        "UPDATE colaboradores SET area_id = ?, puesto_id = ?, updated_at = ? \
         WHERE id = ? AND estado = 'activo' AND area_id = ?",
    )
    .bind(cambio.area_nueva_id)
    .bind(cambio.puesto_nuevo_id)
    .bind(now)
    .bind(cambio.colaborador_id)
    .bind(cambio.area_anterior_id)
    .execute(&mut *tx)
    .await
    .context("Failed to move colaborador")?
    .rows_affected();
    if movidos != 1 {
        tx.rollback().await.context("Failed to roll back cambio de area")?;
        return Ok(None);
    }

    let id = sqlx::query(
        r#"
        INSERT INTO cambios_area (colaborador_id, area_anterior_id, puesto_anterior_id,
            area_nueva_id, puesto_nuevo_id, motivo, fecha_efectiva, usuario_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(cambio.colaborador_id)
    .bind(cambio.area_anterior_id)
    .bind(cambio.puesto_anterior_id)
    .bind(cambio.area_nueva_id)
    .bind(cambio.puesto_nuevo_id)
    .bind(&cambio.motivo)
    .bind(cambio.fecha_efectiva)
    .bind(cambio.usuario_id)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to record cambio de area")?
    .last_insert_id() as i64;

    if cambio.limpiar_comercial {
        sqlx::query(
            "UPDATE colaboradores SET rol_comercial = NULL, comisionista = ?, \
             numero_comisiones = NULL WHERE id = ?",
        )
        .bind(false)
        .bind(cambio.colaborador_id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear commercial fields")?;
    }

    tx.commit().await.context("Failed to commit cambio de area")?;
    Ok(Some(nuevo_cambio_registrado(id, cambio, now)))
}
