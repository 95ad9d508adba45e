//! Usuario service
//!
//! Implements business logic for internal users:
//! - Login/logout with database-backed sessions
//! - Session validation (expired sessions are removed on access)
//! - Account administration: creation, password reset, deactivation
//! - Hash audit for accounts still carrying legacy hashes
//! - Bootstrap of the first admin account

use crate::db::repositories::{SesionRepository, UsuarioRepository};
use crate::models::{NuevoUsuario, Rol, Sesion, Usuario};
use crate::services::password::{hash_kind, hash_password, validar_politica, verify_password, HashKind};
use crate::services::validacion;
use anyhow::Context;
use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Default session expiration time in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

const CREDENCIALES_INVALIDAS: &str = "Correo o contraseña incorrectos";

/// Error types for usuario service operations
#[derive(Debug, thiserror::Error)]
pub enum UsuarioServiceError {
    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Correo already registered
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Session expired")]
    SessionExpired,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Account whose stored hash cannot be verified by this service
#[derive(Debug, Clone, Serialize)]
pub struct HashPendiente {
    pub id: i64,
    pub correo: String,
    pub activo: bool,
    /// `legacy` or `desconocido`
    pub tipo: &'static str,
}

/// Usuario service for authentication and account management
pub struct UsuarioService {
    usuario_repo: Arc<dyn UsuarioRepository>,
    sesion_repo: Arc<dyn SesionRepository>,
    session_expiration_days: i64,
}

impl UsuarioService {
    pub fn new(
        usuario_repo: Arc<dyn UsuarioRepository>,
        sesion_repo: Arc<dyn SesionRepository>,
    ) -> Self {
        Self::with_session_expiration(usuario_repo, sesion_repo, DEFAULT_SESSION_EXPIRATION_DAYS)
    }

    /// Create a new usuario service with custom session expiration
    pub fn with_session_expiration(
        usuario_repo: Arc<dyn UsuarioRepository>,
        sesion_repo: Arc<dyn SesionRepository>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            usuario_repo,
            sesion_repo,
            session_expiration_days,
        }
    }

    pub fn session_expiration_days(&self) -> i64 {
        self.session_expiration_days
    }

    /// Login with correo and password
    ///
    /// Unknown correo and wrong password produce the same error. Accounts
    /// whose hash predates argon2 cannot log in until an admin resets the
    /// password.
    pub async fn login(
        &self,
        correo: &str,
        password: &str,
    ) -> Result<(Sesion, Usuario), UsuarioServiceError> {
        let correo = correo.trim().to_lowercase();
        if correo.is_empty() || password.is_empty() {
            return Err(UsuarioServiceError::ValidationError(
                "Correo y contraseña son obligatorios".to_string(),
            ));
        }

        let usuario = self
            .usuario_repo
            .get_by_correo(&correo)
            .await
            .context("Failed to get usuario by correo")?
            .ok_or_else(|| {
                UsuarioServiceError::AuthenticationError(CREDENCIALES_INVALIDAS.to_string())
            })?;

        match hash_kind(&usuario.password_hash) {
            HashKind::Argon2 => {}
            kind => {
                tracing::warn!(usuario_id = usuario.id, ?kind, "Login rejected: password hash needs reset");
                return Err(UsuarioServiceError::AuthenticationError(
                    "Tu contraseña debe ser restablecida. Solicítalo a un administrador.".to_string(),
                ));
            }
        }

        let valid = verify_password(password, &usuario.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            return Err(UsuarioServiceError::AuthenticationError(
                CREDENCIALES_INVALIDAS.to_string(),
            ));
        }

        if !usuario.activo {
            return Err(UsuarioServiceError::AuthenticationError(
                "Tu cuenta está desactivada. Contacta al administrador.".to_string(),
            ));
        }

        let sesion = self.create_session(usuario.id).await?;
        tracing::info!(usuario_id = usuario.id, "Usuario logged in");

        Ok((sesion, usuario))
    }

    /// Logout (invalidate session)
    pub async fn logout(&self, token: &str) -> Result<(), UsuarioServiceError> {
        self.sesion_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Validate a session token and return its usuario
    ///
    /// # Errors
    /// - `SessionNotFound` for unknown tokens, deleted or inactive usuarios
    /// - `SessionExpired` when the session is past its expiry (it is deleted)
    pub async fn validar_sesion(&self, token: &str) -> Result<Usuario, UsuarioServiceError> {
        let sesion = self
            .sesion_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
            .ok_or(UsuarioServiceError::SessionNotFound)?;

        if sesion.is_expired() {
            self.sesion_repo
                .delete(token)
                .await
                .context("Failed to delete expired session")?;
            return Err(UsuarioServiceError::SessionExpired);
        }

        let usuario = self
            .usuario_repo
            .get_by_id(sesion.usuario_id)
            .await
            .context("Failed to get usuario")?
            .filter(|u| u.activo)
            .ok_or(UsuarioServiceError::SessionNotFound)?;

        Ok(usuario)
    }

    /// Create a usuario (admin or CLI)
    pub async fn crear_usuario(&self, input: NuevoUsuario) -> Result<Usuario, UsuarioServiceError> {
        let correo = validacion::correo(&input.correo).map_err(UsuarioServiceError::ValidationError)?;
        let nombre = validacion::texto_requerido("nombre", &input.nombre)
            .map_err(UsuarioServiceError::ValidationError)?;
        validar_politica(&input.password).map_err(UsuarioServiceError::ValidationError)?;

        if self
            .usuario_repo
            .get_by_correo(&correo)
            .await
            .context("Failed to check correo")?
            .is_some()
        {
            return Err(UsuarioServiceError::Conflict(format!(
                "El correo '{}' ya está registrado",
                correo
            )));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let now = Utc::now();
        let usuario = Usuario {
            id: 0,
            correo,
            nombre,
            password_hash,
            area_id: input.area_id,
            rol: input.rol,
            activo: true,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .usuario_repo
            .create(&usuario)
            .await
            .context("Failed to create usuario")?;

        tracing::info!(usuario_id = created.id, rol = %created.rol, "Usuario created");
        Ok(created)
    }

    /// Replace a usuario's password. Existing sessions are closed.
    pub async fn restablecer_password(
        &self,
        id: i64,
        password: &str,
    ) -> Result<Usuario, UsuarioServiceError> {
        validar_politica(password).map_err(UsuarioServiceError::ValidationError)?;

        let mut usuario = self.require(id).await?;
        usuario.password_hash = hash_password(password).context("Failed to hash password")?;

        let updated = self
            .usuario_repo
            .update(&usuario)
            .await
            .context("Failed to update usuario")?;
        self.sesion_repo
            .delete_by_usuario(id)
            .await
            .context("Failed to delete sessions")?;

        tracing::info!(usuario_id = id, "Password reset");
        Ok(updated)
    }

    /// Deactivate a usuario and close all of their sessions.
    ///
    /// Returns the number of sessions removed.
    pub async fn desactivar(&self, id: i64) -> Result<u64, UsuarioServiceError> {
        let mut usuario = self.require(id).await?;
        usuario.activo = false;

        self.usuario_repo
            .update(&usuario)
            .await
            .context("Failed to update usuario")?;
        let cerradas = self
            .sesion_repo
            .delete_by_usuario(id)
            .await
            .context("Failed to delete sessions")?;

        tracing::info!(usuario_id = id, sesiones = cerradas, "Usuario deactivated");
        Ok(cerradas)
    }

    pub async fn listar(&self) -> Result<Vec<Usuario>, UsuarioServiceError> {
        Ok(self.usuario_repo.list().await.context("Failed to list usuarios")?)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Usuario>, UsuarioServiceError> {
        Ok(self
            .usuario_repo
            .get_by_id(id)
            .await
            .context("Failed to get usuario by ID")?)
    }

    pub async fn get_by_correo(&self, correo: &str) -> Result<Option<Usuario>, UsuarioServiceError> {
        Ok(self
            .usuario_repo
            .get_by_correo(&correo.trim().to_lowercase())
            .await
            .context("Failed to get usuario by correo")?)
    }

    /// Usuarios whose stored hash is not argon2
    pub async fn auditar_hashes(&self) -> Result<Vec<HashPendiente>, UsuarioServiceError> {
        let usuarios = self.listar().await?;
        Ok(usuarios
            .into_iter()
            .filter_map(|u| {
                let tipo = match hash_kind(&u.password_hash) {
                    HashKind::Argon2 => return None,
                    HashKind::Legacy => "legacy",
                    HashKind::Unknown => "desconocido",
                };
                Some(HashPendiente {
                    id: u.id,
                    correo: u.correo,
                    activo: u.activo,
                    tipo,
                })
            })
            .collect())
    }

    /// Create the first admin when the usuarios table is empty.
    ///
    /// Returns `None` when usuarios already exist.
    pub async fn bootstrap_admin(
        &self,
        correo: &str,
        password: &str,
    ) -> Result<Option<Usuario>, UsuarioServiceError> {
        let count = self
            .usuario_repo
            .count()
            .await
            .context("Failed to count usuarios")?;
        if count > 0 {
            return Ok(None);
        }

        let admin = self
            .crear_usuario(NuevoUsuario {
                correo: correo.to_string(),
                nombre: "Administrador".to_string(),
                password: password.to_string(),
                rol: Rol::Admin,
                area_id: None,
            })
            .await?;
        Ok(Some(admin))
    }

    /// Delete all expired sessions
    pub async fn limpiar_sesiones(&self) -> Result<u64, UsuarioServiceError> {
        Ok(self
            .sesion_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?)
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn require(&self, id: i64) -> Result<Usuario, UsuarioServiceError> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| UsuarioServiceError::NotFound(format!("Usuario {}", id)))
    }

    async fn create_session(&self, usuario_id: i64) -> Result<Sesion, UsuarioServiceError> {
        let now = Utc::now();
        let sesion = Sesion {
            id: Uuid::new_v4().to_string(),
            usuario_id,
            expires_at: now + Duration::days(self.session_expiration_days),
            created_at: now,
        };

        let created = self
            .sesion_repo
            .create(&sesion)
            .await
            .context("Failed to create session")?;

        Ok(created)
    }
}
