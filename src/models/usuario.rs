//! Internal user model
//!
//! Usuarios are HR staff who operate the application; they are unrelated to
//! the colaboradores being registered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Internal user account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usuario {
    pub id: i64,
    /// Login e-mail, stored lowercase
    pub correo: String,
    pub nombre: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub area_id: Option<i64>,
    pub rol: Rol,
    pub activo: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Usuario {
    pub fn is_admin(&self) -> bool {
        self.rol == Rol::Admin
    }

    /// May register, terminate and transfer collaborators
    pub fn puede_editar(&self) -> bool {
        self.rol.puede_editar()
    }
}

/// Access level
///
/// - Admin: everything, including usuario and catalog management
/// - Coordinador: alta, baja, cambio de área and uploads
/// - Consulta: read only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Rol {
    Admin,
    Coordinador,
    #[default]
    Consulta,
}

impl Rol {
    pub fn puede_editar(&self) -> bool {
        matches!(self, Rol::Admin | Rol::Coordinador)
    }
}

impl fmt::Display for Rol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rol::Admin => write!(f, "admin"),
            Rol::Coordinador => write!(f, "coordinador"),
            Rol::Consulta => write!(f, "consulta"),
        }
    }
}

impl FromStr for Rol {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Rol::Admin),
            "coordinador" => Ok(Rol::Coordinador),
            "consulta" => Ok(Rol::Consulta),
            _ => Err(anyhow::anyhow!("Invalid role: {}", s)),
        }
    }
}

/// Input for creating a usuario (before password hashing)
#[derive(Debug, Clone, Deserialize)]
pub struct NuevoUsuario {
    pub correo: String,
    pub nombre: String,
    pub password: String,
    #[serde(default)]
    pub rol: Rol,
    #[serde(default)]
    pub area_id: Option<i64>,
}

/// Session entity for usuario authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sesion {
    /// Session token (uuid v4)
    pub id: String,
    pub usuario_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Sesion {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_rol_permissions() {
        assert!(Rol::Admin.puede_editar());
        assert!(Rol::Coordinador.puede_editar());
        assert!(!Rol::Consulta.puede_editar());
    }

    #[test]
    fn test_rol_parse() {
        assert_eq!(Rol::from_str("ADMIN").unwrap(), Rol::Admin);
        assert_eq!(Rol::from_str("coordinador").unwrap(), Rol::Coordinador);
        assert_eq!(Rol::default(), Rol::Consulta);
        assert!(Rol::from_str("editor").is_err());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let now = Utc::now();
        let usuario = Usuario {
            id: 1,
            correo: "rh@empresa.mx".to_string(),
            nombre: "RH".to_string(),
            password_hash: "$argon2id$secreto".to_string(),
            area_id: None,
            rol: Rol::Admin,
            activo: true,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&usuario).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("\"rol\":\"admin\""));
    }

    #[test]
    fn test_sesion_expiration() {
        let now = Utc::now();
        let vencida = Sesion {
            id: "a".to_string(),
            usuario_id: 1,
            expires_at: now - Duration::hours(1),
            created_at: now - Duration::days(8),
        };
        let vigente = Sesion {
            id: "b".to_string(),
            usuario_id: 1,
            expires_at: now + Duration::hours(1),
            created_at: now,
        };
        assert!(vencida.is_expired());
        assert!(!vigente.is_expired());
    }
}
