//! Services layer - Business logic
//!
//! Services are responsible for:
//! - Validating input and enforcing business rules
//! - Coordinating between repositories and the cache
//! - Mapping failures to typed service errors

pub mod analytics;
pub mod catalogo;
pub mod colaborador;
pub mod documento;
pub mod password;
pub mod rate_limiter;
pub mod usuario;
pub mod validacion;

pub use analytics::{AnalyticsService, AnalyticsServiceError, Periodo};
pub use catalogo::{CatalogoService, CatalogoServiceError, Catalogos};
pub use colaborador::{
    BajaInput, CambioAreaInput, ColaboradorDetalle, ColaboradorService, ColaboradorServiceError,
    VerificacionRfc,
};
pub use documento::{ArchivoSubido, DocumentoService, DocumentoServiceError};
pub use password::{hash_kind, hash_password, validar_politica, verify_password, HashKind};
pub use rate_limiter::LoginRateLimiter;
pub use usuario::{HashPendiente, UsuarioService, UsuarioServiceError};
