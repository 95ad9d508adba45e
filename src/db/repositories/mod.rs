//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the SQL for one aggregate, in both dialects.

pub mod catalogo;
pub mod colaborador;
pub mod documento;
pub mod sesion;
pub mod usuario;

pub use catalogo::{CatalogoRepository, SqlxCatalogoRepository};
pub use colaborador::{ColaboradorRepository, SqlxColaboradorRepository};
pub use documento::{DocumentoRepository, SqlxDocumentoRepository};
pub use sesion::{SesionRepository, SqlxSesionRepository};
pub use usuario::{SqlxUsuarioRepository, UsuarioRepository};
