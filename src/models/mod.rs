//! Data models
//!
//! Database entities, input types and the flattened records used by the
//! dashboard aggregations.

mod catalogo;
mod colaborador;
mod documento;
mod usuario;

pub use catalogo::{es_area_comercial, normalizar_texto, Area, Catalogo, CatalogoItem, Puesto};
pub use colaborador::{
    AltaColaboradorInput, AsignacionRecurso, CambioArea, Colaborador, ColaboradorResumen, Duplicado,
    EstadoColaborador, FiltroColaboradores, ListParams, Movimiento, NuevoCambioArea,
    NuevoColaborador, PagedResult, Segmento,
};
pub use documento::Documento;
pub use usuario::{NuevoUsuario, Rol, Sesion, Usuario};
