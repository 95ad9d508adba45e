//! Catalog models
//!
//! Áreas, puestos and the simple lookup catalogs (reclutadores, bancos,
//! métodos de pago, recursos TI, programas).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Department
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub id: i64,
    pub nombre: String,
    #[serde(skip_serializing)]
    pub nombre_normalizado: String,
}

impl Area {
    /// True for sales departments
    pub fn es_comercial(&self) -> bool {
        es_area_comercial(&self.nombre)
    }
}

/// Position within an área
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Puesto {
    pub id: i64,
    pub nombre: String,
    pub area_id: i64,
}

/// Row of one of the simple catalogs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogoItem {
    pub id: i64,
    pub nombre: String,
}

/// Simple catalogs that share the `{id, nombre, nombre_normalizado}` layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Catalogo {
    Reclutadores,
    Bancos,
    MetodosPago,
    RecursosTi,
    Programas,
}

impl Catalogo {
    pub const ALL: [Catalogo; 5] = [
        Catalogo::Reclutadores,
        Catalogo::Bancos,
        Catalogo::MetodosPago,
        Catalogo::RecursosTi,
        Catalogo::Programas,
    ];

    /// Backing table name
    pub fn table(&self) -> &'static str {
        match self {
            Catalogo::Reclutadores => "reclutadores",
            Catalogo::Bancos => "bancos",
            Catalogo::MetodosPago => "metodos_pago",
            Catalogo::RecursosTi => "recursos_ti",
            Catalogo::Programas => "programas",
        }
    }

    /// Singular label used in error messages
    pub fn etiqueta(&self) -> &'static str {
        match self {
            Catalogo::Reclutadores => "Reclutador",
            Catalogo::Bancos => "Banco",
            Catalogo::MetodosPago => "Método de pago",
            Catalogo::RecursosTi => "Recurso TI",
            Catalogo::Programas => "Programa",
        }
    }
}

impl fmt::Display for Catalogo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

impl FromStr for Catalogo {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "reclutadores" => Ok(Catalogo::Reclutadores),
            "bancos" => Ok(Catalogo::Bancos),
            "metodos_pago" => Ok(Catalogo::MetodosPago),
            "recursos_ti" | "equipos" => Ok(Catalogo::RecursosTi),
            "programas" => Ok(Catalogo::Programas),
            _ => Err(anyhow::anyhow!("Invalid catalog: {}", s)),
        }
    }
}

/// Trim, lowercase, strip diacritics and collapse inner whitespace.
///
/// Diacritics are removed after canonical decomposition (NFD), so composed
/// and decomposed spellings of a name share one key. Used as the uniqueness
/// key of every catalog.
pub fn normalizar_texto(s: &str) -> String {
    let sin_marcas: String = s
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();
    sin_marcas.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True when the normalized área name contains "comercial"
pub fn es_area_comercial(nombre: &str) -> bool {
    normalizar_texto(nombre).contains("comercial")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizar_texto() {
        assert_eq!(normalizar_texto("  Dirección   General "), "direccion general");
        assert_eq!(normalizar_texto("BAÑOS"), "banos");
        assert_eq!(normalizar_texto("Pingüino"), "pinguino");
        assert_eq!(normalizar_texto(""), "");
    }

    #[test]
    fn test_normalizar_decomposed_input() {
        assert_eq!(normalizar_texto("Direccio\u{301}n"), "direccion");
        assert_eq!(normalizar_texto("Operacio\u{301}nes"), normalizar_texto("Operaciones"));
        assert_eq!(normalizar_texto("BAN\u{303}OS"), "banos");
    }

    #[test]
    fn test_es_area_comercial() {
        assert!(es_area_comercial("Comercial"));
        assert!(es_area_comercial("Área COMERCIAL Norte"));
        assert!(!es_area_comercial("Recursos Humanos"));
    }

    #[test]
    fn test_catalogo_from_str() {
        assert_eq!(Catalogo::from_str("bancos").unwrap(), Catalogo::Bancos);
        assert_eq!(Catalogo::from_str("metodos-pago").unwrap(), Catalogo::MetodosPago);
        assert_eq!(Catalogo::from_str("Recursos_TI").unwrap(), Catalogo::RecursosTi);
        assert!(Catalogo::from_str("usuarios").is_err());
    }

    #[test]
    fn test_catalogo_table_roundtrip() {
        for catalogo in Catalogo::ALL {
            assert_eq!(Catalogo::from_str(catalogo.table()).unwrap(), catalogo);
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(50))]

            #[test]
            fn normalizar_es_idempotente(s in "[a-zA-ZáéíóúÁÉÍÓÚñÑ ]{0,40}") {
                let una = normalizar_texto(&s);
                prop_assert_eq!(normalizar_texto(&una), una.clone());
            }

            #[test]
            fn normalizar_nfc_y_nfd_coinciden(s in "[a-zA-ZáéíóúüÁÉÍÓÚÜñÑ ]{0,40}") {
                let nfc: String = s.nfc().collect();
                let nfd: String = s.nfd().collect();
                prop_assert_eq!(normalizar_texto(&nfc), normalizar_texto(&nfd));
            }

            #[test]
            fn normalizar_sin_espacios_extremos(s in "\\PC{0,40}") {
                let n = normalizar_texto(&s);
                prop_assert_eq!(n.trim(), n.as_str());
                prop_assert!(!n.contains("  "));
            }
        }
    }
}
