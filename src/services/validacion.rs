//! Field validation for Mexican identifiers and contact data
//!
//! Each function normalizes its input (trim, upper-case, strip separators)
//! and returns the normalized value, or a user-facing message.

use once_cell::sync::Lazy;
use regex::Regex;

static RFC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-ZÑ&]{3,4}\d{6}[A-Z0-9]{3}$").expect("valid RFC regex"));

static CURP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z]{4}\d{6}[HMX][A-Z]{5}[A-Z0-9]\d$").expect("valid CURP regex")
});

static NSS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{11}$").expect("valid NSS regex"));

static CORREO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("valid e-mail regex")
});

/// Longest accepted nombre or apellido
pub const MAX_NOMBRE: usize = 100;

/// Required text field, trimmed and bounded
pub fn texto_requerido(campo: &str, valor: &str) -> Result<String, String> {
    let valor = valor.trim();
    if valor.is_empty() {
        return Err(format!("El campo {} es obligatorio", campo));
    }
    if valor.chars().count() > MAX_NOMBRE {
        return Err(format!(
            "El campo {} no puede exceder {} caracteres",
            campo, MAX_NOMBRE
        ));
    }
    Ok(valor.to_string())
}

/// Optional text: blank becomes `None`
pub fn texto_opcional(valor: Option<&str>) -> Option<String> {
    valor
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn rfc(valor: &str) -> Result<String, String> {
    let rfc = valor.trim().to_uppercase();
    if rfc.is_empty() {
        return Err("El RFC es obligatorio".to_string());
    }
    if !RFC_RE.is_match(&rfc) {
        return Err(format!("RFC inválido: {}", rfc));
    }
    Ok(rfc)
}

pub fn curp(valor: &str) -> Result<String, String> {
    let curp = valor.trim().to_uppercase();
    if !CURP_RE.is_match(&curp) {
        return Err(format!("CURP inválida: {}", curp));
    }
    Ok(curp)
}

pub fn nss(valor: &str) -> Result<String, String> {
    let nss = solo_digitos(valor);
    if !NSS_RE.is_match(&nss) {
        return Err("El NSS debe tener 11 dígitos".to_string());
    }
    Ok(nss)
}

/// E-mail, stored lowercase
pub fn correo(valor: &str) -> Result<String, String> {
    let correo = valor.trim().to_lowercase();
    if !CORREO_RE.is_match(&correo) {
        return Err(format!("Correo electrónico inválido: {}", correo));
    }
    Ok(correo)
}

/// Ten-digit phone number once spaces, dashes, dots and parentheses are removed
pub fn telefono(valor: &str) -> Result<String, String> {
    let limpio: String = valor
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();
    if limpio.len() != 10 || !limpio.chars().all(|c| c.is_ascii_digit()) {
        return Err("El teléfono debe tener 10 dígitos".to_string());
    }
    Ok(limpio)
}

/// Bank account or CLABE: 10 to 18 digits
pub fn numero_cuenta(valor: &str) -> Result<String, String> {
    let cuenta = solo_digitos(valor);
    if !(10..=18).contains(&cuenta.len()) || !cuenta.chars().all(|c| c.is_ascii_digit()) {
        return Err("El número de cuenta debe tener entre 10 y 18 dígitos".to_string());
    }
    Ok(cuenta)
}

pub fn edad(valor: i64) -> Result<i64, String> {
    if !(16..=99).contains(&valor) {
        return Err("La edad debe estar entre 16 y 99 años".to_string());
    }
    Ok(valor)
}

pub fn sueldo(valor: f64) -> Result<f64, String> {
    if !valor.is_finite() || valor < 0.0 {
        return Err("El sueldo no puede ser negativo".to_string());
    }
    Ok(valor)
}

fn solo_digitos(valor: &str) -> String {
    valor.trim().chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc() {
        assert_eq!(rfc(" loaa900101ab1 ").unwrap(), "LOAA900101AB1");
        assert_eq!(rfc("ABC900101AB1").unwrap(), "ABC900101AB1");
        assert!(rfc("").is_err());
        assert!(rfc("LOAA9001").is_err());
        assert!(rfc("LOAA90010AAB1").is_err());
    }

    #[test]
    fn test_curp() {
        assert_eq!(curp("loaa900101mdfpnn09").unwrap(), "LOAA900101MDFPNN09");
        assert!(curp("LOAA900101ZDFPNN09").is_err());
        assert!(curp("LOAA900101").is_err());
    }

    #[test]
    fn test_nss() {
        assert_eq!(nss("123 4567 8901").unwrap(), "12345678901");
        assert!(nss("1234567890").is_err());
        assert!(nss("1234567890A").is_err());
    }

    #[test]
    fn test_correo() {
        assert_eq!(correo(" Ana.Lopez@Empresa.MX ").unwrap(), "ana.lopez@empresa.mx");
        assert!(correo("ana@").is_err());
        assert!(correo("sin-arroba.mx").is_err());
    }

    #[test]
    fn test_telefono() {
        assert_eq!(telefono("(55) 1234-5678").unwrap(), "5512345678");
        assert!(telefono("55 1234 567").is_err());
        assert!(telefono("55123456ab").is_err());
    }

    #[test]
    fn test_numero_cuenta() {
        assert_eq!(numero_cuenta("0123456789").unwrap(), "0123456789");
        assert_eq!(numero_cuenta("012 180 001234567890").unwrap(), "012180001234567890");
        assert!(numero_cuenta("123456789").is_err());
        assert!(numero_cuenta("12345678901234567890").is_err());
        assert!(numero_cuenta("12345-67890").is_err());
    }

    #[test]
    fn test_edad_y_sueldo() {
        assert!(edad(16).is_ok());
        assert!(edad(99).is_ok());
        assert!(edad(15).is_err());
        assert!(edad(100).is_err());
        assert!(sueldo(0.0).is_ok());
        assert!(sueldo(-1.0).is_err());
        assert!(sueldo(f64::NAN).is_err());
    }

    #[test]
    fn test_texto_requerido() {
        assert_eq!(texto_requerido("nombre", "  Ana ").unwrap(), "Ana");
        assert!(texto_requerido("nombre", "   ").is_err());
        assert!(texto_requerido("nombre", &"a".repeat(101)).is_err());
        assert_eq!(texto_opcional(Some("  ")), None);
        assert_eq!(texto_opcional(Some(" x ")), Some("x".to_string()));
    }
}
