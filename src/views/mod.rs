//! View engine
//!
//! Server-side HTML pages rendered with Tera. Templates live in `templates/`
//! and are embedded into the binary, so a deployment only needs the
//! executable, its config file and the static directory.

use rust_embed::RustEmbed;
use serde::Serialize;
use std::error::Error as StdError;
use tera::{Context as TeraContext, Tera};

mod error;

pub use error::ViewError;

use crate::models::Usuario;

#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct Templates;

/// Tera instance loaded from the embedded templates
pub struct ViewEngine {
    tera: Tera,
}

/// Flash message shown at the top of a page
#[derive(Debug, Clone, Serialize)]
pub struct Aviso {
    /// `exito` or `error`
    pub tipo: &'static str,
    pub mensaje: String,
}

impl Aviso {
    pub fn exito(mensaje: impl Into<String>) -> Self {
        Self {
            tipo: "exito",
            mensaje: mensaje.into(),
        }
    }

    pub fn error(mensaje: impl Into<String>) -> Self {
        Self {
            tipo: "error",
            mensaje: mensaje.into(),
        }
    }
}

impl ViewEngine {
    /// Load every embedded template
    pub fn new() -> Result<Self, ViewError> {
        let mut templates = Vec::new();
        for name in Templates::iter() {
            let file = Templates::get(&name).ok_or_else(|| ViewError::NotFound(name.to_string()))?;
            let source = String::from_utf8(file.data.into_owned())
                .map_err(|_| ViewError::InvalidEncoding(name.to_string()))?;
            templates.push((name.to_string(), source));
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(templates)
            .map_err(|e| ViewError::TemplateError(describir(&e)))?;

        tracing::debug!(templates = tera.get_template_names().count(), "Views loaded");
        Ok(Self { tera })
    }

    /// Render a page. `usuario` is exposed to every template for the nav bar.
    pub fn render(
        &self,
        template: &str,
        usuario: Option<&Usuario>,
        mut context: TeraContext,
    ) -> Result<String, ViewError> {
        if !self.has_template(template) {
            return Err(ViewError::NotFound(template.to_string()));
        }
        if let Some(usuario) = usuario {
            context.insert("usuario", usuario);
            context.insert("puede_editar", &usuario.puede_editar());
            context.insert("es_admin", &usuario.is_admin());
        }
        self.tera
            .render(template, &context)
            .map_err(|e| ViewError::TemplateError(describir(&e)))
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|t| t == name)
    }
}

/// Flatten the Tera error chain into one message
fn describir(err: &tera::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(s) = source {
        msg.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    msg
}
