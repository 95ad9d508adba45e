//! Documento service
//!
//! Files uploaded for a collaborator are stored under
//! `<upload.path>/colaborador_<id>/` with sanitized names; the database keeps
//! the path relative to the upload root.

use crate::config::UploadConfig;
use crate::db::repositories::{ColaboradorRepository, DocumentoRepository};
use crate::models::Documento;
use anyhow::Context;
use chrono::Utc;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use uuid::Uuid;

/// Label used when a file is uploaded without one
pub const TIPO_GENERAL: &str = "General";

const MAX_NOMBRE_ARCHIVO: usize = 150;

#[derive(Debug, thiserror::Error)]
pub enum DocumentoServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A file received from a multipart form
#[derive(Debug, Clone)]
pub struct ArchivoSubido {
    /// Client-side file name, unsanitized
    pub nombre: String,
    /// Label from `documentos_nombres[]`
    pub tipo: Option<String>,
    pub datos: Vec<u8>,
}

pub struct DocumentoService {
    repo: Arc<dyn DocumentoRepository>,
    colaboradores: Arc<dyn ColaboradorRepository>,
    config: UploadConfig,
}

impl DocumentoService {
    pub fn new(
        repo: Arc<dyn DocumentoRepository>,
        colaboradores: Arc<dyn ColaboradorRepository>,
        config: UploadConfig,
    ) -> Self {
        Self {
            repo,
            colaboradores,
            config,
        }
    }

    /// Store files for a collaborator.
    ///
    /// Every file is checked before any is written, and a write failure
    /// rolls back the files already stored, so a batch is all or nothing.
    pub async fn subir(
        &self,
        colaborador_id: i64,
        archivos: Vec<ArchivoSubido>,
    ) -> Result<Vec<Documento>, DocumentoServiceError> {
        self.colaboradores
            .get_by_id(colaborador_id)
            .await
            .context("Failed to get colaborador")?
            .ok_or_else(|| DocumentoServiceError::NotFound(format!("Colaborador {}", colaborador_id)))?;

        self.validar_archivos(&archivos)?;
        let preparados: Vec<_> = archivos
            .into_iter()
            .map(|archivo| (sanitizar_nombre(&archivo.nombre), archivo))
            .collect();

        let carpeta = carpeta_colaborador(colaborador_id);
        let destino = self.config.path.join(&carpeta);
        fs::create_dir_all(&destino)
            .await
            .with_context(|| format!("Failed to create upload dir {}", destino.display()))?;

        let mut documentos = Vec::with_capacity(preparados.len());
        for (nombre, archivo) in preparados {
            match self.guardar(colaborador_id, &carpeta, &destino, nombre, archivo).await {
                Ok(documento) => documentos.push(documento),
                Err(e) => {
                    self.deshacer(&documentos).await;
                    return Err(e);
                }
            }
        }

        Ok(documentos)
    }

    /// Write one file and its row; the file is removed if the row fails
    async fn guardar(
        &self,
        colaborador_id: i64,
        carpeta: &str,
        destino: &Path,
        nombre: String,
        archivo: ArchivoSubido,
    ) -> Result<Documento, DocumentoServiceError> {
        let nombre = nombre_disponible(destino, nombre).await;
        let ruta = destino.join(&nombre);
        fs::write(&ruta, &archivo.datos)
            .await
            .with_context(|| format!("Failed to save file {}", ruta.display()))?;

        let tipo = archivo
            .tipo
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(TIPO_GENERAL)
            .to_string();

        let creado = self
            .repo
            .create(&Documento {
                id: 0,
                colaborador_id,
                nombre_archivo: nombre.clone(),
                ruta_archivo: format!("{}/{}", carpeta, nombre),
                tipo,
                tamano: archivo.datos.len() as i64,
                created_at: Utc::now(),
            })
            .await;
        let documento = match creado {
            Ok(documento) => documento,
            Err(e) => {
                let _ = fs::remove_file(&ruta).await;
                return Err(e.context("Failed to create documento").into());
            }
        };

        tracing::info!(
            documento_id = documento.id,
            colaborador_id,
            tamano = documento.tamano,
            "Documento stored"
        );
        Ok(documento)
    }

    /// Remove the rows and files of a partially stored batch
    async fn deshacer(&self, documentos: &[Documento]) {
        for documento in documentos {
            if let Err(e) = self.repo.delete(documento.id).await {
                tracing::error!(documento_id = documento.id, "Failed to roll back documento: {}", e);
            }
            if let Some(ruta) = resolver(&self.config.path, &documento.ruta_archivo) {
                let _ = fs::remove_file(&ruta).await;
            }
        }
        tracing::warn!(documentos = documentos.len(), "Document batch rolled back");
    }

    pub async fn listar(&self, colaborador_id: i64) -> Result<Vec<Documento>, DocumentoServiceError> {
        Ok(self
            .repo
            .list_by_colaborador(colaborador_id)
            .await
            .context("Failed to list documentos")?)
    }

    /// Metadata and contents of a stored document
    pub async fn descargar(&self, id: i64) -> Result<(Documento, Vec<u8>), DocumentoServiceError> {
        let documento = self.get(id).await?;
        let ruta = resolver(&self.config.path, &documento.ruta_archivo).ok_or_else(|| {
            tracing::warn!(documento_id = id, "Document path escapes the upload root");
            DocumentoServiceError::NotFound(format!("Documento {}", id))
        })?;

        let datos = match fs::read(&ruta).await {
            Ok(datos) => datos,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DocumentoServiceError::NotFound(format!(
                    "Archivo del documento {}",
                    id
                )))
            }
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("Failed to read {}", ruta.display()))
                    .into())
            }
        };

        Ok((documento, datos))
    }

    /// Delete the row and the file. A file already missing is not an error.
    pub async fn eliminar(&self, id: i64) -> Result<Documento, DocumentoServiceError> {
        let documento = self.get(id).await?;

        if let Some(ruta) = resolver(&self.config.path, &documento.ruta_archivo) {
            match fs::remove_file(&ruta).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!(documento_id = id, "Document file already missing");
                }
                Err(e) => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("Failed to delete {}", ruta.display()))
                        .into())
                }
            }
        }

        self.repo
            .delete(id)
            .await
            .context("Failed to delete documento")?;
        tracing::info!(documento_id = id, "Documento deleted");
        Ok(documento)
    }

    async fn get(&self, id: i64) -> Result<Documento, DocumentoServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get documento")?
            .ok_or_else(|| DocumentoServiceError::NotFound(format!("Documento {}", id)))
    }

    /// Check size and extension of a batch without touching the disk
    pub fn validar_archivos(&self, archivos: &[ArchivoSubido]) -> Result<(), DocumentoServiceError> {
        for archivo in archivos {
            self.validar(&sanitizar_nombre(&archivo.nombre), archivo.datos.len() as u64)?;
        }
        Ok(())
    }

    fn validar(&self, nombre: &str, tamano: u64) -> Result<(), DocumentoServiceError> {
        if tamano == 0 {
            return Err(DocumentoServiceError::ValidationError(format!(
                "El archivo {} está vacío",
                nombre
            )));
        }
        if tamano > self.config.max_file_size {
            return Err(DocumentoServiceError::ValidationError(format!(
                "El archivo {} excede el tamaño máximo de {} MB",
                nombre,
                self.config.max_file_size / 1024 / 1024
            )));
        }

        let extension = nombre.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
        if !self.config.is_extension_allowed(extension) {
            return Err(DocumentoServiceError::ValidationError(format!(
                "Tipo de archivo no permitido: {}. Permitidos: {}",
                nombre,
                self.config.allowed_extensions.join(", ")
            )));
        }
        Ok(())
    }
}

/// Absolute path of a stored relative path, or `None` if it would leave the root
fn resolver(root: &Path, relativa: &str) -> Option<PathBuf> {
    let relativa = Path::new(relativa);
    let mut componentes = relativa.components().peekable();
    componentes.peek()?;
    componentes
        .all(|c| matches!(c, Component::Normal(_)))
        .then(|| root.join(relativa))
}

fn carpeta_colaborador(colaborador_id: i64) -> String {
    format!("colaborador_{}", colaborador_id)
}

/// Reduce a client file name to a safe single path component.
///
/// Directory parts are dropped, spaces become `_`, and only ASCII
/// alphanumerics, `.`, `-` and `_` survive. Leading dots are removed.
pub fn sanitizar_nombre(nombre: &str) -> String {
    let base = nombre.rsplit(['/', '\\']).next().unwrap_or("");
    let limpio: String = base
        .chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let limpio = limpio.trim_start_matches('.');

    if limpio.is_empty() {
        return "documento".to_string();
    }

    // Keep the extension when truncating
    if limpio.len() > MAX_NOMBRE_ARCHIVO {
        if let Some((base, ext)) = limpio.rsplit_once('.') {
            let corte = MAX_NOMBRE_ARCHIVO.saturating_sub(ext.len() + 1).min(base.len());
            return format!("{}.{}", &base[..corte], ext);
        }
        return limpio[..MAX_NOMBRE_ARCHIVO].to_string();
    }
    limpio.to_string()
}

/// `nombre` if free in `carpeta`, else `nombre` with a short unique prefix
async fn nombre_disponible(carpeta: &Path, nombre: String) -> String {
    let ocupado = fs::try_exists(carpeta.join(&nombre)).await.unwrap_or(true);
    if !ocupado {
        return nombre;
    }
    let prefijo: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    format!("{}_{}", prefijo, nombre)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxColaboradorRepository, SqlxDocumentoRepository};
    use crate::db::{create_test_pool, migrations};
    use tempfile::TempDir;

    async fn setup() -> (TempDir, DocumentoService) {
        let dir = TempDir::new().expect("temp dir");
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool.execute(
            "INSERT INTO colaboradores (id, nombre, apellido, rfc, fecha_alta, area_id) \
             VALUES (1, 'Ana', 'López', 'LOAA900101AB1', '2024-01-15', 3)",
        )
        .await
        .expect("Failed to create colaborador");

        let config = UploadConfig {
            path: dir.path().to_path_buf(),
            max_file_size: 1024,
            ..UploadConfig::default()
        };
        let service = DocumentoService::new(
            SqlxDocumentoRepository::boxed(pool.clone()),
            SqlxColaboradorRepository::boxed(pool),
            config,
        );
        (dir, service)
    }

    fn archivo(nombre: &str, tipo: Option<&str>, datos: &[u8]) -> ArchivoSubido {
        ArchivoSubido {
            nombre: nombre.to_string(),
            tipo: tipo.map(str::to_string),
            datos: datos.to_vec(),
        }
    }

    #[test]
    fn test_sanitizar_nombre() {
        assert_eq!(sanitizar_nombre("../../etc/passwd"), "passwd");
        assert_eq!(sanitizar_nombre("C:\\docs\\Acta Nacimiento.pdf"), "Acta_Nacimiento.pdf");
        assert_eq!(sanitizar_nombre(".oculto.pdf"), "oculto.pdf");
        assert_eq!(sanitizar_nombre("comprobante (1)ñ.PDF"), "comprobante_1.PDF");
        assert_eq!(sanitizar_nombre("..."), "documento");
        assert_eq!(sanitizar_nombre(""), "documento");

        let largo = format!("{}.pdf", "a".repeat(300));
        let corto = sanitizar_nombre(&largo);
        assert_eq!(corto.len(), MAX_NOMBRE_ARCHIVO);
        assert!(corto.ends_with(".pdf"));
    }

    #[tokio::test]
    async fn test_subir_listar_descargar() {
        let (dir, service) = setup().await;

        let docs = service
            .subir(1, vec![
                archivo("ine.pdf", Some("INE"), b"%PDF-1.4"),
                archivo("foto.png", Some("  "), b"png"),
            ])
            .await
            .expect("upload");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].tipo, "INE");
        assert_eq!(docs[1].tipo, TIPO_GENERAL);
        assert!(dir.path().join("colaborador_1/ine.pdf").exists());

        let listados = service.listar(1).await.expect("list");
        assert_eq!(listados.len(), 2);

        let (doc, datos) = service.descargar(docs[0].id).await.expect("download");
        assert_eq!(doc.nombre_archivo, "ine.pdf");
        assert_eq!(datos, b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_subir_same_name_gets_prefix() {
        let (_dir, service) = setup().await;
        let a = service.subir(1, vec![archivo("ine.pdf", None, b"a")]).await.expect("upload");
        let b = service.subir(1, vec![archivo("ine.pdf", None, b"b")]).await.expect("upload");

        assert_eq!(a[0].nombre_archivo, "ine.pdf");
        assert_ne!(b[0].nombre_archivo, "ine.pdf");
        assert!(b[0].nombre_archivo.ends_with("_ine.pdf"));

        let (_, datos) = service.descargar(a[0].id).await.expect("download");
        assert_eq!(datos, b"a");
    }

    #[tokio::test]
    async fn test_subir_rejects_whole_batch() {
        let (dir, service) = setup().await;
        let result = service
            .subir(1, vec![
                archivo("ine.pdf", None, b"ok"),
                archivo("script.exe", None, b"MZ"),
            ])
            .await;
        assert!(matches!(result, Err(DocumentoServiceError::ValidationError(_))));
        assert!(!dir.path().join("colaborador_1/ine.pdf").exists());

        let grande = vec![0u8; 2048];
        let result = service.subir(1, vec![archivo("grande.pdf", None, &grande)]).await;
        assert!(matches!(result, Err(DocumentoServiceError::ValidationError(_))));

        let result = service.subir(99, vec![archivo("ine.pdf", None, b"ok")]).await;
        assert!(matches!(result, Err(DocumentoServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_eliminar() {
        let (dir, service) = setup().await;
        let docs = service.subir(1, vec![archivo("ine.pdf", None, b"x")]).await.expect("upload");

        service.eliminar(docs[0].id).await.expect("delete");
        assert!(!dir.path().join("colaborador_1/ine.pdf").exists());
        assert!(matches!(
            service.descargar(docs[0].id).await,
            Err(DocumentoServiceError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolver_rejects_escapes() {
        let root = Path::new("/srv/uploads");
        assert_eq!(
            resolver(root, "colaborador_1/ine.pdf"),
            Some(PathBuf::from("/srv/uploads/colaborador_1/ine.pdf"))
        );
        assert!(resolver(root, "../secreto.pdf").is_none());
        assert!(resolver(root, "/etc/passwd").is_none());
        assert!(resolver(root, "").is_none());
    }
}
