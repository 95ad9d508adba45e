//! Uploaded document model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File attached to a collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Documento {
    pub id: i64,
    pub colaborador_id: i64,
    /// Sanitized file name as stored on disk
    pub nombre_archivo: String,
    /// Path relative to the upload root
    #[serde(skip_serializing)]
    pub ruta_archivo: String,
    /// Label sent with the upload, `General` when absent
    pub tipo: String,
    /// Size in bytes
    pub tamano: i64,
    pub created_at: DateTime<Utc>,
}
