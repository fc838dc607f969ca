// Archivo: errors.rs
// Propósito: errores de la capa de mensajería y alias Result<T> usado por
// las APIs del crate.
use thiserror::Error;

/// Código usado cuando la versión del documento no coincide.
pub const CODE_VERSION: &str = "model.version";
/// Código usado cuando la firma de un mensaje no valida.
pub const CODE_AUTHENTICATION: &str = "security.authentication";

/// Errores de la capa de mensajería.
///
/// - `Transport`: fallo del broker o de la cola.
/// - `InvalidDocument`: documento rechazado (versión, firma, forma).
/// - `InvalidWindow`: ventana con `begin` posterior a `end`.
#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Error de transporte: {0}")]
    Transport(String),
    /// Documento inválido; `code` identifica la causa para el emisor.
    #[error("Documento inválido [{code}]: {description} : {details}")]
    InvalidDocument { code: String, description: String, details: String },
    #[error("Ventana inválida: {0}")]
    InvalidWindow(String),
    #[error("Error de serialización: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Error de E/S: {0}")]
    Io(#[from] std::io::Error),
}

impl MessagingError {
    /// Versión de documento distinta a la esperada.
    pub fn version_mismatch(expected: &str, found: Option<&str>) -> Self {
        MessagingError::InvalidDocument { code: CODE_VERSION.into(),
                                          description: "versión no válida".into(),
                                          details: format!("esperada={} encontrada={}", expected, found.unwrap_or("ninguna")) }
    }

    /// Firma ausente o que no coincide con el digest.
    pub fn validation_failed(details: impl Into<String>) -> Self {
        MessagingError::InvalidDocument { code: CODE_AUTHENTICATION.into(),
                                          description: "autenticación del mensaje fallida".into(),
                                          details: details.into() }
    }
}

/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, MessagingError>;
