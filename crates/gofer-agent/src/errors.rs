// Archivo: errors.rs
// Propósito: errores del agente y alias Result<T>.
use gofer_messaging::MessagingError;
use gofer_rmi::RmiError;
use thiserror::Error;

/// Errores del agente.
///
/// - `Config`: variable de entorno con valor inválido.
/// - `Storage`: fallo al persistir o recuperar peticiones pendientes.
/// - `Closed`: el almacén o el pool ya fueron cerrados.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuración inválida: {0}")]
    Config(String),
    #[error("Error de almacenamiento: {0}")]
    Storage(String),
    #[error("Plugin duplicado: {0}")]
    DuplicatePlugin(String),
    #[error("Cerrado: {0}")]
    Closed(String),
    #[error(transparent)]
    Rmi(#[from] RmiError),
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error("Error de serialización: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Error de E/S: {0}")]
    Io(#[from] std::io::Error),
}

/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, AgentError>;
