// Archivo: errors.rs
// Propósito: errores de la capa RMI y alias Result<T>. Estos errores viajan
// de vuelta al llamador serializados (ver `marshal`), por eso cada variante
// lleva su estado en campos con nombre.
use gofer_messaging::MessagingError;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Excepción levantada por código de plugin (o recibida sin tipo conocido).
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteException {
    pub xmodule: String,
    pub xclass: String,
    pub message: String,
    pub state: Map<String, Value>,
    pub args: Vec<Value>,
}

impl RemoteException {
    /// Crea una excepción de plugin de clase `xclass`.
    pub fn new(xclass: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self { xmodule: "plugin".into(),
               xclass: xclass.into(),
               args: vec![Value::from(message.clone())],
               message,
               state: Map::new() }
    }

    /// Añade un campo al estado estructurado.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.state.insert(key.to_string(), value.into());
        self
    }
}

impl fmt::Display for RemoteException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.xclass, self.message)
    }
}

/// Errores RMI.
#[derive(Error, Debug)]
pub enum RmiError {
    #[error("\"{0}\" no es provisto por el plugin")]
    NamespaceNotFound(String),
    #[error("\"{namespace}.{method}()\" no es provisto por el plugin")]
    MemberNotFound { namespace: String, method: String },
    #[error("\"{namespace}.{method}()\" no es compartido")]
    NotShared { namespace: String, method: String },
    #[error("secreto requerido")]
    SecretRequired,
    #[error("secreto no coincide")]
    SecretNotMatched,
    #[error("usuario requerido")]
    UserRequired,
    #[error("contraseña requerida")]
    PasswordRequired,
    #[error("usuario \"{0}\" no autorizado")]
    UserNotAuthorized(String),
    #[error("usuario \"{0}\" no autenticado")]
    NotAuthenticated(String),
    #[error("ventana perdida para la petición {0}")]
    WindowMissed(String),
    /// `timeout`: segundos esperados, o índice de etapa si lo sintetiza
    /// un watchdog.
    #[error("petición {sn} sin respuesta ({timeout})")]
    RequestTimeout { sn: String, timeout: u64 },
    #[error("Documento inválido [{code}]: {description} : {details}")]
    InvalidDocument { code: String, description: String, details: String },
    #[error("trigger {0} ya ejecutado")]
    TriggerPulled(String),
    #[error("argumento inválido: {0}")]
    InvalidArgument(String),
    #[error("modelo de ejecución falló: {0}")]
    ModelFailed(String),
    #[error("{0}")]
    Raised(RemoteException),
    #[error("Error de mensajería: {0}")]
    Messaging(#[from] MessagingError),
    #[error("Error de serialización: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Error de E/S: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RemoteException> for RmiError {
    fn from(e: RemoteException) -> Self {
        RmiError::Raised(e)
    }
}

/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, RmiError>;
