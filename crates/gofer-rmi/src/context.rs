// Archivo: context.rs
// Propósito: contexto de ejecución que recibe cada método remoto: número
// de serie, dato opaco, reporte de progreso y consulta de cancelación.
use crate::tracker::Tracker;
use gofer_messaging::{Document, Status, Transport};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Avance reportado por un método en ejecución.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub total: u64,
    pub completed: u64,
    #[serde(default)]
    pub details: Value,
}

impl ProgressReport {
    /// Lee el avance de un documento `status=progress`; los campos
    /// ausentes quedan en cero.
    pub fn from_document(document: &Document) -> Self {
        Self { total: document.get("total").and_then(Value::as_u64).unwrap_or(0),
               completed: document.get("completed").and_then(Value::as_u64).unwrap_or(0),
               details: document.get("details").cloned().unwrap_or(Value::Null) }
    }
}

/// Envía reportes `status=progress` a la cola de respuesta de la petición.
#[derive(Clone)]
pub struct Progress {
    sn: String,
    data: Option<Value>,
    replyto: Option<String>,
    transport: Option<Arc<dyn Transport>>,
}

impl Progress {
    /// Crea un reporte que publica en `replyto`.
    pub fn new(sn: &str, data: Option<Value>, replyto: Option<String>, transport: Arc<dyn Transport>) -> Self {
        Self { sn: sn.to_string(), data, replyto, transport: Some(transport) }
    }

    /// Progreso sin destino: los reportes se descartan.
    pub fn silent(sn: &str) -> Self {
        Self { sn: sn.to_string(), data: None, replyto: None, transport: None }
    }

    /// Publica un avance; sin `replyto` no hace nada.
    pub fn report(&self, total: u64, completed: u64, details: Value) {
        let (Some(replyto), Some(transport)) = (&self.replyto, &self.transport) else {
            return;
        };
        let mut document = Document::status(&self.sn, self.data.clone(), Status::Progress);
        document.set("total", json!(total));
        document.set("completed", json!(completed));
        document.set("details", details);
        if let Err(e) = transport.send(replyto, None, document) {
            log::error!("progreso de {} no enviado: {}", self.sn, e);
        }
    }
}

/// Consulta si la petición fue cancelada.
#[derive(Clone)]
pub struct Cancelled {
    sn: String,
    tracker: Arc<Tracker>,
}

impl Cancelled {
    /// Crea la consulta de cancelación de `sn`.
    pub fn new(sn: &str, tracker: Arc<Tracker>) -> Self {
        Self { sn: sn.to_string(), tracker }
    }

    /// Indica si se pidió cancelar.
    pub fn check(&self) -> bool {
        self.tracker.cancelled(&self.sn)
    }
}

/// Contexto de una llamada remota.
#[derive(Clone)]
pub struct Context {
    pub sn: String,
    pub data: Option<Value>,
    pub progress: Progress,
    pub cancelled: Cancelled,
}

impl Context {
    /// Crea el contexto de la petición `sn`.
    pub fn new(sn: &str, data: Option<Value>, progress: Progress, cancelled: Cancelled) -> Self {
        Self { sn: sn.to_string(), data, progress, cancelled }
    }

    /// Contexto sin agente detrás (pruebas, llamadas locales).
    pub fn detached(sn: &str) -> Self {
        Self::new(sn, None, Progress::silent(sn), Cancelled::new(sn, Arc::new(Tracker::new())))
    }

    /// Atajo de `cancelled.check()`.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.check()
    }
}
