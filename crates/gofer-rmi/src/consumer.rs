// Archivo: consumer.rs
// Propósito: consumo de respuestas asíncronas desde una cola de respuesta
// y notificación a un `Listener`.
//
// Cada respuesta genuina (no sintetizada por un watchdog) avanza o cierra
// la vigilancia de su petición.
use crate::context::ProgressReport;
use crate::errors::{Result, RmiError};
use crate::marshal;
use crate::runner::{Flow, Runner};
use crate::watchdog::WatchDog;
use gofer_messaging::{Document, Reader, Status};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const POLL: Duration = Duration::from_millis(500);

/// Origen común de una respuesta asíncrona.
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncReply {
    pub sn: String,
    pub data: Option<Value>,
    /// Identidad del watchdog si la respuesta es sintetizada.
    pub watchdog: Option<String>,
}

/// Receptor de respuestas. Todos los métodos son opcionales.
pub trait Listener: Send + Sync {
    fn succeeded(&self, _reply: &AsyncReply, _retval: &Value) {}
    fn failed(&self, _reply: &AsyncReply, _error: &RmiError) {}
    fn accepted(&self, _reply: &AsyncReply) {}
    fn rejected(&self, _reply: &AsyncReply, _error: &RmiError) {}
    fn started(&self, _reply: &AsyncReply) {}
    fn progress(&self, _reply: &AsyncReply, _report: &ProgressReport) {}
}

/// Consumidor de una cola de respuestas.
pub struct ReplyConsumer {
    reader: Reader,
    watchdog: Option<Arc<WatchDog>>,
}

impl ReplyConsumer {
    /// Crea un consumidor sin watchdog.
    pub fn new(reader: Reader) -> Self {
        Self { reader, watchdog: None }
    }

    /// Mantiene al día la vigilancia de `watchdog`.
    pub fn with_watchdog(mut self, watchdog: Arc<WatchDog>) -> Self {
        self.watchdog = Some(watchdog);
        self
    }

    /// Clasifica una respuesta y notifica al listener.
    pub fn dispatch(&self, document: Document, listener: &dyn Listener) {
        let reply = AsyncReply { sn: document.sn.clone(), data: document.data.clone(), watchdog: document.watchdog.clone() };
        if reply.watchdog.is_none() {
            self.observe(&document);
        }
        match document.status {
            Some(Status::Accepted) => listener.accepted(&reply),
            Some(Status::Started) => listener.started(&reply),
            Some(Status::Rejected) => {
                listener.rejected(&reply, &marshal::rejected(&document))
            }
            Some(Status::Progress) => {
                listener.progress(&reply, &ProgressReport::from_document(&document))
            }
            None => match document.result.map(marshal::outcome) {
                Some(Ok(retval)) => listener.succeeded(&reply, &retval),
                Some(Err(error)) => listener.failed(&reply, &error),
                None => log::warn!("respuesta {} sin estado ni resultado, ignorada", reply.sn),
            },
        }
    }

    fn observe(&self, document: &Document) {
        let Some(watchdog) = &self.watchdog else {
            return;
        };
        let outcome = match document.status {
            Some(Status::Accepted) | Some(Status::Started) => watchdog.hack(&document.sn),
            Some(Status::Progress) => Ok(()),
            Some(Status::Rejected) | None => watchdog.complete(&document.sn),
        };
        if let Err(e) = outcome {
            log::error!("watchdog no actualizado para {}: {}", document.sn, e);
        }
    }

    /// Procesa a lo sumo un mensaje. Devuelve `false` si no había.
    pub fn consume(&self, listener: &dyn Listener, timeout: Duration) -> Result<bool> {
        let Some(message) = self.reader.next(timeout)? else {
            return Ok(false);
        };
        self.reader.transport().ack(&message)?;
        self.dispatch(message.document, listener);
        Ok(true)
    }

    /// Consume en un hilo de fondo hasta que se detenga el `Runner`.
    pub fn start(self, listener: Arc<dyn Listener>) -> std::io::Result<Runner> {
        let name = format!("replies-{}", self.reader.queue());
        Runner::spawn(&name, Duration::ZERO, move || match self.consume(listener.as_ref(), POLL) {
            Ok(_) => Flow::Continue,
            Err(e) => {
                log::error!("{}: {}", self.reader.queue(), e);
                Flow::Backoff(POLL)
            }
        })
    }
}
