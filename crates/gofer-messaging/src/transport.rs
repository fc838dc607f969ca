// Archivo: transport.rs
// Propósito: contrato del broker de mensajería y un lector con búsqueda por
// número de serie.
//
// El broker concreto (AMQP, etc.) queda fuera de este crate; cualquier
// implementación debe cumplir `Transport`. Ver `stubs::InMemoryBroker`.
use crate::document::Document;
use crate::errors::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Mensaje recibido, pendiente de `ack` o `reject`.
#[derive(Debug, Clone)]
pub struct Message {
    /// Etiqueta de entrega asignada por el broker.
    pub tag: u64,
    pub queue: String,
    pub document: Document,
}

/// Contrato del broker de mensajería.
pub trait Transport: Send + Sync {
    /// Declara (crea si no existe) una cola.
    fn declare(&self, queue: &str) -> Result<()>;

    /// Elimina una cola y sus mensajes.
    fn delete(&self, queue: &str) -> Result<()>;

    /// Envía un documento a `destination`. Si el documento no trae `sn` se
    /// genera uno; devuelve el `sn` usado.
    fn send(&self, destination: &str, ttl: Option<Duration>, document: Document) -> Result<String>;

    /// Espera hasta `timeout` por el siguiente mensaje de `queue`.
    fn receive(&self, queue: &str, timeout: Duration) -> Result<Option<Message>>;

    fn ack(&self, message: &Message) -> Result<()>;

    /// Rechaza un mensaje; con `requeue` vuelve a la cola.
    fn reject(&self, message: &Message, requeue: bool) -> Result<()>;
}

/// Lector de una cola.
#[derive(Clone)]
pub struct Reader {
    transport: Arc<dyn Transport>,
    queue: String,
}

impl Reader {
    /// Crea un lector de `queue`.
    pub fn new(transport: Arc<dyn Transport>, queue: &str) -> Self {
        Self { transport, queue: queue.to_string() }
    }

    /// Cola que lee.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Transporte subyacente.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Siguiente mensaje sin confirmar; el llamador decide `ack`/`reject`.
    pub fn next(&self, timeout: Duration) -> Result<Option<Message>> {
        self.transport.receive(&self.queue, timeout)
    }

    /// Busca el documento con número de serie `sn` durante a lo sumo
    /// `timeout`. Los mensajes con otro `sn` se confirman y descartan.
    pub fn search(&self, sn: &str, timeout: Duration) -> Result<Option<Document>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(message) = self.transport.receive(&self.queue, remaining)? else {
                return Ok(None);
            };
            self.transport.ack(&message)?;
            if message.document.sn == sn {
                return Ok(Some(message.document));
            }
            log::debug!("{}: descartado sn={} buscando sn={}", self.queue, message.document.sn, sn);
            if remaining.is_zero() {
                return Ok(None);
            }
        }
    }
}
