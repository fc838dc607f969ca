// Archivo: consumer.rs
// Propósito: consume la cola de peticiones del agente y las persiste en el
// almacén de pendientes.
//
// El mensaje se confirma al broker sólo después de quedar en disco. Un
// documento con versión inválida se rechaza respondiendo `rejected`.
use crate::errors::Result;
use crate::store::PendingStore;
use gofer_messaging::{Document, MessagingError, Reader};
use gofer_rmi::{Flow, Runner};
use std::sync::Arc;
use std::time::Duration;

const POLL: Duration = Duration::from_millis(500);

/// Lector de la cola de peticiones del agente.
pub struct RequestConsumer {
    reader: Reader,
    store: Arc<PendingStore>,
}

impl RequestConsumer {
    /// Crea un consumidor que persiste en `store`.
    pub fn new(reader: Reader, store: Arc<PendingStore>) -> Self {
        Self { reader, store }
    }

    /// Procesa a lo sumo un mensaje. Devuelve `false` si no había.
    pub fn consume(&self, timeout: Duration) -> Result<bool> {
        let message = match self.reader.next(timeout) {
            Ok(Some(message)) => message,
            Ok(None) => return Ok(false),
            Err(MessagingError::InvalidDocument { code, details, .. }) => {
                log::warn!("{}: mensaje descartado [{}]: {}", self.reader.queue(), code, details);
                return Ok(true);
            }
            Err(e) => return Err(e.into()),
        };
        let transport = self.reader.transport();
        let request = message.document.clone();
        if let Err(MessagingError::InvalidDocument { code, description, details }) = request.validate() {
            log::warn!("petición {} rechazada [{}]: {}", request.sn, code, details);
            if let Some(replyto) = request.replyto.as_deref() {
                let rejected = Document::rejected(&request.sn, request.data.clone(), &code, &description, &details);
                if let Err(e) = transport.send(replyto, None, rejected) {
                    log::error!("rechazo de {} no enviado: {}", request.sn, e);
                }
            }
            transport.ack(&message)?;
            return Ok(true);
        }
        match self.store.put(request) {
            Ok(()) => transport.ack(&message)?,
            Err(e) => {
                log::error!("petición {} no persistida: {}", message.document.sn, e);
                transport.reject(&message, true)?;
                return Err(e);
            }
        }
        Ok(true)
    }

    /// Consume en un hilo de fondo hasta que el almacén cierre.
    pub fn start(self) -> Result<Runner> {
        let name = format!("requests-{}", self.reader.queue());
        Ok(Runner::spawn(&name, Duration::ZERO, move || {
               if self.store.is_closed() {
                   return Flow::Stop;
               }
               match self.consume(POLL) {
                   Ok(_) => Flow::Continue,
                   Err(e) => {
                       log::error!("{}: {}", self.reader.queue(), e);
                       Flow::Backoff(POLL)
                   }
               }
           })?)
    }
}
