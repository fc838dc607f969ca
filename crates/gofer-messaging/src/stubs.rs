// Archivo: stubs.rs
// Propósito: implementaciones en memoria para pruebas y wiring rápido.
//
// `InMemoryBroker` cumple el contrato `Transport` con colas en proceso;
// los mensajes viajan serializados (y firmados si se configura un
// autenticador) igual que con un broker real. `ManualClock` permite
// avanzar el tiempo a mano. No son durables.
use crate::auth::{self, Authenticator};
use crate::clock::Clock;
use crate::document::{new_sn, Document};
use crate::errors::{MessagingError, Result};
use crate::transport::{Message, Transport};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, VecDeque<String>>,
    /// Entregados sin confirmar: tag -> (cola, cuerpo).
    unacked: HashMap<u64, (String, String)>,
    next_tag: u64,
}

/// Broker en memoria.
#[derive(Default)]
pub struct InMemoryBroker {
    state: Mutex<BrokerState>,
    ready: Condvar,
    authenticator: Option<Arc<dyn Authenticator>>,
}

impl InMemoryBroker {
    /// Crea un broker vacío y sin firma.
    pub fn new() -> Self {
        Self::default()
    }

    /// Broker que firma al enviar y valida al recibir.
    pub fn with_authenticator(authenticator: Arc<dyn Authenticator>) -> Self {
        Self { authenticator: Some(authenticator), ..Self::default() }
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Encola un cuerpo ya codificado (útil para simular mensajes ajenos).
    pub fn push_raw(&self, queue: &str, body: &str) {
        self.lock().queues.entry(queue.to_string()).or_default().push_back(body.to_string());
        self.ready.notify_all();
    }

    /// Mensajes en espera en `queue`.
    pub fn depth(&self, queue: &str) -> usize {
        self.lock().queues.get(queue).map_or(0, VecDeque::len)
    }

    /// Indica si la cola existe.
    pub fn exists(&self, queue: &str) -> bool {
        self.lock().queues.contains_key(queue)
    }

    /// Mensajes entregados y aún sin `ack`/`reject`.
    pub fn unacked(&self) -> usize {
        self.lock().unacked.len()
    }

    /// Vacía la cola devolviendo los documentos decodificables.
    pub fn drain(&self, queue: &str) -> Vec<Document> {
        let bodies: Vec<String> = self.lock().queues.get_mut(queue).map(|q| q.drain(..).collect()).unwrap_or_default();
        bodies.iter().filter_map(|b| auth::validate(self.authenticator.as_deref(), b).ok()).collect()
    }
}

impl Transport for InMemoryBroker {
    fn declare(&self, queue: &str) -> Result<()> {
        self.lock().queues.entry(queue.to_string()).or_default();
        Ok(())
    }

    fn delete(&self, queue: &str) -> Result<()> {
        self.lock().queues.remove(queue);
        Ok(())
    }

    fn send(&self, destination: &str, ttl: Option<Duration>, mut document: Document) -> Result<String> {
        if document.sn.is_empty() {
            document.sn = new_sn();
        }
        if let Some(ttl) = ttl {
            document.ttl = Some(ttl.as_secs_f64());
        }
        let body = auth::sign(self.authenticator.as_deref(), &document)?;
        log::debug!("{}: enviado sn={}", destination, document.sn);
        self.push_raw(destination, &body);
        Ok(document.sn)
    }

    fn receive(&self, queue: &str, timeout: Duration) -> Result<Option<Message>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let Some(body) = state.queues.get_mut(queue).and_then(VecDeque::pop_front) {
                return match auth::validate(self.authenticator.as_deref(), &body) {
                    Ok(document) => {
                        state.next_tag += 1;
                        let tag = state.next_tag;
                        state.unacked.insert(tag, (queue.to_string(), body));
                        Ok(Some(Message { tag, queue: queue.to_string(), document }))
                    }
                    // mensaje rechazado sin reencolar
                    Err(e) => Err(e),
                };
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            state = self.ready.wait_timeout(state, remaining).unwrap_or_else(|e| e.into_inner()).0;
        }
    }

    fn ack(&self, message: &Message) -> Result<()> {
        match self.lock().unacked.remove(&message.tag) {
            Some(_) => Ok(()),
            None => Err(MessagingError::Transport(format!("tag {} desconocido", message.tag))),
        }
    }

    fn reject(&self, message: &Message, requeue: bool) -> Result<()> {
        let mut state = self.lock();
        let Some((queue, body)) = state.unacked.remove(&message.tag) else {
            return Err(MessagingError::Transport(format!("tag {} desconocido", message.tag)));
        };
        if requeue {
            state.queues.entry(queue).or_default().push_front(body);
            self.ready.notify_all();
        }
        Ok(())
    }
}

/// Reloj controlado a mano.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Crea un reloj detenido en `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    /// Adelanta el reloj.
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    /// Fija la hora del reloj.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
