// Archivo: scheduler.rs
// Propósito: lleva cada petición lista del almacén al pool del plugin que
// la provee y define la tarea que la ejecuta.
//
// Pasos de la tarea:
//   1. TTL vencido: se confirma y descarta sin respuesta.
//   2. Ventana futura: se vuelve a guardar (diferida).
//   3. Ventana pasada: se confirma y se responde `WindowMissed`.
//   4. Se envía `started`, se ejecuta y se envía la respuesta final.
// El momento del `commit` lo fija `CommitPolicy`. Un pánico del método
// llega como respuesta `ModelFailed`.
use crate::config::CommitPolicy;
use crate::errors::{AgentError, Result};
use crate::plugin::{Plugin, PluginRegistry};
use crate::store::epoch_seconds;
use crate::store::PendingStore;
use gofer_messaging::{Clock, Document, Return, Status, Transport, Window};
use gofer_rmi::{marshal, Cancelled, Context, Dispatcher, Progress, RmiError, Tracker};
use serde_json::Value;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Petición en curso y su copia durable.
pub struct Transaction {
    store: Arc<PendingStore>,
    request: Document,
}

impl Transaction {
    /// Crea la transacción de `request`.
    pub fn new(store: Arc<PendingStore>, request: Document) -> Self {
        Self { store, request }
    }

    /// Petición de la transacción.
    pub fn request(&self) -> &Document {
        &self.request
    }

    /// Ejecución terminada (o entregada): se borra la copia durable.
    pub fn commit(&self) {
        self.store.commit(&self.request.sn);
    }

    /// Petición descartada sin ejecutar.
    pub fn discard(&self) {
        self.store.commit(&self.request.sn);
    }
}

/// Dependencias compartidas por todas las tareas.
#[derive(Clone)]
pub struct TaskContext {
    pub store: Arc<PendingStore>,
    pub transport: Arc<dyn Transport>,
    pub tracker: Arc<Tracker>,
    pub clock: Arc<dyn Clock>,
    pub commit: CommitPolicy,
}

impl TaskContext {
    fn expired(&self, request: &Document) -> bool {
        let (Some(ttl), Some(ts)) = (request.ttl, request.ts) else {
            return false;
        };
        epoch_seconds(self.clock.now()) - ts > ttl
    }

    fn send(&self, request: &Document, document: Document) {
        let Some(replyto) = request.replyto.as_deref() else {
            return;
        };
        if let Err(e) = self.transport.send(replyto, None, document) {
            log::error!("respuesta a {} para {} no enviada: {}", replyto, request.sn, e);
        }
    }

    fn send_status(&self, request: &Document, status: Status) {
        self.send(request, Document::status(&request.sn, request.data.clone(), status));
    }

    fn send_reply(&self, request: &Document, result: Return) {
        self.send(request, Document::reply(&request.sn, request.data.clone(), result));
    }

    /// Ejecuta la petición de la transacción en el hilo actual.
    pub fn execute(&self, tx: Transaction, dispatcher: &Dispatcher) {
        let request = tx.request();
        let sn = request.sn.as_str();
        if self.expired(request) {
            log::info!("petición {} vencida por TTL, descartada", sn);
            tx.discard();
            return;
        }
        let now = self.clock.now();
        let window = Window::of(request.window.as_ref());
        if window.future_at(now) {
            log::info!("petición {} aún fuera de ventana, diferida", sn);
            tx.discard();
            if let Err(e) = self.store.put(request.clone()) {
                log::error!("petición {} no diferida: {}", sn, e);
            }
            return;
        }
        if window.past_at(now) {
            log::info!("petición {} perdió su ventana", sn);
            tx.commit();
            self.send_reply(request, marshal::exception(&RmiError::WindowMissed(sn.to_string())));
            return;
        }

        if self.commit == CommitPolicy::Handoff {
            tx.commit();
        }
        self.tracker.add(sn, request.data.clone().unwrap_or(Value::Null));
        let _running = Running { tasks: self, tx: &tx };
        self.send_status(request, Status::Started);
        let progress = Progress::new(sn, request.data.clone(), request.replyto.clone(), Arc::clone(&self.transport));
        let ctx = Context::new(sn, request.data.clone(), progress, Cancelled::new(sn, Arc::clone(&self.tracker)));
        let result = dispatcher.dispatch_in(&ctx, request);
        self.send_reply(request, result);
    }
}

/// Cierre de una ejecución: libera el sn del tracker y, con
/// `CommitPolicy::Reply`, confirma. Corre también si la tarea aborta.
struct Running<'a> {
    tasks: &'a TaskContext,
    tx: &'a Transaction,
}

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.tasks.tracker.remove(&self.tx.request().sn);
        if self.tasks.commit == CommitPolicy::Reply {
            self.tx.commit();
        }
    }
}

/// Reparte las peticiones listas entre los plugins.
pub struct Scheduler {
    tasks: TaskContext,
    registry: Arc<PluginRegistry>,
    /// Recibe lo que ningún plugin provee y responde `NamespaceNotFound`.
    empty: Arc<Plugin>,
}

impl Scheduler {
    /// Crea un scheduler sobre `registry`.
    pub fn new(tasks: TaskContext, registry: Arc<PluginRegistry>, empty: Plugin) -> Self {
        Self { tasks, registry, empty: Arc::new(empty) }
    }

    /// Primer plugin que provee la clase pedida, o el plugin vacío.
    pub fn select_plugin(&self, request: &Document) -> Arc<Plugin> {
        let classname = request.classname.as_deref().unwrap_or_default();
        self.registry.find(classname).unwrap_or_else(|| {
                                          log::warn!("ningún plugin provee \"{}\" (sn={})", classname, request.sn);
                                          Arc::clone(&self.empty)
                                      })
    }

    /// Entrega una petición al pool de su plugin.
    pub fn schedule(&self, request: Document) -> Result<()> {
        let plugin = self.select_plugin(&request);
        let sn = request.sn.clone();
        let tasks = self.tasks.clone();
        let dispatcher = Arc::clone(plugin.dispatcher());
        let tx = Transaction::new(Arc::clone(&self.tasks.store), request);
        match plugin.run(Box::new(move || tasks.execute(tx, &dispatcher))) {
            Ok(worker) => {
                log::debug!("petición {} en {}[{}]", sn, plugin.name(), worker);
                Ok(())
            }
            Err(e) => {
                log::error!("petición {} no planificada: {}", sn, e);
                self.tasks.store.commit(&sn);
                Err(e)
            }
        }
    }

    /// Ciclo principal: toma peticiones listas hasta que el almacén cierre.
    pub fn run(&self) {
        loop {
            match self.tasks.store.get() {
                Ok(request) => {
                    let _ = self.schedule(request);
                }
                Err(AgentError::Closed(_)) => break,
                Err(e) => log::error!("scheduler: {}", e),
            }
        }
        log::info!("scheduler detenido");
    }

    /// Lanza el ciclo principal en su propio hilo.
    pub fn start(self: Arc<Self>) -> Result<JoinHandle<()>> {
        Ok(thread::Builder::new().name("scheduler".into()).spawn(move || self.run())?)
    }
}
