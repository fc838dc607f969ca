// Archivo: store.rs
// Propósito: almacén durable de peticiones pendientes.
//
// Toda petición aceptada se escribe en disco antes de quedar disponible
// para ejecución y se borra al confirmarse (`commit`). Al abrir, un hilo
// de recuperación re-encola en orden lo que quedó pendiente de una
// ejecución anterior; `put` espera a que termine. Las peticiones con
// ventana futura se guardan aparte (`delayed`) hasta que la ventana abre.
//
// Layout:
//   <root>/pending/<micros>-<n:010>.json
//   <root>/delayed/<micros>-<n:010>.json
//
// Un mismo sn puede llegar dos veces (reentrega del broker tras una caída
// antes del `ack`); cada copia tiene su propio archivo y su propio commit.
use crate::errors::{AgentError, Result};
use chrono::{DateTime, Utc};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use gofer_messaging::{files, Clock, Document, Window};
use gofer_rmi::{Flow, Runner};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

const EXTENSION: &str = "json";
const GET_POLL: Duration = Duration::from_millis(250);

/// Instante de recepción tal como viaja en `Document::ts`.
pub fn epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

/// Generador de nombres de archivo crecientes.
#[derive(Debug, Default)]
struct Sequential {
    last: i64,
    n: u64,
}

/// Ancho fijo del contador; el orden lexicográfico debe coincidir con el
/// de generación.
const COUNTER_MAX: u64 = 9_999_999_999;

impl Sequential {
    fn next(&mut self, now: DateTime<Utc>) -> String {
        let micros = now.timestamp_micros();
        if micros > self.last {
            self.last = micros;
            self.n = 0;
        } else {
            self.n = (self.n + 1).min(COUNTER_MAX);
        }
        format!("{:020}-{:010}.{}", self.last, self.n, EXTENSION)
    }
}

/// Almacén durable de peticiones pendientes y diferidas.
pub struct PendingStore {
    pending: PathBuf,
    delayed: PathBuf,
    clock: Arc<dyn Clock>,
    sequential: Mutex<Sequential>,
    /// sn -> archivos en `pending`, en orden de llegada.
    journal: Mutex<HashMap<String, VecDeque<PathBuf>>>,
    opened: Mutex<bool>,
    opened_cv: Condvar,
    closed: AtomicBool,
    ready_tx: Sender<Document>,
    ready_rx: Receiver<Document>,
}

impl PendingStore {
    /// Crea los directorios (error fatal si no se puede) y lanza la
    /// recuperación en segundo plano.
    pub fn open(root: &Path, clock: Arc<dyn Clock>) -> Result<Arc<Self>> {
        let pending = root.join("pending");
        let delayed = root.join("delayed");
        for dir in [&pending, &delayed] {
            fs::create_dir_all(dir).map_err(|e| AgentError::Storage(format!("{}: {}", dir.display(), e)))?;
            files::purge_tmp(dir)?;
        }
        let (ready_tx, ready_rx) = channel::unbounded();
        let store = Arc::new(Self { pending,
                                    delayed,
                                    clock,
                                    sequential: Mutex::new(Sequential::default()),
                                    journal: Mutex::new(HashMap::new()),
                                    opened: Mutex::new(false),
                                    opened_cv: Condvar::new(),
                                    closed: AtomicBool::new(false),
                                    ready_tx,
                                    ready_rx });
        let recovering = Arc::clone(&store);
        thread::Builder::new().name("pending-recovery".into()).spawn(move || recovering.recover())?;
        Ok(store)
    }

    fn recover(&self) {
        match files::list_sorted(&self.pending, EXTENSION) {
            Ok(paths) => {
                let mut recovered = 0;
                for path in paths {
                    if let Some(request) = self.read(&path) {
                        log::info!("petición {} recuperada de {}", request.sn, path.display());
                        self.enqueue(request, path);
                        recovered += 1;
                    }
                }
                log::info!("almacén abierto: {} pendientes recuperadas", recovered);
            }
            Err(e) => log::error!("recuperación de {} fallida: {}", self.pending.display(), e),
        }
        *self.opened.lock().unwrap_or_else(|e| e.into_inner()) = true;
        self.opened_cv.notify_all();
    }

    /// Bloquea hasta que la recuperación terminó.
    pub fn wait_open(&self) {
        let mut opened = self.opened.lock().unwrap_or_else(|e| e.into_inner());
        while !*opened {
            opened = self.opened_cv.wait(opened).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Persiste la petición y la deja lista para ejecución (o diferida si
    /// su ventana aún no abre).
    pub fn put(&self, mut request: Document) -> Result<()> {
        self.wait_open();
        if self.closed.load(Ordering::SeqCst) {
            return Err(AgentError::Closed(format!("almacén cerrado, petición {} no aceptada", request.sn)));
        }
        let now = self.clock.now();
        request.ts.get_or_insert_with(|| epoch_seconds(now));
        let name = self.sequential.lock().unwrap_or_else(|e| e.into_inner()).next(now);
        let body = serde_json::to_vec(&request)?;
        if Window::of(request.window.as_ref()).future_at(now) {
            files::write_atomic(&self.delayed.join(&name), &body)?;
            log::info!("petición {} diferida hasta {:?}", request.sn, request.window.and_then(|w| w.begin));
            return Ok(());
        }
        let path = self.pending.join(&name);
        files::write_atomic(&path, &body)?;
        self.enqueue(request, path);
        Ok(())
    }

    fn enqueue(&self, mut request: Document, path: PathBuf) {
        request.ts.get_or_insert_with(|| epoch_seconds(self.clock.now()));
        self.journal.lock().unwrap_or_else(|e| e.into_inner()).entry(request.sn.clone()).or_default().push_back(path);
        if self.ready_tx.send(request).is_err() {
            log::error!("cola de listas desconectada");
        }
    }

    /// Siguiente petición lista; bloquea hasta que haya una o el almacén se
    /// cierre.
    pub fn get(&self) -> Result<Document> {
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Err(AgentError::Closed("almacén cerrado".into()));
            }
            match self.ready_rx.recv_timeout(GET_POLL) {
                Ok(request) => return Ok(request),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(AgentError::Closed("cola de listas".into())),
            }
        }
    }

    /// Como `get` pero esperando a lo sumo `timeout`.
    pub fn get_timeout(&self, timeout: Duration) -> Option<Document> {
        self.ready_rx.recv_timeout(timeout).ok()
    }

    /// Borra una copia durable de `sn` (la más antigua si hay varias). Un
    /// sn desconocido sólo se advierte.
    pub fn commit(&self, sn: &str) {
        let path = {
            let mut journal = self.journal.lock().unwrap_or_else(|e| e.into_inner());
            let path = journal.get_mut(sn).and_then(VecDeque::pop_front);
            if journal.get(sn).is_some_and(VecDeque::is_empty) {
                journal.remove(sn);
            }
            path
        };
        match path {
            Some(path) => {
                if let Err(e) = files::unlink(&path) {
                    log::error!("no se pudo borrar {}: {}", path.display(), e);
                }
            }
            None => log::warn!("commit de {}: no encontrada", sn),
        }
    }

    /// Mueve a `pending` las diferidas cuya ventana ya abrió. Devuelve
    /// cuántas se movieron.
    pub fn poll_delayed(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut moved = 0;
        for path in files::list_sorted(&self.delayed, EXTENSION)? {
            let Some(mut request) = self.read(&path) else {
                continue;
            };
            if Window::of(request.window.as_ref()).future_at(now) {
                continue;
            }
            // el TTL corre desde que la ventana abre
            request.ts = Some(epoch_seconds(now));
            let name = self.sequential.lock().unwrap_or_else(|e| e.into_inner()).next(now);
            let target = self.pending.join(name);
            files::write_atomic(&target, &serde_json::to_vec(&request)?)?;
            files::unlink(&path)?;
            log::info!("petición diferida {} lista", request.sn);
            self.enqueue(request, target);
            moved += 1;
        }
        Ok(moved)
    }

    /// Revisión periódica de diferidas en segundo plano.
    pub fn start(self: &Arc<Self>, interval: Duration) -> Result<Runner> {
        let store = Arc::clone(self);
        Ok(Runner::spawn("delayed-poller", interval, move || {
               if store.closed.load(Ordering::SeqCst) {
                   return Flow::Stop;
               }
               if let Err(e) = store.poll_delayed() {
                   log::error!("revisión de diferidas: {}", e);
               }
               Flow::Continue
           })?)
    }

    /// Cierra el almacén: `get` deja de entregar y `put` rechaza.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Indica si el almacén fue cerrado.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Peticiones aún no confirmadas.
    pub fn uncommitted(&self) -> usize {
        self.journal.lock().unwrap_or_else(|e| e.into_inner()).values().map(VecDeque::len).sum()
    }

    /// Directorio de pendientes.
    pub fn pending_dir(&self) -> &Path {
        &self.pending
    }

    /// Directorio de diferidas.
    pub fn delayed_dir(&self) -> &Path {
        &self.delayed
    }

    fn read(&self, path: &Path) -> Option<Document> {
        let parsed = fs::read(path).map_err(AgentError::from)
                                   .and_then(|body| serde_json::from_slice::<Document>(&body).map_err(AgentError::from));
        match parsed {
            Ok(request) => Some(request),
            Err(e) => {
                log::error!("archivo {} corrupto, descartado: {}", path.display(), e);
                if let Err(e) = files::unlink(path) {
                    log::error!("no se pudo borrar {}: {}", path.display(), e);
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn names_are_strictly_increasing() {
        let mut seq = Sequential::default();
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let a = seq.next(t);
        let b = seq.next(t);
        let c = seq.next(t - chrono::Duration::seconds(1));
        let d = seq.next(t + chrono::Duration::seconds(1));
        assert!(a < b && b < c && c < d, "{} {} {} {}", a, b, c, d);
    }

    #[test]
    fn counter_keeps_width_past_ten_thousand() {
        let mut seq = Sequential::default();
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let names: Vec<String> = (0..10_002).map(|_| seq.next(t)).collect();
        assert!(names.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(names[0].len(), names[10_001].len());
    }
}
