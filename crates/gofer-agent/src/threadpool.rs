// Archivo: threadpool.rs
// Propósito: pool fijo de workers, cada uno con su propia cola acotada.
//
// Una tarea nueva va al worker con menor carga (en cola + en ejecución);
// en empate gana el primero. Un pánico dentro de una tarea se registra y
// el worker sigue atendiendo su cola.
use crate::errors::{AgentError, Result};
use crossbeam::channel::{self, Receiver, Sender};
use gofer_rmi::model::panic_message;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Trabajo a ejecutar en un worker.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

enum Call {
    Run(Task),
    Halt,
}

struct Worker {
    queue: Sender<Call>,
    load: Arc<AtomicUsize>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn(name: String, backlog: usize) -> Result<Self> {
        let (queue, calls) = channel::bounded(backlog.max(1));
        let load = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&load);
        let handle = thread::Builder::new().name(name.clone()).spawn(move || Worker::run(&name, calls, counter))?;
        Ok(Self { queue, load, handle: Some(handle) })
    }

    fn run(name: &str, calls: Receiver<Call>, load: Arc<AtomicUsize>) {
        for call in calls.iter() {
            match call {
                Call::Halt => break,
                Call::Run(task) => {
                    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(task)) {
                        log::error!("{}: tarea abortada: {}", name, panic_message(panic.as_ref()));
                    }
                    load.fetch_sub(1, Ordering::SeqCst);
                }
            }
        }
        log::debug!("{}: detenido", name);
    }
}

/// Pool de workers con cola propia cada uno.
pub struct WorkerPool {
    name: String,
    workers: Vec<Worker>,
    /// Serializa la elección de worker con el incremento de carga.
    select: Mutex<()>,
}

impl WorkerPool {
    /// Pool de `capacity` workers (mínimo uno) con colas de `backlog`.
    pub fn new(name: &str, capacity: usize, backlog: usize) -> Result<Self> {
        let workers = (0..capacity.max(1)).map(|i| Worker::spawn(format!("{}-{}", name, i), backlog))
                                          .collect::<Result<Vec<_>>>()?;
        log::debug!("pool {}: {} workers", name, workers.len());
        Ok(Self { name: name.to_string(), workers, select: Mutex::new(()) })
    }

    /// Encola la tarea en el worker menos cargado. Devuelve su índice.
    /// Bloquea si la cola de ese worker está llena.
    pub fn run(&self, task: Task) -> Result<usize> {
        let (index, queue) = {
            let _guard = self.select.lock().unwrap_or_else(|e| e.into_inner());
            let (index, worker) = self.workers
                                      .iter()
                                      .enumerate()
                                      .min_by_key(|(_, w)| w.load.load(Ordering::SeqCst))
                                      .ok_or_else(|| AgentError::Closed(format!("pool {} sin workers", self.name)))?;
            worker.load.fetch_add(1, Ordering::SeqCst);
            (index, worker.queue.clone())
        };
        if queue.send(Call::Run(task)).is_err() {
            self.workers[index].load.fetch_sub(1, Ordering::SeqCst);
            return Err(AgentError::Closed(format!("pool {}: worker {} detenido", self.name, index)));
        }
        Ok(index)
    }

    /// Carga de cada worker (en cola + en ejecución).
    pub fn loads(&self) -> Vec<usize> {
        self.workers.iter().map(|w| w.load.load(Ordering::SeqCst)).collect()
    }

    /// Cantidad de workers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Indica si el pool no tiene workers.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Detiene los workers tras vaciar sus colas y espera a que terminen.
    pub fn shutdown(&mut self) {
        for worker in &self.workers {
            let _ = worker.queue.send(Call::Halt);
        }
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                if handle.join().is_err() {
                    log::error!("pool {}: worker terminó con pánico", self.name);
                }
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
