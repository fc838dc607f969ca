// Archivo: runner.rs
// Propósito: hilo de fondo con ciclo periódico y parada ordenada.
//
// El cuerpo se ejecuta, luego se espera `tick` en un canal de parada; al
// soltar el emisor (`stop` o `Drop`) el ciclo termina y se hace join.
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Resultado de una vuelta del cuerpo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Esperar el tick normal.
    Continue,
    /// Esperar el intervalo dado antes de la siguiente vuelta.
    Backoff(Duration),
    Stop,
}

/// Hilo de fondo con parada ordenada.
pub struct Runner {
    name: String,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Runner {
    /// Lanza `body` en un hilo llamado `name`, esperando `tick` entre vueltas.
    pub fn spawn<F>(name: &str, tick: Duration, mut body: F) -> io::Result<Runner>
        where F: FnMut() -> Flow + Send + 'static
    {
        let (stop, stopped) = channel::bounded::<()>(0);
        let handle = thread::Builder::new().name(name.to_string()).spawn(move || loop {
                                                let wait = match body() {
                                                    Flow::Continue => tick,
                                                    Flow::Backoff(wait) => wait,
                                                    Flow::Stop => break,
                                                };
                                                match stopped.recv_timeout(wait) {
                                                    Err(RecvTimeoutError::Timeout) => continue,
                                                    _ => break,
                                                }
                                            })?;
        log::debug!("{}: iniciado", name);
        Ok(Runner { name: name.to_string(), stop: Some(stop), handle: Some(handle) })
    }

    /// Nombre del hilo.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Detiene el ciclo y espera a que el hilo termine.
    pub fn stop(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("{}: terminó con pánico", self.name);
            } else {
                log::debug!("{}: detenido", self.name);
            }
        }
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.stop();
    }
}
