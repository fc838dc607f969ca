// Archivo: model.rs
// Propósito: modelos de ejecución de un método remoto.
//
// - `Direct`: se ejecuta en el hilo del worker.
// - `Isolated`: se ejecuta en un hilo dedicado.
// En ambos casos un pánico del método se convierte en `ModelFailed`, de
// modo que la petición siempre recibe respuesta.
use crate::catalog::{Invocation, Method};
use crate::context::Context;
use crate::errors::{Result, RmiError};
use serde_json::Value;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

/// Dónde se ejecuta un método remoto.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecModel {
    #[default]
    Direct,
    Isolated,
}

impl ExecModel {
    /// Ejecuta `method` según el modelo.
    pub fn execute(&self, method: &Method, ctx: &Context, invocation: &Invocation) -> Result<Value> {
        match self {
            ExecModel::Direct => {
                panic::catch_unwind(AssertUnwindSafe(|| method(ctx, invocation))).map_err(|panic| {
                    aborted(self, &ctx.sn, panic)
                })?
            }
            ExecModel::Isolated => thread::scope(|scope| {
                let handle = thread::Builder::new().name(format!("isolated-{}", ctx.sn))
                                                   .spawn_scoped(scope, || method(ctx, invocation))?;
                handle.join().map_err(|panic| aborted(self, &ctx.sn, panic))?
            }),
        }
    }
}

fn aborted(model: &ExecModel, sn: &str, panic: Box<dyn Any + Send>) -> RmiError {
    let reason = panic_message(panic.as_ref());
    log::error!("método {} ({:?}) abortó: {}", sn, model, reason);
    RmiError::ModelFailed(reason)
}

/// Texto de un payload de pánico.
pub fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "pánico sin mensaje".to_string()
    }
}
