// Archivo: dog.rs
// Propósito: plugin de demostración cargado por `goferd`.
use gofer_rmi::{ExecModel, Namespace, Remote, RemoteException};
use serde_json::json;
use std::thread;
use std::time::Duration;

/// Namespace de demostración `Dog`.
pub fn namespace() -> Namespace {
    Namespace::new("Dog").remote("bark", Remote::new(|_ctx, inv| {
                             let words: String = inv.arg(0)?;
                             Ok(json!(format!("Yes master. I will bark because that is what dogs do. \"{}\"", words)))
                         }))
                         .remote("wag", Remote::new(|ctx, inv| {
                             let n: u64 = inv.arg(0)?;
                             for i in 1..=n {
                                 if ctx.is_cancelled() {
                                     return Err(RemoteException::new("Cancelled", "wag interrumpido").with("done", i - 1).into());
                                 }
                                 ctx.progress.report(n, i, json!({"wag": i}));
                                 thread::sleep(Duration::from_millis(200));
                             }
                             Ok(json!(format!("Yes master. I will wag my tail {} times", n)))
                         }))
                         .remote("sleep", Remote::new(|_ctx, inv| {
                                              let secs: u64 = inv.arg(0)?;
                                              thread::sleep(Duration::from_secs(secs));
                                              Ok(json!(secs))
                                          }).model(ExecModel::Isolated))
}
