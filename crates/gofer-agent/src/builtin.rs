// Archivo: builtin.rs
// Propósito: plugin de administración incluido en todo agente.
//
// Namespace `Admin`:
// - `hello()`: saludo, útil como ping.
// - `cancel(sn)` o `cancel(criteria={...})`: cancela peticiones en curso;
//   `criteria` selecciona por igualdad de claves del dato opaco.
// - `help()`: namespaces y métodos disponibles en el agente.
use gofer_rmi::{Namespace, Remote, RmiError, Tracker};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Nombre del plugin.
pub const NAME: &str = "builtin";
/// Namespace que expone.
pub const NAMESPACE: &str = "Admin";

fn matches(data: &Value, criteria: &Map<String, Value>) -> bool {
    criteria.iter().all(|(k, v)| data.get(k) == Some(v))
}

/// Namespace `Admin`. `listing` son los pares (namespace, métodos) de los
/// plugins cargados.
pub fn admin(tracker: Arc<Tracker>, listing: Vec<(String, Vec<String>)>) -> Namespace {
    let help: Map<String, Value> = listing.into_iter().map(|(ns, methods)| (ns, json!(methods))).collect();
    Namespace::new(NAMESPACE).remote("hello", Remote::new(|_ctx, _inv| Ok(json!("Hello, I am gofer agent"))))
                             .remote("cancel", Remote::new(move |_ctx, inv| {
                                 let mut cancelled = Vec::new();
                                 if let Some(Value::String(sn)) = inv.args.first() {
                                     if tracker.cancel(sn) {
                                         cancelled.push(sn.clone());
                                     }
                                 }
                                 if let Some(criteria) = inv.kwarg::<Map<String, Value>>("criteria")? {
                                     if criteria.is_empty() {
                                         return Err(RmiError::InvalidArgument("criteria vacío".into()));
                                     }
                                     for sn in tracker.find(|data| matches(data, &criteria)) {
                                         if tracker.cancel(&sn) {
                                             cancelled.push(sn);
                                         }
                                     }
                                 }
                                 Ok(json!(cancelled))
                             }))
                             .remote("help", Remote::new(move |_ctx, _inv| Ok(Value::Object(help.clone()))))
}
