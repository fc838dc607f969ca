// Archivo: tracker.rs
// Propósito: registro de peticiones en ejecución y de las canceladas.
//
// El agente añade cada petición al empezar y la retira al terminar. Los
// métodos de plugin consultan `Cancelled` para abortar cooperativamente.
use dashmap::{DashMap, DashSet};
use serde_json::Value;

/// Peticiones en curso y cancelaciones pedidas.
#[derive(Debug, Default)]
pub struct Tracker {
    /// sn -> dato opaco de la petición.
    running: DashMap<String, Value>,
    cancelled: DashSet<String>,
}

impl Tracker {
    /// Crea un tracker vacío.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra `sn` como en curso con su dato opaco.
    pub fn add(&self, sn: &str, data: Value) {
        self.running.insert(sn.to_string(), data);
    }

    /// Marca `sn` como cancelada. Devuelve `false` si no está en ejecución
    /// o ya estaba cancelada.
    pub fn cancel(&self, sn: &str) -> bool {
        if !self.running.contains_key(sn) {
            log::warn!("cancelación de {} ignorada: no está en ejecución", sn);
            return false;
        }
        let fresh = self.cancelled.insert(sn.to_string());
        if fresh {
            log::info!("petición {} cancelada", sn);
        }
        fresh
    }

    /// Indica si se pidió cancelar `sn`.
    pub fn cancelled(&self, sn: &str) -> bool {
        self.cancelled.contains(sn)
    }

    /// Olvida `sn` y su cancelación.
    pub fn remove(&self, sn: &str) {
        self.running.remove(sn);
        self.cancelled.remove(sn);
    }

    /// Números de serie cuyo dato cumple `matches`.
    pub fn find<F: Fn(&Value) -> bool>(&self, matches: F) -> Vec<String> {
        let mut found: Vec<String> =
            self.running.iter().filter(|entry| matches(entry.value())).map(|entry| entry.key().clone()).collect();
        found.sort();
        found
    }

    /// Peticiones en curso.
    pub fn len(&self) -> usize {
        self.running.len()
    }

    /// Indica si no hay peticiones en curso.
    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cancel_only_running() {
        let t = Tracker::new();
        assert!(!t.cancel("a"));
        t.add("a", json!({"group": 1}));
        t.add("b", json!({"group": 2}));
        assert!(t.cancel("a"));
        assert!(!t.cancel("a"));
        assert!(t.cancelled("a"));
        assert_eq!(t.find(|d| d["group"] == json!(2)), vec!["b".to_string()]);
        t.remove("a");
        assert!(!t.cancelled("a"));
        assert_eq!(t.len(), 1);
    }
}
