// Archivo: plugin.rs
// Propósito: plugins cargados en el agente y su registro.
//
// Un plugin agrupa un catálogo de namespaces (vía su `Dispatcher`) y un
// pool de workers propio donde se ejecutan sus peticiones.
use crate::errors::{AgentError, Result};
use crate::threadpool::{Task, WorkerPool};
use gofer_rmi::{Dispatcher, Namespace};
use indexmap::IndexMap;
use std::sync::Arc;

/// Descripción de un plugin a cargar.
#[derive(Clone)]
pub struct PluginSpec {
    pub name: String,
    /// Identidad para métodos no compartidos; si falta se genera una.
    pub uuid: Option<String>,
    /// Workers del plugin; por defecto los de la configuración.
    pub threads: Option<usize>,
    pub enabled: bool,
    pub namespaces: Vec<Namespace>,
}

impl PluginSpec {
    /// Crea la descripción de un plugin habilitado y sin namespaces.
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), uuid: None, threads: None, enabled: true, namespaces: Vec::new() }
    }

    /// Fija la identidad del plugin.
    pub fn uuid(mut self, uuid: &str) -> Self {
        self.uuid = Some(uuid.to_string());
        self
    }

    /// Cantidad de workers.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Un plugin deshabilitado no se carga.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Agrega un namespace.
    pub fn namespace(mut self, namespace: Namespace) -> Self {
        self.namespaces.push(namespace);
        self
    }
}

/// Plugin cargado: su dispatcher y su pool de workers.
pub struct Plugin {
    name: String,
    dispatcher: Arc<Dispatcher>,
    pool: WorkerPool,
}

impl Plugin {
    /// Crea el plugin y lanza sus workers.
    pub fn new(name: &str, dispatcher: Dispatcher, threads: usize, backlog: usize) -> Result<Self> {
        let pool = WorkerPool::new(name, threads, backlog)?;
        Ok(Self { name: name.to_string(), dispatcher: Arc::new(dispatcher), pool })
    }

    /// Nombre del plugin.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dispatcher con el catálogo del plugin.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Indica si el plugin expone `classname`.
    pub fn provides(&self, classname: &str) -> bool {
        self.dispatcher.provides(classname)
    }

    /// Pool de workers del plugin.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Encola una tarea en el pool del plugin.
    pub fn run(&self, task: Task) -> Result<usize> {
        self.pool.run(task)
    }
}

/// Plugins cargados, en orden de registro.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: IndexMap<String, Arc<Plugin>>,
}

impl PluginRegistry {
    /// Crea un registro vacío.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra un plugin; el nombre debe ser único.
    pub fn add(&mut self, plugin: Plugin) -> Result<Arc<Plugin>> {
        if self.plugins.contains_key(plugin.name()) {
            return Err(AgentError::DuplicatePlugin(plugin.name().to_string()));
        }
        let plugin = Arc::new(plugin);
        self.plugins.insert(plugin.name().to_string(), Arc::clone(&plugin));
        log::info!("plugin {} cargado", plugin.name());
        Ok(plugin)
    }

    /// Primer plugin que provee `classname`.
    pub fn find(&self, classname: &str) -> Option<Arc<Plugin>> {
        self.plugins.values().find(|p| p.provides(classname)).cloned()
    }

    /// Plugin por nombre.
    pub fn get(&self, name: &str) -> Option<Arc<Plugin>> {
        self.plugins.get(name).cloned()
    }

    /// Plugins en orden de registro.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Plugin>> {
        self.plugins.values()
    }

    /// Cantidad de plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Indica si no hay plugins.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
