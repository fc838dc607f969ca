// Archivo: agent.rs
// Propósito: raíz de composición del agente.
//
// Orden de arranque: almacén de pendientes (la recuperación corre en
// segundo plano), plugins + builtin, scheduler, revisión de diferidas y
// por último el consumo de la cola de peticiones. `shutdown` detiene en
// orden inverso.
use crate::builtin;
use crate::config::AgentConfig;
use crate::consumer::RequestConsumer;
use crate::errors::Result;
use crate::plugin::{Plugin, PluginRegistry, PluginSpec};
use crate::scheduler::{Scheduler, TaskContext};
use crate::store::PendingStore;
use gofer_messaging::{Clock, Reader, SystemClock, Transport};
use gofer_rmi::{Catalog, DenyAll, Dispatcher, PamAuthenticator, Runner, Tracker};
use std::sync::Arc;
use std::thread::JoinHandle;
use uuid::Uuid;

/// Configuración de arranque de un `Agent`.
pub struct AgentBuilder {
    config: AgentConfig,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    pam: Arc<dyn PamAuthenticator>,
    plugins: Vec<PluginSpec>,
}

impl AgentBuilder {
    /// Reloj usado para ventanas y TTL.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Autenticador PAM de los métodos protegidos.
    pub fn pam(mut self, pam: Arc<dyn PamAuthenticator>) -> Self {
        self.pam = pam;
        self
    }

    /// Agrega un plugin a cargar.
    pub fn plugin(mut self, spec: PluginSpec) -> Self {
        self.plugins.push(spec);
        self
    }

    fn dispatcher(&self, catalog: Catalog, uuid: Option<String>) -> Dispatcher {
        Dispatcher::new(catalog).with_uuid(uuid).with_pam(Arc::clone(&self.pam), &self.config.pam_service)
    }

    fn registry(&self, tracker: &Arc<Tracker>) -> Result<PluginRegistry> {
        let mut registry = PluginRegistry::new();
        let mut listing: Vec<(String, Vec<String>)> = Vec::new();
        for spec in self.plugins.iter().filter(|s| s.enabled) {
            let catalog = spec.namespaces.iter().cloned().fold(Catalog::new(), Catalog::add);
            listing.extend(catalog.namespaces().map(|ns| (ns.name().to_string(), ns.methods().map(str::to_string).collect())));
            let threads = spec.threads.unwrap_or(self.config.threads);
            let uuid = spec.uuid.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
            let plugin = Plugin::new(&spec.name, self.dispatcher(catalog, Some(uuid)), threads, self.config.backlog)?;
            registry.add(plugin)?;
        }
        let admin_methods = vec!["hello".to_string(), "cancel".to_string(), "help".to_string()];
        listing.push((builtin::NAMESPACE.to_string(), admin_methods));
        let admin = Catalog::new().add(builtin::admin(Arc::clone(tracker), listing));
        registry.add(Plugin::new(builtin::NAME, self.dispatcher(admin, None), 1, self.config.backlog)?)?;
        Ok(registry)
    }

    /// Arranca el agente.
    pub fn start(self) -> Result<Agent> {
        let config = self.config.clone();
        let store = PendingStore::open(&config.root, Arc::clone(&self.clock))?;
        let tracker = Arc::new(Tracker::new());
        let registry = Arc::new(self.registry(&tracker)?);
        let empty = Plugin::new("empty", self.dispatcher(Catalog::new(), None), 1, config.backlog)?;

        let tasks = TaskContext { store: Arc::clone(&store),
                                  transport: Arc::clone(&self.transport),
                                  tracker: Arc::clone(&tracker),
                                  clock: Arc::clone(&self.clock),
                                  commit: config.commit };
        let scheduler = Arc::new(Scheduler::new(tasks, Arc::clone(&registry), empty)).start()?;
        let poller = store.start(config.delayed_poll)?;

        self.transport.declare(&config.queue)?;
        let consumer = RequestConsumer::new(Reader::new(Arc::clone(&self.transport), &config.queue), Arc::clone(&store)).start()?;
        log::info!("agente escuchando en \"{}\" con {} plugins (commit={:?})", config.queue, registry.len(), config.commit);

        Ok(Agent { config, store, tracker, registry, scheduler: Some(scheduler), runners: vec![consumer, poller] })
    }
}

/// Agente en ejecución; se detiene con `shutdown` o al soltarse.
pub struct Agent {
    config: AgentConfig,
    store: Arc<PendingStore>,
    tracker: Arc<Tracker>,
    registry: Arc<PluginRegistry>,
    scheduler: Option<JoinHandle<()>>,
    /// En orden de parada.
    runners: Vec<Runner>,
}

impl Agent {
    /// Crea un builder con reloj del sistema y PAM que todo lo niega.
    pub fn builder(config: AgentConfig, transport: Arc<dyn Transport>) -> AgentBuilder {
        AgentBuilder { config, transport, clock: Arc::new(SystemClock), pam: Arc::new(DenyAll), plugins: Vec::new() }
    }

    /// Configuración efectiva.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Almacén de pendientes.
    pub fn store(&self) -> &Arc<PendingStore> {
        &self.store
    }

    /// Peticiones en curso.
    pub fn tracker(&self) -> &Arc<Tracker> {
        &self.tracker
    }

    /// Plugins cargados.
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Detiene el consumo, cierra el almacén y espera al scheduler. Las
    /// tareas ya encoladas terminan al soltarse los pools.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        for runner in &mut self.runners {
            runner.stop();
        }
        self.store.close();
        if let Some(scheduler) = self.scheduler.take() {
            if scheduler.join().is_err() {
                log::error!("scheduler terminó con pánico");
            }
        }
        log::info!("agente detenido");
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        if self.scheduler.is_some() {
            self.stop();
        }
    }
}
