//! Crate `gofer-agent`: agente de ejecución remota
//!
//! El agente consume su cola de peticiones, las persiste en un almacén
//! durable (`PendingStore`), las planifica en el pool de workers del
//! plugin que provee la clase pedida (`Scheduler`, `WorkerPool`) y
//! responde por la cola indicada en `replyto`.
//!
//! Ejemplo rápido:
//! ```no_run
//! use gofer_agent::{Agent, AgentConfig, PluginSpec};
//! use gofer_messaging::InMemoryBroker;
//! use gofer_rmi::{Namespace, Remote};
//! use std::sync::Arc;
//! let dog = Namespace::new("Dog").remote("bark", Remote::new(|_c, _i| Ok("woof".into())));
//! let agent = Agent::builder(AgentConfig::rooted("/tmp/gofer"), Arc::new(InMemoryBroker::new()))
//!     .plugin(PluginSpec::new("dog").namespace(dog))
//!     .start()
//!     .unwrap();
//! agent.shutdown();
//! ```
pub mod agent;
pub mod builtin;
pub mod config;
pub mod consumer;
pub mod errors;
pub mod plugin;
pub mod scheduler;
pub mod store;
pub mod threadpool;

pub use agent::{Agent, AgentBuilder};
pub use config::{AgentConfig, CommitPolicy};
pub use consumer::RequestConsumer;
pub use errors::*;
pub use plugin::{Plugin, PluginRegistry, PluginSpec};
pub use scheduler::{Scheduler, TaskContext, Transaction};
pub use store::PendingStore;
pub use threadpool::{Task, WorkerPool};
