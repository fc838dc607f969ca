//! Crate `gofer-rmi`: invocación remota sobre mensajería
//!
//! Del lado del agente: catálogo de métodos remotos (`Catalog`,
//! `Namespace`, `Remote`), resolución y ejecución (`Dispatcher`),
//! seguridad por secreto o PAM (`Security`), modelos de ejecución
//! (`ExecModel`), contexto de ejecución con progreso y cancelación
//! (`Context`, `Tracker`).
//!
//! Del lado del llamador: políticas de envío (`Synchronous`,
//! `Asynchronous`, `Trigger`), consumo de respuestas asíncronas
//! (`ReplyConsumer`, `Listener`) y vigilancia de plazos (`WatchDog`).
//!
//! Los errores viajan serializados en el `Return` (ver `marshal`) y se
//! reconstruyen como `RmiError` del lado del llamador.
pub mod catalog;
pub mod consumer;
pub mod context;
pub mod dispatcher;
pub mod errors;
pub mod marshal;
pub mod model;
pub mod policy;
pub mod runner;
pub mod security;
pub mod stubs;
pub mod tracker;
pub mod watchdog;

pub use catalog::{Catalog, Invocation, Method, Namespace, Remote};
pub use consumer::{AsyncReply, Listener, ReplyConsumer};
pub use context::{Cancelled, Context, Progress, ProgressReport};
pub use dispatcher::Dispatcher;
pub use errors::*;
pub use model::ExecModel;
pub use policy::{Asynchronous, PolicyOptions, Request, Synchronous, Timeout, Trigger};
pub use runner::{Flow, Runner};
pub use security::{DenyAll, PamAuthenticator, Requirement, Secret, Security, DEFAULT_PAM_SERVICE};
pub use stubs::StaticPam;
pub use tracker::Tracker;
pub use watchdog::{Journal, JournalEntry, WatchDog};
