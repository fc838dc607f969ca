//! Crate `gofer-messaging`: documento, ventana y contrato de transporte
//!
//! Define el documento JSON que intercambian llamadores y agentes
//! (`Document`, `Return`, `Status`), la ventana de ejecución (`Window`), la
//! fuente de tiempo inyectable (`Clock`), el contrato del broker
//! (`Transport`) con un lector por número de serie (`Reader`), la firma
//! opcional de mensajes (`Authenticator`) y stubs en memoria para pruebas.
//!
//! Ejemplo rápido:
//! ```rust
//! use gofer_messaging::{Document, InMemoryBroker, Transport};
//! use std::time::Duration;
//! let broker = InMemoryBroker::new();
//! let sn = broker.send("agent", None, Document::request("Dog", "bark")).unwrap();
//! let msg = broker.receive("agent", Duration::from_millis(10)).unwrap().unwrap();
//! assert_eq!(msg.document.sn, sn);
//! ```
pub mod auth;
pub mod clock;
pub mod document;
pub mod errors;
pub mod files;
pub mod stubs;
pub mod transport;
pub mod window;

pub use auth::{Authenticator, SharedKeyAuthenticator};
pub use clock::{Clock, SystemClock};
pub use document::*;
pub use errors::*;
pub use stubs::{InMemoryBroker, ManualClock};
pub use transport::{Message, Reader, Transport};
pub use window::Window;
