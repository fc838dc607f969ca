// Archivo: dispatcher.rs
// Propósito: resolver una petición contra el catálogo y ejecutarla.
//
// `dispatch` nunca falla: cualquier error (ruteo, seguridad o del propio
// método) se devuelve serializado dentro del `Return`.
use crate::catalog::{Catalog, Invocation};
use crate::context::Context;
use crate::errors::{Result, RmiError};
use crate::marshal;
use crate::security::{DenyAll, PamAuthenticator, Security, DEFAULT_PAM_SERVICE};
use gofer_messaging::{Auth, Document, Return};
use serde_json::Value;
use std::sync::Arc;

/// Ejecuta peticiones contra un catálogo.
pub struct Dispatcher {
    catalog: Catalog,
    /// Identidad del plugin dueño; habilita métodos no compartidos.
    uuid: Option<String>,
    pam: Arc<dyn PamAuthenticator>,
    service: String,
}

impl Dispatcher {
    /// Crea un dispatcher sin identidad y con PAM que todo lo niega.
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog, uuid: None, pam: Arc::new(DenyAll), service: DEFAULT_PAM_SERVICE.into() }
    }

    /// Identidad del plugin dueño.
    pub fn with_uuid(mut self, uuid: Option<String>) -> Self {
        self.uuid = uuid;
        self
    }

    /// Autenticador y servicio PAM.
    pub fn with_pam(mut self, pam: Arc<dyn PamAuthenticator>, service: &str) -> Self {
        self.pam = pam;
        self.service = service.to_string();
        self
    }

    /// Catálogo servido.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Identidad del plugin dueño.
    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    /// Indica si el catálogo contiene `classname`.
    pub fn provides(&self, classname: &str) -> bool {
        self.catalog.provides(classname)
    }

    /// Ejecuta la petición con un contexto sin agente.
    pub fn dispatch(&self, request: &Document) -> Return {
        self.dispatch_in(&Context::detached(&request.sn), request)
    }

    /// Ejecuta la petición con el contexto dado.
    pub fn dispatch_in(&self, ctx: &Context, request: &Document) -> Return {
        log::info!("llamada sn={}: {}.{}()",
                   request.sn,
                   request.classname.as_deref().unwrap_or(""),
                   request.method.as_deref().unwrap_or(""));
        match self.invoke(ctx, request) {
            Ok(retval) => marshal::succeed(retval),
            Err(e) => {
                log::error!("llamada sn={} falló: {}", request.sn, e);
                marshal::exception(&e)
            }
        }
    }

    fn invoke(&self, ctx: &Context, request: &Document) -> Result<Value> {
        let classname = request.classname.as_deref().unwrap_or_default();
        let method = request.method.as_deref().unwrap_or_default();
        let instance = self.catalog.find(classname)?.construct(request.cntr.as_ref());
        let remote = instance.member(method)?;

        let auth = request.auth.clone().unwrap_or_default();
        if !remote.is_shared() && !self.owns(&auth) {
            return Err(RmiError::NotShared { namespace: classname.into(), method: method.into() });
        }
        Security::new(remote.requirements(), self.pam.as_ref(), &self.service).apply(&auth)?;

        let invocation = Invocation { cntr: instance.cntr().clone(), args: request.args.clone(), kwargs: request.kwargs.clone() };
        remote.exec_model().execute(remote.method(), ctx, &invocation)
    }

    fn owns(&self, auth: &Auth) -> bool {
        match (&self.uuid, &auth.uuid) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => false,
        }
    }
}
