// Archivo: catalog.rs
// Propósito: catálogo de métodos invocables en remoto.
//
// Un `Namespace` agrupa métodos bajo un nombre de clase; sólo lo
// registrado con `remote()` es invocable. Cada método lleva su
// descriptor `Remote` (modelo de ejecución, requisitos de seguridad y si
// es compartido entre plugins).
use crate::context::Context;
use crate::errors::{Result, RmiError};
use crate::model::ExecModel;
use crate::security::{Requirement, Secret};
use gofer_messaging::Constructor;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Implementación de un método remoto.
pub type Method = Arc<dyn Fn(&Context, &Invocation) -> Result<Value> + Send + Sync>;

/// Argumentos de una llamada: constructor del namespace y del método.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invocation {
    pub cntr: Constructor,
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
}

impl Invocation {
    /// Argumento posicional `index` convertido a `T`.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T> {
        let value = self.args
                        .get(index)
                        .ok_or_else(|| RmiError::InvalidArgument(format!("falta el argumento {}", index)))?;
        serde_json::from_value(value.clone()).map_err(|e| RmiError::InvalidArgument(format!("argumento {}: {}", index, e)))
    }

    /// Argumento con nombre, si está presente.
    pub fn kwarg<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.kwargs.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some)
                                                               .map_err(|e| RmiError::InvalidArgument(format!("{}: {}", name, e))),
        }
    }
}

/// Descriptor de un método remoto.
#[derive(Clone)]
pub struct Remote {
    method: Method,
    model: ExecModel,
    security: Vec<Requirement>,
    shared: bool,
}

impl Remote {
    /// Crea un miembro remoto compartido, directo y sin requisitos.
    pub fn new<F>(method: F) -> Self
        where F: Fn(&Context, &Invocation) -> Result<Value> + Send + Sync + 'static
    {
        Self { method: Arc::new(method), model: ExecModel::Direct, security: Vec::new(), shared: true }
    }

    /// Modelo de ejecución del método.
    pub fn model(mut self, model: ExecModel) -> Self {
        self.model = model;
        self
    }

    /// Acepta cualquiera de los secretos dados.
    pub fn secret(mut self, accepted: &[&str]) -> Self {
        self.security.push(Requirement::Secret(Secret::Fixed(accepted.iter().map(|s| s.to_string()).collect())));
        self
    }

    /// Secretos resueltos en cada llamada.
    pub fn secret_with<F>(mut self, resolve: F) -> Self
        where F: Fn() -> Vec<String> + Send + Sync + 'static
    {
        self.security.push(Requirement::Secret(Secret::Resolved(Arc::new(resolve))));
        self
    }

    /// Exige autenticación PAM de `user`.
    pub fn pam(mut self, user: &str, service: Option<&str>) -> Self {
        self.security.push(Requirement::Pam { user: user.into(), service: service.map(str::to_string) });
        self
    }

    /// Con `false` sólo lo invocan peticiones dirigidas al uuid del plugin.
    pub fn shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    /// Función que implementa el método.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Modelo de ejecución.
    pub fn exec_model(&self) -> ExecModel {
        self.model
    }

    /// Requisitos de seguridad, en orden.
    pub fn requirements(&self) -> &[Requirement] {
        &self.security
    }

    /// Indica si lo puede invocar cualquier llamador.
    pub fn is_shared(&self) -> bool {
        self.shared
    }
}

/// Clase remota: nombre y métodos invocables.
#[derive(Clone)]
pub struct Namespace {
    name: String,
    members: IndexMap<String, Remote>,
}

impl Namespace {
    /// Crea un namespace vacío.
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), members: IndexMap::new() }
    }

    /// Registra `method` como llamable remotamente.
    pub fn remote(mut self, method: &str, remote: Remote) -> Self {
        self.members.insert(method.to_string(), remote);
        self
    }

    /// Nombre del namespace.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Métodos registrados, en orden.
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    /// Instancia del namespace con los argumentos de construcción.
    pub fn construct(&self, cntr: Option<&Constructor>) -> Instance<'_> {
        Instance { namespace: self, cntr: cntr.cloned().unwrap_or_default() }
    }
}

/// Namespace ligado a sus argumentos de construcción.
pub struct Instance<'a> {
    namespace: &'a Namespace,
    cntr: Constructor,
}

impl<'a> Instance<'a> {
    /// Miembro remoto `method`, o `MemberNotFound`.
    pub fn member(&self, method: &str) -> Result<&'a Remote> {
        self.namespace.members.get(method).ok_or_else(|| RmiError::MemberNotFound {
                                                                 namespace: self.namespace.name.clone(),
                                                                 method: method.to_string(),
                                                             })
    }

    /// Argumentos de construcción.
    pub fn cntr(&self) -> &Constructor {
        &self.cntr
    }
}

/// Conjunto de namespaces provistos por un plugin.
#[derive(Clone, Default)]
pub struct Catalog {
    namespaces: IndexMap<String, Namespace>,
}

impl Catalog {
    /// Crea un catálogo vacío.
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega un namespace; reemplaza uno del mismo nombre.
    pub fn add(mut self, namespace: Namespace) -> Self {
        self.namespaces.insert(namespace.name.clone(), namespace);
        self
    }

    /// Indica si el catálogo contiene `classname`.
    pub fn provides(&self, classname: &str) -> bool {
        self.namespaces.contains_key(classname)
    }

    /// Namespace `classname`, o `NamespaceNotFound`.
    pub fn find(&self, classname: &str) -> Result<&Namespace> {
        self.namespaces.get(classname).ok_or_else(|| RmiError::NamespaceNotFound(classname.to_string()))
    }

    /// Namespaces en orden de registro.
    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> {
        self.namespaces.values()
    }
}
