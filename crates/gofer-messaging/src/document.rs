// Archivo: document.rs
// Propósito: el documento JSON que viaja por el broker (peticiones,
// respuestas y estados) y el resultado `Return` de una llamada.
//
// Los campos conocidos tienen tipo; cualquier otro campo se conserva en
// `extra` para no perder información al reenviar o persistir.
use crate::errors::{MessagingError, Result};
use crate::window::Window;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Versión del formato de documento.
pub const VERSION: &str = "2.0";

/// Estados intermedios o de rechazo de una petición.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Accepted,
    Rejected,
    Started,
    Progress,
}

/// Credenciales PAM enviadas por el llamador.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PamCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Bloque `auth` de una petición.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Auth {
    /// Identidad del plugin destino (métodos `shared = false`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pam: Option<PamCredentials>,
}

/// Argumentos de construcción `[args, kwargs]` del namespace destino.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constructor(pub Vec<Value>, pub Map<String, Value>);

/// Excepción serializada. `xclass` identifica el tipo y `xstate` lleva su
/// estado estructurado para reconstruirla del lado del llamador.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raised {
    pub exval: String,
    #[serde(default)]
    pub xmodule: String,
    pub xclass: String,
    #[serde(default)]
    pub xstate: Map<String, Value>,
    #[serde(default)]
    pub xargs: Vec<Value>,
}

/// Resultado de una invocación: `{retval}` o la excepción serializada.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Return {
    Succeeded { retval: Value },
    Failed(Raised),
}

impl Return {
    /// Indica si el resultado es exitoso.
    pub fn succeeded(&self) -> bool {
        matches!(self, Return::Succeeded { .. })
    }

    /// Indica si el resultado es una excepción.
    pub fn failed(&self) -> bool {
        !self.succeeded()
    }
}

/// Documento de mensajería.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Número de serie; lo genera el emisor.
    #[serde(default)]
    pub sn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replyto: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cntr: Option<Constructor>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Map::is_empty")]
    pub kwargs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<Window>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Auth>,
    /// Tiempo de vida en segundos desde la recepción.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<f64>,
    /// Instante de recepción (segundos epoch); lo fija el agente.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<f64>,
    /// Dato opaco del usuario, devuelto en cada respuesta.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Return>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    /// Presente sólo en respuestas sintetizadas por un watchdog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watchdog: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
    where D: Deserializer<'de>,
          T: Default + Deserialize<'de>
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Genera un número de serie nuevo.
pub fn new_sn() -> String {
    Uuid::new_v4().to_string()
}

impl Document {
    /// Petición RMI `classname.method()` con versión actual y sn vacío.
    pub fn request(classname: &str, method: &str) -> Self {
        Document { version: Some(VERSION.into()),
                   classname: Some(classname.into()),
                   method: Some(method.into()),
                   ..Default::default() }
    }

    /// Respuesta final de la petición `sn`.
    pub fn reply(sn: &str, data: Option<Value>, result: Return) -> Self {
        Document { sn: sn.into(),
                   version: Some(VERSION.into()),
                   data,
                   result: Some(result),
                   ..Default::default() }
    }

    /// Notificación de estado de la petición `sn`.
    pub fn status(sn: &str, data: Option<Value>, status: Status) -> Self {
        Document { sn: sn.into(),
                   version: Some(VERSION.into()),
                   data,
                   status: Some(status),
                   ..Default::default() }
    }

    /// Rechazo de la petición `sn` con código y detalle.
    pub fn rejected(sn: &str, data: Option<Value>, code: &str, description: &str, details: &str) -> Self {
        let mut document = Document::status(sn, data, Status::Rejected);
        document.set("code", Value::from(code));
        document.set("description", Value::from(description));
        document.set("details", Value::from(details));
        document
    }

    /// Campo no tipado.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Fija un campo extra.
    pub fn set(&mut self, key: &str, value: Value) {
        self.extra.insert(key.to_string(), value);
    }

    /// Comprueba que la versión sea la soportada.
    pub fn validate(&self) -> Result<()> {
        match self.version.as_deref() {
            Some(VERSION) => Ok(()),
            found => Err(MessagingError::version_mismatch(VERSION, found)),
        }
    }

    /// Serializa el documento a JSON.
    pub fn dump(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Lee un documento desde JSON.
    pub fn load(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Texto de un campo no tipado, o cadena vacía.
    pub fn text(&self, key: &str) -> String {
        self.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_args_are_empty() {
        let d = Document::load(r#"{"sn":"1","args":null,"kwargs":null}"#).unwrap();
        assert!(d.args.is_empty());
        assert!(d.kwargs.is_empty());
    }

    #[test]
    fn rejected_carries_code() {
        let d = Document::rejected("1", Some(json!(7)), "model.version", "versión no válida", "x");
        assert_eq!(d.status, Some(Status::Rejected));
        assert_eq!(d.text("code"), "model.version");
        assert_eq!(d.data, Some(json!(7)));
    }
}
