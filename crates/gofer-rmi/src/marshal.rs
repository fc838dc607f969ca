// Archivo: marshal.rs
// Propósito: conversión entre `RmiError` y su forma serializada `Raised`,
// y construcción/lectura de `Return`.
//
// `xclass` identifica la variante y `xstate` lleva sus campos. Del lado
// del llamador las clases conocidas de este módulo se reconstruyen con su
// tipo; el resto (incluidas las excepciones de plugins) llega como
// `RmiError::Raised`.
use crate::errors::{RemoteException, RmiError};
use gofer_messaging::{Document, MessagingError, Raised, Return};
use serde_json::{Map, Value};

const MODULE: &str = "gofer_rmi";

/// Resultado exitoso.
pub fn succeed(retval: Value) -> Return {
    Return::Succeeded { retval }
}

/// Resultado con la excepción `error`.
pub fn exception(error: &RmiError) -> Return {
    Return::Failed(to_raised(error))
}

/// Valor de retorno o error reconstruido.
pub fn outcome(result: Return) -> Result<Value, RmiError> {
    match result {
        Return::Succeeded { retval } => Ok(retval),
        Return::Failed(raised) => Err(from_raised(&raised)),
    }
}

/// Nombre de clase con el que viaja cada variante.
pub fn xclass(error: &RmiError) -> &str {
    match error {
        RmiError::NamespaceNotFound(_) => "NamespaceNotFound",
        RmiError::MemberNotFound { .. } => "MemberNotFound",
        RmiError::NotShared { .. } => "NotShared",
        RmiError::SecretRequired => "SecretRequired",
        RmiError::SecretNotMatched => "SecretNotMatched",
        RmiError::UserRequired => "UserRequired",
        RmiError::PasswordRequired => "PasswordRequired",
        RmiError::UserNotAuthorized(_) => "UserNotAuthorized",
        RmiError::NotAuthenticated(_) => "NotAuthenticated",
        RmiError::WindowMissed(_) => "WindowMissed",
        RmiError::RequestTimeout { .. } => "RequestTimeout",
        RmiError::InvalidDocument { .. } | RmiError::Messaging(MessagingError::InvalidDocument { .. }) => {
            "InvalidDocument"
        }
        RmiError::TriggerPulled(_) => "TriggerPulled",
        RmiError::InvalidArgument(_) => "InvalidArgument",
        RmiError::ModelFailed(_) => "ModelFailed",
        RmiError::Raised(e) => e.xclass.as_str(),
        RmiError::Messaging(_) => "MessagingError",
        RmiError::Serialization(_) => "SerializationError",
        RmiError::Io(_) => "IoError",
    }
}

fn state(error: &RmiError) -> Map<String, Value> {
    let mut state = Map::new();
    let mut put = |k: &str, v: Value| {
        state.insert(k.to_string(), v);
    };
    match error {
        RmiError::NamespaceNotFound(namespace) => put("namespace", namespace.as_str().into()),
        RmiError::MemberNotFound { namespace, method } | RmiError::NotShared { namespace, method } => {
            put("namespace", namespace.as_str().into());
            put("method", method.as_str().into());
        }
        RmiError::UserNotAuthorized(user) | RmiError::NotAuthenticated(user) => put("user", user.as_str().into()),
        RmiError::WindowMissed(sn) | RmiError::TriggerPulled(sn) => put("sn", sn.as_str().into()),
        RmiError::RequestTimeout { sn, timeout } => {
            put("sn", sn.as_str().into());
            put("timeout", (*timeout).into());
        }
        RmiError::InvalidDocument { code, description, details }
        | RmiError::Messaging(MessagingError::InvalidDocument { code, description, details }) => {
            put("code", code.as_str().into());
            put("description", description.as_str().into());
            put("details", details.as_str().into());
        }
        RmiError::InvalidArgument(m) | RmiError::ModelFailed(m) => put("message", m.as_str().into()),
        RmiError::Raised(e) => return e.state.clone(),
        _ => {}
    }
    state
}

/// Forma serializada de `error`.
pub fn to_raised(error: &RmiError) -> Raised {
    let (xmodule, xargs) = match error {
        RmiError::Raised(e) => (e.xmodule.clone(), e.args.clone()),
        other => (MODULE.to_string(), vec![Value::from(other.to_string())]),
    };
    Raised { exval: error.to_string(),
             xmodule,
             xclass: xclass(error).to_string(),
             xstate: state(error),
             xargs }
}

/// Reconstruye el error recibido.
pub fn from_raised(raised: &Raised) -> RmiError {
    rebuild(raised).unwrap_or_else(|| {
        RmiError::Raised(RemoteException { xmodule: raised.xmodule.clone(),
                                           xclass: raised.xclass.clone(),
                                           message: raised.exval.clone(),
                                           state: raised.xstate.clone(),
                                           args: raised.xargs.clone() })
    })
}

/// Error de un documento `status=rejected`.
pub fn rejected(document: &Document) -> RmiError {
    RmiError::InvalidDocument { code: document.text("code"),
                                description: document.text("description"),
                                details: document.text("details") }
}

fn rebuild(raised: &Raised) -> Option<RmiError> {
    if raised.xmodule != MODULE {
        return None;
    }
    let text = |k: &str| raised.xstate.get(k).and_then(Value::as_str).map(str::to_string);
    let error = match raised.xclass.as_str() {
        "NamespaceNotFound" => RmiError::NamespaceNotFound(text("namespace")?),
        "MemberNotFound" => RmiError::MemberNotFound { namespace: text("namespace")?, method: text("method")? },
        "NotShared" => RmiError::NotShared { namespace: text("namespace")?, method: text("method")? },
        "SecretRequired" => RmiError::SecretRequired,
        "SecretNotMatched" => RmiError::SecretNotMatched,
        "UserRequired" => RmiError::UserRequired,
        "PasswordRequired" => RmiError::PasswordRequired,
        "UserNotAuthorized" => RmiError::UserNotAuthorized(text("user")?),
        "NotAuthenticated" => RmiError::NotAuthenticated(text("user")?),
        "WindowMissed" => RmiError::WindowMissed(text("sn")?),
        "TriggerPulled" => RmiError::TriggerPulled(text("sn")?),
        "RequestTimeout" => RmiError::RequestTimeout { sn: text("sn")?,
                                                       timeout: raised.xstate.get("timeout").and_then(Value::as_u64)? },
        "InvalidDocument" => RmiError::InvalidDocument { code: text("code")?,
                                                         description: text("description")?,
                                                         details: text("details")? },
        "InvalidArgument" => RmiError::InvalidArgument(text("message")?),
        "ModelFailed" => RmiError::ModelFailed(text("message")?),
        _ => return None,
    };
    Some(error)
}
