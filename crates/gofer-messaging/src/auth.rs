// Archivo: auth.rs
// Propósito: firma y validación opcional de mensajes.
//
// Con un `Authenticator` configurado el mensaje viaja como
// `{"message": <json>, "signature": <base64>}`; la firma cubre el digest
// sha256 del texto de `message`. Sin autenticador el documento viaja tal
// cual y se acepta sin validar.
use crate::document::Document;
use crate::errors::{MessagingError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Firma y verifica el digest de los documentos.
pub trait Authenticator: Send + Sync {
    /// Firma el digest de un mensaje.
    fn sign(&self, digest: &str) -> Result<Vec<u8>>;

    /// Valida la firma del digest; `document` permite elegir la clave.
    fn validate(&self, document: &Document, digest: &str, signature: &[u8]) -> Result<()>;
}

/// Digest sha256 en hexadecimal.
pub fn digest(message: &str) -> String {
    format!("{:x}", Sha256::digest(message.as_bytes()))
}

/// Codifica el documento para el broker, firmándolo si corresponde.
pub fn sign(authenticator: Option<&dyn Authenticator>, document: &Document) -> Result<String> {
    let message = document.dump()?;
    let Some(authenticator) = authenticator else {
        return Ok(message);
    };
    let signature = authenticator.sign(&digest(&message))?;
    let envelope = serde_json::json!({ "message": message, "signature": STANDARD.encode(signature) });
    Ok(envelope.to_string())
}

/// Decodifica un mensaje del broker y valida su firma si hay autenticador.
pub fn validate(authenticator: Option<&dyn Authenticator>, raw: &str) -> Result<Document> {
    let (message, signature) = peel(raw)?;
    let document = Document::load(&message)?;
    let Some(authenticator) = authenticator else {
        return Ok(document);
    };
    let signature = match signature {
        Some(s) => STANDARD.decode(s).map_err(|e| MessagingError::validation_failed(e.to_string()))?,
        None => return Err(MessagingError::validation_failed(format!("mensaje {} sin firma", document.sn))),
    };
    authenticator.validate(&document, &digest(&message), &signature)?;
    Ok(document)
}

/// Separa mensaje y firma de un sobre firmado.
fn peel(raw: &str) -> Result<(String, Option<String>)> {
    let value: Value = serde_json::from_str(raw)?;
    if let (Some(Value::String(message)), Some(Value::String(signature))) = (value.get("message"), value.get("signature")) {
        return Ok((message.clone(), Some(signature.clone())));
    }
    Ok((raw.to_string(), None))
}

/// Autenticador de clave compartida: la firma es sha256(clave || digest).
pub struct SharedKeyAuthenticator {
    key: String,
}

impl SharedKeyAuthenticator {
    /// Crea un autenticador con la clave compartida `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    fn mac(&self, digest: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(self.key.as_bytes());
        hasher.update(digest.as_bytes());
        hasher.finalize().to_vec()
    }
}

impl Authenticator for SharedKeyAuthenticator {
    fn sign(&self, digest: &str) -> Result<Vec<u8>> {
        Ok(self.mac(digest))
    }

    fn validate(&self, document: &Document, digest: &str, signature: &[u8]) -> Result<()> {
        if self.mac(digest) == signature {
            Ok(())
        } else {
            Err(MessagingError::validation_failed(format!("firma inválida en mensaje {}", document.sn)))
        }
    }
}
