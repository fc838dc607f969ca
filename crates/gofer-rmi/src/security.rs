// Archivo: security.rs
// Propósito: requisitos de autorización de un método remoto y su
// verificación contra el bloque `auth` de la petición.
//
// Un método puede declarar varios requisitos; basta con que uno se cumpla.
// Si ninguno se cumple se informa el error del último intentado.
use crate::errors::{Result, RmiError};
use gofer_messaging::Auth;
use std::fmt;
use std::sync::Arc;

/// Servicio PAM por defecto.
pub const DEFAULT_PAM_SERVICE: &str = "passwd";

/// Capacidad de autenticación PAM; la implementación real depende del
/// sistema y se inyecta al construir el agente.
pub trait PamAuthenticator: Send + Sync {
    fn authenticate(&self, user: &str, password: &str, service: &str) -> bool;
}

/// Sin PAM disponible: toda autenticación falla.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAll;

impl PamAuthenticator for DenyAll {
    fn authenticate(&self, _user: &str, _password: &str, _service: &str) -> bool {
        false
    }
}

/// Fuente de secretos aceptados.
#[derive(Clone)]
pub enum Secret {
    Fixed(Vec<String>),
    /// Se resuelve en cada llamada (rotación de secretos).
    Resolved(Arc<dyn Fn() -> Vec<String> + Send + Sync>),
}

impl Secret {
    fn accepted(&self) -> Vec<String> {
        match self {
            Secret::Fixed(values) => values.clone(),
            Secret::Resolved(resolve) => resolve(),
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Secret::Fixed(values) => write!(f, "Secret::Fixed({} valores)", values.len()),
            Secret::Resolved(_) => write!(f, "Secret::Resolved"),
        }
    }
}

/// Requisito de seguridad de un método.
#[derive(Debug, Clone)]
pub enum Requirement {
    Secret(Secret),
    /// Usuario PAM exigido; `service` por defecto el del agente.
    Pam { user: String, service: Option<String> },
}

/// Verificador de requisitos para una llamada concreta.
pub struct Security<'a> {
    requirements: &'a [Requirement],
    pam: &'a dyn PamAuthenticator,
    service: &'a str,
}

impl<'a> Security<'a> {
    /// Crea la verificación de `requirements`.
    pub fn new(requirements: &'a [Requirement], pam: &'a dyn PamAuthenticator, service: &'a str) -> Self {
        Self { requirements, pam, service }
    }

    /// Autoriza si algún requisito se cumple (o si no hay requisitos).
    pub fn apply(&self, passed: &Auth) -> Result<()> {
        let mut last = None;
        for requirement in self.requirements {
            match self.check(requirement, passed) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    log::debug!("requisito {:?} no cumplido: {}", requirement, e);
                    last = Some(e);
                }
            }
        }
        match last {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn check(&self, requirement: &Requirement, passed: &Auth) -> Result<()> {
        match requirement {
            Requirement::Secret(secret) => {
                let accepted = secret.accepted();
                if accepted.is_empty() {
                    return Ok(());
                }
                match passed.secret.as_deref() {
                    None => Err(RmiError::SecretRequired),
                    Some(s) if accepted.iter().any(|a| a == s) => Ok(()),
                    Some(_) => Err(RmiError::SecretNotMatched),
                }
            }
            Requirement::Pam { user, service } => {
                let pam = passed.pam.clone().unwrap_or_default();
                let passed_user = pam.user.ok_or(RmiError::UserRequired)?;
                let password = pam.password.ok_or(RmiError::PasswordRequired)?;
                if &passed_user != user {
                    return Err(RmiError::UserNotAuthorized(passed_user));
                }
                let service = service.as_deref().unwrap_or(self.service);
                if !self.pam.authenticate(&passed_user, &password, service) {
                    return Err(RmiError::NotAuthenticated(passed_user));
                }
                Ok(())
            }
        }
    }
}
