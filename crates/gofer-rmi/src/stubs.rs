// Archivo: stubs.rs
// Propósito: implementaciones en memoria para pruebas y demos.
use crate::security::PamAuthenticator;

/// PAM con credenciales fijas, para pruebas y demos.
#[derive(Debug, Default, Clone)]
pub struct StaticPam {
    /// (usuario, contraseña, servicio)
    accounts: Vec<(String, String, String)>,
}

impl StaticPam {
    /// Crea un PAM sin cuentas.
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega una cuenta válida para `service`.
    pub fn account(mut self, user: &str, password: &str, service: &str) -> Self {
        self.accounts.push((user.into(), password.into(), service.into()));
        self
    }
}

impl PamAuthenticator for StaticPam {
    fn authenticate(&self, user: &str, password: &str, service: &str) -> bool {
        self.accounts.iter().any(|(u, p, s)| u == user && p == password && s == service)
    }
}
