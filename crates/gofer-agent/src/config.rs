// Archivo: config.rs
// Propósito: configuración del agente leída del entorno (con soporte de
// `.env` vía dotenvy).
//
// Variables reconocidas:
// - GOFER_ROOT: directorio de estado (pendientes, diferidas, journal).
// - GOFER_QUEUE: cola de peticiones del agente.
// - GOFER_THREADS: workers por plugin.
// - GOFER_BACKLOG: capacidad de la cola de cada worker.
// - GOFER_DELAYED_POLL_MS: intervalo de revisión de peticiones diferidas.
// - GOFER_PAM_SERVICE: servicio PAM por defecto.
// - GOFER_COMMIT: `handoff` (al entregar al worker) o `reply` (tras responder).
use crate::errors::{AgentError, Result};
use gofer_rmi::DEFAULT_PAM_SERVICE;
use once_cell::sync::Lazy;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

static DEFAULT_ROOT: Lazy<PathBuf> = Lazy::new(|| PathBuf::from("/var/lib/gofer"));

/// Momento en que una petición se retira del almacén de pendientes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommitPolicy {
    /// Al entregarla al worker: una caída durante la ejecución la pierde.
    #[default]
    Handoff,
    /// Tras enviar la respuesta: una caída la re-ejecuta al reiniciar.
    Reply,
}

impl FromStr for CommitPolicy {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "handoff" => Ok(CommitPolicy::Handoff),
            "reply" => Ok(CommitPolicy::Reply),
            other => Err(AgentError::Config(format!("GOFER_COMMIT desconocido: {}", other))),
        }
    }
}

/// Configuración del agente.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub root: PathBuf,
    pub queue: String,
    pub threads: usize,
    pub backlog: usize,
    pub delayed_poll: Duration,
    pub pam_service: String,
    pub commit: CommitPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { root: DEFAULT_ROOT.clone(),
               queue: "gofer".into(),
               threads: 1,
               backlog: 100,
               delayed_poll: Duration::from_millis(1000),
               pam_service: DEFAULT_PAM_SERVICE.into(),
               commit: CommitPolicy::Handoff }
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse<T: FromStr>(name: &str, value: String) -> Result<T> {
    value.trim().parse().map_err(|_| AgentError::Config(format!("{}={} no es válido", name, value)))
}

impl AgentConfig {
    /// Lee la configuración del entorno; lo ausente toma el valor por
    /// defecto.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = AgentConfig::default();
        if let Some(root) = var("GOFER_ROOT") {
            config.root = PathBuf::from(root);
        }
        if let Some(queue) = var("GOFER_QUEUE") {
            config.queue = queue;
        }
        if let Some(v) = var("GOFER_THREADS") {
            config.threads = parse::<usize>("GOFER_THREADS", v)?.max(1);
        }
        if let Some(v) = var("GOFER_BACKLOG") {
            config.backlog = parse::<usize>("GOFER_BACKLOG", v)?.max(1);
        }
        if let Some(v) = var("GOFER_DELAYED_POLL_MS") {
            config.delayed_poll = Duration::from_millis(parse("GOFER_DELAYED_POLL_MS", v)?);
        }
        if let Some(service) = var("GOFER_PAM_SERVICE") {
            config.pam_service = service;
        }
        if let Some(v) = var("GOFER_COMMIT") {
            config.commit = v.parse()?;
        }
        Ok(config)
    }

    /// Configuración con raíz en `root` y el resto por defecto.
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), ..Self::default() }
    }

    /// Directorio de peticiones pendientes.
    pub fn pending_dir(&self) -> PathBuf {
        self.root.join("pending")
    }

    /// Directorio de peticiones diferidas.
    pub fn delayed_dir(&self) -> PathBuf {
        self.root.join("delayed")
    }

    /// Directorio del journal del watchdog.
    pub fn journal_dir(&self) -> PathBuf {
        self.root.join("journal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_policy_parses() {
        assert_eq!("handoff".parse::<CommitPolicy>().unwrap(), CommitPolicy::Handoff);
        assert_eq!(" Reply ".parse::<CommitPolicy>().unwrap(), CommitPolicy::Reply);
        assert!("later".parse::<CommitPolicy>().is_err());
    }

    #[test]
    fn layout_under_root() {
        let c = AgentConfig::rooted("/tmp/g");
        assert_eq!(c.pending_dir(), PathBuf::from("/tmp/g/pending"));
        assert_eq!(c.delayed_dir(), PathBuf::from("/tmp/g/delayed"));
        assert_eq!(c.threads, 1);
        assert_eq!(c.backlog, 100);
    }
}
