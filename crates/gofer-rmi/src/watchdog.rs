// Archivo: watchdog.rs
// Propósito: vigilancia de plazos de peticiones asíncronas.
//
// Cada petición vigilada tiene dos plazos: recibir `started`/`accepted`
// y recibir la respuesta final. El estado se persiste en un journal
// `{sn}.jnl` para sobrevivir reinicios. Si un plazo vence sin respuesta
// el watchdog publica una respuesta sintetizada con `RequestTimeout`.
use crate::errors::{Result, RmiError};
use crate::marshal;
use crate::runner::{Flow, Runner};
use chrono::{DateTime, Utc};
use gofer_messaging::clock::after;
use gofer_messaging::{files, Clock, Document, Transport};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

const EXTENSION: &str = "jnl";
const TICK: Duration = Duration::from_secs(1);
const BACKOFF: Duration = Duration::from_secs(3);

/// Entrada del journal de una petición vigilada.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub sn: String,
    pub replyto: String,
    /// Dato opaco del llamador.
    #[serde(default)]
    pub any: Option<Value>,
    /// Plazos absolutos (inicio, fin).
    pub ts: (DateTime<Utc>, DateTime<Utc>),
    /// Plazo vigente: 0 = inicio, 1 = fin.
    pub idx: usize,
}

impl JournalEntry {
    /// Plazo de la etapa actual; `None` si ya no quedan.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        match self.idx {
            0 => Some(self.ts.0),
            1 => Some(self.ts.1),
            _ => None,
        }
    }
}

/// Journal en disco, un archivo por petición.
#[derive(Debug, Clone)]
pub struct Journal {
    root: PathBuf,
}

impl Journal {
    /// Abre (o crea) el journal en `root`.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        files::purge_tmp(root)?;
        Ok(Self { root: root.to_path_buf() })
    }

    fn path(&self, sn: &str) -> PathBuf {
        self.root.join(format!("{}.{}", sn.replace(['/', '\\'], "_"), EXTENSION))
    }

    /// Escribe la entrada de forma atómica.
    pub fn write(&self, entry: &JournalEntry) -> Result<()> {
        let body = serde_json::to_vec(entry)?;
        files::write_atomic(&self.path(&entry.sn), &body)?;
        Ok(())
    }

    /// Entrada de `sn`, si existe.
    pub fn find(&self, sn: &str) -> Result<Option<JournalEntry>> {
        let path = self.path(sn);
        if !path.exists() {
            return Ok(None);
        }
        Ok(self.read(&path))
    }

    /// Borra la entrada de `sn`.
    pub fn delete(&self, sn: &str) -> Result<()> {
        files::unlink(&self.path(sn))?;
        Ok(())
    }

    /// Todas las entradas legibles; las corruptas se eliminan.
    pub fn load(&self) -> Result<BTreeMap<String, JournalEntry>> {
        let mut entries = BTreeMap::new();
        for path in files::list_sorted(&self.root, EXTENSION)? {
            if let Some(entry) = self.read(&path) {
                entries.insert(entry.sn.clone(), entry);
            }
        }
        Ok(entries)
    }

    fn read(&self, path: &Path) -> Option<JournalEntry> {
        let parsed = fs::read(path).map_err(RmiError::from)
                                   .and_then(|body| serde_json::from_slice::<JournalEntry>(&body).map_err(RmiError::from));
        match parsed {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::error!("journal {} corrupto, descartado: {}", path.display(), e);
                if let Err(e) = files::unlink(path) {
                    log::error!("no se pudo borrar {}: {}", path.display(), e);
                }
                None
            }
        }
    }
}

/// Vigila respuestas asíncronas y publica timeouts.
pub struct WatchDog {
    id: String,
    journal: Journal,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    /// Serializa las actualizaciones del journal.
    lock: Mutex<()>,
}

impl WatchDog {
    /// Crea un watchdog con identidad nueva.
    pub fn new(journal: Journal, transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        Self { id: Uuid::new_v4().to_string(), journal, transport, clock, lock: Mutex::new(()) }
    }

    /// Identidad que marca las respuestas sintetizadas.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Journal del watchdog.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Empieza a vigilar `sn` con plazos (inicio, fin) relativos a ahora.
    pub fn track(&self, sn: &str, replyto: &str, any: Option<Value>, timeout: (Duration, Duration)) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let now = self.clock.now();
        let entry = JournalEntry { sn: sn.to_string(),
                                   replyto: replyto.to_string(),
                                   any,
                                   ts: (after(now, timeout.0), after(now, timeout.1)),
                                   idx: 0 };
        self.journal.write(&entry)?;
        log::debug!("watchdog: vigilando {} plazos={:?}", sn, entry.ts);
        Ok(())
    }

    /// Llegó una respuesta intermedia: pasa al siguiente plazo, o deja de
    /// vigilar si ya no quedan.
    pub fn hack(&self, sn: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let Some(mut entry) = self.journal.find(sn)? else {
            return Ok(());
        };
        entry.idx += 1;
        if entry.deadline().is_some() {
            self.journal.write(&entry)
        } else {
            self.journal.delete(sn)
        }
    }

    /// Llegó la respuesta final: deja de vigilar.
    pub fn complete(&self, sn: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.journal.delete(sn)
    }

    /// Una pasada: publica timeouts vencidos. Devuelve los sn vencidos.
    pub fn process(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let now = self.clock.now();
        let mut expired = Vec::new();
        for (sn, entry) in self.journal.load()? {
            let Some(deadline) = entry.deadline() else {
                self.journal.delete(&sn)?;
                continue;
            };
            if now <= deadline {
                continue;
            }
            let error = RmiError::RequestTimeout { sn: sn.clone(), timeout: entry.idx as u64 };
            let mut reply = Document::reply(&sn, entry.any.clone(), marshal::exception(&error));
            reply.watchdog = Some(self.id.clone());
            // un destino caído no frena al resto; la entrada queda para la
            // siguiente pasada
            if let Err(e) = self.transport.send(&entry.replyto, None, reply) {
                log::error!("watchdog: timeout de {} no enviado a {}: {}", sn, entry.replyto, e);
                continue;
            }
            self.journal.delete(&sn)?;
            log::info!("watchdog: petición {} vencida en etapa {}", sn, entry.idx);
            expired.push(sn);
        }
        Ok(expired)
    }

    /// Ciclo de fondo: una pasada por segundo; tras un error espera más.
    pub fn start(self: &Arc<Self>) -> std::io::Result<Runner> {
        let watchdog = Arc::clone(self);
        Runner::spawn("watchdog", TICK, move || match watchdog.process() {
            Ok(_) => Flow::Continue,
            Err(e) => {
                log::error!("watchdog: {}", e);
                Flow::Backoff(BACKOFF)
            }
        })
    }
}
