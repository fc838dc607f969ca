// Archivo: policy.rs
// Propósito: políticas del lado del llamador para enviar una petición y
// (opcionalmente) esperar su respuesta.
//
// - `Synchronous`: cola de respuesta efímera y espera en dos etapas
//   (`timeout` hasta started/accepted, `wait` hasta la respuesta final).
// - `Asynchronous`: devuelve el sn; las respuestas van a `reply` y, si hay
//   watchdog, los plazos quedan vigilados.
// - `Trigger`: envío asíncrono diferido y de un solo uso.
use crate::context::ProgressReport;
use crate::errors::{Result, RmiError};
use crate::marshal;
use crate::watchdog::WatchDog;
use gofer_messaging::{new_sn, Auth, Constructor, Document, PamCredentials, Reader, Status, Transport, Window};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Conversión de plazos expresados como texto.
pub struct Timeout;

impl Timeout {
    /// Segundos de un plazo `N`, `Ns`, `Nm`, `Nh` o `Nd`.
    pub fn seconds(text: &str) -> Result<u64> {
        let text = text.trim();
        let invalid = || RmiError::InvalidArgument(format!("timeout inválido: \"{}\"", text));
        let (number, unit) = match text.char_indices().last() {
            Some((i, c)) if c.is_ascii_alphabetic() => (&text[..i], c.to_ascii_lowercase()),
            Some(_) => (text, 's'),
            None => return Err(invalid()),
        };
        let factor = match unit {
            's' => 1,
            'm' => 60,
            'h' => 3_600,
            'd' => 86_400,
            _ => return Err(invalid()),
        };
        let n: u64 = number.trim().parse().map_err(|_| invalid())?;
        n.checked_mul(factor).ok_or_else(invalid)
    }

    /// Como `seconds`, en `Duration`.
    pub fn duration(text: &str) -> Result<Duration> {
        Ok(Duration::from_secs(Timeout::seconds(text)?))
    }
}

/// Recibe (sn, avance) de una llamada síncrona.
pub type ProgressCallback = Arc<dyn Fn(&str, &ProgressReport) + Send + Sync>;

/// Opciones comunes de envío.
#[derive(Clone)]
pub struct PolicyOptions {
    /// Tiempo de vida de la petición en el agente.
    pub ttl: Option<Duration>,
    /// Plazo hasta `started`/`accepted`.
    pub timeout: Duration,
    /// Plazo hasta la respuesta final.
    pub wait: Duration,
    pub window: Option<Window>,
    /// Dato opaco devuelto en cada respuesta.
    pub data: Option<Value>,
    /// Cola de respuestas (sólo asíncrono).
    pub reply: Option<String>,
    pub uuid: Option<String>,
    pub secret: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub progress: Option<ProgressCallback>,
}

impl Default for PolicyOptions {
    fn default() -> Self {
        Self { ttl: None,
               timeout: Duration::from_secs(10),
               wait: Duration::from_secs(90),
               window: None,
               data: None,
               reply: None,
               uuid: None,
               secret: None,
               user: None,
               password: None,
               progress: None }
    }
}

impl PolicyOptions {
    fn auth(&self) -> Option<Auth> {
        let pam = match (&self.user, &self.password) {
            (None, None) => None,
            (user, password) => Some(PamCredentials { user: user.clone(), password: password.clone() }),
        };
        if self.uuid.is_none() && self.secret.is_none() && pam.is_none() {
            return None;
        }
        Some(Auth { uuid: self.uuid.clone(), secret: self.secret.clone(), pam })
    }
}

/// Firma de la llamada remota.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    pub classname: String,
    pub method: String,
    pub cntr: Option<Constructor>,
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
}

impl Request {
    /// Crea la petición de `classname.method()`.
    pub fn new(classname: &str, method: &str) -> Self {
        Self { classname: classname.into(), method: method.into(), ..Default::default() }
    }

    /// Agrega un argumento posicional.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Agrega un argumento con nombre.
    pub fn kwarg(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.to_string(), value.into());
        self
    }

    /// Argumentos de construcción del namespace.
    pub fn cntr(mut self, args: Vec<Value>, kwargs: Map<String, Value>) -> Self {
        self.cntr = Some(Constructor(args, kwargs));
        self
    }

    fn document(self, sn: &str, replyto: Option<&str>, options: &PolicyOptions) -> Document {
        let mut document = Document::request(&self.classname, &self.method);
        document.sn = sn.to_string();
        document.cntr = self.cntr;
        document.args = self.args;
        document.kwargs = self.kwargs;
        document.replyto = replyto.map(str::to_string);
        document.window = options.window;
        document.data = options.data.clone();
        document.auth = options.auth();
        document
    }
}

/// Envío bloqueante hasta la respuesta final.
pub struct Synchronous {
    transport: Arc<dyn Transport>,
    options: PolicyOptions,
}

impl Synchronous {
    /// Crea la política con `options`.
    pub fn new(transport: Arc<dyn Transport>, options: PolicyOptions) -> Self {
        Self { transport, options }
    }

    /// Envía a `route` y devuelve el valor de retorno o el error remoto.
    pub fn send(&self, route: &str, request: Request) -> Result<Value> {
        let queue = format!("reply-{}", Uuid::new_v4());
        self.transport.declare(&queue)?;
        let result = self.call(route, &queue, request);
        if let Err(e) = self.transport.delete(&queue) {
            log::warn!("cola de respuesta {} no eliminada: {}", queue, e);
        }
        result
    }

    fn call(&self, route: &str, queue: &str, request: Request) -> Result<Value> {
        let sn = new_sn();
        let document = request.document(&sn, Some(queue), &self.options);
        self.transport.send(route, self.options.ttl, document)?;
        let reader = Reader::new(self.transport.clone(), queue);
        if let Some(value) = self.get_started(&reader, &sn)? {
            return Ok(value);
        }
        self.get_reply(&reader, &sn)
    }

    /// Primera etapa. Devuelve el resultado si la respuesta final llegó
    /// antes que cualquier estado.
    fn get_started(&self, reader: &Reader, sn: &str) -> Result<Option<Value>> {
        let timeout = self.options.timeout;
        let Some(document) = reader.search(sn, timeout)? else {
            return Err(RmiError::RequestTimeout { sn: sn.into(), timeout: timeout.as_secs() });
        };
        match document.status {
            Some(Status::Rejected) => Err(marshal::rejected(&document)),
            Some(Status::Accepted) | Some(Status::Started) => Ok(None),
            Some(Status::Progress) => {
                self.on_progress(&document);
                Ok(None)
            }
            None => self.on_reply(document).map(Some),
        }
    }

    fn get_reply(&self, reader: &Reader, sn: &str) -> Result<Value> {
        let wait = self.options.wait;
        let deadline = Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let found = if remaining.is_zero() { None } else { reader.search(sn, remaining)? };
            let Some(document) = found else {
                return Err(RmiError::RequestTimeout { sn: sn.into(), timeout: wait.as_secs() });
            };
            match document.status {
                Some(Status::Rejected) => return Err(marshal::rejected(&document)),
                Some(Status::Accepted) | Some(Status::Started) => continue,
                Some(Status::Progress) => self.on_progress(&document),
                None => return self.on_reply(document),
            }
        }
    }

    fn on_progress(&self, document: &Document) {
        if let Some(callback) = &self.options.progress {
            callback(&document.sn, &ProgressReport::from_document(document));
        }
    }

    fn on_reply(&self, document: Document) -> Result<Value> {
        match document.result {
            Some(result) => marshal::outcome(result),
            None => Err(RmiError::InvalidDocument { code: "model.reply".into(),
                                                    description: "respuesta sin resultado".into(),
                                                    details: document.sn }),
        }
    }
}

/// Envío sin espera.
#[derive(Clone)]
pub struct Asynchronous {
    transport: Arc<dyn Transport>,
    options: PolicyOptions,
    watchdog: Option<Arc<WatchDog>>,
}

impl Asynchronous {
    /// Crea la política con `options`.
    pub fn new(transport: Arc<dyn Transport>, options: PolicyOptions) -> Self {
        Self { transport, options, watchdog: None }
    }

    /// Vigila las peticiones con respuesta en `watchdog`.
    pub fn with_watchdog(mut self, watchdog: Arc<WatchDog>) -> Self {
        self.watchdog = Some(watchdog);
        self
    }

    /// Envía y devuelve el sn de la petición.
    pub fn send(&self, route: &str, request: Request) -> Result<String> {
        self.send_as(&new_sn(), route, request)
    }

    fn send_as(&self, sn: &str, route: &str, request: Request) -> Result<String> {
        let replyto = self.options.reply.as_deref();
        let document = request.document(sn, replyto, &self.options);
        // se vigila antes de enviar: una respuesta rápida debe encontrar la
        // entrada del journal
        let watched = match (&self.watchdog, replyto) {
            (Some(watchdog), Some(replyto)) => {
                watchdog.track(sn, replyto, self.options.data.clone(), (self.options.timeout, self.options.wait))?;
                Some(watchdog)
            }
            _ => None,
        };
        match self.transport.send(route, self.options.ttl, document) {
            Ok(sn) => Ok(sn),
            Err(e) => {
                if let Some(watchdog) = watched {
                    if let Err(e) = watchdog.complete(sn) {
                        log::error!("watchdog: {} no liberado: {}", sn, e);
                    }
                }
                Err(e.into())
            }
        }
    }
}

/// Envío asíncrono preparado y disparado después; el sn se conoce antes
/// de disparar.
pub struct Trigger {
    sn: String,
    route: String,
    policy: Asynchronous,
    request: Mutex<Option<Request>>,
}

impl Trigger {
    /// Prepara el envío de `request` a `route`.
    pub fn new(policy: Asynchronous, route: &str, request: Request) -> Self {
        Self { sn: new_sn(), route: route.to_string(), policy, request: Mutex::new(Some(request)) }
    }

    /// Número de serie que tendrá la petición.
    pub fn sn(&self) -> &str {
        &self.sn
    }

    /// Envía la petición. Un segundo disparo falla con `TriggerPulled`.
    pub fn trigger(&self) -> Result<String> {
        let request = self.request.lock().unwrap_or_else(|e| e.into_inner()).take();
        match request {
            Some(request) => self.policy.send_as(&self.sn, &self.route, request),
            None => Err(RmiError::TriggerPulled(self.sn.clone())),
        }
    }
}
