// Archivo: clock.rs
// Propósito: fuente de tiempo inyectable. Las decisiones de ventana, TTL y
// watchdog consultan un `Clock` para poder simular el tiempo en pruebas.
use chrono::{DateTime, Utc};

/// Fuente de la hora actual.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reloj del sistema.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Suma una duración estándar a un instante, saturando en duraciones
/// fuera de rango.
pub fn after(at: DateTime<Utc>, duration: std::time::Duration) -> DateTime<Utc> {
    let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX / 2);
    at.checked_add_signed(chrono::Duration::milliseconds(millis)).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
