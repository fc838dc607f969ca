// Archivo: window.rs
// Propósito: ventana de tiempo [begin, end] en la que una petición puede
// ejecutarse. Una ventana ausente equivale a "siempre vigente".
use crate::errors::{MessagingError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ventana de ejecución. Ambos extremos son opcionales e inclusivos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl Window {
    /// Construye una ventana validando que `begin <= end`.
    pub fn new(begin: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<Self> {
        let window = Window { begin, end };
        if !window.is_valid() {
            return Err(MessagingError::InvalidWindow(format!("begin={:?} posterior a end={:?}", begin, end)));
        }
        Ok(window)
    }

    /// Ventana que comienza en `begin` y dura `duration`.
    pub fn starting(begin: DateTime<Utc>, duration: Duration) -> Result<Self> {
        let span = chrono::Duration::from_std(duration).map_err(|e| MessagingError::InvalidWindow(e.to_string()))?;
        Window::new(Some(begin), Some(begin + span))
    }

    /// Ventana sin límites.
    pub fn always() -> Self {
        Window::default()
    }

    /// La ventana de un documento; sin ventana se considera siempre vigente.
    pub fn of(window: Option<&Window>) -> Self {
        window.copied().unwrap_or_default()
    }

    /// Indica si `begin <= end` cuando ambos existen.
    pub fn is_valid(&self) -> bool {
        match (self.begin, self.end) {
            (Some(b), Some(e)) => b <= e,
            _ => true,
        }
    }

    /// `now` es anterior al inicio de la ventana.
    pub fn future_at(&self, now: DateTime<Utc>) -> bool {
        self.begin.is_some_and(|b| now < b)
    }

    /// `now` es posterior al final de la ventana.
    pub fn past_at(&self, now: DateTime<Utc>) -> bool {
        self.end.is_some_and(|e| now > e)
    }

    /// Ni futura ni pasada en `now`.
    pub fn current_at(&self, now: DateTime<Utc>) -> bool {
        !self.future_at(now) && !self.past_at(now)
    }

    /// Como `future_at` con la hora del sistema.
    pub fn future(&self) -> bool {
        self.future_at(Utc::now())
    }

    /// Como `past_at` con la hora del sistema.
    pub fn past(&self) -> bool {
        self.past_at(Utc::now())
    }
}
