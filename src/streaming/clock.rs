//! Session clock shared by the audio and video tracks

use tracing::debug;

/// Base timestamp for a session
///
/// The first raw timestamp observed by either track becomes time zero; every
/// later timestamp is expressed in milliseconds relative to it.
#[derive(Debug, Clone, Default)]
pub struct SessionClock {
    base: Option<i64>,
}

impl SessionClock {
    pub fn new() -> Self {
        SessionClock { base: None }
    }

    /// Raw base timestamp in microseconds, once set
    pub fn base(&self) -> Option<i64> {
        self.base
    }

    pub fn is_started(&self) -> bool {
        self.base.is_some()
    }

    /// Convert a raw microsecond timestamp to session milliseconds
    ///
    /// Sets the base on first use. Timestamps before the base map to 0.
    pub fn relative_ms(&mut self, raw: i64) -> f64 {
        let base = match self.base {
            Some(base) => base,
            None => {
                debug!("Session clock base set to {}us", raw);
                self.base = Some(raw);
                raw
            }
        };
        (raw.saturating_sub(base) as f64 / 1000.0).max(0.0)
    }

    /// Forget the base; the next observed timestamp starts a new session
    pub fn reset(&mut self) {
        self.base = None;
    }
}
