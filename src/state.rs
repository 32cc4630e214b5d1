use std::sync::{Arc, RwLock};

use log::{info, warn};

use crate::error::{BridgeError, Result};

// ---------------------------------------------------------------------------
// Interval state
// ---------------------------------------------------------------------------

/// The reporting interval (milliseconds) handed to the controller.
///
/// Written by the bus listener thread, read by the dispatcher. Cloning
/// yields another handle to the same value.
#[derive(Debug, Clone)]
pub struct IntervalState {
    inner: Arc<RwLock<u64>>,
}

impl IntervalState {
    pub fn new(initial_ms: u64) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial_ms)),
        }
    }

    /// Current interval in milliseconds.
    pub fn get(&self) -> u64 {
        *self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set(&self, interval_ms: u64) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = interval_ms;
    }

    /// Apply a payload received on the interval-control topic.
    ///
    /// The payload must be a decimal, non-negative integer (surrounding
    /// whitespace allowed). On error the stored value is left unchanged.
    pub fn apply_update(&self, payload: &[u8]) -> Result<u64> {
        let text = std::str::from_utf8(payload)
            .map_err(|_| BridgeError::Parse("interval payload is not UTF-8".to_string()))?;
        let value = text
            .trim()
            .parse::<u64>()
            .map_err(|_| BridgeError::Parse(format!("invalid interval value '{}'", text.trim())))?;
        self.set(value);
        Ok(value)
    }

    /// Bus handler form of [`apply_update`](Self::apply_update): logs instead
    /// of returning the error.
    pub fn handle_message(&self, payload: &[u8]) -> Option<u64> {
        match self.apply_update(payload) {
            Ok(value) => {
                info!("Interval updated to {value} ms");
                Some(value)
            }
            Err(e) => {
                warn!("Invalid interval value received: {e}");
                None
            }
        }
    }
}

impl IntervalState {
    /// Handler for the interval-control topic. Writing this state is all it
    /// does.
    pub fn subscriber(&self) -> impl Fn(&[u8]) + Send + 'static {
        let state = self.clone();
        move |payload| {
            state.handle_message(payload);
        }
    }
}

impl Default for IntervalState {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_INTERVAL_MS)
    }
}
