use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::backend::Backend;

const DEFAULT_TTL: Duration = Duration::from_secs(30);

#[derive(Clone, Copy)]
struct Verdict {
    checked_at: Instant,
    online: bool,
}

/// Time-boxed reachability cache. A verdict (online or not) is reused for the
/// whole TTL window, so a dead endpoint is only re-pinged once per window.
pub struct ConnectivityProbe {
    ttl: Duration,
    cached: Mutex<Option<Verdict>>,
}

impl Default for ConnectivityProbe {
    fn default() -> Self {
        ConnectivityProbe::new(DEFAULT_TTL)
    }
}

impl ConnectivityProbe {
    pub fn new(ttl: Duration) -> Self {
        ConnectivityProbe {
            ttl,
            cached: Mutex::new(None),
        }
    }

    /// Cached verdict if still within the TTL window.
    pub fn last_verdict(&self) -> Option<bool> {
        let guard = self.cached.lock().ok()?;
        let verdict = (*guard)?;
        (verdict.checked_at.elapsed() < self.ttl).then_some(verdict.online)
    }

    pub async fn check(&self, backend: &dyn Backend) -> bool {
        if let Some(online) = self.last_verdict() {
            return online;
        }
        let online = match backend.ping().await {
            Ok(()) => true,
            Err(err) => {
                debug!(
                    target: "glowdesk",
                    event = "connectivity_probe_failed",
                    kind = ?err.kind,
                    error = %err.message
                );
                false
            }
        };
        if let Ok(mut guard) = self.cached.lock() {
            *guard = Some(Verdict {
                checked_at: Instant::now(),
                online,
            });
        }
        debug!(target: "glowdesk", event = "connectivity_probe", online);
        online
    }

    /// Records a verdict observed as a side effect of a real query, so a
    /// connectivity failure seen by one operation is sticky for the rest of
    /// the window without an extra ping.
    pub fn note(&self, online: bool) {
        if let Ok(mut guard) = self.cached.lock() {
            *guard = Some(Verdict {
                checked_at: Instant::now(),
                online,
            });
        }
    }

    pub fn invalidate(&self) {
        if let Ok(mut guard) = self.cached.lock() {
            *guard = None;
        }
    }
}
