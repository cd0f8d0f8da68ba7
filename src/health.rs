use log::error;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

type PanicListener = Box<dyn Fn(&str) + Send + Sync>;

/// Shared process-health handle for the durability layer.
///
/// A failed durable write leaves the on-disk state in a shape that the next
/// recovery cannot tell apart from a valid short log, so the writer marks the
/// whole process unhealthy instead of returning a retryable error. The owning
/// process is expected to observe the panic (via [`Health::on_panic`] or
/// [`Health::ensure_healthy`]) and exit.
#[derive(Clone, Default)]
pub struct Health {
    inner: Arc<HealthInner>,
}

#[derive(Default)]
struct HealthInner {
    panicked: AtomicBool,
    cause: Mutex<Option<String>>,
    listener: Mutex<Option<PanicListener>>,
}

impl Health {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the listener invoked on the first panic. Later panics only
    /// update the stored cause.
    pub fn on_panic(&self, listener: impl Fn(&str) + Send + Sync + 'static) {
        *self.inner.listener.lock() = Some(Box::new(listener));
    }

    pub fn panic(&self, cause: &dyn std::fmt::Display) {
        let cause = cause.to_string();
        error!("event=health_panic cause={cause}");
        let first = !self.inner.panicked.swap(true, Ordering::SeqCst);
        {
            let mut stored = self.inner.cause.lock();
            if stored.is_none() {
                *stored = Some(cause.clone());
            }
        }
        if first {
            if let Some(listener) = self.inner.listener.lock().as_ref() {
                listener(&cause);
            }
        }
    }

    pub fn is_healthy(&self) -> bool {
        !self.inner.panicked.load(Ordering::SeqCst)
    }

    pub fn cause(&self) -> Option<String> {
        self.inner.cause.lock().clone()
    }

    pub fn ensure_healthy(&self) -> Result<(), HealthError> {
        if self.is_healthy() {
            Ok(())
        } else {
            Err(HealthError::Panicked {
                cause: self.cause().unwrap_or_default(),
            })
        }
    }
}

impl std::fmt::Debug for Health {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Health")
            .field("healthy", &self.is_healthy())
            .field("cause", &self.cause())
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("storage health has panicked: {cause}")]
    Panicked { cause: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn panic_marks_unhealthy_and_fires_listener_once() {
        let health = Health::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let observed = fired.clone();
        health.on_panic(move |_| {
            observed.fetch_add(1, Ordering::SeqCst);
        });

        assert!(health.is_healthy());
        health.panic(&"disk gone");
        health.panic(&"disk still gone");

        assert!(!health.is_healthy());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(health.cause().as_deref(), Some("disk gone"));
        assert!(health.ensure_healthy().is_err());
    }

    #[test]
    fn clones_share_state() {
        let health = Health::new();
        let other = health.clone();
        other.panic(&"torn write");
        assert!(!health.is_healthy());
    }
}
