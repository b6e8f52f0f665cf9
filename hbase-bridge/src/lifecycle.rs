//! Once-until-success holder for the process's runtime handle.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;

/// Holds at most one runtime.
///
/// Initialisation runs under the slot lock, so concurrent first callers
/// construct exactly one runtime. A failed initialisation leaves the slot
/// empty and the next caller starts over.
pub struct RuntimeSlot<R> {
    inner: Mutex<Option<Arc<R>>>,
}

impl<R> Default for RuntimeSlot<R> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }
}

impl<R> RuntimeSlot<R> {
    pub fn get(&self) -> Option<Arc<R>> {
        self.inner.lock().clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.lock().is_some()
    }

    pub fn get_or_try_init<F>(&self, init: F) -> Result<Arc<R>>
    where
        F: FnOnce() -> Result<R>,
    {
        let mut guard = self.inner.lock();
        if let Some(runtime) = guard.as_ref() {
            return Ok(Arc::clone(runtime));
        }
        let runtime = Arc::new(init()?);
        *guard = Some(Arc::clone(&runtime));
        Ok(runtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_init_runs_once() {
        let slot = RuntimeSlot::default();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let value = slot
                .get_or_try_init(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .unwrap();
            assert_eq!(*value, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_leaves_slot_empty() {
        let slot: RuntimeSlot<u32> = RuntimeSlot::default();
        let err = slot
            .get_or_try_init(|| Err(BridgeError::Launch("boom".into())))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Launch(_)));
        assert!(!slot.is_initialized());

        let value = slot.get_or_try_init(|| Ok(1)).unwrap();
        assert_eq!(*value, 1);
        assert!(slot.get().is_some());
    }

    #[test]
    fn test_concurrent_init_constructs_once() {
        let slot = Arc::new(RuntimeSlot::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let slot = Arc::clone(&slot);
                let calls = Arc::clone(&calls);
                std::thread::spawn(move || {
                    slot.get_or_try_init(|| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(20));
                        Ok(String::from("jvm"))
                    })
                    .unwrap()
                })
            })
            .collect();
        let handles: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
