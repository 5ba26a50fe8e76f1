//! Mapped diagnostic context: ambient per-thread key/value pairs
//!
//! Values put into the MDC are captured by every log call made on the same
//! thread until they are removed. Use [`Mdc::scoped`] to have a value removed
//! automatically when the returned guard is dropped.

use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;

thread_local! {
    static MDC: RefCell<HashMap<String, String>> = RefCell::new(HashMap::new());
}

/// Thread-local diagnostic context.
pub struct Mdc;

impl Mdc {
    pub fn put(key: impl Into<String>, value: impl Into<String>) {
        MDC.with(|mdc| {
            mdc.borrow_mut().insert(key.into(), value.into());
        });
    }

    pub fn get(key: &str) -> Option<String> {
        MDC.with(|mdc| mdc.borrow().get(key).cloned())
    }

    pub fn remove(key: &str) -> Option<String> {
        MDC.with(|mdc| mdc.borrow_mut().remove(key))
    }

    pub fn clear() {
        MDC.with(|mdc| mdc.borrow_mut().clear());
    }

    pub fn is_empty() -> bool {
        MDC.with(|mdc| mdc.borrow().is_empty())
    }

    /// Copy of the calling thread's context.
    pub fn snapshot() -> HashMap<String, String> {
        MDC.with(|mdc| mdc.borrow().clone())
    }

    /// Put a value that is removed (or restored) when the guard drops.
    ///
    /// # Example
    ///
    /// ```
    /// use neurallog::Mdc;
    ///
    /// {
    ///     let _guard = Mdc::scoped("request_id", "abc-123");
    ///     assert_eq!(Mdc::get("request_id").as_deref(), Some("abc-123"));
    /// }
    /// assert!(Mdc::get("request_id").is_none());
    /// ```
    #[must_use = "the value is removed as soon as the guard is dropped"]
    pub fn scoped(key: impl Into<String>, value: impl Into<String>) -> MdcGuard {
        let key = key.into();
        let previous = MDC.with(|mdc| mdc.borrow_mut().insert(key.clone(), value.into()));
        MdcGuard {
            key,
            previous,
            _not_send: PhantomData,
        }
    }
}

/// RAII guard returned by [`Mdc::scoped`].
///
/// Bound to the thread that created it, since the context it edits is
/// thread-local.
pub struct MdcGuard {
    key: String,
    previous: Option<String>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for MdcGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        MDC.with(|mdc| {
            let mut mdc = mdc.borrow_mut();
            match previous {
                Some(value) => mdc.insert(self.key.clone(), value),
                None => mdc.remove(&self.key),
            };
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_remove() {
        Mdc::clear();
        Mdc::put("user", "alice");
        assert_eq!(Mdc::get("user").as_deref(), Some("alice"));
        assert_eq!(Mdc::remove("user").as_deref(), Some("alice"));
        assert!(Mdc::is_empty());
    }

    #[test]
    fn test_scoped_restores_previous_value() {
        Mdc::clear();
        Mdc::put("tenant", "outer");
        {
            let _guard = Mdc::scoped("tenant", "inner");
            assert_eq!(Mdc::get("tenant").as_deref(), Some("inner"));
        }
        assert_eq!(Mdc::get("tenant").as_deref(), Some("outer"));
        Mdc::clear();
    }

    #[test]
    fn test_context_is_per_thread() {
        Mdc::clear();
        Mdc::put("request_id", "main");
        let other = std::thread::spawn(Mdc::snapshot).join().unwrap();
        assert!(other.is_empty());
        assert_eq!(Mdc::snapshot().len(), 1);
        Mdc::clear();
    }
}
