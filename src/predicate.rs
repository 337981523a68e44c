//! Failure classification shared by retry and fallback policies.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

type Classifier = dyn Fn(&(dyn Error + 'static)) -> bool + Send + Sync;

/// Decides whether a failure is eligible for a retry or a fallback.
///
/// Predicates work on `&dyn Error` so that one named predicate can classify
/// failures from any guarded call. Cloning is cheap.
///
/// # Examples
///
/// ```rust
/// use resilient::FailurePredicate;
/// use std::io;
///
/// let io_only = FailurePredicate::caused_by::<io::Error>();
///
/// let err = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
/// assert!(io_only.test(&err));
///
/// let other: Box<dyn std::error::Error> = "parse failure".into();
/// assert!(!io_only.test(other.as_ref()));
/// ```
#[derive(Clone)]
pub struct FailurePredicate {
    classify: Arc<Classifier>,
}

impl FailurePredicate {
    /// Build a predicate from a closure.
    pub fn new<F>(classify: F) -> Self
    where
        F: Fn(&(dyn Error + 'static)) -> bool + Send + Sync + 'static,
    {
        Self {
            classify: Arc::new(classify),
        }
    }

    /// Accept every failure.
    pub fn always() -> Self {
        Self::new(|_| true)
    }

    /// Accept failures whose error, or any error in its `source()` chain, is a `T`.
    pub fn caused_by<T: Error + 'static>() -> Self {
        Self::new(|err| {
            let mut current: Option<&(dyn Error + 'static)> = Some(err);
            while let Some(e) = current {
                if e.is::<T>() {
                    return true;
                }
                current = e.source();
            }
            false
        })
    }

    /// Classify a failure.
    pub fn test(&self, err: &(dyn Error + 'static)) -> bool {
        (self.classify)(err)
    }
}

impl Default for FailurePredicate {
    fn default() -> Self {
        Self::always()
    }
}

impl fmt::Debug for FailurePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailurePredicate").finish_non_exhaustive()
    }
}
