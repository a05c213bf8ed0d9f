//! Trait-based callback for the unauthenticated entry point.
//!
//! When a session becomes unusable (refresh rejected, refresh token
//! missing, explicit logout) the client hands control to a [`LoginRedirect`].
//! The crate never navigates anywhere itself; an application wires in
//! whatever "go back to the login screen" means for it.
//!
//! # Example: Implementing `LoginRedirect`
//!
//! ```no_run
//! use bearer_session::callbacks::LoginRedirect;
//!
//! struct PrintLoginHint;
//!
//! impl LoginRedirect for PrintLoginHint {
//!     fn redirect_to_login(&self) {
//!         eprintln!("Session expired. Run `session-cli login` again.");
//!     }
//! }
//! ```
//!
//! # Example: Using a closure
//!
//! ```
//! use bearer_session::callbacks::{FnLoginRedirect, LoginRedirect};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let redirects = Arc::new(AtomicUsize::new(0));
//! let counter = redirects.clone();
//! let redirect = FnLoginRedirect::new(move || {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! redirect.redirect_to_login();
//! assert_eq!(redirects.load(Ordering::SeqCst), 1);
//! ```

use std::sync::Arc;

/// Navigation collaborator invoked when the session is invalidated.
///
/// Called synchronously with no parameters, once per invalidation.
pub trait LoginRedirect: Send + Sync {
    /// Send the user to the unauthenticated entry point
    fn redirect_to_login(&self);
}

// Blanket implementation for boxed trait objects
impl LoginRedirect for Box<dyn LoginRedirect> {
    fn redirect_to_login(&self) {
        (**self).redirect_to_login();
    }
}

impl<T: LoginRedirect + ?Sized> LoginRedirect for Arc<T> {
    fn redirect_to_login(&self) {
        (**self).redirect_to_login();
    }
}

/// Type alias for a shared redirect callback.
pub type SharedLoginRedirect = Arc<dyn LoginRedirect>;

/// Redirect that only records the event in the log.
///
/// Default for clients that have no navigation surface.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyRedirect;

impl LoginRedirect for LogOnlyRedirect {
    fn redirect_to_login(&self) {
        tracing::info!("Session invalidated; login required");
    }
}

/// Wrapper to convert a closure into a `LoginRedirect`.
pub struct FnLoginRedirect<F>
where
    F: Fn() + Send + Sync,
{
    func: F,
}

impl<F> FnLoginRedirect<F>
where
    F: Fn() + Send + Sync,
{
    /// Create a new function-based redirect callback.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> LoginRedirect for FnLoginRedirect<F>
where
    F: Fn() + Send + Sync,
{
    fn redirect_to_login(&self) {
        (self.func)();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRedirect {
        count: AtomicUsize,
    }

    impl LoginRedirect for CountingRedirect {
        fn redirect_to_login(&self) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_arc_wrapped_redirect() {
        let inner = Arc::new(CountingRedirect {
            count: AtomicUsize::new(0),
        });
        let shared: SharedLoginRedirect = inner.clone();

        shared.redirect_to_login();
        shared.redirect_to_login();
        assert_eq!(inner.count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_boxed_redirect() {
        let boxed: Box<dyn LoginRedirect> = Box::new(LogOnlyRedirect);
        boxed.redirect_to_login();
    }

    #[test]
    fn test_fn_redirect() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        let redirect = FnLoginRedirect::new(move || {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        redirect.redirect_to_login();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
