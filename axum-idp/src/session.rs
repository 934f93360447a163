use std::sync::Arc;

use tokio::sync::watch;

/// A read-only, observable reference to a client's current user.
///
/// The value is either `Some(user)` or `None`; absence is an ordinary state,
/// not an error. Reads always return the most recent value published for the
/// client, so holders never need to refresh it themselves.
///
/// Contexts are cheap to clone and are handed to the facade, the guards and
/// request handlers explicitly (see [`AuthManagerLayer`](crate::AuthManagerLayer),
/// which inserts one into every request's extensions).
#[derive(Debug, Clone)]
pub struct SessionContext<User> {
    rx: watch::Receiver<Option<User>>,
}

impl<User: Clone> SessionContext<User> {
    /// A context that never has a user.
    pub fn anonymous() -> Self {
        let (_, rx) = watch::channel(None);
        Self { rx }
    }

    /// Returns the current user, if any.
    pub fn user(&self) -> Option<User> {
        self.rx.borrow().clone()
    }

    /// Returns `true` when a user is present.
    pub fn is_authenticated(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Waits until a new value is published.
    ///
    /// Returns `false` once the publisher has gone away and no further changes
    /// can happen; the last value remains readable.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// The writing half of a [`SessionContext`].
///
/// [`AuthSession`](crate::AuthSession) owns one per request, seeded from the
/// client's session record, and publishes whenever an operation changes the
/// signed-in user: after sign-in, sign-up (when a session is issued), sign-out
/// and user updates.
#[derive(Debug, Clone)]
pub struct SessionPublisher<User> {
    tx: Arc<watch::Sender<Option<User>>>,
}

impl<User: Clone> Default for SessionPublisher<User> {
    fn default() -> Self {
        Self::new()
    }
}

impl<User: Clone> SessionPublisher<User> {
    /// Creates a publisher with no user.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Replaces the current value and notifies every context.
    pub fn publish(&self, user: Option<User>) {
        self.tx.send_replace(user);
    }

    /// Returns the current value.
    pub fn current(&self) -> Option<User> {
        self.tx.borrow().clone()
    }

    /// Returns a new context observing this publisher.
    pub fn context(&self) -> SessionContext<User> {
        SessionContext {
            rx: self.tx.subscribe(),
        }
    }
}
