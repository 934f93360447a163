//! Route access decisions.
//!
//! Both guards are pure functions of the session context at the time of the
//! request. They never call the provider; they trust the value it last
//! published.

use crate::SessionContext;

/// The outcome of a guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Let the request through unchanged.
    Allow,

    /// Abort the request and redirect to the given location.
    Redirect(String),
}

/// Allows signed-in users; sends anonymous users to `login_path`.
pub fn require_user<User: Clone>(session: &SessionContext<User>, login_path: &str) -> Access {
    if session.is_authenticated() {
        Access::Allow
    } else {
        Access::Redirect(login_path.to_owned())
    }
}

/// Allows anonymous users; sends signed-in users to `home_path`.
///
/// Meant for pages such as login and sign-up.
pub fn require_guest<User: Clone>(session: &SessionContext<User>, home_path: &str) -> Access {
    if session.is_authenticated() {
        Access::Redirect(home_path.to_owned())
    } else {
        Access::Allow
    }
}
