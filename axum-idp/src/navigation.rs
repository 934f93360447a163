use std::{
    fmt::Debug,
    sync::{Arc, Mutex, PoisonError},
};

/// The "redirect to path" primitive.
///
/// Facade operations use it for their post-success side effects: sign-out
/// sends the user to the login view and OAuth sign-in sends the browser to the
/// provider's consent page.
pub trait Navigator: Debug + Send + Sync {
    /// Requests navigation to `location`, a path or absolute URL.
    fn navigate_to(&self, location: &str);
}

/// A per-request navigation slot.
///
/// [`AuthManagerLayer`](crate::AuthManagerLayer) installs one for each
/// request. When a handler leaves a location in it, the handler's response is
/// replaced with a `303 See Other` redirect to that location. The last
/// requested location wins.
#[derive(Debug, Clone, Default)]
pub struct Navigation {
    location: Arc<Mutex<Option<String>>>,
}

impl Navigation {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the requested location.
    pub fn take(&self) -> Option<String> {
        self.location
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Navigator for Navigation {
    fn navigate_to(&self, location: &str) {
        *self
            .location
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(location.to_owned());
    }
}
