use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::guard::Access;

/// This is intended for internal use only and subject to change in the future
/// without warning!
#[doc(hidden)]
pub async fn enforce(access: Access, req: Request, next: Next) -> Response {
    match access {
        Access::Allow => next.run(req).await,
        Access::Redirect(location) => {
            tracing::debug!(%location, uri = %req.uri(), "guard redirecting request");
            Redirect::temporary(&location).into_response()
        }
    }
}

/// Protected-route middleware.
///
/// Requires that a user is signed in. Anonymous requests are redirected to
/// the configured login path, or to `login_url` when given.
#[macro_export]
macro_rules! login_required {
    ($provider_type:ty) => {{
        $crate::axum::middleware::from_fn(
            |auth_session: $crate::AuthSession<$provider_type>,
             req: $crate::axum::extract::Request,
             next: $crate::axum::middleware::Next| async move {
                let access = $crate::guard::require_user(
                    auth_session.session(),
                    &auth_session.config().login_path,
                );
                $crate::enforce(access, req, next).await
            },
        )
    }};

    ($provider_type:ty, login_url = $login_url:expr) => {{
        $crate::axum::middleware::from_fn(
            |auth_session: $crate::AuthSession<$provider_type>,
             req: $crate::axum::extract::Request,
             next: $crate::axum::middleware::Next| async move {
                let access = $crate::guard::require_user(auth_session.session(), $login_url);
                $crate::enforce(access, req, next).await
            },
        )
    }};
}

/// Guest-only middleware, for pages such as login and sign-up.
///
/// Requires that no user is signed in. Signed-in requests are redirected to
/// the configured home path, or to `home_url` when given.
#[macro_export]
macro_rules! guest_only {
    ($provider_type:ty) => {{
        $crate::axum::middleware::from_fn(
            |auth_session: $crate::AuthSession<$provider_type>,
             req: $crate::axum::extract::Request,
             next: $crate::axum::middleware::Next| async move {
                let access = $crate::guard::require_guest(
                    auth_session.session(),
                    &auth_session.config().home_path,
                );
                $crate::enforce(access, req, next).await
            },
        )
    }};

    ($provider_type:ty, home_url = $home_url:expr) => {{
        $crate::axum::middleware::from_fn(
            |auth_session: $crate::AuthSession<$provider_type>,
             req: $crate::axum::extract::Request,
             next: $crate::axum::middleware::Next| async move {
                let access = $crate::guard::require_guest(auth_session.session(), $home_url);
                $crate::enforce(access, req, next).await
            },
        )
    }};
}
