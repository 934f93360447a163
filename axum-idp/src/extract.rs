use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};

use crate::{AuthSession, AuthUser, IdentityProvider, SessionContext};

#[async_trait]
impl<S, Provider> FromRequestParts<S> for AuthSession<Provider>
where
    S: Send + Sync,
    Provider: IdentityProvider + Send + Sync + 'static,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthSession<_>>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Can't extract auth session. Is `AuthManagerLayer` enabled?",
        ))
    }
}

#[async_trait]
impl<S, User> FromRequestParts<S> for SessionContext<User>
where
    S: Send + Sync,
    User: AuthUser + 'static,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<SessionContext<_>>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Can't extract session context. Is `AuthManagerLayer` enabled?",
        ))
    }
}
