use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::http::{self, header, HeaderMap, HeaderValue, Request, Response};
use tower_cookies::CookieManager;
use tower_layer::Layer;
use tower_service::Service;
use tower_sessions::{
    service::{CookieController, PlaintextCookie},
    Session, SessionManager, SessionManagerLayer, SessionStore,
};
use tracing::Instrument;

use crate::{AuthConfig, AuthSession, AuthUser, IdentityProvider, Navigation};

const DEFAULT_DATA_KEY: &str = "axum-idp.data";

/// Picks the origin callback URLs are built from.
///
/// The origin a request names through its `Origin` header (or, lacking one,
/// `http://` plus its `Host` header) is only used when it is listed in
/// [`AuthConfig::allowed_origins`]. Otherwise the configured site URL is used,
/// and without one callbacks stay relative.
fn request_origin(headers: &HeaderMap, config: &AuthConfig) -> String {
    let requested = headers
        .get(header::ORIGIN)
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned)
        .or_else(|| {
            headers
                .get(header::HOST)
                .and_then(|h| h.to_str().ok())
                .map(|host| format!("http://{host}"))
        });

    if let Some(requested) = requested {
        if config.allowed_origins.contains(&requested) {
            return requested;
        }

        if config.site_url.as_ref() != Some(&requested) {
            tracing::debug!(origin = %requested, "ignoring origin that is not allowed");
        }
    }

    config.site_url.clone().unwrap_or_default()
}

fn internal_error<ResBody: Default>() -> Response<ResBody> {
    let mut res = Response::default();
    *res.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
    res
}

fn see_other<ResBody: Default>(location: &str) -> Response<ResBody> {
    let mut res = Response::default();

    match HeaderValue::try_from(location) {
        Ok(location) => {
            *res.status_mut() = http::StatusCode::SEE_OTHER;
            res.headers_mut().insert(header::LOCATION, location);
        }

        Err(err) => {
            tracing::error!(err = %err, "navigation location is not a valid header value");
            *res.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
        }
    }

    res
}

/// A middleware that provides [`AuthSession`] and
/// [`SessionContext`](crate::SessionContext) as request extensions.
///
/// Each client's state is loaded from its `tower-sessions` record, which must
/// be provided by an outer [`SessionManager`]; [`AuthManagerLayer`] installs
/// one.
///
/// Navigation requested through the session while the request is handled
/// replaces the inner response with a `303 See Other` redirect.
#[derive(Debug, Clone)]
pub struct AuthManager<S, Provider: IdentityProvider> {
    inner: S,
    provider: Provider,
    config: Arc<AuthConfig>,
    data_key: &'static str,
}

impl<S, Provider: IdentityProvider> AuthManager<S, Provider> {
    /// Create a new [`AuthManager`] with the provided identity provider.
    pub fn new(
        inner: S,
        provider: Provider,
        config: Arc<AuthConfig>,
        data_key: &'static str,
    ) -> Self {
        Self {
            inner,
            provider,
            config,
            data_key,
        }
    }
}

impl<ReqBody, ResBody, S, Provider> Service<Request<ReqBody>> for AuthManager<S, Provider>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Default + Send,
    Provider: IdentityProvider + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    #[inline]
    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let span = tracing::info_span!("call", user.id = tracing::field::Empty);

        let provider = self.provider.clone();
        let config = self.config.clone();
        let data_key = self.data_key;
        let origin = request_origin(req.headers(), &config);

        // Because the inner service can panic until ready, we need to ensure we only
        // use the ready service.
        //
        // See: https://docs.rs/tower/latest/tower/trait.Service.html#be-careful-when-cloning-inner-services
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(
            async move {
                let Some(session) = req.extensions().get::<Session>().cloned() else {
                    tracing::error!("session not found in request extensions");
                    return Ok(internal_error());
                };

                let navigation = Navigation::new();
                let auth_session = match AuthSession::from_session(
                    session,
                    provider,
                    Arc::new(navigation.clone()),
                    origin,
                    config,
                    data_key,
                )
                .await
                {
                    Ok(auth_session) => auth_session,
                    Err(err) => {
                        tracing::error!(err = %err, "could not load auth session from session");
                        return Ok(internal_error());
                    }
                };

                if let Some(ref user) = auth_session.user() {
                    tracing::Span::current().record("user.id", user.id().to_string());
                }

                req.extensions_mut().insert(auth_session.session().clone());
                req.extensions_mut().insert(auth_session);

                let res = inner.call(req).await?;

                match navigation.take() {
                    Some(location) => {
                        tracing::debug!(%location, "navigating");
                        Ok(see_other(&location))
                    }
                    None => Ok(res),
                }
            }
            .instrument(span),
        )
    }
}

/// A layer for providing [`AuthSession`] as a request extension.
#[derive(Debug, Clone)]
pub struct AuthManagerLayer<
    Provider: IdentityProvider,
    Sessions: SessionStore,
    C: CookieController = PlaintextCookie,
> {
    provider: Provider,
    config: Arc<AuthConfig>,
    data_key: &'static str,
    session_manager_layer: SessionManagerLayer<Sessions, C>,
}

impl<Provider: IdentityProvider, Sessions: SessionStore, C: CookieController>
    AuthManagerLayer<Provider, Sessions, C>
{
    pub(crate) fn new(
        provider: Provider,
        config: AuthConfig,
        data_key: &'static str,
        session_manager_layer: SessionManagerLayer<Sessions, C>,
    ) -> Self {
        Self {
            provider,
            config: Arc::new(config),
            data_key,
            session_manager_layer,
        }
    }
}

impl<S, Provider: IdentityProvider, Sessions: SessionStore, C: CookieController> Layer<S>
    for AuthManagerLayer<Provider, Sessions, C>
{
    type Service = CookieManager<SessionManager<AuthManager<S, Provider>, Sessions, C>>;

    fn layer(&self, inner: S) -> Self::Service {
        let auth_manager = AuthManager::new(
            inner,
            self.provider.clone(),
            self.config.clone(),
            self.data_key,
        );

        self.session_manager_layer.layer(auth_manager)
    }
}

/// Builder for the [`AuthManagerLayer`].
#[derive(Debug, Clone)]
pub struct AuthManagerLayerBuilder<
    Provider: IdentityProvider,
    Sessions: SessionStore,
    C: CookieController = PlaintextCookie,
> {
    provider: Provider,
    session_manager_layer: SessionManagerLayer<Sessions, C>,
    config: Option<AuthConfig>,
    data_key: Option<&'static str>,
}

impl<Provider: IdentityProvider, Sessions: SessionStore, C: CookieController>
    AuthManagerLayerBuilder<Provider, Sessions, C>
{
    /// Create a new [`AuthManagerLayerBuilder`] with the provided identity
    /// provider and the session layer client state is kept in.
    pub fn new(
        provider: Provider,
        session_manager_layer: SessionManagerLayer<Sessions, C>,
    ) -> Self {
        Self {
            provider,
            session_manager_layer,
            config: None,
            data_key: None,
        }
    }

    /// Configure paths, origins and OAuth settings. If not configured,
    /// [`AuthConfig::default`] is used.
    pub fn with_config(
        mut self,
        config: AuthConfig,
    ) -> AuthManagerLayerBuilder<Provider, Sessions, C> {
        self.config = Some(config);
        self
    }

    /// Configure the key client state is stored under in the session. If not
    /// configured it will default to "axum-idp.data".
    pub fn with_data_key(
        mut self,
        data_key: &'static str,
    ) -> AuthManagerLayerBuilder<Provider, Sessions, C> {
        self.data_key = Some(data_key);
        self
    }

    /// Build the [`AuthManagerLayer`].
    pub fn build(self) -> AuthManagerLayer<Provider, Sessions, C> {
        AuthManagerLayer::new(
            self.provider,
            self.config.unwrap_or_default(),
            self.data_key.unwrap_or(DEFAULT_DATA_KEY),
            self.session_manager_layer,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_defaults_to_site_url() {
        let config = AuthConfig::default().with_site_url("https://app.example.com");

        let mut headers = HeaderMap::new();
        assert_eq!(request_origin(&headers, &config), "https://app.example.com");

        headers.insert(header::ORIGIN, HeaderValue::from_static("https://evil.test"));
        assert_eq!(request_origin(&headers, &config), "https://app.example.com");

        headers.insert(header::ORIGIN, HeaderValue::from_static("https://app.example.com"));
        assert_eq!(request_origin(&headers, &config), "https://app.example.com");
    }

    #[test]
    fn test_origin_headers_ignored_without_allow_list() {
        let config = AuthConfig::default();

        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("evil.test"));
        assert_eq!(request_origin(&headers, &config), "");

        headers.insert(header::ORIGIN, HeaderValue::from_static("https://evil.test"));
        assert_eq!(request_origin(&headers, &config), "");

        assert_eq!(request_origin(&HeaderMap::new(), &config), "");
    }

    #[test]
    fn test_origin_from_allowed_headers() {
        let config = AuthConfig::default()
            .with_site_url("https://app.example.com")
            .with_allowed_origin("https://staging.example.com")
            .with_allowed_origin("http://localhost:3000");

        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("localhost:3000"));
        assert_eq!(request_origin(&headers, &config), "http://localhost:3000");

        headers.insert(
            header::ORIGIN,
            HeaderValue::from_static("https://staging.example.com"),
        );
        assert_eq!(
            request_origin(&headers, &config),
            "https://staging.example.com"
        );

        headers.insert(header::ORIGIN, HeaderValue::from_static("https://evil.test"));
        assert_eq!(request_origin(&headers, &config), "https://app.example.com");
    }

    #[test]
    fn test_see_other() {
        let res: Response<String> = see_other("/login");
        assert_eq!(res.status(), http::StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/login");

        let res: Response<String> = see_other("/bad\nlocation");
        assert_eq!(res.status(), http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
