use std::{fmt, future::Future, sync::Arc};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{
    AuthConfig, AuthData, AuthError, Credentials, IdentityProvider, Navigator, SessionContext,
    SessionPublisher, SignUpCredentials, TokenSession, UserAttributes,
};

/// Awaits a provider operation, logging a failure under `label` before handing
/// the very same error back.
async fn report<T, F>(label: &'static str, op: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, AuthError>>,
{
    op.await.inspect_err(|err| {
        tracing::error!(status = ?err.status, "Error {label}: {err}");
    })
}

fn ensure_present(field: &str, value: &str) -> Result<(), AuthError> {
    if value.is_empty() {
        return Err(AuthError::required(field));
    }

    Ok(())
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct Data<User> {
    user: Option<User>,
    tokens: Option<TokenSession>,
}

impl<User> Default for Data<User> {
    fn default() -> Self {
        Self {
            user: None,
            tokens: None,
        }
    }
}

/// The auth operations available to a request.
///
/// Every operation is a single call into the [`IdentityProvider`]. Failures
/// are logged and returned unchanged; side effects such as the post sign-out
/// navigation only run after the provider call succeeded.
///
/// The signed-in user and the tokens issued for it belong to the requesting
/// client: they are kept in its `tower-sessions` record, so one visitor
/// signing in or out never affects another.
///
/// Within an axum application the session is installed by
/// [`AuthManagerLayer`](crate::AuthManagerLayer) and extracted in handlers:
///
/// ```rust,no_run
/// use axum::http::StatusCode;
/// use axum_idp::{memory::MemoryProvider, AuthSession};
///
/// async fn logout(auth_session: AuthSession<MemoryProvider>) -> StatusCode {
///     match auth_session.sign_out().await {
///         // The layer turns the navigation into a redirect to the login path.
///         Ok(()) => StatusCode::OK,
///         Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
///     }
/// }
/// ```
#[derive(Clone)]
pub struct AuthSession<Provider: IdentityProvider> {
    /// The identity provider calls are delegated to.
    pub provider: Provider,

    publisher: SessionPublisher<Provider::User>,
    context: SessionContext<Provider::User>,
    session: Session,
    data_key: &'static str,
    navigator: Arc<dyn Navigator>,
    origin: String,
    config: Arc<AuthConfig>,
}

impl<Provider: IdentityProvider> fmt::Debug for AuthSession<Provider> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("context", &self.context)
            .field("session", &self.session)
            .field("navigator", &self.navigator)
            .field("origin", &self.origin)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<Provider: IdentityProvider> AuthSession<Provider> {
    /// Loads the client's state from its session record.
    ///
    /// `origin` is the scheme and authority callback URLs are built from; it
    /// is used verbatim.
    pub(crate) async fn from_session(
        session: Session,
        provider: Provider,
        navigator: Arc<dyn Navigator>,
        origin: String,
        config: Arc<AuthConfig>,
        data_key: &'static str,
    ) -> Result<Self, AuthError> {
        let data: Data<Provider::User> = session.get(data_key).await?.unwrap_or_default();

        let publisher = SessionPublisher::new();
        publisher.publish(data.user);

        Ok(Self {
            provider,
            context: publisher.context(),
            publisher,
            session,
            data_key,
            navigator,
            origin,
            config,
        })
    }

    /// The current user, `None` when signed out.
    pub fn user(&self) -> Option<Provider::User> {
        self.context.user()
    }

    /// The observable session this facade reads from.
    pub fn session(&self) -> &SessionContext<Provider::User> {
        &self.context
    }

    /// The configuration in effect.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// The origin callback URLs are built from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    fn callback_url(&self, path: &str) -> String {
        format!("{}{}", self.origin, path)
    }

    async fn tokens(&self) -> Result<Option<TokenSession>, AuthError> {
        let data: Option<Data<Provider::User>> = self.session.get(self.data_key).await?;
        Ok(data.and_then(|data| data.tokens))
    }

    async fn store(&self, user: Provider::User, tokens: TokenSession) -> Result<(), AuthError> {
        let data = Data {
            user: Some(user.clone()),
            tokens: Some(tokens),
        };
        self.session.insert(self.data_key, data).await?;
        self.publisher.publish(Some(user));
        Ok(())
    }

    async fn start(&self, data: &AuthData<Provider::User>) -> Result<(), AuthError> {
        let (Some(user), Some(tokens)) = (&data.user, &data.session) else {
            return Ok(());
        };

        if !self.context.is_authenticated() {
            self.session.cycle_id().await?; // Session-fixation mitigation.
        }

        self.store(user.clone(), tokens.clone()).await
    }

    /// Starts OAuth sign-in with the configured issuer and navigates to its
    /// consent page.
    #[tracing::instrument(level = "debug", skip_all, fields(provider = %self.config.oauth_provider))]
    pub async fn sign_in_with_oauth(&self) -> Result<(), AuthError> {
        report("signing in with OAuth", async {
            let redirect_to = self.callback_url(&self.config.callback_path);
            let consent_url = self
                .provider
                .sign_in_with_oauth(&self.config.oauth_provider, &redirect_to)
                .await?;
            self.navigator.navigate_to(&consent_url);
            Ok::<_, AuthError>(())
        })
        .await
    }

    /// Signs in with an email and password, returning the provider's payload.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn sign_in_with_email(
        &self,
        email: &str,
        password: SecretString,
    ) -> Result<AuthData<Provider::User>, AuthError> {
        report("signing in with email", async {
            ensure_present("email", email)?;
            ensure_present("password", password.expose_secret())?;

            let creds = Credentials {
                email: email.to_owned(),
                password,
            };
            let data = self.provider.sign_in_with_password(creds).await?;
            self.start(&data).await?;
            Ok::<_, AuthError>(data)
        })
        .await
    }

    /// Creates an account. The verification email links back to this
    /// application's callback path.
    ///
    /// When a confirmation password is supplied it must match the password.
    /// If the provider issues a session right away, the client is signed in.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn sign_up_with_email(
        &self,
        creds: SignUpCredentials,
    ) -> Result<AuthData<Provider::User>, AuthError> {
        report("signing up", async {
            ensure_present("email", &creds.email)?;
            ensure_present("password", creds.password.expose_secret())?;

            if let Some(ref confirm_password) = creds.confirm_password {
                if confirm_password.expose_secret() != creds.password.expose_secret() {
                    return Err(AuthError::new("Passwords do not match", Some(422)));
                }
            }

            let email_redirect_to = self.callback_url(&self.config.callback_path);
            let data = self
                .provider
                .sign_up(creds.into(), &email_redirect_to)
                .await?;
            self.start(&data).await?;
            Ok(data)
        })
        .await
    }

    /// Signs out and then navigates to the login path.
    ///
    /// No navigation happens when the provider fails to end the session.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        report("signing out", async {
            if let Some(tokens) = self.tokens().await? {
                self.provider.sign_out(&tokens).await?;
            }

            self.session.flush().await?;
            self.publisher.publish(None);

            self.navigator.navigate_to(&self.config.login_path);
            Ok::<_, AuthError>(())
        })
        .await
    }

    /// Requests a password reset email linking back to the reset path.
    ///
    /// Repeated calls are not de-duplicated; each reaches the provider.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        report("resetting password", async {
            ensure_present("email", email)?;

            let redirect_to = self.callback_url(&self.config.reset_password_path);
            self.provider
                .reset_password_for_email(email, &redirect_to)
                .await
        })
        .await
    }

    /// Sets a new password for the signed-in user.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn update_password(&self, new_password: SecretString) -> Result<(), AuthError> {
        report("updating password", async {
            ensure_present("password", new_password.expose_secret())?;

            let Some(tokens) = self.tokens().await? else {
                return Err(AuthError::new("Auth session missing!", Some(400)));
            };

            let attributes = UserAttributes {
                password: Some(new_password),
            };
            let user = self.provider.update_user(&tokens, attributes).await?;
            self.store(user, tokens).await
        })
        .await
    }
}
