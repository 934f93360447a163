use std::fmt::{Debug, Display};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize, Serializer};

use crate::AuthError;

/// A user record as reported by an identity provider.
///
/// The guards only ever look at whether a user is present; these accessors
/// exist for handlers and logging. Application-specific fields belong on the
/// implementing type.
///
/// Users are kept in each client's session record, hence the serde bounds.
///
/// # Examples
///
/// ```rust
/// use axum_idp::AuthUser;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct User {
///     id: String,
///     email: String,
/// }
///
/// impl AuthUser for User {
///     type Id = String;
///
///     fn id(&self) -> Self::Id {
///         self.id.clone()
///     }
///
///     fn email(&self) -> Option<&str> {
///         Some(&self.email)
///     }
/// }
/// ```
pub trait AuthUser: Debug + Clone + Send + Sync + Serialize + DeserializeOwned {
    /// An identifying feature of the user.
    type Id: Debug + Display + Clone + Send + Sync;

    /// Returns some identifying feature of the user.
    fn id(&self) -> Self::Id;

    /// Returns the user's email address, if the provider knows one.
    fn email(&self) -> Option<&str>;
}

/// An email and password pair.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    /// Account email.
    pub email: String,

    /// Account password.
    pub password: SecretString,
}

impl Credentials {
    /// Creates credentials from an email and password.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: SecretString::new(password.into()),
        }
    }
}

/// Sign-up input: credentials plus an optional confirmation password.
///
/// When `confirm_password` is present it must equal `password`.
#[derive(Debug, Clone, Deserialize)]
pub struct SignUpCredentials {
    /// Account email.
    pub email: String,

    /// Account password.
    pub password: SecretString,

    /// Repeated password, as typed into a sign-up form.
    #[serde(default)]
    pub confirm_password: Option<SecretString>,
}

impl SignUpCredentials {
    /// Creates sign-up credentials without a confirmation password.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: SecretString::new(password.into()),
            confirm_password: None,
        }
    }

    /// Sets the confirmation password.
    pub fn with_confirm_password(mut self, confirm_password: impl Into<String>) -> Self {
        self.confirm_password = Some(SecretString::new(confirm_password.into()));
        self
    }
}

impl From<SignUpCredentials> for Credentials {
    fn from(creds: SignUpCredentials) -> Self {
        Self {
            email: creds.email,
            password: creds.password,
        }
    }
}

fn expose_secret<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Tokens issued by the provider for an authenticated session.
///
/// These are stored in the client's session record and presented back to the
/// provider for sign-out and user updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSession {
    /// Bearer token for calls made on behalf of the user.
    #[serde(serialize_with = "expose_secret")]
    pub access_token: SecretString,

    /// Token used by the provider to refresh the session.
    #[serde(serialize_with = "expose_secret")]
    pub refresh_token: SecretString,

    /// Lifetime of the access token in seconds.
    pub expires_in: u64,

    /// Token type, normally `bearer`.
    pub token_type: String,
}

/// The payload of a sign-in or sign-up.
///
/// Sign-up returns a user without a session when the provider requires the
/// email address to be confirmed first.
#[derive(Debug, Clone)]
pub struct AuthData<User> {
    /// The authenticated or newly created user.
    pub user: Option<User>,

    /// The issued session, if any.
    pub session: Option<TokenSession>,
}

/// Attributes of the current user which may be updated.
#[derive(Debug, Clone, Default)]
pub struct UserAttributes {
    /// A new password.
    pub password: Option<SecretString>,
}

/// An external identity provider.
///
/// Providers are shared by every request and hold no per-client state. Each
/// browser's session (the signed-in user and the tokens issued for it) lives
/// in that client's `tower-sessions` record, and the tokens are handed back to
/// the provider for the calls that act on an existing session.
#[async_trait]
pub trait IdentityProvider: Clone + Send + Sync {
    /// The provider's user record.
    type User: AuthUser + 'static;

    /// Begins an OAuth flow with the named third-party issuer, returning the
    /// consent URL the browser should be sent to. After consent the issuer
    /// redirects to `redirect_to`.
    async fn sign_in_with_oauth(&self, provider: &str, redirect_to: &str)
        -> Result<String, AuthError>;

    /// Signs in with an email and password.
    async fn sign_in_with_password(
        &self,
        creds: Credentials,
    ) -> Result<AuthData<Self::User>, AuthError>;

    /// Creates an account. The verification email links to
    /// `email_redirect_to`.
    async fn sign_up(
        &self,
        creds: Credentials,
        email_redirect_to: &str,
    ) -> Result<AuthData<Self::User>, AuthError>;

    /// Revokes the session the tokens were issued for.
    async fn sign_out(&self, tokens: &TokenSession) -> Result<(), AuthError>;

    /// Sends a password reset email linking to `redirect_to`.
    async fn reset_password_for_email(&self, email: &str, redirect_to: &str)
        -> Result<(), AuthError>;

    /// Updates the user the tokens were issued for.
    async fn update_user(
        &self,
        tokens: &TokenSession,
        attributes: UserAttributes,
    ) -> Result<Self::User, AuthError>;
}
