//! An in-process identity provider.
//!
//! [`MemoryProvider`] behaves like a Supabase Auth (GoTrue) client talking to
//! a private server: accounts live in a map, "sent" emails land in an outbox
//! and issued access tokens are tracked until they are signed out. It is
//! meant for tests, demos and local development.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::form_urlencoded;

use crate::{
    AuthData, AuthError, AuthUser, Credentials, IdentityProvider, TokenSession, UserAttributes,
};

/// A user of the [`MemoryProvider`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryUser {
    /// Sequential identifier.
    pub id: u64,

    /// Account email.
    pub email: String,

    /// Whether the email address has been confirmed.
    pub email_confirmed: bool,

    /// Application-specific data.
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl AuthUser for MemoryUser {
    type Id = u64;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn email(&self) -> Option<&str> {
        Some(&self.email)
    }
}

/// What an outbox mail was sent for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailKind {
    /// Sign-up verification.
    Confirmation,

    /// Password reset.
    Recovery,
}

/// An email the provider would have sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    /// Why it was sent.
    pub kind: MailKind,

    /// Recipient.
    pub to: String,

    /// Where the link in the mail leads.
    pub redirect_to: String,
}

#[derive(Debug)]
struct Account {
    user: MemoryUser,
    password: SecretString,
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<String, Account>,
    outbox: Vec<Mail>,
    // Access token to account email.
    sessions: HashMap<String, String>,
    next_id: u64,
    issued_tokens: u64,
}

impl State {
    fn issue_tokens(&mut self, user: &MemoryUser) -> TokenSession {
        self.issued_tokens += 1;
        let tokens = TokenSession {
            access_token: SecretString::new(format!(
                "memory-access-{}-{}",
                user.id, self.issued_tokens
            )),
            refresh_token: SecretString::new(format!(
                "memory-refresh-{}-{}",
                user.id, self.issued_tokens
            )),
            expires_in: 3600,
            token_type: "bearer".to_string(),
        };

        self.sessions.insert(
            tokens.access_token.expose_secret().clone(),
            user.email.clone(),
        );

        tokens
    }

    fn session_email(&self, tokens: &TokenSession) -> Option<&String> {
        self.sessions.get(tokens.access_token.expose_secret())
    }
}

/// An [`IdentityProvider`] keeping everything in memory.
///
/// Clones share accounts, outbox and issued tokens. Which user a client is
/// signed in as is not tracked here; that is kept in the client's session.
///
/// # Examples
///
/// ```rust
/// use axum_idp::{memory::MemoryProvider, Credentials, IdentityProvider};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let provider = MemoryProvider::new();
/// provider.add_user("ferris@example.com", "hunter42").await;
///
/// let data = provider
///     .sign_in_with_password(Credentials::new("ferris@example.com", "hunter42"))
///     .await
///     .unwrap();
/// assert!(data.session.is_some());
/// assert_eq!(provider.active_sessions().await, 1);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryProvider {
    state: Arc<RwLock<State>>,
    require_confirmation: bool,
    oauth_providers: Vec<String>,
    min_password_length: usize,
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProvider {
    /// Creates an empty provider. Sign-ups are confirmed immediately, `google`
    /// is the only OAuth issuer and passwords need six characters.
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            require_confirmation: false,
            oauth_providers: vec!["google".to_string()],
            min_password_length: 6,
        }
    }

    /// Requires new accounts to confirm their email before signing in.
    pub fn with_email_confirmation(mut self, require_confirmation: bool) -> Self {
        self.require_confirmation = require_confirmation;
        self
    }

    /// Enables an additional OAuth issuer.
    pub fn with_oauth_provider(mut self, provider: impl Into<String>) -> Self {
        self.oauth_providers.push(provider.into());
        self
    }

    /// Sets the minimum password length.
    pub fn with_min_password_length(mut self, min_password_length: usize) -> Self {
        self.min_password_length = min_password_length;
        self
    }

    /// Adds a confirmed account, replacing any account with the same email.
    pub async fn add_user(&self, email: &str, password: &str) -> MemoryUser {
        let mut state = self.state.write().await;
        state.next_id += 1;
        let user = MemoryUser {
            id: state.next_id,
            email: email.to_owned(),
            email_confirmed: true,
            user_metadata: serde_json::Value::Null,
        };
        state.accounts.insert(
            email.to_owned(),
            Account {
                user: user.clone(),
                password: SecretString::new(password.to_owned()),
            },
        );
        user
    }

    /// Marks an account's email as confirmed, as following the verification
    /// link would. Returns `false` for unknown accounts.
    pub async fn confirm_email(&self, email: &str) -> bool {
        match self.state.write().await.accounts.get_mut(email) {
            Some(account) => {
                account.user.email_confirmed = true;
                true
            }
            None => false,
        }
    }

    /// Returns every mail sent so far, oldest first.
    pub async fn outbox(&self) -> Vec<Mail> {
        self.state.read().await.outbox.clone()
    }

    /// Counts the access tokens issued and not yet signed out.
    pub async fn active_sessions(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    fn check_password(&self, password: &SecretString) -> Result<(), AuthError> {
        if password.expose_secret().chars().count() < self.min_password_length {
            return Err(AuthError::new(
                format!(
                    "Password should be at least {} characters.",
                    self.min_password_length
                ),
                Some(422),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for MemoryProvider {
    type User = MemoryUser;

    /// Returns the consent URL a GoTrue server would serve. It is relative to
    /// the application, which has to route `/auth/v1/authorize` itself.
    async fn sign_in_with_oauth(
        &self,
        provider: &str,
        redirect_to: &str,
    ) -> Result<String, AuthError> {
        if !self.oauth_providers.iter().any(|p| p == provider) {
            return Err(AuthError::new(
                "Unsupported provider: provider is not enabled",
                Some(400),
            ));
        }

        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("provider", provider)
            .append_pair("redirect_to", redirect_to)
            .finish();

        Ok(format!("/auth/v1/authorize?{query}"))
    }

    async fn sign_in_with_password(
        &self,
        creds: Credentials,
    ) -> Result<AuthData<Self::User>, AuthError> {
        let mut state = self.state.write().await;

        let user = match state.accounts.get(&creds.email) {
            Some(account)
                if account.password.expose_secret() == creds.password.expose_secret() =>
            {
                account.user.clone()
            }
            _ => return Err(AuthError::new("Invalid login credentials", Some(400))),
        };

        if !user.email_confirmed {
            return Err(AuthError::new("Email not confirmed", Some(400)));
        }

        let tokens = state.issue_tokens(&user);

        Ok(AuthData {
            user: Some(user),
            session: Some(tokens),
        })
    }

    async fn sign_up(
        &self,
        creds: Credentials,
        email_redirect_to: &str,
    ) -> Result<AuthData<Self::User>, AuthError> {
        self.check_password(&creds.password)?;

        let mut state = self.state.write().await;
        if state.accounts.contains_key(&creds.email) {
            return Err(AuthError::new("User already registered", Some(422)));
        }

        state.next_id += 1;
        let user = MemoryUser {
            id: state.next_id,
            email: creds.email.clone(),
            email_confirmed: !self.require_confirmation,
            user_metadata: serde_json::Value::Null,
        };
        state.accounts.insert(
            creds.email.clone(),
            Account {
                user: user.clone(),
                password: creds.password,
            },
        );
        state.outbox.push(Mail {
            kind: MailKind::Confirmation,
            to: creds.email,
            redirect_to: email_redirect_to.to_owned(),
        });

        let session = if self.require_confirmation {
            None
        } else {
            Some(state.issue_tokens(&user))
        };

        Ok(AuthData {
            user: Some(user),
            session,
        })
    }

    /// Ends every session of the tokens' user. Unknown tokens are ignored.
    async fn sign_out(&self, tokens: &TokenSession) -> Result<(), AuthError> {
        let mut state = self.state.write().await;

        if let Some(email) = state.session_email(tokens).cloned() {
            state.sessions.retain(|_, owner| *owner != email);
        }

        Ok(())
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), AuthError> {
        let mut state = self.state.write().await;

        // Unknown accounts succeed silently so accounts can't be enumerated.
        if state.accounts.contains_key(email) {
            state.outbox.push(Mail {
                kind: MailKind::Recovery,
                to: email.to_owned(),
                redirect_to: redirect_to.to_owned(),
            });
        }

        Ok(())
    }

    async fn update_user(
        &self,
        tokens: &TokenSession,
        attributes: UserAttributes,
    ) -> Result<Self::User, AuthError> {
        let mut state = self.state.write().await;

        let Some(email) = state.session_email(tokens).cloned() else {
            return Err(AuthError::new("Session not found", Some(403)));
        };

        let Some(account) = state.accounts.get_mut(&email) else {
            return Err(AuthError::new("User not found", Some(404)));
        };

        if let Some(password) = attributes.password {
            self.check_password(&password)?;

            if password.expose_secret() == account.password.expose_secret() {
                return Err(AuthError::new(
                    "New password should be different from the old password.",
                    Some(422),
                ));
            }

            account.password = password;
        }

        Ok(account.user.clone())
    }
}
