//! A client for the Supabase Auth (GoTrue) REST API.
//!
//! [`GoTrueProvider`] keeps no client state of its own. Tokens it issues are
//! stored in each client's session by [`AuthSession`](crate::AuthSession) and
//! handed back for sign-out and user updates.

use std::env;

use async_trait::async_trait;
use reqwest::{header, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::{
    AuthData, AuthError, AuthUser, Credentials, IdentityProvider, TokenSession, UserAttributes,
};

/// A GoTrue user record.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GoTrueUser {
    /// User UUID.
    pub id: String,

    /// Account email, absent for phone-only users.
    #[serde(default)]
    pub email: Option<String>,

    /// Confirmation timestamp, absent until the email is confirmed.
    #[serde(default)]
    pub email_confirmed_at: Option<String>,

    /// Data controlled by the user.
    #[serde(default)]
    pub user_metadata: Value,

    /// Data controlled by the service.
    #[serde(default)]
    pub app_metadata: Value,
}

impl AuthUser for GoTrueUser {
    type Id = String;

    fn id(&self) -> Self::Id {
        self.id.clone()
    }

    fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(flatten)]
    tokens: TokenSession,
    user: GoTrueUser,
}

impl From<TokenResponse> for AuthData<GoTrueUser> {
    fn from(response: TokenResponse) -> Self {
        AuthData {
            user: Some(response.user),
            session: Some(response.tokens),
        }
    }
}

/// An error raised while configuring a [`GoTrueProvider`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("environment variable `{0}` is not set")]
    Missing(&'static str),

    /// The project URL could not be parsed.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Maps a GoTrue error response onto [`AuthError`].
///
/// GoTrue has used several field names for the message over time; the first
/// one present wins.
fn error_from_body(status: u16, body: &str) -> AuthError {
    let message = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        ["msg", "message", "error_description", "error"]
            .iter()
            .find_map(|key| value.get(key).and_then(Value::as_str).map(str::to_owned))
    });

    let message = match message {
        Some(message) => message,
        None if !body.is_empty() => body.to_owned(),
        None => format!("request failed with status {status}"),
    };

    AuthError::new(message, Some(status))
}

/// An [`IdentityProvider`] backed by a Supabase Auth server.
#[derive(Debug, Clone)]
pub struct GoTrueProvider {
    http: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
}

impl GoTrueProvider {
    /// Creates a provider for the project at `project_url`, e.g.
    /// `https://<ref>.supabase.co`, authenticating with the project's API key.
    pub fn new(project_url: &str, api_key: SecretString) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&format!(
            "{}/auth/v1/",
            project_url.trim_end_matches('/')
        ))?;

        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
        })
    }

    /// Creates a provider from `SUPABASE_URL` and `SUPABASE_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let project_url =
            env::var("SUPABASE_URL").map_err(|_| ConfigError::Missing("SUPABASE_URL"))?;
        let api_key =
            env::var("SUPABASE_KEY").map_err(|_| ConfigError::Missing("SUPABASE_KEY"))?;

        Self::new(&project_url, SecretString::new(api_key))
    }

    /// Uses the given HTTP client instead of a default one.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, AuthError> {
        let mut url = self.base_url.join(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn send(
        &self,
        req: RequestBuilder,
        bearer: Option<&SecretString>,
    ) -> Result<Response, AuthError> {
        let bearer = bearer.unwrap_or(&self.api_key);
        let res = req
            .header("apikey", self.api_key.expose_secret())
            .header(header::ACCEPT, "application/json")
            .bearer_auth(bearer.expose_secret())
            .send()
            .await?;

        let status = res.status();
        tracing::debug!(url = %res.url().path(), %status, "gotrue response");

        if status.is_success() {
            return Ok(res);
        }

        let body = res.text().await.unwrap_or_default();
        Err(error_from_body(status.as_u16(), &body))
    }
}

#[async_trait]
impl IdentityProvider for GoTrueProvider {
    type User = GoTrueUser;

    async fn sign_in_with_oauth(
        &self,
        provider: &str,
        redirect_to: &str,
    ) -> Result<String, AuthError> {
        let url = self.endpoint(
            "authorize",
            &[("provider", provider), ("redirect_to", redirect_to)],
        )?;
        Ok(url.to_string())
    }

    async fn sign_in_with_password(
        &self,
        creds: Credentials,
    ) -> Result<AuthData<Self::User>, AuthError> {
        let url = self.endpoint("token", &[("grant_type", "password")])?;
        let body = json!({
            "email": creds.email,
            "password": creds.password.expose_secret(),
        });

        let response: TokenResponse = self
            .send(self.http.post(url).json(&body), None)
            .await?
            .json()
            .await?;

        Ok(response.into())
    }

    async fn sign_up(
        &self,
        creds: Credentials,
        email_redirect_to: &str,
    ) -> Result<AuthData<Self::User>, AuthError> {
        let url = self.endpoint("signup", &[("redirect_to", email_redirect_to)])?;
        let body = json!({
            "email": creds.email,
            "password": creds.password.expose_secret(),
        });

        let value: Value = self
            .send(self.http.post(url).json(&body), None)
            .await?
            .json()
            .await?;

        // With email confirmation enabled GoTrue answers with the bare user.
        if value.get("access_token").is_some() {
            let response: TokenResponse = serde_json::from_value(value)?;
            Ok(response.into())
        } else {
            let user: GoTrueUser = serde_json::from_value(value)?;
            Ok(AuthData {
                user: Some(user),
                session: None,
            })
        }
    }

    async fn sign_out(&self, tokens: &TokenSession) -> Result<(), AuthError> {
        let url = self.endpoint("logout", &[("scope", "global")])?;
        match self
            .send(self.http.post(url), Some(&tokens.access_token))
            .await
        {
            Ok(_) => {}
            // The server no longer knows the session; it is gone either way.
            Err(err) if matches!(err.status, Some(401 | 403 | 404)) => {
                tracing::debug!(err = %err, "session already ended on the server");
            }
            Err(err) => return Err(err),
        }

        Ok(())
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), AuthError> {
        let url = self.endpoint("recover", &[("redirect_to", redirect_to)])?;
        self.send(self.http.post(url).json(&json!({ "email": email })), None)
            .await?;
        Ok(())
    }

    async fn update_user(
        &self,
        tokens: &TokenSession,
        attributes: UserAttributes,
    ) -> Result<Self::User, AuthError> {
        let mut body = json!({});
        if let Some(ref password) = attributes.password {
            body["password"] = Value::from(password.expose_secret().as_str());
        }

        let url = self.endpoint("user", &[])?;
        let user: GoTrueUser = self
            .send(self.http.put(url).json(&body), Some(&tokens.access_token))
            .await?
            .json()
            .await?;

        Ok(user)
    }
}
