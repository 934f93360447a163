/// Paths and provider settings used by the facade and the guards.
///
/// ```rust
/// use axum_idp::AuthConfig;
///
/// let config = AuthConfig::default()
///     .with_login_path("/signin")
///     .with_site_url("https://app.example.com");
/// assert_eq!(config.login_path, "/signin");
/// assert_eq!(config.callback_path, "/auth/callback");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Where anonymous users are sent from protected routes, and where
    /// sign-out lands. Defaults to `/login`.
    pub login_path: String,

    /// Where signed-in users are sent from guest-only routes. Defaults to `/`.
    pub home_path: String,

    /// Appended to the origin for OAuth and email verification callbacks.
    /// Defaults to `/auth/callback`.
    pub callback_path: String,

    /// Appended to the origin for password reset links. Defaults to
    /// `/reset-password`.
    pub reset_password_path: String,

    /// The third-party issuer used by OAuth sign-in. Defaults to `google`.
    pub oauth_provider: String,

    /// The origin callback URLs are built from, e.g.
    /// `https://app.example.com`. When unset, callback URLs are relative.
    pub site_url: Option<String>,

    /// Further origins a request may select through its `Origin` or `Host`
    /// header. Headers naming any other origin are ignored.
    pub allowed_origins: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            home_path: "/".to_string(),
            callback_path: "/auth/callback".to_string(),
            reset_password_path: "/reset-password".to_string(),
            oauth_provider: "google".to_string(),
            site_url: None,
            allowed_origins: Vec::new(),
        }
    }
}

impl AuthConfig {
    /// Sets the login path.
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Sets the home path.
    pub fn with_home_path(mut self, path: impl Into<String>) -> Self {
        self.home_path = path.into();
        self
    }

    /// Sets the callback path.
    pub fn with_callback_path(mut self, path: impl Into<String>) -> Self {
        self.callback_path = path.into();
        self
    }

    /// Sets the password reset path.
    pub fn with_reset_password_path(mut self, path: impl Into<String>) -> Self {
        self.reset_password_path = path.into();
        self
    }

    /// Sets the OAuth issuer.
    pub fn with_oauth_provider(mut self, provider: impl Into<String>) -> Self {
        self.oauth_provider = provider.into();
        self
    }

    /// Sets the origin for callback URLs.
    pub fn with_site_url(mut self, site_url: impl Into<String>) -> Self {
        self.site_url = Some(site_url.into());
        self
    }

    /// Allows requests to select `origin` for their callback URLs, for
    /// applications served under more than one host.
    pub fn with_allowed_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origins.push(origin.into());
        self
    }
}
