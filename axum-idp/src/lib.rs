//! Route guards and an auth facade over an external identity provider, for
//! Axum.
//!
//! Credentials, token issuance and OAuth redirect handling belong to the
//! identity provider. This crate orchestrates calls into it and keeps each
//! client's user and tokens in its `tower-sessions` session:
//!
//! 1. [`AuthSession`] exposes sign-in (OAuth and email), sign-up, sign-out,
//!    password reset and password update as single provider calls whose
//!    failures are logged and returned unchanged,
//! 2. [`SessionContext`] is an observable reference to the client's current
//!    user,
//! 3. [`login_required!`] and [`guest_only!`] redirect requests based on
//!    whether a user is present.
//!
//! Providers implement [`IdentityProvider`]. [`memory::MemoryProvider`] is
//! an in-process provider for tests and local development; with the `gotrue`
//! feature, `gotrue::GoTrueProvider` talks to Supabase Auth.
//!
//! # Example
//!
//! ```rust,no_run
//! use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
//! use axum_idp::{
//!     guest_only, login_required,
//!     memory::MemoryProvider,
//!     tower_sessions::{MemoryStore, SessionManagerLayer},
//!     AuthConfig, AuthManagerLayerBuilder, AuthSession,
//! };
//!
//! type Session = AuthSession<MemoryProvider>;
//!
//! async fn protected(auth_session: Session) -> impl IntoResponse {
//!     let email = auth_session.user().map(|user| user.email).unwrap_or_default();
//!     format!("Logged in as: {email}")
//! }
//!
//! async fn logout(auth_session: Session) -> StatusCode {
//!     match auth_session.sign_out().await {
//!         Ok(()) => StatusCode::OK, // Replaced by a redirect to `/login`.
//!         Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider = MemoryProvider::new();
//!     provider.add_user("ferris@example.com", "hunter42").await;
//!
//!     let members = Router::new()
//!         .route("/", get(protected))
//!         .route("/logout", get(logout))
//!         .route_layer(login_required!(MemoryProvider));
//!
//!     let guests = Router::new()
//!         .route("/login", get(|| async { "Log in" }))
//!         .route_layer(guest_only!(MemoryProvider));
//!
//!     // Session layer.
//!     //
//!     // This uses `tower-sessions` to establish a layer that will provide the session
//!     // as a request extension.
//!     let session_store = MemoryStore::default();
//!     let session_layer = SessionManagerLayer::new(session_store);
//!
//!     // Callback URLs in confirmation and recovery mails are built from this
//!     // origin, never from request headers.
//!     let config = AuthConfig::default().with_site_url("http://localhost:3000");
//!
//!     let auth_layer = AuthManagerLayerBuilder::new(provider, session_layer)
//!         .with_config(config)
//!         .build();
//!
//!     let app = members.merge(guests).layer(auth_layer);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod auth;
mod config;
mod error;
mod extract;
pub mod guard;
#[cfg(feature = "gotrue")]
pub mod gotrue;
pub mod memory;
mod middleware;
mod navigation;
mod provider;
mod service;
mod session;

pub use auth::AuthSession;
pub use axum;
pub use config::AuthConfig;
pub use error::AuthError;
#[doc(hidden)]
pub use middleware::enforce;
pub use navigation::{Navigation, Navigator};
pub use provider::{
    AuthData, AuthUser, Credentials, IdentityProvider, SignUpCredentials, TokenSession,
    UserAttributes,
};
pub use secrecy;
pub use service::{AuthManager, AuthManagerLayer, AuthManagerLayerBuilder};
pub use session::{SessionContext, SessionPublisher};
pub use tower_sessions;
pub use tracing;
