use axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use axum_idp::{
    guest_only, login_required,
    memory::{MailKind, MemoryProvider},
    secrecy::SecretString,
    AuthConfig, AuthError, AuthManagerLayerBuilder, AuthSession, Credentials, IdentityProvider,
    SignUpCredentials,
};
use serde::Deserialize;
use tower::ServiceExt;
use tower_cookies::cookie;
use tower_sessions::{MemoryStore, SessionManagerLayer};

type Session = AuthSession<MemoryProvider>;

#[derive(Deserialize)]
struct LoginForm {
    email: String,
    password: SecretString,
}

#[derive(Deserialize)]
struct EmailForm {
    email: String,
}

#[derive(Deserialize)]
struct PasswordForm {
    password: SecretString,
}

fn error_response(err: AuthError) -> Response {
    let status = err
        .status
        .and_then(|status| StatusCode::from_u16(status).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, err.message).into_response()
}

async fn login(auth_session: Session, Form(form): Form<LoginForm>) -> Response {
    match auth_session
        .sign_in_with_email(&form.email, form.password)
        .await
    {
        Ok(_) => Redirect::to("/").into_response(),
        Err(err) => error_response(err),
    }
}

async fn oauth(auth_session: Session) -> Response {
    match auth_session.sign_in_with_oauth().await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn signup(auth_session: Session, Form(creds): Form<SignUpCredentials>) -> Response {
    match auth_session.sign_up_with_email(creds).await {
        Ok(_) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn forgot_password(auth_session: Session, Form(form): Form<EmailForm>) -> Response {
    match auth_session.reset_password(&form.email).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn logout(auth_session: Session) -> Response {
    match auth_session.sign_out().await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn update_password(auth_session: Session, Form(form): Form<PasswordForm>) -> Response {
    match auth_session.update_password(form.password).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

fn app(provider: MemoryProvider, config: AuthConfig) -> Router {
    let protected = Router::new()
        .route(
            "/",
            get(|auth_session: Session| async move {
                auth_session
                    .user()
                    .map(|user| user.email)
                    .unwrap_or_default()
            }),
        )
        .route("/logout", post(logout))
        .route("/password", post(update_password))
        .route_layer(login_required!(MemoryProvider));

    let guests = Router::new()
        .route("/login", get(|| async { "Log in" }).post(login))
        .route("/login/oauth", get(oauth))
        .route("/signup", post(signup))
        .route("/forgot-password", post(forgot_password))
        .route_layer(guest_only!(MemoryProvider));

    let session_layer = SessionManagerLayer::new(MemoryStore::default()).with_secure(false);

    protected.merge(guests).layer(
        AuthManagerLayerBuilder::new(provider, session_layer)
            .with_config(config)
            .build(),
    )
}

/// The configuration for an app served at `http://localhost:3000`.
fn local_config() -> AuthConfig {
    AuthConfig::default().with_allowed_origin("http://localhost:3000")
}

fn get_request(uri: &str, session_cookie: Option<&str>) -> Request<Body> {
    let mut req = Request::builder()
        .uri(uri)
        .header(header::ORIGIN, "http://localhost:3000");
    if let Some(session_cookie) = session_cookie {
        req = req.header(header::COOKIE, session_cookie);
    }
    req.body(Body::empty()).unwrap()
}

fn form_request(uri: &str, form: &str, session_cookie: Option<&str>) -> Request<Body> {
    let mut req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(session_cookie) = session_cookie {
        req = req.header(header::COOKIE, session_cookie);
    }
    req.body(Body::from(form.to_owned())).unwrap()
}

fn location(res: &Response) -> Option<&str> {
    res.headers()
        .get(header::LOCATION)
        .and_then(|h| h.to_str().ok())
}

fn get_session_cookie(res: &Response) -> Option<String> {
    res.headers()
        .get(header::SET_COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|cookie_str| {
            let cookie = cookie::Cookie::parse(cookie_str);
            cookie.map(|c| c.stripped().to_string()).ok()
        })
}

async fn body_text(res: Response) -> String {
    let bytes = body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn provider_with_users() -> MemoryProvider {
    let provider = MemoryProvider::new();
    provider.add_user("ferris@example.com", "hunter42").await;
    provider.add_user("crab@example.com", "hunter42").await;
    provider
}

/// Signs in through the login form and returns the client's session cookie.
async fn sign_in(app: &Router, email: &str) -> String {
    let form = format!("email={}&password=hunter42", email.replace('@', "%40"));
    let res = app
        .clone()
        .oneshot(form_request("/login", &form, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    get_session_cookie(&res).expect("Response should have a valid session cookie")
}

#[tokio::test]
async fn sign_in_unlocks_protected_routes() {
    let app = app(provider_with_users().await, local_config());

    // Anonymous visitors are sent to the login page.
    let res = app.clone().oneshot(get_request("/", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&res), Some("/login"));

    let res = app
        .clone()
        .oneshot(get_request("/login", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Invalid credentials surface the provider's error.
    let res = app
        .clone()
        .oneshot(form_request(
            "/login",
            "email=ferris%40example.com&password=bogus",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(res).await, "Invalid login credentials");

    let res = app
        .clone()
        .oneshot(form_request("/login", "email=&password=hunter42", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(res).await, "email is required");

    let res = app
        .clone()
        .oneshot(form_request(
            "/login",
            "email=ferris%40example.com&password=hunter42",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), Some("/"));
    let session_cookie =
        get_session_cookie(&res).expect("Response should have a valid session cookie");

    let res = app
        .clone()
        .oneshot(get_request("/", Some(&session_cookie)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_text(res).await, "ferris@example.com");

    // Guest-only pages now send the user home.
    let res = app
        .oneshot(get_request("/login", Some(&session_cookie)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&res), Some("/"));
}

#[tokio::test]
async fn clients_do_not_share_sessions() {
    let provider = provider_with_users().await;
    let app = app(provider.clone(), local_config());

    let ferris_cookie = sign_in(&app, "ferris@example.com").await;

    // A second client without a cookie is still anonymous.
    let res = app.clone().oneshot(get_request("/", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&res), Some("/login"));

    let res = app
        .clone()
        .oneshot(get_request("/login", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let crab_cookie = sign_in(&app, "crab@example.com").await;
    assert_ne!(ferris_cookie, crab_cookie);

    let res = app
        .clone()
        .oneshot(get_request("/", Some(&crab_cookie)))
        .await
        .unwrap();
    assert_eq!(body_text(res).await, "crab@example.com");

    let res = app
        .clone()
        .oneshot(get_request("/", Some(&ferris_cookie)))
        .await
        .unwrap();
    assert_eq!(body_text(res).await, "ferris@example.com");

    // Signing one client out leaves the other signed in.
    let res = app
        .clone()
        .oneshot(form_request("/logout", "", Some(&crab_cookie)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(provider.active_sessions().await, 1);

    let res = app
        .clone()
        .oneshot(get_request("/", Some(&crab_cookie)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);

    let res = app
        .oneshot(get_request("/", Some(&ferris_cookie)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_text(res).await, "ferris@example.com");
}

#[tokio::test]
async fn sign_out_navigates_to_login() {
    let provider = provider_with_users().await;
    let app = app(provider.clone(), local_config());
    let session_cookie = sign_in(&app, "ferris@example.com").await;

    let res = app
        .clone()
        .oneshot(form_request("/logout", "", Some(&session_cookie)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), Some("/login"));
    assert_eq!(provider.active_sessions().await, 0);

    let res = app
        .oneshot(get_request("/", Some(&session_cookie)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn sign_out_honours_configured_login_path() {
    let app = app(
        provider_with_users().await,
        local_config().with_login_path("/account/login"),
    );
    let session_cookie = sign_in(&app, "ferris@example.com").await;

    let res = app
        .oneshot(form_request("/logout", "", Some(&session_cookie)))
        .await
        .unwrap();
    assert_eq!(location(&res), Some("/account/login"));
}

#[tokio::test]
async fn sign_up_links_back_to_callback() {
    let provider = MemoryProvider::new().with_email_confirmation(true);
    let app = app(provider.clone(), local_config());

    let res = app
        .clone()
        .oneshot(form_request(
            "/signup",
            "email=crab%40example.com&password=hunter42&confirm_password=hunter42",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let outbox = provider.outbox().await;
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].kind, MailKind::Confirmation);
    assert_eq!(outbox[0].to, "crab@example.com");
    assert_eq!(outbox[0].redirect_to, "http://localhost:3000/auth/callback");

    // Unconfirmed accounts have no session yet.
    assert_eq!(provider.active_sessions().await, 0);

    let res = app
        .oneshot(form_request(
            "/signup",
            "email=shell%40example.com&password=hunter42&confirm_password=hunter43",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_text(res).await, "Passwords do not match");
    assert_eq!(provider.outbox().await.len(), 1);
}

#[tokio::test]
async fn sign_up_without_confirmation_signs_the_client_in() {
    let app = app(MemoryProvider::new(), local_config());

    let res = app
        .clone()
        .oneshot(form_request(
            "/signup",
            "email=crab%40example.com&password=hunter42",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let session_cookie =
        get_session_cookie(&res).expect("Response should have a valid session cookie");

    let res = app
        .oneshot(get_request("/", Some(&session_cookie)))
        .await
        .unwrap();
    assert_eq!(body_text(res).await, "crab@example.com");
}

#[tokio::test]
async fn reset_password_links_back_to_reset_path() {
    let provider = provider_with_users().await;
    let app = app(
        provider.clone(),
        local_config().with_allowed_origin("http://localhost:8080"),
    );

    // Without an `Origin` header the `Host` header is used.
    let req = Request::builder()
        .method("POST")
        .uri("/forgot-password")
        .header(header::HOST, "localhost:8080")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("email=ferris%40example.com"))
        .unwrap();

    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        provider.outbox().await[0].redirect_to,
        "http://localhost:8080/reset-password"
    );

    // Each request reaches the provider.
    app.clone()
        .oneshot(form_request(
            "/forgot-password",
            "email=ferris%40example.com",
            None,
        ))
        .await
        .unwrap();
    let outbox = provider.outbox().await;
    assert_eq!(outbox.len(), 2);
    assert_eq!(outbox[1].kind, MailKind::Recovery);
    assert_eq!(outbox[1].redirect_to, "http://localhost:3000/reset-password");

    let res = app
        .oneshot(form_request("/forgot-password", "email=", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn forged_origin_never_reaches_reset_mail() {
    let forged = |name: header::HeaderName, value: &str| {
        Request::builder()
            .method("POST")
            .uri("/forgot-password")
            .header(name, value)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("email=ferris%40example.com"))
            .unwrap()
    };

    // Without a site URL the link stays relative.
    let provider = provider_with_users().await;
    let relative = app(provider.clone(), AuthConfig::default());

    relative
        .clone()
        .oneshot(forged(header::ORIGIN, "https://evil.test"))
        .await
        .unwrap();
    relative
        .oneshot(forged(header::HOST, "evil.test"))
        .await
        .unwrap();

    let outbox = provider.outbox().await;
    assert_eq!(outbox.len(), 2);
    assert!(outbox.iter().all(|mail| mail.redirect_to == "/reset-password"));

    // With one the site URL is used.
    let provider = provider_with_users().await;
    let absolute = app(
        provider.clone(),
        local_config().with_site_url("https://app.example.com"),
    );

    absolute
        .oneshot(forged(header::ORIGIN, "https://evil.test"))
        .await
        .unwrap();
    assert_eq!(
        provider.outbox().await[0].redirect_to,
        "https://app.example.com/reset-password"
    );
}

#[tokio::test]
async fn site_url_overrides_request_origin() {
    let provider = provider_with_users().await;
    let config = AuthConfig::default()
        .with_site_url("https://app.example.com")
        .with_reset_password_path("/account/reset");
    let app = app(provider.clone(), config);

    app.oneshot(form_request(
        "/forgot-password",
        "email=ferris%40example.com",
        None,
    ))
    .await
    .unwrap();

    assert_eq!(
        provider.outbox().await[0].redirect_to,
        "https://app.example.com/account/reset"
    );
}

#[tokio::test]
async fn oauth_navigates_to_consent_page() {
    let app = app(MemoryProvider::new(), local_config());

    let res = app
        .oneshot(get_request("/login/oauth", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&res),
        Some("/auth/v1/authorize?provider=google&redirect_to=http%3A%2F%2Flocalhost%3A3000%2Fauth%2Fcallback")
    );
}

#[tokio::test]
async fn oauth_with_disabled_issuer_fails_without_navigation() {
    let app = app(
        MemoryProvider::new(),
        local_config().with_oauth_provider("github"),
    );

    let res = app
        .oneshot(get_request("/login/oauth", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(location(&res), None);
}

#[tokio::test]
async fn update_password_replaces_credentials() {
    let provider = provider_with_users().await;
    let app = app(provider.clone(), local_config());

    // Anonymous clients never reach the handler.
    let res = app
        .clone()
        .oneshot(form_request("/password", "password=hunter43", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);

    let session_cookie = sign_in(&app, "ferris@example.com").await;

    let res = app
        .clone()
        .oneshot(form_request(
            "/password",
            "password=hunter42",
            Some(&session_cookie),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = app
        .oneshot(form_request(
            "/password",
            "password=hunter43",
            Some(&session_cookie),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    assert!(provider
        .sign_in_with_password(Credentials::new("ferris@example.com", "hunter42"))
        .await
        .is_err());
    assert!(provider
        .sign_in_with_password(Credentials::new("ferris@example.com", "hunter43"))
        .await
        .is_ok());
}
