use axum::{
    response::{Html, IntoResponse, Redirect},
    routing::get,
    Form, Router,
};
use axum_idp::{guest_only, memory::MemoryProvider, secrecy::SecretString, SignUpCredentials};
use serde::Deserialize;

use crate::web::page;

pub type AuthSession = axum_idp::AuthSession<MemoryProvider>;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    email: String,
    password: SecretString,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordForm {
    email: String,
}

const LOGIN_FORM: &str = r#"<form method="post" action="/login">
<input name="email" type="email" placeholder="Email">
<input name="password" type="password" placeholder="Password">
<button>Log in</button>
</form>
<p><a href="/login/oauth">Continue with Google</a></p>
<p><a href="/signup">Sign up</a> | <a href="/forgot-password">Forgot password?</a></p>"#;

const SIGNUP_FORM: &str = r#"<form method="post" action="/signup">
<input name="email" type="email" placeholder="Email">
<input name="password" type="password" placeholder="Password">
<input name="confirm_password" type="password" placeholder="Confirm password">
<button>Sign up</button>
</form>"#;

const FORGOT_PASSWORD_FORM: &str = r#"<form method="post" action="/forgot-password">
<input name="email" type="email" placeholder="Email">
<button>Send reset link</button>
</form>"#;

pub fn router() -> Router<()> {
    let guests = Router::new()
        .route("/login", get(self::get::login).post(self::post::login))
        .route("/login/oauth", get(self::get::oauth))
        .route("/signup", get(self::get::signup).post(self::post::signup))
        .route(
            "/forgot-password",
            get(self::get::forgot_password).post(self::post::forgot_password),
        )
        .route_layer(guest_only!(MemoryProvider));

    guests
        .route("/auth/callback", get(self::get::callback))
        // The in-memory provider's consent URL points back into this app.
        .route("/auth/v1/authorize", get(self::get::authorize))
}

mod post {
    use super::*;

    pub async fn login(auth_session: AuthSession, Form(form): Form<LoginForm>) -> impl IntoResponse {
        match auth_session
            .sign_in_with_email(&form.email, form.password)
            .await
        {
            Ok(_) => Redirect::to("/").into_response(),
            Err(err) => page::render("Log in", Some(&err.message), LOGIN_FORM).into_response(),
        }
    }

    pub async fn signup(
        auth_session: AuthSession,
        Form(creds): Form<SignUpCredentials>,
    ) -> impl IntoResponse {
        match auth_session.sign_up_with_email(creds).await {
            Ok(data) if data.session.is_some() => Redirect::to("/").into_response(),
            Ok(_) => page::render(
                "Sign up",
                Some("Check your email for the confirmation link."),
                "",
            )
            .into_response(),
            Err(err) => page::render("Sign up", Some(&err.message), SIGNUP_FORM).into_response(),
        }
    }

    pub async fn forgot_password(
        auth_session: AuthSession,
        Form(form): Form<ForgotPasswordForm>,
    ) -> Html<String> {
        match auth_session.reset_password(&form.email).await {
            Ok(()) => page::render(
                "Forgot password",
                Some("If the account exists, a reset link is on its way."),
                "",
            ),
            Err(err) => page::render("Forgot password", Some(&err.message), FORGOT_PASSWORD_FORM),
        }
    }
}

mod get {
    use super::*;

    pub async fn login() -> Html<String> {
        page::render("Log in", None, LOGIN_FORM)
    }

    pub async fn oauth(auth_session: AuthSession) -> impl IntoResponse {
        // On success the response is replaced by a redirect to the consent page.
        match auth_session.sign_in_with_oauth().await {
            Ok(()) => page::render("Log in", None, ""),
            Err(err) => page::render("Log in", Some(&err.message), LOGIN_FORM),
        }
    }

    pub async fn signup() -> Html<String> {
        page::render("Sign up", None, SIGNUP_FORM)
    }

    pub async fn forgot_password() -> Html<String> {
        page::render("Forgot password", None, FORGOT_PASSWORD_FORM)
    }

    pub async fn authorize() -> Html<String> {
        page::render(
            "Continue with Google",
            Some("The in-memory provider has no OAuth issuer to hand you over to."),
            r#"<p>Against Supabase Auth this is where the issuer's consent page opens.</p>
<p><a href="/login">Back to log in</a></p>"#,
        )
    }

    pub async fn callback() -> Redirect {
        Redirect::to("/")
    }
}
