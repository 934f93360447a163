use axum::{
    response::{Html, IntoResponse},
    routing::get,
    Form, Router,
};
use axum_idp::secrecy::SecretString;
use serde::Deserialize;

use crate::web::{auth::AuthSession, page};

#[derive(Debug, Deserialize)]
pub struct ResetPasswordForm {
    password: SecretString,
}

const RESET_PASSWORD_FORM: &str = r#"<form method="post" action="/reset-password">
<input name="password" type="password" placeholder="New password">
<button>Update password</button>
</form>"#;

pub fn router() -> Router<()> {
    Router::new()
        .route("/", get(self::get::protected))
        .route("/logout", get(self::get::logout))
        .route(
            "/reset-password",
            get(self::get::reset_password).post(self::post::reset_password),
        )
}

mod post {
    use super::*;

    pub async fn reset_password(
        auth_session: AuthSession,
        Form(form): Form<ResetPasswordForm>,
    ) -> Html<String> {
        match auth_session.update_password(form.password).await {
            Ok(()) => page::render(
                "Reset password",
                Some("Password updated."),
                r#"<a href="/">Home</a>"#,
            ),
            Err(err) => page::render("Reset password", Some(&err.message), RESET_PASSWORD_FORM),
        }
    }
}

mod get {
    use super::*;

    pub async fn protected(auth_session: AuthSession) -> Html<String> {
        let email = auth_session
            .user()
            .map(|user| user.email)
            .unwrap_or_default();

        page::render(
            "Protected",
            None,
            &format!(
                r#"<p>Logged in as {email}.</p>
<p><a href="/reset-password">Change password</a> | <a href="/logout">Log out</a></p>"#
            ),
        )
    }

    pub async fn logout(auth_session: AuthSession) -> impl IntoResponse {
        // The redirect to the login page is issued by the auth layer.
        match auth_session.sign_out().await {
            Ok(()) => page::render("Log out", None, ""),
            Err(err) => page::render("Log out", Some(&err.message), ""),
        }
    }

    pub async fn reset_password() -> Html<String> {
        page::render("Reset password", None, RESET_PASSWORD_FORM)
    }
}
