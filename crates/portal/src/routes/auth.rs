//! Login, registration and logout.
//!
//! JSON callers get the envelope; browser form posts are redirected, to the
//! role's landing page on success or back to the form with an error flag.

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, header},
    response::{IntoResponse, Redirect, Response},
    routing::post,
};
use cookie::{Cookie, SameSite, time::Duration};
use tracing::instrument;

use super::{Submitted, respond_created, wants_json};
use crate::actions::{
    Envelope, auth,
    auth::{LoginForm, RegisterForm},
};
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::services::auth::SESSION_COOKIE;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/logout", post(logout))
}

fn session_cookie(state: &AppState, token: String) -> String {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config().secure_cookies())
        .max_age(Duration::seconds(state.sessions().ttl().num_seconds()))
        .build()
        .to_string()
}

fn cleared_cookie(state: &AppState) -> String {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config().secure_cookies())
        .max_age(Duration::ZERO)
        .build()
        .to_string()
}

#[instrument(skip(state, headers, form))]
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Submitted(form): Submitted<LoginForm>,
) -> Response {
    let json = wants_json(&headers);
    match auth::login(&state, form).await {
        Ok(outcome) => {
            set_sentry_user(&outcome.user.id, Some(outcome.user.email.as_str()));
            let cookie = session_cookie(&state, outcome.token.clone());
            if json {
                ([(header::SET_COOKIE, cookie)], Envelope::ok(outcome)).into_response()
            } else {
                ([(header::SET_COOKIE, cookie)], Redirect::to(outcome.landing_path)).into_response()
            }
        }
        Err(e) if json => e.into_response(),
        Err(_) => Redirect::to("/login?error=credentials").into_response(),
    }
}

#[instrument(skip(state, headers, form))]
async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Submitted(form): Submitted<RegisterForm>,
) -> Response {
    let result = auth::register(&state, form).await;
    if wants_json(&headers) {
        return respond_created(result);
    }
    match result {
        Ok(_) => Redirect::to("/login?success=registered").into_response(),
        Err(_) => Redirect::to("/register?error=invalid").into_response(),
    }
}

#[instrument(skip(state, headers))]
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    clear_sentry_user();
    let cookie = cleared_cookie(&state);
    if wants_json(&headers) {
        ([(header::SET_COOKIE, cookie)], Envelope::done()).into_response()
    } else {
        ([(header::SET_COOKIE, cookie)], Redirect::to("/login")).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use secrecy::SecretString;
    use url::Url;
    use warehub_core::Email;

    use super::*;
    use crate::config::{PortalConfig, StoreBackend};
    use crate::db::memory::MemoryDatabase;
    use crate::services::{DisabledFileHost, LogMailer};

    fn state() -> AppState {
        let config = PortalConfig {
            store: StoreBackend::Memory,
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: Url::parse("http://localhost:3000").unwrap(),
            session_secret: SecretString::from("k7Qp2Zr9Lw4Xv8Nc1Bt6Hy3Jm5Fd0Gs!"),
            session_ttl_hours: 24,
            admin_notification_email: Email::parse("ops@warehub.test").unwrap(),
            email: None,
            uploads: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
            tls: None,
        };
        AppState::new(
            config,
            Arc::new(MemoryDatabase::new()),
            Arc::new(LogMailer),
            Arc::new(DisabledFileHost),
        )
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie(&state(), "tok".to_owned());
        assert!(cookie.starts_with("warehub_session=tok"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=86400"));
    }

    #[test]
    fn test_cleared_cookie_expires_immediately() {
        let cookie = cleared_cookie(&state());
        assert!(cookie.starts_with("warehub_session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
