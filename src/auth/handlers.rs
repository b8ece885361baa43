use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, info, instrument};

use crate::{
    auth::{
        dto::{LoginForm, RegisterForm},
        services::{self, AuthError},
        session,
    },
    flash::{self, Flash},
    state::AppState,
    views::{self, Notice},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", get(register_page).post(register))
        .route("/login", get(login_page).post(login))
        .route("/logout", get(logout))
}

pub async fn register_page() -> impl IntoResponse {
    views::register_form(None)
}

#[instrument(skip(state, jar, form))]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Response {
    match services::register(state.storage.as_ref(), &state.hasher, form).await {
        Ok(user) => {
            info!(user_id = user.id, "registration complete, redirecting to login");
            (flash::set(jar, Flash::Registered), Redirect::to("/login")).into_response()
        }
        Err(e) => {
            log_failure(&e);
            let notice = Notice::error(e.public_message());
            (e.status(), views::register_form(Some(&notice))).into_response()
        }
    }
}

pub async fn login_page(jar: CookieJar) -> impl IntoResponse {
    let (jar, pending) = flash::take(jar);
    let notice = pending.map(|f| Notice::success(f.message()));
    (jar, views::login_form(notice.as_ref()))
}

#[instrument(skip(state, jar, form))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let user = match services::login(state.storage.as_ref(), &state.hasher, form).await {
        Ok(u) => u,
        Err(e) => {
            log_failure(&e);
            let notice = Notice::error(e.public_message());
            return (e.status(), views::login_form(Some(&notice))).into_response();
        }
    };

    match state.sessions.establish(jar, &user) {
        Ok(jar) => (flash::set(jar, Flash::LoggedIn), Redirect::to("/dashboard")).into_response(),
        Err(e) => {
            error!(error = %e, user_id = user.id, "session token signing failed");
            let err = AuthError::Session(e.to_string());
            let notice = Notice::error(err.public_message());
            (err.status(), views::login_form(Some(&notice))).into_response()
        }
    }
}

/// Always ends without a session, whether or not one existed.
#[instrument(skip(state, jar))]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(claims) = state.sessions.current(&jar) {
        info!(user_id = claims.sub, "user logged out");
    }
    let jar = flash::set(session::clear(jar), Flash::LoggedOut);
    (jar, Redirect::to("/")).into_response()
}

fn log_failure(e: &AuthError) {
    if e.status().is_server_error() {
        error!(error = %e, "auth request failed");
    } else {
        info!(reason = %e, "auth request rejected");
    }
}
