use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::Redirect,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, warn};

use crate::state::AppState;
use crate::storage::{Storage, StoreError};

/// The user bound to a valid session cookie. Pages that need it send anonymous
/// visitors to the login form.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        state
            .sessions
            .current(&jar)
            .map(|claims| CurrentUser {
                id: claims.sub,
                username: claims.name,
            })
            .ok_or_else(|| Redirect::to("/login"))
    }
}

/// Same as [`CurrentUser`] for the JSON API, which answers 401 instead of
/// redirecting. The account must still exist.
pub struct ApiUser(pub CurrentUser);

fn login_required() -> (StatusCode, String) {
    (StatusCode::UNAUTHORIZED, "login required".to_string())
}

async fn user_exists(storage: &dyn Storage, id: i64) -> Result<bool, StoreError> {
    let mut session = storage.begin().await?;
    let found = session.find_user(id).await?;
    session.rollback().await?;
    Ok(found.is_some())
}

#[async_trait]
impl FromRequestParts<AppState> for ApiUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state)
            .await
            .map_err(|_| login_required())?;
        match user_exists(state.storage.as_ref(), current.id).await {
            Ok(true) => Ok(ApiUser(current)),
            Ok(false) => {
                warn!(user_id = current.id, "session for a user that no longer exists");
                Err(login_required())
            }
            Err(e) => {
                error!(error = %e, user_id = current.id, "session user lookup failed");
                Err((StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string()))
            }
        }
    }
}
