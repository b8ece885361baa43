use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{delete, get},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, instrument, warn};

use super::dto::{CreateMoodRequest, Pagination};
use super::insights::{self, Insights};
use super::services::{self, MoodError, INSIGHTS_WINDOW};
use crate::{
    auth::{
        extractors::{ApiUser, CurrentUser},
        session,
    },
    db::Mood,
    flash,
    state::AppState,
    views::{self, Notice},
};

const DASHBOARD_MOODS: usize = 5;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/moods", get(list_moods).post(create_mood))
        .route("/moods/insights", get(mood_insights))
        .route("/moods/:id", delete(delete_mood))
}

pub fn page_routes() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

#[instrument(skip(state))]
pub async fn list_moods(
    State(state): State<AppState>,
    ApiUser(user): ApiUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<Mood>>, (StatusCode, String)> {
    let (limit, offset) = p.clamped();
    services::list_moods(state.storage.as_ref(), user.id, limit, offset)
        .await
        .map(Json)
        .map_err(reject)
}

#[instrument(skip(state))]
pub async fn mood_insights(
    State(state): State<AppState>,
    ApiUser(user): ApiUser,
) -> Result<Json<Insights>, (StatusCode, String)> {
    services::insights_for(state.storage.as_ref(), user.id)
        .await
        .map(Json)
        .map_err(reject)
}

#[instrument(skip(state, body))]
pub async fn create_mood(
    State(state): State<AppState>,
    ApiUser(user): ApiUser,
    Json(body): Json<CreateMoodRequest>,
) -> Result<(StatusCode, Json<Mood>), (StatusCode, String)> {
    let mood = services::record_mood(state.storage.as_ref(), user.id, &body.entry)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(mood)))
}

#[instrument(skip(state))]
pub async fn delete_mood(
    State(state): State<AppState>,
    ApiUser(user): ApiUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    services::delete_mood(state.storage.as_ref(), user.id, id)
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, jar))]
pub async fn dashboard(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
) -> Response {
    let loaded = async {
        let mut session = state.storage.begin().await?;
        let user = session.find_user(current.id).await?;
        let moods = session.moods_for_user(current.id, INSIGHTS_WINDOW, 0).await?;
        session.rollback().await?;
        Ok::<_, crate::storage::StoreError>((user, moods))
    }
    .await;

    match loaded {
        Ok((Some(user), moods)) => {
            let summary = insights::summarize(&moods);
            let recent = &moods[..moods.len().min(DASHBOARD_MOODS)];
            let (jar, pending) = flash::take(jar);
            let notice = pending.map(|f| Notice::success(f.message()));
            (jar, views::dashboard(&user, recent, &summary, notice.as_ref())).into_response()
        }
        Ok((None, _)) => {
            warn!(user_id = current.id, "session for a user that no longer exists");
            (session::clear(jar), Redirect::to("/login")).into_response()
        }
        Err(e) => {
            error!(error = %e, user_id = current.id, "dashboard load failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong. Please try again.",
            )
                .into_response()
        }
    }
}

fn reject(e: MoodError) -> (StatusCode, String) {
    if e.status().is_server_error() {
        error!(error = %e, "mood request failed");
    }
    (e.status(), e.public_message())
}
