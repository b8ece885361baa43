use axum::http::StatusCode;
use thiserror::Error;
use tracing::info;

use super::insights::{self, Insights};
use super::sentiment;
use crate::db::{Mood, NewMood};
use crate::storage::{Storage, StoreError};

#[derive(Debug, Error)]
pub enum MoodError {
    #[error("entry must not be empty")]
    EmptyEntry,
    #[error("mood not found")]
    NotFound,
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl MoodError {
    pub fn status(&self) -> StatusCode {
        match self {
            MoodError::EmptyEntry => StatusCode::BAD_REQUEST,
            MoodError::NotFound => StatusCode::NOT_FOUND,
            // Session outlived its account.
            MoodError::Storage(StoreError::MissingOwner) => StatusCode::UNAUTHORIZED,
            MoodError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn public_message(&self) -> String {
        match self {
            MoodError::Storage(StoreError::MissingOwner) => "login required".into(),
            MoodError::Storage(_) => "internal error".into(),
            other => other.to_string(),
        }
    }
}

/// Scores and stores a journal entry for `user_id`.
pub async fn record_mood(
    storage: &dyn Storage,
    user_id: i64,
    entry: &str,
) -> Result<Mood, MoodError> {
    let entry = entry.trim();
    if entry.is_empty() {
        return Err(MoodError::EmptyEntry);
    }
    let scored = sentiment::analyze(entry);

    let mut session = storage.begin().await?;
    let mood = session
        .insert::<Mood>(NewMood {
            user_id,
            entry: entry.to_string(),
            sentiment: scored.label.as_str().to_string(),
            score: scored.score,
            timestamp: None,
        })
        .await?;
    session.commit().await?;

    info!(mood_id = mood.id, user_id, sentiment = %mood.sentiment, "mood recorded");
    Ok(mood)
}

pub async fn list_moods(
    storage: &dyn Storage,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<Mood>, MoodError> {
    let mut session = storage.begin().await?;
    let moods = session.moods_for_user(user_id, limit, offset).await?;
    session.rollback().await?;
    Ok(moods)
}

/// Most entries a summary looks at, newest first.
pub const INSIGHTS_WINDOW: i64 = 1000;

pub async fn insights_for(storage: &dyn Storage, user_id: i64) -> Result<Insights, MoodError> {
    let moods = list_moods(storage, user_id, INSIGHTS_WINDOW, 0).await?;
    Ok(insights::summarize(&moods))
}

/// Deletes one of the user's own moods. Someone else's mood looks the same as a
/// missing one.
pub async fn delete_mood(storage: &dyn Storage, user_id: i64, mood_id: i64) -> Result<(), MoodError> {
    let mut session = storage.begin().await?;
    let mood = session
        .find_mood(mood_id)
        .await?
        .filter(|m| m.user_id == user_id)
        .ok_or(MoodError::NotFound)?;
    session.delete(mood.key()).await?;
    session.commit().await?;
    info!(mood_id, user_id, "mood deleted");
    Ok(())
}
