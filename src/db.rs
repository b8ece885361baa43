use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::auth::password::PasswordDigest;

/// Longest sentiment label the `moods.sentiment` column accepts.
pub const SENTIMENT_MAX_LEN: usize = 10;

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, never exposed
    pub username: String,
    pub full_name: Option<String>,
}

/// A user that has not been written yet. The hash can only come from the hasher,
/// so a plaintext or empty password never reaches storage.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: PasswordDigest,
    pub username: String,
    pub full_name: Option<String>,
}

/// One mood journal entry, owned by exactly one user.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Mood {
    pub id: i64,
    pub user_id: i64,
    pub entry: String,
    pub sentiment: String,
    pub score: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewMood {
    pub user_id: i64,
    pub entry: String,
    pub sentiment: String,
    pub score: f64,
    /// Defaults to the insertion time when absent.
    pub timestamp: Option<OffsetDateTime>,
}

/// Everything the storage gateway knows how to insert.
#[derive(Debug, Clone)]
pub enum NewEntity {
    User(NewUser),
    Mood(NewMood),
}

impl From<NewUser> for NewEntity {
    fn from(u: NewUser) -> Self {
        NewEntity::User(u)
    }
}

impl From<NewMood> for NewEntity {
    fn from(m: NewMood) -> Self {
        NewEntity::Mood(m)
    }
}

/// A persisted row of one of the known entity kinds.
#[derive(Debug, Clone)]
pub enum Record {
    User(User),
    Mood(Mood),
}

impl Record {
    pub fn key(&self) -> EntityKey {
        match self {
            Record::User(u) => EntityKey::User(u.id),
            Record::Mood(m) => EntityKey::Mood(m.id),
        }
    }
}

/// Identifies a row for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKey {
    User(i64),
    Mood(i64),
}

impl Mood {
    pub fn key(&self) -> EntityKey {
        EntityKey::Mood(self.id)
    }
}
