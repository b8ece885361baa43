//! Storage gateway: every read and write of users and moods goes through a
//! [`StorageSession`] opened from the process-wide [`Storage`].

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::{EntityKey, Mood, NewEntity, NewMood, NewUser, Record, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

/// Unique columns whose violation is reported back to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Username,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniqueField::Email => f.write_str("email"),
            UniqueField::Username => f.write_str("username"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    Duplicate(UniqueField),
    #[error("owning user does not exist")]
    MissingOwner,
    #[error("more than one row matched")]
    MultipleMatches,
    #[error("unexpected record kind")]
    UnexpectedKind,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Tables that carry an `email` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailTable {
    Users,
}

/// An entity kind the gateway can insert and hand back.
pub trait Stored: Sized {
    type New: Into<NewEntity> + Send;

    fn from_record(record: Record) -> Option<Self>;
}

/// Entity kinds that can be looked up by email. Only implemented for kinds with an
/// email column, so asking for anything else does not compile.
pub trait EmailKeyed: Stored {
    const TABLE: EmailTable;
}

impl Stored for User {
    type New = NewUser;

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::User(u) => Some(u),
            Record::Mood(_) => None,
        }
    }
}

impl EmailKeyed for User {
    const TABLE: EmailTable = EmailTable::Users;
}

impl Stored for Mood {
    type New = NewMood;

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::Mood(m) => Some(m),
            Record::User(_) => None,
        }
    }
}

/// Opened once at startup and shared by every request.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StorageSession>, StoreError>;
    async fn close(&self);
}

/// One unit of work. Changes become durable on [`commit`](StorageSession::commit);
/// dropping the session discards anything uncommitted. A session stays usable after
/// a commit or rollback.
#[async_trait]
pub trait StorageSession: Send {
    /// Stages and flushes a new row; it is visible to this session right away.
    async fn create(&mut self, entity: NewEntity) -> Result<Record, StoreError>;
    async fn commit(&mut self) -> Result<(), StoreError>;
    async fn rollback(&mut self) -> Result<(), StoreError>;
    /// Stages removal. Absent rows are ignored; a user's moods go with it.
    async fn delete(&mut self, key: EntityKey) -> Result<(), StoreError>;
    async fn lookup_email(
        &mut self,
        table: EmailTable,
        email: &str,
    ) -> Result<Option<Record>, StoreError>;
    async fn find_user(&mut self, id: i64) -> Result<Option<User>, StoreError>;
    async fn find_mood(&mut self, id: i64) -> Result<Option<Mood>, StoreError>;
    /// Newest first.
    async fn moods_for_user(
        &mut self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Mood>, StoreError>;
}

impl dyn StorageSession + '_ {
    pub async fn insert<E: Stored>(&mut self, new: E::New) -> Result<E, StoreError> {
        let record = self.create(new.into()).await?;
        E::from_record(record).ok_or(StoreError::UnexpectedKind)
    }

    pub async fn find_by_email<E: EmailKeyed>(
        &mut self,
        email: &str,
    ) -> Result<Option<E>, StoreError> {
        match self.lookup_email(E::TABLE, email).await? {
            Some(record) => E::from_record(record)
                .map(Some)
                .ok_or(StoreError::UnexpectedKind),
            None => Ok(None),
        }
    }
}
