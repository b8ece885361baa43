use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool, Postgres, Transaction,
};
use tracing::{debug, error, info};

use super::{EmailTable, Storage, StorageSession, StoreError, UniqueField};
use crate::config::DatabaseConfig;
use crate::db::{EntityKey, Mood, NewEntity, Record, User};

#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Connects and applies pending migrations.
    pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<Self> {
        let options = match cfg {
            DatabaseConfig::Url(url) => {
                PgConnectOptions::from_str(url).context("parse DATABASE_URL")?
            }
            DatabaseConfig::Parts {
                host,
                port,
                user,
                password,
                name,
            } => PgConnectOptions::new()
                .host(host)
                .port(*port)
                .username(user)
                .password(password)
                .database(name),
            DatabaseConfig::Memory => anyhow::bail!("memory database is not a postgres target"),
        };

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("run migrations")?;
        info!("database ready");

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn begin(&self) -> Result<Box<dyn StorageSession>, StoreError> {
        Ok(Box::new(PgSession {
            pool: self.pool.clone(),
            tx: None,
        }))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Holds an open transaction between `create` and `commit`; a new one starts lazily
/// after every commit or rollback.
pub struct PgSession {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgSession {
    async fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, StoreError> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => self.pool.begin().await.map_err(map_db_error)?,
        };
        Ok(self.tx.insert(tx))
    }
}

#[async_trait]
impl StorageSession for PgSession {
    async fn create(&mut self, entity: NewEntity) -> Result<Record, StoreError> {
        let tx = self.tx().await?;
        match entity {
            NewEntity::User(new) => {
                let user = sqlx::query_as::<_, User>(
                    r#"
                    INSERT INTO users (email, password_hash, username, full_name)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id, email, password_hash, username, full_name
                    "#,
                )
                .bind(&new.email)
                .bind(new.password_hash.as_str())
                .bind(&new.username)
                .bind(&new.full_name)
                .fetch_one(&mut **tx)
                .await
                .map_err(map_db_error)?;
                debug!(user_id = user.id, "user staged");
                Ok(Record::User(user))
            }
            NewEntity::Mood(new) => {
                let mood = sqlx::query_as::<_, Mood>(
                    r#"
                    INSERT INTO moods (user_id, entry, sentiment, score, timestamp)
                    VALUES ($1, $2, $3, $4, COALESCE($5, now()))
                    RETURNING id, user_id, entry, sentiment, score, timestamp
                    "#,
                )
                .bind(new.user_id)
                .bind(&new.entry)
                .bind(&new.sentiment)
                .bind(new.score)
                .bind(new.timestamp)
                .fetch_one(&mut **tx)
                .await
                .map_err(map_db_error)?;
                debug!(mood_id = mood.id, user_id = mood.user_id, "mood staged");
                Ok(Record::Mood(mood))
            }
        }
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await.map_err(map_db_error)?;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await.map_err(map_db_error)?;
        }
        Ok(())
    }

    async fn delete(&mut self, key: EntityKey) -> Result<(), StoreError> {
        let tx = self.tx().await?;
        let (sql, id) = match key {
            EntityKey::User(id) => ("DELETE FROM users WHERE id = $1", id),
            EntityKey::Mood(id) => ("DELETE FROM moods WHERE id = $1", id),
        };
        let done = sqlx::query(sql)
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(map_db_error)?;
        debug!(?key, rows = done.rows_affected(), "delete staged");
        Ok(())
    }

    async fn lookup_email(
        &mut self,
        table: EmailTable,
        email: &str,
    ) -> Result<Option<Record>, StoreError> {
        let tx = self.tx().await?;
        match table {
            EmailTable::Users => {
                // Two rows are enough to tell "one" from "many".
                let mut rows = sqlx::query_as::<_, User>(
                    r#"
                    SELECT id, email, password_hash, username, full_name
                    FROM users
                    WHERE email = $1
                    LIMIT 2
                    "#,
                )
                .bind(email)
                .fetch_all(&mut **tx)
                .await
                .map_err(map_db_error)?;
                if rows.len() > 1 {
                    error!(email = %email, "email matched more than one user");
                    return Err(StoreError::MultipleMatches);
                }
                Ok(rows.pop().map(Record::User))
            }
        }
    }

    async fn find_user(&mut self, id: i64) -> Result<Option<User>, StoreError> {
        let tx = self.tx().await?;
        sqlx::query_as::<_, User>(
            r#"SELECT id, email, password_hash, username, full_name FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_db_error)
    }

    async fn find_mood(&mut self, id: i64) -> Result<Option<Mood>, StoreError> {
        let tx = self.tx().await?;
        sqlx::query_as::<_, Mood>(
            r#"SELECT id, user_id, entry, sentiment, score, timestamp FROM moods WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_db_error)
    }

    async fn moods_for_user(
        &mut self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Mood>, StoreError> {
        let tx = self.tx().await?;
        sqlx::query_as::<_, Mood>(
            r#"
            SELECT id, user_id, entry, sentiment, score, timestamp
            FROM moods
            WHERE user_id = $1
            ORDER BY timestamp DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut **tx)
        .await
        .map_err(map_db_error)
    }
}

fn map_db_error(e: sqlx::Error) -> StoreError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return match unique_field(db.constraint()) {
                Some(field) => StoreError::Duplicate(field),
                None => StoreError::Unavailable(e.to_string()),
            };
        }
        if db.is_foreign_key_violation() {
            return StoreError::MissingOwner;
        }
    }
    error!(error = %e, "database error");
    StoreError::Unavailable(e.to_string())
}

fn unique_field(constraint: Option<&str>) -> Option<UniqueField> {
    match constraint? {
        "users_email_key" => Some(UniqueField::Email),
        "users_username_key" => Some(UniqueField::Username),
        _ => None,
    }
}
