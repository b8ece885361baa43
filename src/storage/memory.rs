use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::debug;

use super::{EmailTable, Storage, StorageSession, StoreError, UniqueField};
use crate::db::{EntityKey, Mood, NewEntity, Record, User, SENTIMENT_MAX_LEN};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    moods: BTreeMap<i64, Mood>,
    last_user_id: i64,
    last_mood_id: i64,
}

impl Tables {
    fn check_unique(&self, user: &User) -> Result<(), StoreError> {
        for other in self.users.values().filter(|u| u.id != user.id) {
            if other.email == user.email {
                return Err(StoreError::Duplicate(UniqueField::Email));
            }
            if other.username == user.username {
                return Err(StoreError::Duplicate(UniqueField::Username));
            }
        }
        Ok(())
    }

    fn remove(&mut self, key: EntityKey) {
        match key {
            EntityKey::User(id) => {
                self.users.remove(&id);
                self.moods.retain(|_, m| m.user_id != id);
            }
            EntityKey::Mood(id) => {
                self.moods.remove(&id);
            }
        }
    }

    fn insert(&mut self, record: Record) -> Result<(), StoreError> {
        match record {
            Record::User(user) => {
                self.check_unique(&user)?;
                self.users.insert(user.id, user);
            }
            Record::Mood(mood) => {
                if mood.sentiment.chars().count() > SENTIMENT_MAX_LEN {
                    return Err(StoreError::Unavailable(format!(
                        "sentiment longer than {SENTIMENT_MAX_LEN} characters"
                    )));
                }
                if !self.users.contains_key(&mood.user_id) {
                    return Err(StoreError::MissingOwner);
                }
                self.moods.insert(mood.id, mood);
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
enum Change {
    Insert(Record),
    Delete(EntityKey),
}

/// Process-local storage with the same unique, owner and cascade rules as the
/// postgres schema. Ids come from counters that, like sequences, are not rolled back.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    shared: Arc<Mutex<Tables>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn begin(&self) -> Result<Box<dyn StorageSession>, StoreError> {
        Ok(Box::new(MemorySession {
            shared: Arc::clone(&self.shared),
            changes: Vec::new(),
        }))
    }

    async fn close(&self) {}
}

pub struct MemorySession {
    shared: Arc<Mutex<Tables>>,
    changes: Vec<Change>,
}

impl MemorySession {
    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.shared
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    /// Committed state with this session's pending changes laid over it.
    fn view(&self) -> Result<Tables, StoreError> {
        let mut tables = self.lock()?.clone();
        for change in &self.changes {
            match change {
                Change::Insert(record) => tables.insert(record.clone())?,
                Change::Delete(key) => tables.remove(*key),
            }
        }
        Ok(tables)
    }
}

#[async_trait]
impl StorageSession for MemorySession {
    async fn create(&mut self, entity: NewEntity) -> Result<Record, StoreError> {
        let view = self.view()?;
        let record = match entity {
            NewEntity::User(new) => {
                let id = {
                    let mut shared = self.lock()?;
                    shared.last_user_id += 1;
                    shared.last_user_id
                };
                Record::User(User {
                    id,
                    email: new.email,
                    password_hash: new.password_hash.into_string(),
                    username: new.username,
                    full_name: new.full_name,
                })
            }
            NewEntity::Mood(new) => {
                let id = {
                    let mut shared = self.lock()?;
                    shared.last_mood_id += 1;
                    shared.last_mood_id
                };
                Record::Mood(Mood {
                    id,
                    user_id: new.user_id,
                    entry: new.entry,
                    sentiment: new.sentiment,
                    score: new.score,
                    timestamp: new.timestamp.unwrap_or_else(OffsetDateTime::now_utc),
                })
            }
        };

        // Constraint check happens at flush time, like an INSERT would.
        let mut flushed = view;
        flushed.insert(record.clone())?;
        debug!(key = ?record.key(), "staged in memory");
        self.changes.push(Change::Insert(record.clone()));
        Ok(record)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let changes = std::mem::take(&mut self.changes);
        let mut shared = self.lock()?;
        let mut next = shared.clone();
        for change in changes {
            match change {
                Change::Insert(record) => next.insert(record)?,
                Change::Delete(key) => next.remove(key),
            }
        }
        *shared = next;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.changes.clear();
        Ok(())
    }

    async fn delete(&mut self, key: EntityKey) -> Result<(), StoreError> {
        self.changes.push(Change::Delete(key));
        Ok(())
    }

    async fn lookup_email(
        &mut self,
        table: EmailTable,
        email: &str,
    ) -> Result<Option<Record>, StoreError> {
        let view = self.view()?;
        match table {
            EmailTable::Users => {
                let mut found = view.users.into_values().filter(|u| u.email == email);
                let first = found.next();
                if found.next().is_some() {
                    return Err(StoreError::MultipleMatches);
                }
                Ok(first.map(Record::User))
            }
        }
    }

    async fn find_user(&mut self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.view()?.users.remove(&id))
    }

    async fn find_mood(&mut self, id: i64) -> Result<Option<Mood>, StoreError> {
        Ok(self.view()?.moods.remove(&id))
    }

    async fn moods_for_user(
        &mut self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Mood>, StoreError> {
        let mut moods: Vec<Mood> = self
            .view()?
            .moods
            .into_values()
            .filter(|m| m.user_id == user_id)
            .collect();
        moods.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(moods
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::Hasher;
    use crate::config::PasswordConfig;
    use crate::db::{NewMood, NewUser};

    fn new_user(email: &str, username: &str) -> NewUser {
        let hasher = Hasher::new(&PasswordConfig {
            m_cost: 8,
            t_cost: 1,
            p_cost: 1,
        })
        .unwrap();
        NewUser {
            email: email.into(),
            password_hash: hasher.hash("pw1").unwrap(),
            username: username.into(),
            full_name: None,
        }
    }

    fn new_mood(user_id: i64, entry: &str, ts: OffsetDateTime) -> NewMood {
        NewMood {
            user_id,
            entry: entry.into(),
            sentiment: "neutral".into(),
            score: 0.0,
            timestamp: Some(ts),
        }
    }

    #[tokio::test]
    async fn created_rows_are_visible_before_commit_and_gone_after_rollback() {
        let storage = MemoryStorage::new();
        let mut session = storage.begin().await.unwrap();
        let user: User = session.insert(new_user("a@x.com", "alice")).await.unwrap();
        assert_eq!(user.id, 1);

        let found = session.find_by_email::<User>("a@x.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(1));

        let mut other = storage.begin().await.unwrap();
        assert!(other.find_by_email::<User>("a@x.com").await.unwrap().is_none());

        session.rollback().await.unwrap();
        assert!(session.find_by_email::<User>("a@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn commit_makes_rows_visible_to_other_sessions() {
        let storage = MemoryStorage::new();
        let mut session = storage.begin().await.unwrap();
        session.insert::<User>(new_user("a@x.com", "alice")).await.unwrap();
        session.commit().await.unwrap();

        let mut other = storage.begin().await.unwrap();
        let user = other.find_by_email::<User>("a@x.com").await.unwrap().unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(other.find_user(user.id).await.unwrap().map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn duplicate_email_and_username_rejected_at_create() {
        let storage = MemoryStorage::new();
        let mut session = storage.begin().await.unwrap();
        session.insert::<User>(new_user("a@x.com", "alice")).await.unwrap();

        let err = session
            .insert::<User>(new_user("a@x.com", "bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueField::Email)));

        let err = session
            .insert::<User>(new_user("b@x.com", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueField::Username)));
    }

    #[tokio::test]
    async fn race_loser_fails_at_commit() {
        let storage = MemoryStorage::new();
        let mut first = storage.begin().await.unwrap();
        let mut second = storage.begin().await.unwrap();
        first.insert::<User>(new_user("a@x.com", "alice")).await.unwrap();
        second.insert::<User>(new_user("a@x.com", "alice2")).await.unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueField::Email)));

        let mut check = storage.begin().await.unwrap();
        let user = check.find_by_email::<User>("a@x.com").await.unwrap().unwrap();
        assert_eq!(user.username, "alice");
    }

    #[tokio::test]
    async fn mood_requires_existing_owner() {
        let storage = MemoryStorage::new();
        let mut session = storage.begin().await.unwrap();
        let err = session
            .insert::<Mood>(new_mood(42, "hi", OffsetDateTime::now_utc()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingOwner));
    }

    #[tokio::test]
    async fn moods_listed_newest_first_with_paging() {
        let storage = MemoryStorage::new();
        let mut session = storage.begin().await.unwrap();
        let user: User = session.insert(new_user("a@x.com", "alice")).await.unwrap();
        let base = time::macros::datetime!(2024-01-01 00:00 UTC);
        for day in 0..3 {
            session
                .insert::<Mood>(new_mood(user.id, &format!("day {day}"), base + time::Duration::days(day)))
                .await
                .unwrap();
        }
        session.commit().await.unwrap();

        let moods = session.moods_for_user(user.id, 10, 0).await.unwrap();
        let entries: Vec<_> = moods.iter().map(|m| m.entry.as_str()).collect();
        assert_eq!(entries, ["day 2", "day 1", "day 0"]);

        let page = session.moods_for_user(user.id, 1, 1).await.unwrap();
        assert_eq!(page[0].entry, "day 1");
    }

    #[tokio::test]
    async fn deleting_user_cascades_to_moods_and_missing_rows_are_ignored() {
        let storage = MemoryStorage::new();
        let mut session = storage.begin().await.unwrap();
        let user: User = session.insert(new_user("a@x.com", "alice")).await.unwrap();
        let mood: Mood = session
            .insert(new_mood(user.id, "hi", OffsetDateTime::now_utc()))
            .await
            .unwrap();
        session.commit().await.unwrap();

        session.delete(EntityKey::Mood(999)).await.unwrap();
        session.delete(EntityKey::User(user.id)).await.unwrap();
        assert!(session.find_mood(mood.id).await.unwrap().is_none());
        session.commit().await.unwrap();

        let mut other = storage.begin().await.unwrap();
        assert!(other.find_user(user.id).await.unwrap().is_none());
        assert!(other.find_mood(mood.id).await.unwrap().is_none());
    }
}
