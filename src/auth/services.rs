use axum::http::StatusCode;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::auth::dto::{LoginForm, RegisterForm};
use crate::auth::password::Hasher;
use crate::db::{NewUser, User};
use crate::storage::{Storage, StorageSession, StoreError, UniqueField};

pub const INVALID_CREDENTIALS: &str = "Invalid email or password.";
const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";
const USERNAME_MAX_LEN: usize = 80;
const FULL_NAME_MAX_LEN: usize = 120;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Passwords do not match!")]
    PasswordMismatch,
    #[error("Please enter a valid email address.")]
    InvalidEmail,
    #[error("Username is required.")]
    MissingUsername,
    #[error("Username must be at most 80 characters.")]
    UsernameTooLong,
    #[error("Full name must be at most 120 characters.")]
    FullNameTooLong,
    #[error("Password is required.")]
    MissingPassword,
    #[error("Email already registered!")]
    DuplicateEmail,
    #[error("Username already taken!")]
    DuplicateUsername,
    #[error("Invalid email or password.")]
    InvalidCredentials,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("session could not be established: {0}")]
    Session(String),
    #[error(transparent)]
    Storage(StoreError),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(UniqueField::Email) => AuthError::DuplicateEmail,
            StoreError::Duplicate(UniqueField::Username) => AuthError::DuplicateUsername,
            other => AuthError::Storage(other),
        }
    }
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::PasswordMismatch
            | AuthError::InvalidEmail
            | AuthError::MissingUsername
            | AuthError::UsernameTooLong
            | AuthError::FullNameTooLong
            | AuthError::MissingPassword => StatusCode::BAD_REQUEST,
            AuthError::DuplicateEmail | AuthError::DuplicateUsername => StatusCode::CONFLICT,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::Hashing(_) | AuthError::Session(_) | AuthError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Text safe to show the user; internal failures carry no detail.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::Hashing(_) | AuthError::Session(_) | AuthError::Storage(_) => {
                GENERIC_FAILURE.to_string()
            }
            other => other.to_string(),
        }
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    email.len() <= 255 && EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Registers a new account. Nothing is written unless every check passes; a
/// duplicate that slips past the email pre-check is caught by the unique
/// constraints at create or commit time.
#[instrument(skip(storage, hasher, form))]
pub async fn register(
    storage: &dyn Storage,
    hasher: &Hasher,
    form: RegisterForm,
) -> Result<User, AuthError> {
    if form.password != form.confirm_password {
        warn!("password confirmation mismatch");
        return Err(AuthError::PasswordMismatch);
    }

    let email = normalize_email(&form.email);
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AuthError::InvalidEmail);
    }
    let username = form.username.trim().to_string();
    if username.is_empty() {
        return Err(AuthError::MissingUsername);
    }
    if username.chars().count() > USERNAME_MAX_LEN {
        return Err(AuthError::UsernameTooLong);
    }
    if form.password.is_empty() {
        return Err(AuthError::MissingPassword);
    }
    let full_name = form
        .full_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    if full_name
        .as_ref()
        .is_some_and(|n| n.chars().count() > FULL_NAME_MAX_LEN)
    {
        return Err(AuthError::FullNameTooLong);
    }

    let mut session = storage.begin().await?;

    if session.find_by_email::<User>(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AuthError::DuplicateEmail);
    }

    let password_hash = hasher
        .hash(&form.password)
        .map_err(|e| AuthError::Hashing(e.to_string()))?;

    let new_user = NewUser {
        email,
        password_hash,
        username,
        full_name,
    };
    let user = match session.insert::<User>(new_user).await {
        Ok(user) => user,
        Err(e) => return Err(abandon(session.as_mut(), e).await),
    };
    if let Err(e) = session.commit().await {
        return Err(abandon(session.as_mut(), e).await);
    }

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Checks credentials. Both failure cases produce the same error and roughly the
/// same amount of work.
#[instrument(skip(storage, hasher, form))]
pub async fn login(
    storage: &dyn Storage,
    hasher: &Hasher,
    form: LoginForm,
) -> Result<User, AuthError> {
    let email = normalize_email(&form.email);

    let mut session = storage.begin().await?;
    let found = session.find_by_email::<User>(&email).await?;
    session.rollback().await?;

    let Some(user) = found else {
        hasher.verify_dummy(&form.password);
        warn!(email = %email, "login unknown email");
        return Err(AuthError::InvalidCredentials);
    };

    match hasher.verify(&form.password, &user.password_hash) {
        Ok(true) => {
            info!(user_id = user.id, "user logged in");
            Ok(user)
        }
        Ok(false) => {
            warn!(user_id = user.id, "login invalid password");
            Err(AuthError::InvalidCredentials)
        }
        Err(e) => {
            error!(error = %e, user_id = user.id, "stored password hash unreadable");
            Err(AuthError::InvalidCredentials)
        }
    }
}

async fn abandon(session: &mut dyn StorageSession, cause: StoreError) -> AuthError {
    if let Err(e) = session.rollback().await {
        warn!(error = %e, "rollback after failed registration");
    }
    match &cause {
        StoreError::Duplicate(field) => warn!(%field, "unique constraint rejected registration"),
        other => error!(error = %other, "registration write failed"),
    }
    cause.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PasswordConfig;
    use crate::db::{EntityKey, Mood, NewEntity, Record};
    use crate::storage::{EmailTable, MemoryStorage};

    fn hasher() -> Hasher {
        Hasher::new(&PasswordConfig {
            m_cost: 8,
            t_cost: 1,
            p_cost: 1,
        })
        .unwrap()
    }

    fn form(email: &str, password: &str, confirm: &str, username: &str) -> RegisterForm {
        RegisterForm {
            email: email.into(),
            password: password.into(),
            confirm_password: confirm.into(),
            username: username.into(),
            full_name: None,
        }
    }

    fn login_form(email: &str, password: &str) -> LoginForm {
        LoginForm {
            email: email.into(),
            password: password.into(),
        }
    }

    async fn user_count(storage: &MemoryStorage, email: &str) -> usize {
        let mut session = storage.begin().await.unwrap();
        session
            .find_by_email::<User>(email)
            .await
            .unwrap()
            .into_iter()
            .count()
    }

    #[tokio::test]
    async fn register_then_login() {
        let storage = MemoryStorage::new();
        let hasher = hasher();
        let user = register(&storage, &hasher, form("a@x.com", "pw1", "pw1", "alice"))
            .await
            .expect("registered");
        assert_eq!(user.email, "a@x.com");
        assert_ne!(user.password_hash, "pw1");

        let logged = login(&storage, &hasher, login_form("a@x.com", "pw1"))
            .await
            .expect("logged in");
        assert_eq!(logged.id, user.id);
    }

    #[tokio::test]
    async fn email_is_normalized() {
        let storage = MemoryStorage::new();
        let hasher = hasher();
        let mut f = form("  A@X.com ", "pw1", "pw1", " alice ");
        f.full_name = Some("  ".into());
        let user = register(&storage, &hasher, f).await.unwrap();
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.username, "alice");
        assert_eq!(user.full_name, None);
        assert!(login(&storage, &hasher, login_form("A@x.COM", "pw1")).await.is_ok());
    }

    #[tokio::test]
    async fn mismatch_persists_nothing() {
        let storage = MemoryStorage::new();
        let err = register(&storage, &hasher(), form("a@x.com", "pw1", "pw2", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::PasswordMismatch));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(user_count(&storage, "a@x.com").await, 0);
    }

    #[tokio::test]
    async fn duplicate_email_rejected_and_single_row_kept() {
        let storage = MemoryStorage::new();
        let hasher = hasher();
        register(&storage, &hasher, form("a@x.com", "pw1", "pw1", "alice"))
            .await
            .unwrap();
        let err = register(&storage, &hasher, form("a@x.com", "pw2", "pw2", "other"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail));
        assert_eq!(err.public_message(), "Email already registered!");
        assert_eq!(user_count(&storage, "a@x.com").await, 1);
    }

    #[tokio::test]
    async fn duplicate_username_is_reported_not_fatal() {
        let storage = MemoryStorage::new();
        let hasher = hasher();
        register(&storage, &hasher, form("a@x.com", "pw1", "pw1", "alice"))
            .await
            .unwrap();
        let err = register(&storage, &hasher, form("b@x.com", "pw1", "pw1", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUsername));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(user_count(&storage, "b@x.com").await, 0);
    }

    #[tokio::test]
    async fn rejects_malformed_input() {
        let storage = MemoryStorage::new();
        let hasher = hasher();
        let err = register(&storage, &hasher, form("nope", "pw1", "pw1", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidEmail));
        let err = register(&storage, &hasher, form("a@x.com", "pw1", "pw1", "  "))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingUsername));
        let err = register(&storage, &hasher, form("a@x.com", "", "", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingPassword));
    }

    #[tokio::test]
    async fn overlong_names_are_rejected_not_truncated() {
        let storage = MemoryStorage::new();
        let hasher = hasher();
        let err = register(&storage, &hasher, form("a@x.com", "pw1", "pw1", &"u".repeat(81)))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UsernameTooLong));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_ne!(err.public_message(), AuthError::MissingUsername.public_message());

        let mut f = form("a@x.com", "pw1", "pw1", "alice");
        f.full_name = Some("n".repeat(200));
        let err = register(&storage, &hasher, f).await.unwrap_err();
        assert!(matches!(err, AuthError::FullNameTooLong));
        assert_eq!(user_count(&storage, "a@x.com").await, 0);

        let mut f = form("a@x.com", "pw1", "pw1", &"u".repeat(80));
        f.full_name = Some("n".repeat(120));
        let user = register(&storage, &hasher, f).await.unwrap();
        assert_eq!(user.full_name.map(|n| n.len()), Some(120));
    }

    /// Storage whose email lookups never see anything, so a duplicate reaches
    /// the unique constraint the way a concurrent registration would.
    struct BlindLookup(MemoryStorage);

    struct BlindSession(Box<dyn StorageSession>);

    #[async_trait::async_trait]
    impl Storage for BlindLookup {
        async fn begin(&self) -> Result<Box<dyn StorageSession>, StoreError> {
            Ok(Box::new(BlindSession(self.0.begin().await?)))
        }

        async fn close(&self) {}
    }

    #[async_trait::async_trait]
    impl StorageSession for BlindSession {
        async fn create(&mut self, entity: NewEntity) -> Result<Record, StoreError> {
            self.0.create(entity).await
        }
        async fn commit(&mut self) -> Result<(), StoreError> {
            self.0.commit().await
        }
        async fn rollback(&mut self) -> Result<(), StoreError> {
            self.0.rollback().await
        }
        async fn delete(&mut self, key: EntityKey) -> Result<(), StoreError> {
            self.0.delete(key).await
        }
        async fn lookup_email(
            &mut self,
            _table: EmailTable,
            _email: &str,
        ) -> Result<Option<Record>, StoreError> {
            Ok(None)
        }
        async fn find_user(&mut self, id: i64) -> Result<Option<User>, StoreError> {
            self.0.find_user(id).await
        }
        async fn find_mood(&mut self, id: i64) -> Result<Option<Mood>, StoreError> {
            self.0.find_mood(id).await
        }
        async fn moods_for_user(
            &mut self,
            user_id: i64,
            limit: i64,
            offset: i64,
        ) -> Result<Vec<Mood>, StoreError> {
            self.0.moods_for_user(user_id, limit, offset).await
        }
    }

    #[tokio::test]
    async fn duplicate_missed_by_precheck_fails_at_write() {
        let storage = MemoryStorage::new();
        let hasher = hasher();
        register(&storage, &hasher, form("a@x.com", "pw1", "pw1", "alice"))
            .await
            .unwrap();

        let blind = BlindLookup(storage.clone());
        let err = register(&blind, &hasher, form("a@x.com", "pw2", "pw2", "bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(user_count(&storage, "a@x.com").await, 1);

        let mut session = storage.begin().await.unwrap();
        let kept = session.find_by_email::<User>("a@x.com").await.unwrap().unwrap();
        assert_eq!(kept.username, "alice");
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let storage = MemoryStorage::new();
        let hasher = hasher();
        register(&storage, &hasher, form("a@x.com", "pw1", "pw1", "alice"))
            .await
            .unwrap();

        let wrong_pw = login(&storage, &hasher, login_form("a@x.com", "wrong"))
            .await
            .unwrap_err();
        let no_user = login(&storage, &hasher, login_form("nobody@x.com", "pw1"))
            .await
            .unwrap_err();
        assert_eq!(wrong_pw.public_message(), no_user.public_message());
        assert_eq!(wrong_pw.status(), no_user.status());
        assert_eq!(wrong_pw.public_message(), INVALID_CREDENTIALS);
    }

    #[test]
    fn storage_failures_hide_detail() {
        let err = AuthError::from(StoreError::Unavailable("connection refused to 10.0.0.5".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.public_message().contains("10.0.0.5"));
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email(""));
    }
}
