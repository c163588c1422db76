use chrono::Utc;
use tracing::instrument;

use hive_core::{User, UserId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// Stored user row. Credential material never leaves this crate as part of a
/// wire type; callers convert to the public profile with [`UserRecord::to_user`].
#[derive(Clone, Debug)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub password_salt: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: String,
}

impl UserRecord {
    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            created_at: self.created_at.clone(),
        }
    }
}

/// Insert parameters. Password material arrives already hashed.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub password_salt: String,
    pub first_name: String,
    pub last_name: String,
}

pub struct UserRepo {
    db: Database,
}

impl UserRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new user. Duplicate email or username maps to `Conflict`.
    #[instrument(skip(self, new), fields(email = %new.email, username = %new.username))]
    pub fn create(&self, new: &NewUser) -> Result<UserRecord, StoreError> {
        let id = UserId::new();
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, username, password_hash, password_salt,
                                    first_name, last_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    id.as_str(),
                    new.email,
                    new.username,
                    new.password_hash,
                    new.password_salt,
                    new.first_name,
                    new.last_name,
                    now,
                ],
            )?;

            Ok(UserRecord {
                id,
                email: new.email.clone(),
                username: new.username.clone(),
                password_hash: new.password_hash.clone(),
                password_salt: new.password_salt.clone(),
                first_name: new.first_name.clone(),
                last_name: new.last_name.clone(),
                created_at: now,
            })
        })
    }

    /// Get a user by ID.
    #[instrument(skip(self), fields(user_id = %id))]
    pub fn get(&self, id: &UserId) -> Result<UserRecord, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id = ?1"
            ))?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_user(row),
                None => Err(StoreError::NotFound(format!("user {id}"))),
            }
        })
    }

    /// Look a user up by email or username in one query; login accepts either.
    #[instrument(skip(self), fields(identifier = %identifier))]
    pub fn get_by_identifier(&self, identifier: &str) -> Result<UserRecord, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE email = ?1 OR username = ?1"
            ))?;
            let mut rows = stmt.query([identifier])?;
            match rows.next()? {
                Some(row) => row_to_user(row),
                None => Err(StoreError::NotFound(format!("user {identifier}"))),
            }
        })
    }
}

const USER_COLUMNS: &str =
    "id, email, username, password_hash, password_salt, first_name, last_name, created_at";

fn row_to_user(row: &rusqlite::Row<'_>) -> Result<UserRecord, StoreError> {
    Ok(UserRecord {
        id: UserId::from_raw(row_helpers::get::<String>(row, 0, "users", "id")?),
        email: row_helpers::get(row, 1, "users", "email")?,
        username: row_helpers::get(row, 2, "users", "username")?,
        password_hash: row_helpers::get(row, 3, "users", "password_hash")?,
        password_salt: row_helpers::get(row, 4, "users", "password_salt")?,
        first_name: row_helpers::get(row, 5, "users", "first_name")?,
        last_name: row_helpers::get(row, 6, "users", "last_name")?,
        created_at: row_helpers::get(row, 7, "users", "created_at")?,
    })
}
