use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{info, warn};

use crate::error::{EnrichError, Result};
use crate::store::quote_ident;

/// An authenticated user. Created by [`UserStore::login`], handed explicitly
/// to every handler that needs a logged-in user, ended by [`Session::logout`].
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: i64,
    pub username: String,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn logout(self) {
        info!(
            action = "logout",
            component = "session",
            username = %self.username,
            session_secs = (Utc::now() - self.started_at).num_seconds(),
            "Session ended"
        );
    }
}

/// Registration form for [`UserStore::create_user`].
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub secret_question: &'a str,
    pub secret_answer: &'a str,
}

pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Credential store kept in a table next to the traffic data.
pub struct UserStore {
    conn: Connection,
    table: String,
}

impl UserStore {
    pub fn open(path: &Path, table: &str) -> Result<Self> {
        Self::from_connection(Connection::open(path)?, table)
    }

    pub fn from_connection(conn: Connection, table: &str) -> Result<Self> {
        let store = Self {
            conn,
            table: table.to_string(),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<()> {
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                password TEXT NOT NULL,
                secret_question TEXT NOT NULL,
                secret_answer TEXT NOT NULL
            )",
            quote_ident(&self.table)
        ))?;
        Ok(())
    }

    pub fn create_user(&self, user: &NewUser<'_>) -> Result<i64> {
        if user.username.trim().is_empty() || user.password.is_empty() {
            return Err(EnrichError::validation("username and password are required"));
        }
        if self.find_id(user.username)?.is_some() {
            return Err(EnrichError::validation(format!(
                "user '{}' already exists",
                user.username
            )));
        }

        self.conn.execute(
            &format!(
                "INSERT INTO {} (username, email, password, secret_question, secret_answer)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                quote_ident(&self.table)
            ),
            params![
                user.username,
                user.email,
                hash_secret(user.password),
                user.secret_question,
                hash_secret(user.secret_answer)
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(action = "create", component = "users", username = user.username, user_id = id, "User registered");
        Ok(id)
    }

    pub fn login(&self, username: &str, password: &str) -> Result<Session> {
        let user_id: Option<i64> = self
            .conn
            .query_row(
                &format!(
                    "SELECT id FROM {} WHERE username = ?1 AND password = ?2",
                    quote_ident(&self.table)
                ),
                params![username, hash_secret(password)],
                |row| row.get(0),
            )
            .optional()?;

        match user_id {
            Some(user_id) => {
                info!(action = "login", component = "session", username = username, user_id, "Session started");
                Ok(Session {
                    user_id,
                    username: username.to_string(),
                    started_at: Utc::now(),
                })
            }
            None => {
                warn!(action = "login", component = "session", username = username, "Invalid credentials");
                Err(EnrichError::Auth(username.to_string()))
            }
        }
    }

    pub fn reset_password(
        &self,
        username: &str,
        secret_question: &str,
        secret_answer: &str,
        new_password: &str,
    ) -> Result<()> {
        if new_password.is_empty() {
            return Err(EnrichError::validation("new password must not be empty"));
        }

        let user_id: Option<i64> = self
            .conn
            .query_row(
                &format!(
                    "SELECT id FROM {} WHERE username = ?1 AND secret_question = ?2 AND secret_answer = ?3",
                    quote_ident(&self.table)
                ),
                params![username, secret_question, hash_secret(secret_answer)],
                |row| row.get(0),
            )
            .optional()?;

        let Some(user_id) = user_id else {
            warn!(action = "reset", component = "users", username = username, "Recovery answers did not match");
            return Err(EnrichError::Auth(username.to_string()));
        };

        self.conn.execute(
            &format!(
                "UPDATE {} SET password = ?1 WHERE id = ?2",
                quote_ident(&self.table)
            ),
            params![hash_secret(new_password), user_id],
        )?;
        info!(action = "reset", component = "users", username = username, user_id, "Password updated");
        Ok(())
    }

    fn find_id(&self, username: &str) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT id FROM {} WHERE username = ?1",
                    quote_ident(&self.table)
                ),
                params![username],
                |row| row.get(0),
            )
            .optional()?)
    }
}
