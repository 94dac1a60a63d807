//! # SQLite Record Store
//!
//! Persists birthdays in a single SQLite file. Statements are serialized behind
//! an async mutex; each operation is one statement, so no transactions are needed.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use sqlite::{Connection, State, Statement};
use tokio::sync::Mutex;

use crate::core::StoreError;
use crate::features::birthdays::query::{Filter, ORDER_BY};
use crate::features::birthdays::{Birthday, BirthdayStore, ConversationId};

/// SQLITE_CONSTRAINT primary result code
const SQLITE_CONSTRAINT: isize = 19;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS birthdays (
        chat_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        day INTEGER NOT NULL,
        month INTEGER NOT NULL,
        UNIQUE (chat_id, name)
    );
    CREATE INDEX IF NOT EXISTS idx_birthdays_calendar ON birthdays (month, day);
    CREATE TABLE IF NOT EXISTS accounts (
        login TEXT PRIMARY KEY,
        password TEXT NOT NULL
    );
";

const INSERT_SQL: &str = "INSERT INTO birthdays (chat_id, name, day, month) VALUES (?1, ?2, ?3, ?4)";
const SELECT_NAME_SQL: &str =
    "SELECT chat_id, name, day, month FROM birthdays WHERE chat_id = ?1 AND name = ?2";
const SELECT_ON_SQL: &str = "SELECT chat_id, name, day, month FROM birthdays WHERE day = ?1 AND month = ?2";
const SELECT_SCOPED_SQL: &str = "SELECT chat_id, name, day, month FROM birthdays WHERE chat_id = ?1";
const UPDATE_NAME_SQL: &str = "UPDATE birthdays SET name = ?1 WHERE chat_id = ?2 AND name = ?3";
const UPDATE_DATE_SQL: &str =
    "UPDATE birthdays SET day = ?1, month = ?2 WHERE chat_id = ?3 AND name = ?4";
const DELETE_SQL: &str = "DELETE FROM birthdays WHERE chat_id = ?1 AND name = ?2";
const AUTH_SQL: &str = "SELECT password FROM accounts WHERE login = ?1";

#[derive(Clone)]
pub struct Database {
    connection: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file and make sure the schema exists.
    /// `:memory:` gives a private in-memory database.
    pub async fn new(path: &str) -> Result<Self> {
        let connection =
            sqlite::open(path).with_context(|| format!("Failed to open database at {path}"))?;
        connection
            .execute(SCHEMA)
            .context("Failed to initialize birthday schema")?;

        info!("💾 Database ready at {path}");
        Ok(Database {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Stored password for a login, if any.
    ///
    /// Not used by any dialog flow; kept for a future authentication hook.
    pub async fn password_for(&self, login: &str) -> Result<Option<String>, StoreError> {
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare(AUTH_SQL)?;
        statement.bind((1, login))?;
        if let State::Row = statement.next()? {
            Ok(Some(statement.read::<String, _>(0)?))
        } else {
            Ok(None)
        }
    }

    fn execute_keyed(connection: &Connection, statement: Statement<'_>) -> Result<bool, StoreError> {
        let mut statement = statement;
        while let State::Row = statement.next()? {}
        drop(statement);
        Ok(Self::changes(connection)? > 0)
    }

    fn changes(connection: &Connection) -> Result<i64, StoreError> {
        let mut statement = connection.prepare("SELECT changes()")?;
        statement.next()?;
        Ok(statement.read::<i64, _>(0)?)
    }

    fn collect(mut statement: Statement<'_>) -> Result<Vec<Birthday>, StoreError> {
        let mut birthdays = Vec::new();
        while let State::Row = statement.next()? {
            birthdays.push(Self::read_birthday(&statement)?);
        }
        Ok(birthdays)
    }

    fn read_birthday(statement: &Statement<'_>) -> Result<Birthday, StoreError> {
        let conversation_id = statement.read::<i64, _>(0)?;
        let name = statement.read::<String, _>(1)?;
        let day = statement.read::<i64, _>(2)?;
        let month = statement.read::<i64, _>(3)?;

        let day = u32::try_from(day)
            .map_err(|_| StoreError::Corrupt(format!("day {day} for '{name}'")))?;
        let month = u32::try_from(month)
            .map_err(|_| StoreError::Corrupt(format!("month {month} for '{name}'")))?;

        Ok(Birthday {
            conversation_id,
            name,
            day,
            month,
        })
    }

    fn is_constraint_violation(err: &sqlite::Error) -> bool {
        // Extended result codes keep the primary code in the low byte
        err.code.map(|code| code & 0xff) == Some(SQLITE_CONSTRAINT)
    }
}

#[async_trait]
impl BirthdayStore for Database {
    async fn create(&self, birthday: &Birthday) -> Result<(), StoreError> {
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare(INSERT_SQL)?;
        statement.bind((1, birthday.conversation_id))?;
        statement.bind((2, birthday.name.as_str()))?;
        statement.bind((3, i64::from(birthday.day)))?;
        statement.bind((4, i64::from(birthday.month)))?;

        match statement.next() {
            Ok(_) => {
                debug!(
                    "[{}] Inserted birthday '{}' ({})",
                    birthday.conversation_id,
                    birthday.name,
                    birthday.date_label()
                );
                Ok(())
            }
            Err(e) if Self::is_constraint_violation(&e) => Err(StoreError::DuplicateKey {
                conversation_id: birthday.conversation_id,
                name: birthday.name.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_name(
        &self,
        conversation_id: ConversationId,
        name: &str,
    ) -> Result<Option<Birthday>, StoreError> {
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare(SELECT_NAME_SQL)?;
        statement.bind((1, conversation_id))?;
        statement.bind((2, name))?;

        if let State::Row = statement.next()? {
            Ok(Some(Self::read_birthday(&statement)?))
        } else {
            Ok(None)
        }
    }

    async fn find_on_calendar_day(&self, day: u32, month: u32) -> Result<Vec<Birthday>, StoreError> {
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare(SELECT_ON_SQL)?;
        statement.bind((1, i64::from(day)))?;
        statement.bind((2, i64::from(month)))?;
        Self::collect(statement)
    }

    async fn search(
        &self,
        conversation_id: ConversationId,
        filter: &Filter,
    ) -> Result<Vec<Birthday>, StoreError> {
        let sql = format!("{SELECT_SCOPED_SQL}{}{ORDER_BY}", filter.predicate());

        let connection = self.connection.lock().await;
        let mut statement = connection.prepare(sql)?;
        statement.bind((1, conversation_id))?;
        match filter {
            Filter::All => {}
            Filter::NameContains(pattern) => statement.bind((2, pattern.as_str()))?,
            Filter::Day(day) => statement.bind((2, i64::from(*day)))?,
            Filter::Month(month) => statement.bind((2, i64::from(*month)))?,
            Filter::Date { day, month } => {
                statement.bind((2, i64::from(*day)))?;
                statement.bind((3, i64::from(*month)))?;
            }
        }
        Self::collect(statement)
    }

    async fn rename(
        &self,
        conversation_id: ConversationId,
        old_name: &str,
        new_name: &str,
    ) -> Result<bool, StoreError> {
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare(UPDATE_NAME_SQL)?;
        statement.bind((1, new_name))?;
        statement.bind((2, conversation_id))?;
        statement.bind((3, old_name))?;

        match Self::execute_keyed(&connection, statement) {
            Err(StoreError::Sqlite(e)) if Self::is_constraint_violation(&e) => {
                Err(StoreError::DuplicateKey {
                    conversation_id,
                    name: new_name.to_string(),
                })
            }
            other => other,
        }
    }

    async fn reschedule(
        &self,
        conversation_id: ConversationId,
        name: &str,
        day: u32,
        month: u32,
    ) -> Result<bool, StoreError> {
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare(UPDATE_DATE_SQL)?;
        statement.bind((1, i64::from(day)))?;
        statement.bind((2, i64::from(month)))?;
        statement.bind((3, conversation_id))?;
        statement.bind((4, name))?;
        Self::execute_keyed(&connection, statement)
    }

    async fn delete(&self, conversation_id: ConversationId, name: &str) -> Result<bool, StoreError> {
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare(DELETE_SQL)?;
        statement.bind((1, conversation_id))?;
        statement.bind((2, name))?;
        Self::execute_keyed(&connection, statement)
    }
}
