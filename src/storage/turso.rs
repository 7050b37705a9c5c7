use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Builder, Connection, Database, Row, Value};
use std::sync::Arc;

use crate::service::{
    subscription::SubscriptionTier,
    user::{User, UserPatch},
};

use super::{MergeStrategy, StorageError, UserStore};

/// Patchable columns, in parameter order after `user_id`.
const COLUMNS: [&str; 11] = [
    "username",
    "first_name",
    "last_name",
    "joined_at",
    "subscription_tier",
    "is_subscribed",
    "name",
    "business_type",
    "location",
    "contact",
    "created_at",
];

const CREATE_USERS_TABLE: &str = "CREATE TABLE IF NOT EXISTS users (
    user_id TEXT PRIMARY KEY,
    username TEXT,
    first_name TEXT,
    last_name TEXT,
    joined_at TEXT,
    subscription_tier TEXT,
    is_subscribed INTEGER,
    name TEXT,
    business_type TEXT,
    location TEXT,
    contact TEXT,
    created_at TEXT
)";

/// One row per user in Turso (libSQL). Merges happen inside a single statement.
#[derive(Clone)]
pub struct TursoUserStore {
    inner: Arc<Database>,
}

impl TursoUserStore {
    pub async fn new(url: &str, token: &str) -> Result<Self, StorageError> {
        info!("Initializing TursoUserStore...");
        let db = Builder::new_remote(url.to_string(), token.to_string())
            .build()
            .await?;

        let store = Self { inner: Arc::new(db) };
        store.get_connection()?.execute(CREATE_USERS_TABLE, ()).await?;

        info!("TursoUserStore initialized");
        Ok(store)
    }

    fn get_connection(&self) -> Result<Connection, StorageError> {
        Ok(self.inner.connect()?)
    }
}

#[async_trait]
impl UserStore for TursoUserStore {
    async fn upsert(&self, user_id: &str, patch: &UserPatch, strategy: MergeStrategy) -> Result<(), StorageError> {
        let conn = self.get_connection()?;
        conn.execute(&upsert_sql(strategy), params(user_id, patch)).await?;
        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Option<User>, StorageError> {
        let conn = self.get_connection()?;
        let mut rows = conn.query(&select_sql(), [user_id]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(read_user(user_id, &row)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, user_id: &str, patch: &UserPatch) -> Result<(), StorageError> {
        let conn = self.get_connection()?;
        let changed = conn.execute(&update_sql(), params(user_id, patch)).await?;

        if changed == 0 {
            return Err(StorageError::NotFound(user_id.to_string()));
        }
        Ok(())
    }
}

fn upsert_sql(strategy: MergeStrategy) -> String {
    let placeholders: Vec<String> = (1..=COLUMNS.len() + 1).map(|i| format!("?{}", i)).collect();

    let assignments: Vec<String> = COLUMNS
        .iter()
        .map(|column| match strategy {
            MergeStrategy::Merge => format!("{column} = COALESCE(excluded.{column}, users.{column})"),
            MergeStrategy::KeepExisting => format!("{column} = COALESCE(users.{column}, excluded.{column})"),
        })
        .collect();

    format!(
        "INSERT INTO users (user_id, {}) VALUES ({}) ON CONFLICT(user_id) DO UPDATE SET {}",
        COLUMNS.join(", "),
        placeholders.join(", "),
        assignments.join(", ")
    )
}

fn update_sql() -> String {
    let assignments: Vec<String> = COLUMNS
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{column} = COALESCE(?{}, {column})", i + 2))
        .collect();

    format!("UPDATE users SET {} WHERE user_id = ?1", assignments.join(", "))
}

fn select_sql() -> String {
    format!("SELECT {} FROM users WHERE user_id = ?1 LIMIT 1", COLUMNS.join(", "))
}

fn text(value: &Option<String>) -> Value {
    value.clone().map(Value::Text).unwrap_or(Value::Null)
}

fn timestamp(value: &Option<DateTime<Utc>>) -> Value {
    value.map(|at| Value::Text(at.to_rfc3339())).unwrap_or(Value::Null)
}

fn params(user_id: &str, patch: &UserPatch) -> Vec<Value> {
    vec![
        Value::Text(user_id.to_string()),
        text(&patch.username),
        text(&patch.first_name),
        text(&patch.last_name),
        timestamp(&patch.joined_at),
        patch
            .subscription_tier
            .map(|tier| Value::Text(tier.to_string()))
            .unwrap_or(Value::Null),
        patch
            .is_subscribed
            .map(|subscribed| Value::Integer(subscribed as i64))
            .unwrap_or(Value::Null),
        text(&patch.name),
        text(&patch.business_type),
        text(&patch.location),
        text(&patch.contact),
        timestamp(&patch.created_at),
    ]
}

fn read_user(user_id: &str, row: &Row) -> Result<User, StorageError> {
    let corrupted = |reason: String| StorageError::Corrupted {
        key: user_id.to_string(),
        reason,
    };

    let read_text = |idx: i32| -> Result<Option<String>, StorageError> {
        match row.get_value(idx)? {
            Value::Null => Ok(None),
            Value::Text(value) => Ok(Some(value)),
            other => Err(corrupted(format!("column {} holds {:?}", COLUMNS[idx as usize], other))),
        }
    };

    let read_timestamp = |idx: i32| -> Result<Option<DateTime<Utc>>, StorageError> {
        read_text(idx)?
            .map(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|at| at.with_timezone(&Utc))
                    .map_err(|e| corrupted(format!("column {}: {}", COLUMNS[idx as usize], e)))
            })
            .transpose()
    };

    let subscription_tier = read_text(4)?
        .map(|raw| raw.parse::<SubscriptionTier>().map_err(corrupted))
        .transpose()?;

    let is_subscribed = match row.get_value(5)? {
        Value::Null => None,
        Value::Integer(flag) => Some(flag != 0),
        other => return Err(corrupted(format!("column is_subscribed holds {:?}", other))),
    };

    Ok(User {
        user_id: user_id.to_string(),
        username: read_text(0)?,
        first_name: read_text(1)?,
        last_name: read_text(2)?,
        joined_at: read_timestamp(3)?,
        subscription_tier,
        is_subscribed,
        name: read_text(6)?,
        business_type: read_text(7)?,
        location: read_text(8)?,
        contact: read_text(9)?,
        created_at: read_timestamp(10)?,
    })
}
