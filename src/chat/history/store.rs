//! Chat history store.

use std::future::Future;
use std::pin::Pin;

use chrono::{TimeZone, Utc};
use tokio_rusqlite::Connection;

use crate::chat::core::config::StorageConfig;
use crate::chat::core::errors::{StoreError, StoreResult};
use crate::chat::core::ids::{ConversationId, PlatformId};
use crate::chat::history::turn::{ChatTurn, NewChatTurn};

/// Boxed future type for chat store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Append-only chat history.
pub trait ChatStore: Send + Sync {
    /// Append one completed turn and return its row id.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn append(&self, turn: NewChatTurn) -> StoreFuture<'_, StoreResult<i64>>;

    /// Load the `limit` most recent turns of a conversation, oldest first.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn recent(
        &self,
        conversation_id: ConversationId,
        user_id: PlatformId,
        group_id: PlatformId,
        limit: usize,
    ) -> StoreFuture<'_, StoreResult<Vec<ChatTurn>>>;
}

/// `SQLite` implementation of chat history storage.
pub struct SqliteChatStore {
    conn: Connection,
    table: String,
}

impl SqliteChatStore {
    /// Open (and create if needed) the history table.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn new(config: &StorageConfig) -> StoreResult<Self> {
        let conn = Connection::open(&config.sqlite_path).await?;
        let table = config.table.clone();
        let table_name = table.clone();

        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table_name} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    sessionId TEXT NOT NULL,
                    userId TEXT NOT NULL,
                    groupId TEXT NOT NULL,
                    message TEXT NOT NULL,
                    answer TEXT NOT NULL,
                    create_time INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{table_name}_session_time
                    ON {table_name} (sessionId, create_time);"
            ))?;
            Ok(())
        })
        .await?;

        Ok(Self { conn, table })
    }
}

type TurnRow = (i64, ConversationId, PlatformId, PlatformId, String, String, i64);

impl ChatStore for SqliteChatStore {
    fn append(&self, turn: NewChatTurn) -> StoreFuture<'_, StoreResult<i64>> {
        Box::pin(async move {
            let table = self.table.clone();
            let id = self
                .conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT INTO {table}
                            (sessionId, userId, groupId, message, answer, create_time)
                            VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
                        ),
                        rusqlite::params![
                            turn.conversation_id,
                            turn.user_id,
                            turn.group_id,
                            turn.message,
                            turn.answer,
                            turn.created_at.timestamp_millis()
                        ],
                    )?;
                    Ok(conn.last_insert_rowid())
                })
                .await?;
            Ok(id)
        })
    }

    fn recent(
        &self,
        conversation_id: ConversationId,
        user_id: PlatformId,
        group_id: PlatformId,
        limit: usize,
    ) -> StoreFuture<'_, StoreResult<Vec<ChatTurn>>> {
        Box::pin(async move {
            if limit == 0 {
                return Ok(Vec::new());
            }

            let table = self.table.clone();
            let limit = i64::try_from(limit)
                .map_err(|_| StoreError::InvalidRow("limit exceeds i64".to_string()))?;
            let mut rows: Vec<TurnRow> = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT id, sessionId, userId, groupId, message, answer, create_time
                         FROM {table}
                         WHERE sessionId = ?1 AND userId = ?2 AND groupId = ?3
                         ORDER BY create_time DESC, id DESC
                         LIMIT ?4"
                    ))?;
                    let rows = stmt
                        .query_map(
                            rusqlite::params![conversation_id, user_id, group_id, limit],
                            |row| {
                                Ok((
                                    row.get(0)?,
                                    row.get(1)?,
                                    row.get(2)?,
                                    row.get(3)?,
                                    row.get(4)?,
                                    row.get(5)?,
                                    row.get(6)?,
                                ))
                            },
                        )?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            rows.reverse();
            let turns = rows
                .into_iter()
                .map(|(id, conversation_id, user_id, group_id, message, answer, ts)| {
                    let created_at = Utc.timestamp_millis_opt(ts).single().ok_or_else(|| {
                        StoreError::InvalidRow(format!("invalid create_time {ts} for row {id}"))
                    })?;
                    Ok(ChatTurn {
                        id,
                        conversation_id,
                        user_id,
                        group_id,
                        message,
                        answer,
                        created_at,
                    })
                })
                .collect::<StoreResult<Vec<_>>>()?;

            Ok(turns)
        })
    }
}
