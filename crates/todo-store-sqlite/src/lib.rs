#![allow(clippy::missing_errors_doc)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, InterruptHandle};
use time::OffsetDateTime;
use todo_core::{
    calculate_metadata, format_rfc3339, now_utc, parse_rfc3339, validate_item, DomainError,
    Filters, Item, ItemDraft, Metadata, Validator,
};

pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(3);
const MAX_IDLE_CONNECTIONS: usize = 8;

const SCHEMA_ITEMS: &str = r"
CREATE TABLE IF NOT EXISTS items (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  created_at TEXT NOT NULL,
  item TEXT NOT NULL,
  description TEXT NOT NULL DEFAULT ''
);
";

const SELECT_ITEM_COLUMNS: &str = "id, created_at, item, description";

/// Item store over a SQLite file.
///
/// Cloning is cheap; clones share one connection pool. Every operation runs
/// on the blocking thread pool and is bounded by the configured timeout. A
/// call that exceeds it has its statement interrupted and reports
/// [`DomainError::Timeout`].
#[derive(Debug, Clone)]
pub struct SqliteItemStore {
    pool: Arc<ConnectionPool>,
    operation_timeout: Duration,
}

#[derive(Debug)]
struct ConnectionPool {
    path: PathBuf,
    idle: Mutex<Vec<Connection>>,
}

#[derive(Default)]
struct InterruptSlot {
    cancelled: bool,
    handle: Option<InterruptHandle>,
}

impl SqliteItemStore {
    /// Opens (creating if needed) the database at `path` and ensures the
    /// `items` table exists.
    pub fn open(path: &Path, operation_timeout: Duration) -> Result<Self> {
        let conn = open_connection(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;
        conn.execute_batch(SCHEMA_ITEMS)
            .context("failed to ensure items table exists")?;

        Ok(Self {
            pool: Arc::new(ConnectionPool {
                path: path.to_path_buf(),
                idle: Mutex::new(vec![conn]),
            }),
            operation_timeout,
        })
    }

    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    pub async fn insert(&self, draft: &ItemDraft) -> Result<Item, DomainError> {
        ensure_valid(draft)?;
        let draft = draft.clone();
        let created_at = now_utc();
        let stamp = format_rfc3339(created_at).map_err(|err| DomainError::internal(err.to_string()))?;

        self.run("insert", move |conn| {
            conn.execute(
                "INSERT INTO items (created_at, item, description) VALUES (?1, ?2, ?3)",
                params![stamp, draft.name, draft.description],
            )?;
            Ok(Item {
                id: conn.last_insert_rowid(),
                created_at,
                name: draft.name,
                description: draft.description,
            })
        })
        .await
    }

    pub async fn get(&self, id: i64) -> Result<Item, DomainError> {
        if id < 1 {
            return Err(DomainError::NotFound);
        }

        self.run("get", move |conn| {
            conn.query_row(
                &format!("SELECT {SELECT_ITEM_COLUMNS} FROM items WHERE id = ?1"),
                params![id],
                |row| parse_item_row(row, 0),
            )
        })
        .await
    }

    /// Replaces the stored name and description of `item.id`.
    ///
    /// Partial updates are merged by the caller before this call. No row
    /// with the id is reported as [`DomainError::NotFound`].
    pub async fn update(&self, item: &Item) -> Result<Item, DomainError> {
        if item.id < 1 {
            return Err(DomainError::NotFound);
        }
        ensure_valid(&item.draft())?;
        let item = item.clone();

        self.run("update", move |conn| {
            let changed = conn.execute(
                "UPDATE items SET item = ?1, description = ?2 WHERE id = ?3",
                params![item.name, item.description, item.id],
            )?;
            if changed == 0 {
                return Err(rusqlite::Error::QueryReturnedNoRows);
            }
            Ok(item)
        })
        .await
    }

    pub async fn delete(&self, id: i64) -> Result<(), DomainError> {
        if id < 1 {
            return Err(DomainError::NotFound);
        }

        self.run("delete", move |conn| {
            let changed = conn.execute("DELETE FROM items WHERE id = ?1", params![id])?;
            if changed == 0 {
                return Err(rusqlite::Error::QueryReturnedNoRows);
            }
            Ok(())
        })
        .await
    }

    /// Returns one page of items matching both text filters, plus metadata
    /// computed from the total match count.
    pub async fn list(
        &self,
        name_filter: &str,
        description_filter: &str,
        filters: &Filters,
    ) -> Result<(Vec<Item>, Metadata), DomainError> {
        let (sql, args) = list_query(name_filter, description_filter, filters)?;
        let (page, page_size) = (filters.page, filters.page_size);

        let (items, total) = self
            .run("list", move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let mut rows = stmt.query(params_from_iter(args))?;
                let mut items = Vec::new();
                let mut total = 0_i64;
                while let Some(row) = rows.next()? {
                    total = row.get(0)?;
                    items.push(parse_item_row(row, 1)?);
                }
                Ok((items, total))
            })
            .await?;

        Ok((items, calculate_metadata(total, page, page_size)))
    }

    async fn run<T, F>(&self, operation: &'static str, op: F) -> Result<T, DomainError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let pool = Arc::clone(&self.pool);
        let slot = Arc::new(Mutex::new(InterruptSlot::default()));
        let task_slot = Arc::clone(&slot);

        let handle = tokio::task::spawn_blocking(move || {
            let conn = pool.checkout()?;
            {
                let mut guard = task_slot
                    .lock()
                    .map_err(|_| DomainError::internal("interrupt slot poisoned"))?;
                if guard.cancelled {
                    pool.checkin(conn);
                    return Err(DomainError::internal(format!(
                        "{operation} cancelled before it started"
                    )));
                }
                guard.handle = Some(conn.get_interrupt_handle());
            }
            let result = op(&conn).map_err(|err| classify(operation, err));
            // A late interrupt must not reach whoever checks the connection out next.
            if let Ok(mut guard) = task_slot.lock() {
                guard.handle = None;
            }
            pool.checkin(conn);
            result
        });

        match tokio::time::timeout(self.operation_timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => Err(DomainError::internal(format!("{operation} join failure: {err}"))),
            Err(_) => {
                if let Ok(mut guard) = slot.lock() {
                    guard.cancelled = true;
                    if let Some(handle) = guard.handle.take() {
                        handle.interrupt();
                    }
                }
                tracing::warn!(
                    operation,
                    timeout_ms = u64::try_from(self.operation_timeout.as_millis())
                        .unwrap_or(u64::MAX),
                    "store operation timed out and was interrupted"
                );
                Err(DomainError::Timeout {
                    operation,
                    timeout: self.operation_timeout,
                })
            }
        }
    }
}

impl ConnectionPool {
    fn checkout(&self) -> Result<Connection, DomainError> {
        let pooled = self
            .idle
            .lock()
            .map_err(|_| DomainError::internal("connection pool poisoned"))?
            .pop();
        match pooled {
            Some(conn) => Ok(conn),
            None => {
                tracing::debug!(path = %self.path.display(), "opening sqlite connection");
                open_connection(&self.path).map_err(|err| {
                    DomainError::internal(format!(
                        "failed to open sqlite database at {}: {err}",
                        self.path.display()
                    ))
                })
            }
        }
    }

    fn checkin(&self, conn: Connection) {
        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < MAX_IDLE_CONNECTIONS {
                idle.push(conn);
            }
        }
    }
}

fn open_connection(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = 5000;",
    )?;
    Ok(conn)
}

fn ensure_valid(draft: &ItemDraft) -> Result<(), DomainError> {
    let mut v = Validator::new();
    validate_item(&mut v, draft);
    match v.first_error() {
        None => Ok(()),
        Some((field, message)) => Err(DomainError::Invalid {
            field: field.to_string(),
            message: message.to_string(),
        }),
    }
}

fn classify(operation: &'static str, err: rusqlite::Error) -> DomainError {
    match err {
        rusqlite::Error::QueryReturnedNoRows => DomainError::NotFound,
        rusqlite::Error::SqliteFailure(ref failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            DomainError::EditConflict
        }
        other => DomainError::internal(format!("{operation} failed: {other}")),
    }
}

/// Builds the listing query. Only allow-listed identifiers and `?n`
/// placeholders appear in the SQL text; all client input is in the returned
/// arguments.
fn list_query(
    name_filter: &str,
    description_filter: &str,
    filters: &Filters,
) -> Result<(String, Vec<SqlValue>), DomainError> {
    let Some(column) = filters.sort_column() else {
        return Err(DomainError::Invalid {
            field: "sort".to_string(),
            message: format!("invalid sort value {:?}", filters.sort),
        });
    };

    let mut clauses = Vec::new();
    let mut args = Vec::new();
    for (field, filter) in [("item", name_filter), ("description", description_filter)] {
        for term in filter.split_whitespace() {
            args.push(SqlValue::Text(term.to_ascii_lowercase()));
            clauses.push(format!("instr(lower({field}), ?{}) > 0", args.len()));
        }
    }
    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    args.push(SqlValue::Integer(filters.limit()));
    let limit_at = args.len();
    args.push(SqlValue::Integer(filters.offset()));
    let offset_at = args.len();

    let sql = format!(
        "SELECT count(*) OVER (), {SELECT_ITEM_COLUMNS}
         FROM items
         {where_clause}
         ORDER BY {column} {direction}, id ASC
         LIMIT ?{limit_at} OFFSET ?{offset_at}",
        direction = filters.sort_direction().as_sql(),
    );
    Ok((sql, args))
}

fn parse_item_row(row: &rusqlite::Row<'_>, first: usize) -> rusqlite::Result<Item> {
    let created_at_raw: String = row.get(first + 1)?;
    let created_at: OffsetDateTime = parse_rfc3339(&created_at_raw).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            first + 1,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid created_at {created_at_raw:?}: {err}"),
            )),
        )
    })?;

    Ok(Item {
        id: row.get(first)?,
        created_at,
        name: row.get(first + 2)?,
        description: row.get(first + 3)?,
    })
}
