//! Async SQLite connection access via diesel-async's `SyncConnectionWrapper`.
//!
//! SQLite connections are lightweight and file-based, so (as in the teacher
//! repo) we create a new connection per request rather than pooling a fixed
//! set — `SyncConnectionWrapper` already pushes blocking work onto
//! `spawn_blocking` for us.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use diesel::sqlite::SqliteConnection;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::AsyncConnection;
use tokio::sync::Mutex as AsyncMutex;

use super::RepositoryError;

pub type SqliteConn = SyncConnectionWrapper<SqliteConnection>;

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Clone)]
pub struct SqlitePool {
    database_url: String,
    /// Held open for the pool's whole lifetime when `database_url` points at
    /// a shared-cache in-memory database. SQLite destroys an in-memory
    /// database's backing store the instant its last connection closes —
    /// since every `get()` call opens and drops its own short-lived
    /// connection, nothing would survive between two calls without this
    /// keeping one connection alive the whole time. File-backed pools don't
    /// need it and leave this `None`.
    _keepalive: Option<Arc<AsyncMutex<SqliteConn>>>,
}

impl SqlitePool {
    pub fn new(database_url: &str) -> Self {
        let url = database_url.strip_prefix("sqlite:").unwrap_or(database_url);
        Self {
            database_url: url.to_string(),
            _keepalive: None,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        Self::new(&path.display().to_string())
    }

    /// A private, shared-cache in-memory database unique to this pool
    /// instance — named so concurrent `in_memory()` pools (e.g. parallel
    /// tests in the same process) never see each other's data.
    pub async fn in_memory() -> Result<Self, RepositoryError> {
        let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
        let url = format!("file:newsloom_memdb_{id}?mode=memory&cache=shared");
        let keepalive = SqliteConn::establish(&url).await?;
        Ok(Self {
            database_url: url,
            _keepalive: Some(Arc::new(AsyncMutex::new(keepalive))),
        })
    }

    pub async fn get(&self) -> Result<SqliteConn, RepositoryError> {
        Ok(SqliteConn::establish(&self.database_url).await?)
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}
