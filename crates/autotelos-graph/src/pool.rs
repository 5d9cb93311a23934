//! Bounded session pool over SQLite connections
//!
//! A semaphore caps concurrent sessions. Idle connections are reused; new
//! ones are opened lazily up to the cap. The active-session counter sits
//! behind a read-write lock so observers can read it without contending
//! with checkout.

use crate::error::{GraphError, GraphResult};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

struct PoolInner {
    path: PathBuf,
    max_sessions: usize,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<Connection>>,
    active: RwLock<usize>,
}

#[derive(Clone)]
pub struct SessionPool {
    inner: Arc<PoolInner>,
}

/// A checked-out connection. Returned to the pool on drop.
pub struct Session {
    conn: Option<Connection>,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl Session {
    pub fn conn(&mut self) -> GraphResult<&mut Connection> {
        self.conn
            .as_mut()
            .ok_or_else(|| GraphError::Pool("session already released".into()))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Ok(mut idle) = self.pool.idle.lock() {
                idle.push(conn);
            }
        }
        if let Ok(mut active) = self.pool.active.write() {
            *active = active.saturating_sub(1);
        }
    }
}

fn open_connection(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(
        "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
    )?;
    Ok(conn)
}

impl SessionPool {
    /// Open the pool and verify connectivity with a first connection.
    /// `init` runs once on that connection (schema setup).
    pub fn open<F>(path: impl AsRef<Path>, max_sessions: usize, init: F) -> GraphResult<Self>
    where
        F: FnOnce(&Connection) -> GraphResult<()>,
    {
        if max_sessions == 0 {
            return Err(GraphError::Pool("max_sessions must be at least 1".into()));
        }
        let path = path.as_ref().to_path_buf();
        let unreachable = |source| GraphError::Unreachable {
            path: path.display().to_string(),
            source,
        };

        let conn = open_connection(&path).map_err(unreachable)?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(unreachable)?;
        init(&conn)?;

        debug!("session pool ready: {} (max {})", path.display(), max_sessions);

        Ok(Self {
            inner: Arc::new(PoolInner {
                path,
                max_sessions,
                permits: Arc::new(Semaphore::new(max_sessions)),
                idle: Mutex::new(vec![conn]),
                active: RwLock::new(0),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn max_sessions(&self) -> usize {
        self.inner.max_sessions
    }

    /// Sessions currently checked out.
    pub fn active_sessions(&self) -> usize {
        self.inner.active.read().map(|a| *a).unwrap_or(0)
    }

    /// Check out a session, waiting while the pool is at capacity.
    pub async fn acquire(&self) -> GraphResult<Session> {
        let permit = self
            .inner
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| GraphError::Pool("pool closed".into()))?;

        let reused = self
            .inner
            .idle
            .lock()
            .map_err(|e| GraphError::Pool(format!("idle list poisoned: {}", e)))?
            .pop();
        let conn = match reused {
            Some(conn) => conn,
            None => open_connection(&self.inner.path)?,
        };

        {
            let mut active = self
                .inner
                .active
                .write()
                .map_err(|e| GraphError::Pool(format!("session counter poisoned: {}", e)))?;
            *active += 1;
        }

        Ok(Session {
            conn: Some(conn),
            pool: self.inner.clone(),
            _permit: permit,
        })
    }

    /// Run blocking work against a pooled connection off the async executor.
    pub async fn run<T, F>(&self, f: F) -> GraphResult<T>
    where
        F: FnOnce(&mut Connection) -> GraphResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut session = self.acquire().await?;
        tokio::task::spawn_blocking(move || {
            let conn = session.conn()?;
            f(conn)
        })
        .await?
    }
}
