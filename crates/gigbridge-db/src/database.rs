use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use gigbridge_common::{Error, Result};
use rusqlite::Connection;
use tracing::info;
use url::Url;

/// Database engine dialect, passed through to migration steps that need
/// engine-specific SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Sqlite,
    Postgres,
    Cockroach,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::Cockroach => "cockroach",
        }
    }
}

/// Shared handle to the bridge database.
///
/// Access is serialized through a mutex; [`acquire`](Database::acquire)
/// hands out the scoped connection. The migration executor holds it for the
/// duration of a whole upgrade sequence.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    scheme: Scheme,
}

impl Database {
    /// Opens a database from a URI such as `sqlite:bridge.db` or a plain
    /// filesystem path. Non-SQLite schemes are recognized but not supported
    /// by this build.
    pub fn open(uri: &str) -> Result<Self> {
        match Url::parse(uri) {
            Ok(url) => match url.scheme() {
                "sqlite" => {
                    if url.path() == ":memory:" {
                        Self::in_memory()
                    } else {
                        Self::open_path(Path::new(url.path()))
                    }
                }
                "postgres" | "postgresql" | "cockroach" => Err(Error::Database(format!(
                    "'{}' databases are not supported by this build, use sqlite",
                    url.scheme()
                ))),
                other => Err(Error::Database(format!("unknown database scheme '{other}'"))),
            },
            // No scheme at all: treat the URI as a filesystem path.
            Err(_) => Self::open_path(Path::new(uri)),
        }
    }

    pub fn open_path(path: &Path) -> Result<Self> {
        info!("opening bridge database at {}", path.display());
        let conn = Connection::open(path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
            scheme: Scheme::Sqlite,
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
            scheme: Scheme::Sqlite,
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Scoped access to the underlying connection.
    pub fn acquire(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("database lock poisoned".into()))
    }

    pub fn execute(&self, sql: &str, params: impl rusqlite::Params) -> Result<usize> {
        let conn = self.acquire()?;
        conn.execute(sql, params)
            .map_err(|e| Error::Database(format!("query failed: {e}")))
    }

    /// Runs a query expected to return at most one row, mapping it with `f`.
    pub fn fetch_optional<T>(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
        f: impl FnOnce(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Option<T>> {
        let conn = self.acquire()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;
        stmt.query_row(params, f)
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(Error::Database(format!("query failed: {other}"))),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{Database, Scheme};

    #[test]
    fn open_rejects_postgres_uris() {
        let err = Database::open("postgres://localhost/bridge").expect_err("should be rejected");
        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn open_accepts_in_memory_uri() {
        let db = Database::open("sqlite::memory:").expect("in-memory database should open");
        assert_eq!(db.scheme(), Scheme::Sqlite);
        assert_eq!(db.scheme().as_str(), "sqlite");
    }

    #[test]
    fn fetch_optional_distinguishes_missing_rows() {
        let db = Database::in_memory().expect("in-memory database should open");
        db.execute("CREATE TABLE t (x INTEGER)", [])
            .expect("create should succeed");

        let none: Option<i64> = db
            .fetch_optional("SELECT x FROM t LIMIT 1", [], |row| row.get(0))
            .expect("empty query should not error");
        assert_eq!(none, None);

        db.execute("INSERT INTO t (x) VALUES (7)", [])
            .expect("insert should succeed");
        let some: Option<i64> = db
            .fetch_optional("SELECT x FROM t LIMIT 1", [], |row| row.get(0))
            .expect("query should succeed");
        assert_eq!(some, Some(7));
    }
}
