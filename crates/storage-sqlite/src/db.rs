//! Pool construction, embedded migrations, and the single-writer handle.

use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use diesel::Connection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::sync::{mpsc, Arc};
use std::thread;

use hydromon_core::errors::{DatabaseError, Error, Result};

use crate::errors::StorageError;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT_MS: u32 = 5_000;

const PRAGMAS: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    PRAGMA foreign_keys = ON;
";

fn apply_connection_pragmas(conn: &mut SqliteConnection) -> diesel::QueryResult<()> {
    conn.batch_execute(&format!(
        "{PRAGMAS} PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};"
    ))
}

#[derive(Debug)]
struct ConnectionPragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionPragmas {
    fn on_acquire(
        &self,
        conn: &mut SqliteConnection,
    ) -> std::result::Result<(), diesel::r2d2::Error> {
        apply_connection_pragmas(conn).map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Build the read pool for `database_url`.
pub fn create_pool(database_url: &str) -> Result<Arc<DbPool>> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(8)
        .connection_customizer(Box::new(ConnectionPragmas))
        .build(manager)
        .map_err(|e| Error::Database(DatabaseError::Pool(e.to_string())))?;
    Ok(Arc::new(pool))
}

pub fn get_connection(pool: &Arc<DbPool>) -> Result<DbConnection> {
    pool.get()
        .map_err(|e| Error::Database(DatabaseError::Pool(e.to_string())))
}

/// Run pending embedded migrations.
pub fn run_migrations(pool: &Arc<DbPool>) -> Result<()> {
    let mut conn = get_connection(pool)?;
    conn.run_pending_migrations(MIGRATIONS)
        .map(|_| ())
        .map_err(|e| StorageError::Migration(e.to_string()).into())
}

type WriteJob = Box<dyn FnOnce(&mut SqliteConnection) + Send + 'static>;

/// Serialized writer: every mutation executes on one dedicated thread with
/// its own connection, so writes never race each other. Readers keep using
/// the pool concurrently.
#[derive(Clone)]
pub struct WriteHandle {
    sender: mpsc::Sender<WriteJob>,
}

impl WriteHandle {
    /// Spawn the writer thread for `database_url`.
    pub fn spawn(database_url: &str) -> Result<Self> {
        let mut conn = SqliteConnection::establish(database_url).map_err(|e| {
            Error::Database(DatabaseError::Internal(format!(
                "Failed to open writer connection: {}",
                e
            )))
        })?;
        apply_connection_pragmas(&mut conn).map_err(|e| {
            Error::Database(DatabaseError::Internal(format!(
                "Failed to apply pragmas: {}",
                e
            )))
        })?;

        let (sender, receiver) = mpsc::channel::<WriteJob>();
        thread::Builder::new()
            .name("hydromon-sqlite-writer".to_string())
            .spawn(move || {
                // Exits when the last WriteHandle is dropped.
                while let Ok(job) = receiver.recv() {
                    job(&mut conn);
                }
            })
            .map_err(|e| {
                Error::Database(DatabaseError::Internal(format!(
                    "Failed to spawn writer thread: {}",
                    e
                )))
            })?;

        Ok(Self { sender })
    }

    /// Run `job` on the writer thread and await its result.
    pub async fn exec<F, R>(&self, job: F) -> Result<R>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(Box::new(move |conn| {
                let _ = tx.send(job(conn));
            }))
            .map_err(|_| {
                Error::Database(DatabaseError::Internal(
                    "Writer thread is gone".to_string(),
                ))
            })?;
        rx.await.map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "Writer dropped the reply".to_string(),
            ))
        })?
    }
}
