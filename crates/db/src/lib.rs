//! Persistence for the portal: the SQLite schema, the row types stored in it
//! and the pooled connection handed to request handlers.

pub mod email;
pub mod event;
pub mod idea;
pub mod notification;
pub mod participation;
pub mod payment;
pub mod promotion;
/// Database schema
pub mod schema;
pub mod settings;
pub mod team;
pub mod user;

use std::time::Duration;

use diesel::connection::{
    AnsiTransactionManager, ConnectionSealed, DefaultLoadingMode,
    Instrumentation, InstrumentationEvent, LoadConnection, SimpleConnection,
    TransactionManager,
};
use diesel::expression::QueryMetadata;
use diesel::migration::{MigrationConnection, CREATE_MIGRATIONS_TABLE};
use diesel::query_builder::{Query, QueryFragment, QueryId};
use diesel::r2d2::{
    ConnectionManager, CustomizeConnection, ManageConnection, Pool,
};
use diesel::sqlite::Sqlite;
use diesel::{
    sql_query, Connection, ConnectionResult, QueryResult, RunQueryDsl,
    SqliteConnection,
};
use rocket::{Build, Rocket};
use rocket_sync_db_pools::{database, Config, PoolResult, Poolable};

/// Pragmas applied to every connection as it leaves the pool.
const CONNECTION_PRAGMAS: &str = "\
    PRAGMA journal_mode = WAL;\
    PRAGMA busy_timeout = 1000;\
    PRAGMA foreign_keys = ON;";

#[database("database")]
pub struct DbConn(PortalConnection);

/// A SQLite connection which reports every query it runs through `tracing`.
pub struct PortalConnection(SqliteConnection);

impl SimpleConnection for PortalConnection {
    #[tracing::instrument(skip(self, query))]
    fn batch_execute(&mut self, query: &str) -> QueryResult<()> {
        self.0.batch_execute(query)
    }
}

impl ConnectionSealed for PortalConnection {}

impl Connection for PortalConnection {
    type Backend = Sqlite;
    type TransactionManager = AnsiTransactionManager;

    fn establish(database_url: &str) -> ConnectionResult<PortalConnection> {
        SqliteConnection::establish(database_url).map(PortalConnection)
    }

    #[tracing::instrument(skip(self, f))]
    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<diesel::result::Error>,
    {
        Self::TransactionManager::transaction(self, f)
    }

    fn execute_returning_count<T>(&mut self, source: &T) -> QueryResult<usize>
    where
        T: QueryFragment<Sqlite> + QueryId,
    {
        self.0.execute_returning_count(source)
    }

    fn transaction_state(&mut self) -> &mut Self::TransactionManager {
        self.0.transaction_state()
    }

    fn instrumentation(&mut self) -> &mut dyn Instrumentation {
        self.0.instrumentation()
    }

    fn set_instrumentation(&mut self, instrumentation: impl Instrumentation) {
        self.0.set_instrumentation(instrumentation)
    }
}

impl LoadConnection<DefaultLoadingMode> for PortalConnection {
    type Cursor<'conn, 'query>
        = <SqliteConnection as LoadConnection<DefaultLoadingMode>>::Cursor<
        'conn,
        'query,
    >
    where
        Self: 'conn;
    type Row<'conn, 'query>
        = <SqliteConnection as LoadConnection<DefaultLoadingMode>>::Row<
        'conn,
        'query,
    >
    where
        Self: 'conn;

    #[tracing::instrument(skip(self, source))]
    fn load<'conn, 'query, T>(
        &'conn mut self,
        source: T,
    ) -> QueryResult<Self::Cursor<'conn, 'query>>
    where
        T: Query + QueryFragment<Self::Backend> + QueryId + 'query,
        Self::Backend: QueryMetadata<T::SqlType>,
    {
        self.0.load(source)
    }
}

impl MigrationConnection for PortalConnection {
    fn setup(&mut self) -> QueryResult<usize> {
        sql_query(CREATE_MIGRATIONS_TABLE).execute(self)
    }
}

pub struct PortalConnectionManager {
    inner: ConnectionManager<SqliteConnection>,
}

impl ManageConnection for PortalConnectionManager {
    type Connection = PortalConnection;
    type Error = diesel::r2d2::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        self.inner.connect().map(PortalConnection)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        self.inner.is_valid(&mut conn.0)
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        self.inner.has_broken(&mut conn.0)
    }
}

/// Logs queries at `trace` and failed queries at `warn`.
struct QueryLogger;

impl Instrumentation for QueryLogger {
    fn on_connection_event(&mut self, event: InstrumentationEvent<'_>) {
        match event {
            InstrumentationEvent::StartQuery { query, .. } => {
                tracing::trace!(%query, "running query");
            }
            InstrumentationEvent::FinishQuery {
                query,
                error: Some(error),
                ..
            } => {
                tracing::warn!(%query, %error, "query failed");
            }
            _ => (),
        }
    }
}

#[derive(Debug)]
struct ApplyPragmas;

impl CustomizeConnection<PortalConnection, diesel::r2d2::Error>
    for ApplyPragmas
{
    fn on_acquire(
        &self,
        conn: &mut PortalConnection,
    ) -> Result<(), diesel::r2d2::Error> {
        conn.0.set_instrumentation(QueryLogger);
        conn.0
            .batch_execute(CONNECTION_PRAGMAS)
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

impl Poolable for PortalConnection {
    type Manager = PortalConnectionManager;
    type Error = std::convert::Infallible;

    fn pool(db_name: &str, rocket: &Rocket<Build>) -> PoolResult<Self> {
        let config = Config::from(db_name, rocket)?;
        tracing::info!(url = %config.url, pool_size = config.pool_size, "opening database pool");

        let manager = PortalConnectionManager {
            inner: ConnectionManager::new(&config.url),
        };

        Ok(Pool::builder()
            .connection_customizer(Box::new(ApplyPragmas))
            .max_size(config.pool_size)
            .connection_timeout(Duration::from_secs(config.timeout as u64))
            .build(manager)?)
    }
}

/// Whether a diesel error is a violated UNIQUE constraint. Several
/// application invariants (one team per user per event, one participation per
/// user per event) are backed by such constraints.
pub fn is_unique_violation(error: &diesel::result::Error) -> bool {
    matches!(
        error,
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _
        )
    )
}
