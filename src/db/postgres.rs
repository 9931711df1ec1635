//! PostgreSQL row counter
//!
//! One session shared by all count queries of a cycle. A query that times out
//! is cancelled on the server and its session dropped, so the next table runs
//! on a fresh connection. A closed session is re-established on the next query.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_postgres::{Client, Config, NoTls};
use tracing::{debug, info, warn};

use super::RowCounter;
use crate::config::DatabaseConfig;
use crate::error::DbError;

/// A live database session able to count rows
#[async_trait]
trait Session: Send + Sync {
    fn is_closed(&self) -> bool;

    async fn count(&self, table: &str) -> Result<i64, DbError>;

    /// Ask the server to abort the query in flight
    async fn cancel(&self);
}

/// Opens new sessions
#[async_trait]
trait Connector: Send + Sync {
    type Session: Session;

    async fn open(&self) -> Result<Self::Session, DbError>;
}

/// Holds at most one session and bounds every query on it
struct SessionSlot<K: Connector> {
    connector: K,
    session: Mutex<Option<K::Session>>,
    query_timeout: Option<Duration>,
}

impl<K: Connector> SessionSlot<K> {
    fn new(connector: K, session: Option<K::Session>, query_timeout: Option<Duration>) -> Self {
        Self {
            connector,
            session: Mutex::new(session),
            query_timeout,
        }
    }

    async fn count_rows(&self, table: &str) -> Result<u64, DbError> {
        let mut slot = self.session.lock().await;

        let session = match slot.take() {
            Some(session) if !session.is_closed() => session,
            stale => {
                if stale.is_some() {
                    info!("Database session closed, reconnecting");
                }
                self.connector.open().await?
            }
        };

        debug!(%table, "Counting rows");
        let count = match self.query_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, session.count(table)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(%table, ?timeout, "Count query timed out, cancelling");
                    let _ = tokio::time::timeout(timeout, session.cancel()).await;
                    // The session is dropped here; the next query reconnects.
                    return Err(DbError::Timeout {
                        table: table.to_string(),
                        timeout,
                    });
                }
            },
            None => session.count(table).await,
        };
        *slot = Some(session);

        let count = count?;
        u64::try_from(count).map_err(|_| DbError::NegativeCount {
            table: table.to_string(),
            count,
        })
    }
}

/// Opens `tokio-postgres` clients
struct PgConnector {
    pg_config: Config,
    host: String,
    port: u16,
}

#[async_trait]
impl Connector for PgConnector {
    type Session = Client;

    async fn open(&self) -> Result<Client, DbError> {
        let (client, connection) =
            self.pg_config
                .connect(NoTls)
                .await
                .map_err(|source| DbError::Connect {
                    host: self.host.clone(),
                    port: self.port,
                    source,
                })?;

        // The connection object drives the socket; it resolves when the session ends.
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "Database connection closed");
            }
        });

        Ok(client)
    }
}

#[async_trait]
impl Session for Client {
    fn is_closed(&self) -> bool {
        Client::is_closed(self)
    }

    async fn count(&self, table: &str) -> Result<i64, DbError> {
        let query_err = |source: tokio_postgres::Error| DbError::Query {
            table: table.to_string(),
            source,
        };
        let row = self
            .query_one(count_statement(table).as_str(), &[])
            .await
            .map_err(query_err)?;
        row.try_get(0).map_err(query_err)
    }

    async fn cancel(&self) {
        if let Err(e) = self.cancel_token().cancel_query(NoTls).await {
            warn!(error = %e, "Failed to cancel query");
        }
    }
}

/// Row counter backed by a `tokio-postgres` client
pub struct PostgresCounter {
    slot: SessionSlot<PgConnector>,
}

impl PostgresCounter {
    /// Connect using the configured parameters
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DbError> {
        let mut pg_config = Config::new();
        pg_config
            .host(&config.host)
            .port(config.port)
            .user(&config.user)
            .password(&config.password)
            .dbname(&config.dbname)
            .application_name(env!("CARGO_PKG_NAME"));
        if let Some(timeout) = config.connect_timeout() {
            pg_config.connect_timeout(timeout);
        }

        let connector = PgConnector {
            pg_config,
            host: config.host.clone(),
            port: config.port,
        };
        let client = connector.open().await?;
        info!(
            host = %config.host,
            port = config.port,
            dbname = %config.dbname,
            "Connected to database"
        );

        Ok(Self {
            slot: SessionSlot::new(connector, Some(client), config.query_timeout()),
        })
    }
}

#[async_trait]
impl RowCounter for PostgresCounter {
    async fn count_rows(&self, table: &str) -> Result<u64, DbError> {
        self.slot.count_rows(table).await
    }
}

/// `SELECT count(*)` against a quoted identifier
fn count_statement(table: &str) -> String {
    format!("SELECT count(*) FROM {}", quote_ident(table))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
