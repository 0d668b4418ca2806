//! Authenticated PostgreSQL access over mutual TLS.
//!
//! [`PgConnector`] opens one connection per request using the files of a
//! [`MaterialSet`]: the root CA is the only trust anchor for the server
//! certificate and the client certificate/key authenticate the login.
//!
//! The database maps the client certificate to a role by its Common Name
//! (`clientcert=verify-full` / `cert` auth in `pg_hba.conf`), so
//! [`DatabaseConfig::user`] must equal the CN Vault puts in the certificate.
//! A mismatch is rejected by the server as an authentication failure.

use crate::material::MaterialSet;
use async_trait::async_trait;
use rustls::{
    ClientConfig, RootCertStore,
    pki_types::{CertificateDer, PrivateKeyDer},
};
use serde::Serialize;
use std::{fs::File, io::BufReader, path::Path, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, config::SslMode};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, error, instrument, warn};

/// Lookup executed for every request.
pub const RECIPE_QUERY: &str = "SELECT name, ingredients FROM recipes WHERE id = $1";

/// Database connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Server host; must match a name in the server certificate
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database name
    pub name: String,
    /// Login role. Must equal the Common Name of the client certificate.
    pub user: String,
    /// Upper bound on connect plus TLS handshake
    pub connect_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            name: "postgres".to_string(),
            user: "app_user".to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// A row of the recipes table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipe {
    /// Recipe name
    pub name: String,
    /// Comma separated ingredients
    pub ingredients: String,
}

/// Database failures.
#[derive(Error, Debug)]
pub enum DbError {
    /// Network, TLS or authentication failure while connecting
    #[error("connect failed: {0}")]
    Connect(String),

    /// The lookup itself failed
    #[error("query failed: {0}")]
    Query(String),

    /// More than one row shares an identifier
    #[error("expected at most one row, got {rows}")]
    Integrity {
        /// Rows returned
        rows: usize,
    },
}

/// Opens authenticated sessions.
#[async_trait]
pub trait RecipeConnector: Send + Sync {
    /// Open one session authenticated with `material`.
    async fn connect(&self, material: &MaterialSet) -> Result<Box<dyn RecipeSession>, DbError>;
}

/// One open database session.
#[async_trait]
pub trait RecipeSession: Send {
    /// Look a recipe up by identifier. `Ok(None)` when no row matches.
    async fn fetch_recipe(&mut self, id: i32) -> Result<Option<Recipe>, DbError>;

    /// Close the session. After this returns the driver no longer needs the
    /// material files.
    async fn close(self: Box<Self>);
}

/// `tokio-postgres` connector using rustls for mutual TLS.
#[derive(Debug, Clone)]
pub struct PgConnector {
    config: DatabaseConfig,
}

impl PgConnector {
    /// Create a connector for `config`.
    #[must_use]
    pub const fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    fn pg_config(&self) -> tokio_postgres::Config {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&self.config.host)
            .port(self.config.port)
            .dbname(&self.config.name)
            .user(&self.config.user)
            .ssl_mode(SslMode::Require)
            .connect_timeout(self.config.connect_timeout)
            .application_name("recipe-service");
        pg
    }
}

/// Build a rustls client config from the material files.
///
/// Server hostname verification is always on; the root CA file is the only
/// trust anchor.
///
/// # Errors
///
/// [`DbError::Connect`] when a file is unreadable or holds no usable PEM.
pub fn tls_config(material: &MaterialSet) -> Result<ClientConfig, DbError> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(material.root_ca())? {
        roots
            .add(cert)
            .map_err(|e| DbError::Connect(format!("invalid root CA: {e}")))?;
    }

    let chain = load_certs(material.certificate())?;
    let key = load_key(material.key())?;

    ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| DbError::Connect(e.to_string()))?
        .with_root_certificates(roots)
        .with_client_auth_cert(chain, key)
        .map_err(|e| DbError::Connect(format!("invalid client certificate: {e}")))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, DbError> {
    let mut reader = BufReader::new(File::open(path).map_err(|e| DbError::Connect(e.to_string()))?);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| DbError::Connect(e.to_string()))?;
    if certs.is_empty() {
        return Err(DbError::Connect(format!("no certificate in {}", path.display())));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, DbError> {
    let mut reader = BufReader::new(File::open(path).map_err(|e| DbError::Connect(e.to_string()))?);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| DbError::Connect(e.to_string()))?
        .ok_or_else(|| DbError::Connect(format!("no private key in {}", path.display())))
}

#[async_trait]
impl RecipeConnector for PgConnector {
    #[instrument(skip_all, fields(host = %self.config.host, db = %self.config.name, user = %self.config.user))]
    async fn connect(&self, material: &MaterialSet) -> Result<Box<dyn RecipeSession>, DbError> {
        let tls = MakeRustlsConnect::new(tls_config(material).inspect_err(|e| {
            error!(error = %e, "Failed to load TLS material");
        })?);

        let pg = self.pg_config();
        let connect = pg.connect(tls);
        let (client, connection) = tokio::time::timeout(self.config.connect_timeout, connect)
            .await
            .map_err(|_| {
                error!(timeout = ?self.config.connect_timeout, "Database connect timed out");
                DbError::Connect("timed out".to_string())
            })?
            .map_err(|e| {
                error!(error = %e, "Database connect failed");
                DbError::Connect(e.to_string())
            })?;

        let connection = tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "Database connection ended with error");
            }
        });

        debug!("Database session opened");
        Ok(Box::new(PgSession {
            client,
            connection,
            close_timeout: self.config.connect_timeout,
        }))
    }
}

struct PgSession {
    client: Client,
    connection: JoinHandle<()>,
    /// How long `close` waits for the driver task before aborting it
    close_timeout: Duration,
}

#[async_trait]
impl RecipeSession for PgSession {
    async fn fetch_recipe(&mut self, id: i32) -> Result<Option<Recipe>, DbError> {
        let rows = self
            .client
            .query(RECIPE_QUERY, &[&id])
            .await
            .map_err(|e| DbError::Query(e.to_string()))?;

        match rows.as_slice() {
            [] => Ok(None),
            [row] => Ok(Some(Recipe {
                name: row.try_get("name").map_err(|e| DbError::Query(e.to_string()))?,
                ingredients: row
                    .try_get("ingredients")
                    .map_err(|e| DbError::Query(e.to_string()))?,
            })),
            _ => Err(DbError::Integrity { rows: rows.len() }),
        }
    }

    async fn close(self: Box<Self>) {
        let Self {
            client,
            connection,
            close_timeout,
        } = *self;
        drop(client);
        if drain_connection(connection, close_timeout).await {
            debug!("Database session closed");
        }
    }
}

/// Wait up to `grace` for the driver task to finish, aborting it otherwise.
///
/// Returns `false` when the task had to be aborted.
async fn drain_connection(mut connection: JoinHandle<()>, grace: Duration) -> bool {
    match tokio::time::timeout(grace, &mut connection).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(error = %e, "Database connection task failed");
            true
        }
        Err(_) => {
            warn!(grace = ?grace, "Database connection did not close in time, aborting");
            connection.abort();
            false
        }
    }
}
