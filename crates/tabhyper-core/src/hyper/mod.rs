//! Embedded extract engine: a local `hyperd` process and connections to it.
//!
//! The traits here are the seam scripts program against. [`HyperdEngine`] is the
//! production implementation; tests substitute recording doubles.

mod connection;
mod process;
pub mod sql;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::ExtractError;

pub use connection::HyperConnection;
pub use process::{HyperdEngine, HyperdProcess};
pub use sql::ExternalFormat;

/// Login used for the local, password-less hyperd instance.
pub const HYPER_USER: &str = "tableau_internal_user";

/// What to do with the database file when a connection is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreateMode {
    /// Attach an existing file; fail if it is missing.
    #[default]
    None,
    /// Create a new file; fail if it already exists.
    Create,
    CreateIfNotExists,
    /// Drop any existing file and start empty.
    CreateAndReplace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab.tcp://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Path to the `hyperd` executable; a bare name is resolved through `PATH`.
    pub hyperd_path: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub startup_timeout: Duration,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            hyperd_path: PathBuf::from("hyperd"),
            log_dir: None,
            startup_timeout: Duration::from_secs(30),
        }
    }
}

#[async_trait]
pub trait ExtractEngine: Send + Sync {
    async fn start_process(
        &self,
        options: &ProcessOptions,
    ) -> Result<Box<dyn ExtractProcess>, ExtractError>;
}

#[async_trait]
pub trait ExtractProcess: Send + Sync {
    fn endpoint(&self) -> &Endpoint;

    async fn open_connection(
        &self,
        database: &Path,
        mode: CreateMode,
    ) -> Result<Box<dyn ExtractConnection>, ExtractError>;

    async fn shutdown(self: Box<Self>) -> Result<(), ExtractError>;
}

#[async_trait]
pub trait ExtractConnection: Send {
    async fn create_schema(&mut self, schema: &str) -> Result<(), ExtractError>;

    /// Run a statement and return the affected row count.
    async fn execute_command(&mut self, sql: &str) -> Result<u64, ExtractError>;

    async fn close(self: Box<Self>) -> Result<(), ExtractError>;
}

/// Load one local file into a fresh `schema.table` inside `database`.
#[derive(Debug, Clone)]
pub struct ExternalImport<'a> {
    pub database: &'a Path,
    pub mode: CreateMode,
    pub schema: &'a str,
    pub table: &'a str,
    pub source: &'a Path,
    pub format: ExternalFormat,
}

/// Start a process, open a connection, create the schema and import the file.
///
/// The connection is closed and the process shut down on every exit path, in
/// that order. When several steps fail the earliest error is returned and the
/// later ones are logged.
pub async fn import_external_file(
    engine: &dyn ExtractEngine,
    options: &ProcessOptions,
    import: &ExternalImport<'_>,
) -> Result<u64, ExtractError> {
    let source = import
        .source
        .to_str()
        .ok_or_else(|| ExtractError::NonUtf8Path(import.source.to_path_buf()))?;
    let statement =
        sql::create_table_from_external(import.schema, import.table, source, import.format);

    let process = engine.start_process(options).await?;
    info!(endpoint = %process.endpoint(), "hyperd started");

    let opened = process.open_connection(import.database, import.mode).await;
    let outcome = match opened {
        Ok(mut connection) => {
            let work = async {
                connection.create_schema(import.schema).await?;
                connection.execute_command(&statement).await
            }
            .await;
            let closed = connection.close().await;
            first_error(work, closed, "failed to close Hyper connection")
        }
        Err(err) => Err(err),
    };

    let stopped = process.shutdown().await;
    let rows = first_error(outcome, stopped, "failed to shut down hyperd")?;

    info!(
        database = %import.database.display(),
        schema = import.schema,
        table = import.table,
        rows,
        "Created table from external file"
    );
    Ok(rows)
}

fn first_error<T>(
    outcome: Result<T, ExtractError>,
    cleanup: Result<(), ExtractError>,
    cleanup_label: &str,
) -> Result<T, ExtractError> {
    match (outcome, cleanup) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(cleanup_err)) => {
            warn!(error = %cleanup_err, "{cleanup_label}");
            Err(err)
        }
    }
}
