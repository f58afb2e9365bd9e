use std::path::Path;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::{Connection, Executor};
use tracing::debug;

use super::sql::{escape_name, escape_string_literal};
use super::{CreateMode, Endpoint, ExtractConnection, HYPER_USER};
use crate::error::ExtractError;

/// A session against a running hyperd, with one database file attached.
///
/// hyperd speaks the PostgreSQL wire protocol; statements go over the simple
/// query protocol because Hyper DDL does not take bind parameters.
pub struct HyperConnection {
    conn: PgConnection,
    database: String,
}

impl std::fmt::Debug for HyperConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperConnection")
            .field("database", &self.database)
            .finish()
    }
}

impl HyperConnection {
    pub async fn open(
        endpoint: &Endpoint,
        database: &Path,
        mode: CreateMode,
    ) -> Result<Self, ExtractError> {
        let database = database
            .to_str()
            .ok_or_else(|| ExtractError::NonUtf8Path(database.to_path_buf()))?
            .to_string();

        let options = connect_options(endpoint)?;
        let conn = PgConnection::connect_with(&options).await?;

        let mut connection = Self { conn, database };
        for statement in prepare_statements(&connection.database, mode) {
            connection.run(&statement).await?;
        }
        debug!(database = %connection.database, ?mode, "attached Hyper database");
        Ok(connection)
    }

    async fn run(&mut self, statement: &str) -> Result<u64, ExtractError> {
        debug!(statement, "executing Hyper statement");
        let result = Executor::execute(&mut self.conn, sqlx::raw_sql(statement)).await?;
        Ok(result.rows_affected())
    }
}

/// Connection options for the local hyperd.
///
/// sqlx seeds options from the `PG*` variables. Everything it can override is
/// overridden here; a database or startup options it cannot clear are refused.
fn connect_options(endpoint: &Endpoint) -> Result<PgConnectOptions, ExtractError> {
    let options = PgConnectOptions::new_without_pgpass()
        .host(&endpoint.host)
        .port(endpoint.port)
        .username(HYPER_USER)
        .application_name("tabhyper")
        .ssl_mode(PgSslMode::Disable);

    if options.get_database().is_some() {
        return Err(ExtractError::InheritedConnectionSetting { var: "PGDATABASE" });
    }
    if options.get_options().is_some() {
        return Err(ExtractError::InheritedConnectionSetting { var: "PGOPTIONS" });
    }
    Ok(options)
}

/// Statements that bring the database file into the state `mode` asks for and
/// attach it to the session.
fn prepare_statements(database: &str, mode: CreateMode) -> Vec<String> {
    let name = escape_name(database);
    let mut statements = match mode {
        CreateMode::None => Vec::new(),
        CreateMode::Create => vec![format!("CREATE DATABASE {name}")],
        CreateMode::CreateIfNotExists => vec![format!("CREATE DATABASE IF NOT EXISTS {name}")],
        CreateMode::CreateAndReplace => vec![
            format!("DROP DATABASE IF EXISTS {name}"),
            format!("CREATE DATABASE {name}"),
        ],
    };
    statements.push(format!(
        "ATTACH DATABASE {} AS {}",
        escape_string_literal(database),
        escape_name(&database_alias(database)),
    ));
    statements
}

/// Attachment alias: the file stem, e.g. `pokemon` for `/tmp/pokemon.hyper`.
fn database_alias(database: &str) -> String {
    Path::new(database)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("extract")
        .to_string()
}

#[async_trait]
impl ExtractConnection for HyperConnection {
    async fn create_schema(&mut self, schema: &str) -> Result<(), ExtractError> {
        self.run(&format!("CREATE SCHEMA {}", escape_name(schema)))
            .await?;
        Ok(())
    }

    async fn execute_command(&mut self, sql: &str) -> Result<u64, ExtractError> {
        self.run(sql).await
    }

    async fn close(self: Box<Self>) -> Result<(), ExtractError> {
        let HyperConnection { conn, database } = *self;
        conn.close().await?;
        debug!(%database, "closed Hyper connection");
        Ok(())
    }
}
