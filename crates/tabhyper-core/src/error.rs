// crates/tabhyper-core/src/error.rs

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing Tableau config vars: {}", .missing.join(", "))]
    MissingVars { missing: Vec<String> },
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Tableau request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Tableau API returned {status} (code {code}): {summary}: {detail}")]
    Api {
        status: u16,
        code: String,
        summary: String,
        detail: String,
    },

    #[error("Tableau API returned {status} with an unreadable body: {body}")]
    UnexpectedResponse { status: u16, body: String },

    #[error("invalid Tableau site url '{0}'")]
    InvalidSiteUrl(String),

    #[error("Tableau session is already closed")]
    Closed,

    #[error("failed to read datasource file {path}: {source}")]
    ReadDatasource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Hyper query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("failed to start hyperd at {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("hyperd exited before accepting connections ({0})")]
    ProcessExited(ExitStatus),

    #[error("hyperd did not accept connections within {0:?}")]
    StartupTimeout(Duration),

    #[error("database path {0} is not valid UTF-8")]
    NonUtf8Path(PathBuf),

    #[error("{var} is set in the environment and would be sent to hyperd; unset it")]
    InheritedConnectionSetting { var: &'static str },
}
