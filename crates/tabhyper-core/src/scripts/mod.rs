//! Named units of work selectable from the command line.

mod create_extract;

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use clap::{Args, ValueEnum};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::hyper::ExtractEngine;
use crate::session::SiteSession;

pub use create_extract::CreateExtract;

/// Every script name the command line accepts.
///
/// Not every name has an implementation registered; see [`ScriptRegistry::standard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum ScriptName {
    #[value(name = "hyper_api_create_extract")]
    HyperApiCreateExtract,
    #[value(name = "hyper_api_create_hyper")]
    HyperApiCreateHyper,
    #[value(name = "hyper_api_publish_hyper")]
    HyperApiPublishHyper,
}

impl ScriptName {
    pub const ALL: [ScriptName; 3] = [
        ScriptName::HyperApiCreateExtract,
        ScriptName::HyperApiCreateHyper,
        ScriptName::HyperApiPublishHyper,
    ];
}

impl fmt::Display for ScriptName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => write!(f, "{self:?}"),
        }
    }
}

/// Options shared by all scripts.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ScriptArgs {
    /// Delimited source file to turn into an extract
    #[arg(long, default_value = "sample_data/pokemon.csv")]
    pub input: PathBuf,

    /// Directory for the staged parquet file and the generated .hyper file
    #[arg(long, default_value = "temp/generate_hyper")]
    pub work_dir: PathBuf,

    /// Field delimiter of the source file
    #[arg(long, default_value_t = ',')]
    pub delimiter: char,

    /// Schema that receives the extract table
    #[arg(long, default_value = "Extract")]
    pub schema: String,

    /// Name of the extract table
    #[arg(long, default_value = "Extract")]
    pub table: String,

    /// Path to the hyperd executable
    #[arg(long, default_value = "hyperd")]
    pub hyperd: PathBuf,

    /// Directory for hyperd log files
    #[arg(long)]
    pub hyperd_log_dir: Option<PathBuf>,

    /// Publish the extract into this project (LUID) after building it
    #[arg(long)]
    pub publish_project: Option<String>,

    /// Datasource name to publish under (defaults to the input file stem)
    #[arg(long)]
    pub datasource_name: Option<String>,

    /// Fail instead of replacing an existing datasource of the same name
    #[arg(long)]
    pub no_overwrite: bool,
}

// Mirrors the `#[arg]` defaults above; kept in step by a unit test.
impl Default for ScriptArgs {
    fn default() -> Self {
        Self {
            input: PathBuf::from("sample_data/pokemon.csv"),
            work_dir: PathBuf::from("temp/generate_hyper"),
            delimiter: ',',
            schema: "Extract".to_string(),
            table: "Extract".to_string(),
            hyperd: PathBuf::from("hyperd"),
            hyperd_log_dir: None,
            publish_project: None,
            datasource_name: None,
            no_overwrite: false,
        }
    }
}

/// One unit of work. Failure is reported only through the returned error.
#[async_trait]
pub trait Script: Send + Sync {
    async fn run(
        &self,
        session: &dyn SiteSession,
        config: &AppConfig,
        args: &ScriptArgs,
    ) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Completed,
    NotRegistered(ScriptName),
}

/// Fixed table from script name to implementation, built once at startup.
#[derive(Default)]
pub struct ScriptRegistry {
    scripts: BTreeMap<ScriptName, Box<dyn Script>>,
}

impl fmt::Debug for ScriptRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRegistry")
            .field("scripts", &self.scripts.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The scripts shipped with the binary.
    ///
    /// Only `hyper_api_create_extract` is wired up; the other advertised names
    /// dispatch to the not-registered path.
    pub fn standard(engine: Arc<dyn ExtractEngine>) -> Self {
        Self::new().with(
            ScriptName::HyperApiCreateExtract,
            CreateExtract::new(engine),
        )
    }

    pub fn with(mut self, name: ScriptName, script: impl Script + 'static) -> Self {
        self.scripts.insert(name, Box::new(script));
        self
    }

    pub fn contains(&self, name: ScriptName) -> bool {
        self.scripts.contains_key(&name)
    }

    pub fn registered(&self) -> impl Iterator<Item = ScriptName> + '_ {
        self.scripts.keys().copied()
    }

    /// Run the script registered under `selector`, reporting unknown names on stderr.
    pub async fn dispatch(
        &self,
        selector: ScriptName,
        session: &dyn SiteSession,
        config: &AppConfig,
        args: &ScriptArgs,
    ) -> Result<DispatchOutcome> {
        self.dispatch_to(selector, session, config, args, &mut io::stderr())
            .await
    }

    /// Like [`dispatch`](Self::dispatch) but writes the not-registered diagnostic
    /// to `diagnostics`. Script errors are returned unchanged.
    pub async fn dispatch_to<W>(
        &self,
        selector: ScriptName,
        session: &dyn SiteSession,
        config: &AppConfig,
        args: &ScriptArgs,
        diagnostics: &mut W,
    ) -> Result<DispatchOutcome>
    where
        W: Write + Send,
    {
        let Some(script) = self.scripts.get(&selector) else {
            warn!(script = %selector, "no implementation registered");
            writeln!(diagnostics, "No script found: {selector}")?;
            return Ok(DispatchOutcome::NotRegistered(selector));
        };

        info!(script = %selector, "dispatching script");
        script.run(session, config, args).await?;
        Ok(DispatchOutcome::Completed)
    }
}
