use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::info;

use super::{Script, ScriptArgs};
use crate::config::AppConfig;
use crate::hyper::{
    import_external_file, CreateMode, ExternalFormat, ExternalImport, ExtractEngine,
    ProcessOptions,
};
use crate::session::{PublishRequest, SiteSession};
use crate::staging::{csv_to_parquet, CsvOptions};
use crate::timing::LogDuration;

/// Builds a `.hyper` extract from a delimited file, staged through Parquet, and
/// optionally publishes it to the session's site.
pub struct CreateExtract {
    engine: Arc<dyn ExtractEngine>,
}

impl CreateExtract {
    pub fn new(engine: Arc<dyn ExtractEngine>) -> Self {
        Self { engine }
    }
}

/// Where the staged and generated files go for one input file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ExtractPaths {
    stem: String,
    parquet: PathBuf,
}

impl ExtractPaths {
    fn for_input(input: &Path, work_dir: &Path) -> Result<Self> {
        let stem = input
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .with_context(|| format!("input path {} has no file name", input.display()))?
            .to_string();

        Ok(Self {
            parquet: work_dir.join(format!("{stem}.parquet")),
            stem,
        })
    }
}

fn csv_options(args: &ScriptArgs) -> Result<CsvOptions> {
    if !args.delimiter.is_ascii() {
        bail!("delimiter {:?} must be a single ASCII character", args.delimiter);
    }
    Ok(CsvOptions {
        delimiter: args.delimiter as u8,
        has_header: true,
    })
}

#[async_trait]
impl Script for CreateExtract {
    async fn run(
        &self,
        session: &dyn SiteSession,
        config: &AppConfig,
        args: &ScriptArgs,
    ) -> Result<()> {
        let _timer = LogDuration::start("hyper_api_create_extract");
        info!(
            site_url = %config.credentials.site_url,
            site = session.site_content_url(),
            input = %args.input.display(),
            "Building extract"
        );

        let paths = ExtractPaths::for_input(&args.input, &args.work_dir)?;
        let rows = csv_to_parquet(&args.input, &paths.parquet, &csv_options(args)?)?;
        let staged = paths.parquet.canonicalize()?;
        let database = staged.with_extension("hyper");
        info!(rows, parquet = %staged.display(), "Staged source file");

        let options = ProcessOptions {
            hyperd_path: args.hyperd.clone(),
            log_dir: args.hyperd_log_dir.clone(),
            ..ProcessOptions::default()
        };
        let import = ExternalImport {
            database: &database,
            mode: CreateMode::CreateAndReplace,
            schema: &args.schema,
            table: &args.table,
            source: &staged,
            format: ExternalFormat::Parquet,
        };
        let imported = import_external_file(self.engine.as_ref(), &options, &import).await?;
        info!(rows = imported, hyper = %database.display(), "Extract written");

        if let Some(project_id) = &args.publish_project {
            let name = args.datasource_name.as_deref().unwrap_or(&paths.stem);
            let published = session
                .publish_datasource(&PublishRequest {
                    file: &database,
                    name,
                    project_id,
                    overwrite: !args.no_overwrite,
                })
                .await?;
            info!(datasource_id = %published.id, name = %published.name, "Extract published");
        }

        Ok(())
    }
}
