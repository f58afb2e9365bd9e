use std::fs::{self, File};
use std::path::Path;

use polars::io::parquet::write::{ParquetCompression, ParquetWriter};
use polars::prelude::*;
use tracing::info;

use crate::error::ExtractError;

/// How the delimited source file is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub has_header: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
        }
    }
}

/// Read a delimited text file and write it back out as Parquet.
///
/// Column types are whatever polars infers. Parent directories of `output`
/// are created as needed and an existing file is replaced. Returns the number
/// of rows written.
pub fn csv_to_parquet(
    input: &Path,
    output: &Path,
    options: &CsvOptions,
) -> Result<usize, ExtractError> {
    let mut df = CsvReadOptions::default()
        .with_has_header(options.has_header)
        .map_parse_options(|parse| {
            parse
                .with_separator(options.delimiter)
                .with_encoding(CsvEncoding::Utf8)
        })
        .try_into_reader_with_file_path(Some(input.to_path_buf()))?
        .finish()?;

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(output)?;
    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Snappy)
        .finish(&mut df)?;

    info!(
        input = %input.display(),
        output = %output.display(),
        rows = df.height(),
        columns = df.width(),
        "Staged CSV as parquet"
    );

    Ok(df.height())
}
