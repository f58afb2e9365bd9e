/// Quote an identifier (schema, table, database) for Hyper SQL.
pub fn escape_name(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal for Hyper SQL.
pub fn escape_string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Fully qualified `"schema"."table"` name.
pub fn table_name(schema: &str, table: &str) -> String {
    format!("{}.{}", escape_name(schema), escape_name(table))
}

/// File formats Hyper can read through `external(...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalFormat {
    Parquet,
    Csv,
}

impl ExternalFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExternalFormat::Parquet => "parquet",
            ExternalFormat::Csv => "csv",
        }
    }
}

/// `CREATE TABLE ... AS (SELECT * FROM external(...))` for a file on the local disk.
pub fn create_table_from_external(
    schema: &str,
    table: &str,
    file: &str,
    format: ExternalFormat,
) -> String {
    format!(
        "CREATE TABLE {} AS (SELECT * FROM external({}, FORMAT => {}))",
        table_name(schema, table),
        escape_string_literal(file),
        escape_string_literal(format.as_str()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_embedded_quotes() {
        assert_eq!(escape_name("Extract"), "\"Extract\"");
        assert_eq!(escape_name("my \"odd\" table"), "\"my \"\"odd\"\" table\"");
        assert_eq!(escape_string_literal("/tmp/o'brien.parquet"), "'/tmp/o''brien.parquet'");
    }

    #[test]
    fn builds_external_import_statement() {
        let sql = create_table_from_external(
            "Extract",
            "Extract",
            "/data/pokemon.parquet",
            ExternalFormat::Parquet,
        );
        assert_eq!(
            sql,
            "CREATE TABLE \"Extract\".\"Extract\" AS \
             (SELECT * FROM external('/data/pokemon.parquet', FORMAT => 'parquet'))"
        );

        let csv = create_table_from_external("Staging", "raw", "/data/raw.csv", ExternalFormat::Csv);
        assert!(csv.starts_with("CREATE TABLE \"Staging\".\"raw\" AS"));
        assert!(csv.ends_with("FORMAT => 'csv'))"));
    }
}
