// crates/tabhyper-core/src/config.rs

use once_cell::sync::OnceCell;

use crate::error::ConfigError;

pub const PAT_NAME_VAR: &str = "TAB_PAT_NAME";
pub const PAT_SECRET_VAR: &str = "TAB_PAT_SECRET";
pub const SITE_ID_VAR: &str = "TAB_SITE_ID";
pub const SITE_URL_VAR: &str = "TAB_SITE_URL";
pub const API_VERSION_VAR: &str = "TAB_API_VERSION";

/// Personal-access-token credentials for one Tableau site.
#[derive(Clone, PartialEq, Eq)]
pub struct TableauCredentials {
    pub pat_name: String,
    pub pat_secret: String,
    pub site_id: String,
    pub site_url: String,
    pub api_version: Option<String>,
}

impl std::fmt::Debug for TableauCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableauCredentials")
            .field("pat_name", &self.pat_name)
            .field("pat_secret", &"<redacted>")
            .field("site_id", &self.site_id)
            .field("site_url", &self.site_url)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl TableauCredentials {
    fn required_fields(&self) -> [(&'static str, &'static str, &str); 4] {
        [
            ("pat_name", PAT_NAME_VAR, &self.pat_name),
            ("pat_secret", PAT_SECRET_VAR, &self.pat_secret),
            ("site_id", SITE_ID_VAR, &self.site_id),
            ("site_url", SITE_URL_VAR, &self.site_url),
        ]
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let missing: Vec<String> = self
            .required_fields()
            .iter()
            .filter(|(_, _, value)| value.is_empty())
            .map(|(field, var, _)| format!("{field} ({var})"))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingVars { missing })
        }
    }
}

/// Validated configuration for a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub credentials: TableauCredentials,
}

impl AppConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// Unset and empty variables are treated the same way: both count as missing
    /// for required fields and as absent for the optional API version.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).unwrap_or_default();

        let credentials = TableauCredentials {
            pat_name: read(PAT_NAME_VAR),
            pat_secret: read(PAT_SECRET_VAR),
            site_id: read(SITE_ID_VAR),
            site_url: read(SITE_URL_VAR),
            api_version: lookup(API_VERSION_VAR).filter(|value| !value.is_empty()),
        };
        credentials.validate()?;

        Ok(Self { credentials })
    }
}

/// Holds at most one [`AppConfig`] and hands out the same instance on every call.
#[derive(Debug, Default)]
pub struct ConfigCell {
    cell: OnceCell<AppConfig>,
}

impl ConfigCell {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    pub fn get_or_load(&self) -> Result<&AppConfig, ConfigError> {
        self.get_or_load_with(env_lookup)
    }

    /// Loads on first use only. A failed load leaves the cell empty.
    pub fn get_or_load_with<F>(&self, lookup: F) -> Result<&AppConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.cell.get_or_try_init(|| AppConfig::from_lookup(lookup))
    }

    pub fn get(&self) -> Option<&AppConfig> {
        self.cell.get()
    }
}

static PROCESS_CONFIG: ConfigCell = ConfigCell::new();

/// Process-wide configuration, read from the environment on the first call.
pub fn load_or_get_config() -> Result<&'static AppConfig, ConfigError> {
    PROCESS_CONFIG.get_or_load()
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
