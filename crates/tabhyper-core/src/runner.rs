use anyhow::Result;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::ConfigError;
use crate::scripts::{DispatchOutcome, ScriptArgs, ScriptName, ScriptRegistry};
use crate::session::SessionConnector;

pub const EXIT_SUCCESS: u8 = 0;
/// Configuration, connection, or script failure.
pub const EXIT_FAILURE: u8 = 1;
/// The selector is a valid name but has no registered implementation.
pub const EXIT_SCRIPT_NOT_REGISTERED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    ScriptNotRegistered(ScriptName),
}

impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Completed => EXIT_SUCCESS,
            RunOutcome::ScriptNotRegistered(_) => EXIT_SCRIPT_NOT_REGISTERED,
        }
    }
}

impl From<DispatchOutcome> for RunOutcome {
    fn from(outcome: DispatchOutcome) -> Self {
        match outcome {
            DispatchOutcome::Completed => RunOutcome::Completed,
            DispatchOutcome::NotRegistered(name) => RunOutcome::ScriptNotRegistered(name),
        }
    }
}

/// Process exit code for the result of [`run`].
pub fn exit_code_for(result: &Result<RunOutcome>) -> u8 {
    match result {
        Ok(outcome) => outcome.exit_code(),
        Err(_) => EXIT_FAILURE,
    }
}

/// One full run: load configuration, open the session, dispatch, close the session.
///
/// Configuration is loaded before anything touches the network. Once the
/// session is open it is closed on every path out of dispatch. A script error
/// takes precedence over a failure to close; the latter is then only logged.
pub async fn run<'c, L, C>(
    load_config: L,
    connector: &C,
    registry: &ScriptRegistry,
    selector: ScriptName,
    args: &ScriptArgs,
) -> Result<RunOutcome>
where
    L: FnOnce() -> Result<&'c AppConfig, ConfigError>,
    C: SessionConnector + ?Sized,
{
    let config = load_config()?;
    let mut session = connector.open(&config.credentials).await?;

    let dispatched = registry.dispatch(selector, session.as_ref(), config, args).await;
    let closed = session.close().await;

    match (dispatched, closed) {
        (Ok(outcome), Ok(())) => {
            info!(script = %selector, ?outcome, "run finished");
            Ok(outcome.into())
        }
        (Ok(_), Err(err)) => Err(err.into()),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            warn!(error = %close_err, "failed to close Tableau session after script error");
            Err(err)
        }
    }
}
