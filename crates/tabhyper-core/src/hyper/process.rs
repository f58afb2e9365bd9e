use std::net::{Ipv4Addr, TcpListener as StdTcpListener};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use super::connection::HyperConnection;
use super::{
    CreateMode, Endpoint, ExtractConnection, ExtractEngine, ExtractProcess, ProcessOptions,
    HYPER_USER,
};
use crate::error::ExtractError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Launches `hyperd` executables on the local machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct HyperdEngine;

#[async_trait]
impl ExtractEngine for HyperdEngine {
    async fn start_process(
        &self,
        options: &ProcessOptions,
    ) -> Result<Box<dyn ExtractProcess>, ExtractError> {
        let process = HyperdProcess::start(options).await?;
        Ok(Box::new(process))
    }
}

/// A running `hyperd` child. Killed on drop if [`ExtractProcess::shutdown`] was
/// never called.
#[derive(Debug)]
pub struct HyperdProcess {
    child: Child,
    endpoint: Endpoint,
}

impl HyperdProcess {
    pub async fn start(options: &ProcessOptions) -> Result<Self, ExtractError> {
        let port = free_local_port()?;
        let endpoint = Endpoint {
            host: Ipv4Addr::LOCALHOST.to_string(),
            port,
        };

        let mut command = Command::new(&options.hyperd_path);
        command
            .arg("run")
            .arg("--skip-license")
            .arg("--no-password")
            .arg(format!("--init-user={HYPER_USER}"))
            .arg(format!("--listen-connection={endpoint}"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(log_dir) = &options.log_dir {
            std::fs::create_dir_all(log_dir)?;
            command.arg(format!("--log-dir={}", log_dir.display()));
        }

        let child = command.spawn().map_err(|source| ExtractError::Spawn {
            path: options.hyperd_path.clone(),
            source,
        })?;
        debug!(path = %options.hyperd_path.display(), %endpoint, "spawned hyperd");

        let mut process = Self { child, endpoint };
        process.wait_until_ready(options.startup_timeout).await?;
        Ok(process)
    }

    async fn wait_until_ready(&mut self, limit: Duration) -> Result<(), ExtractError> {
        let deadline = Instant::now() + limit;
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Err(ExtractError::ProcessExited(status));
            }
            if TcpStream::connect((self.endpoint.host.as_str(), self.endpoint.port))
                .await
                .is_ok()
            {
                return Ok(());
            }
            if Instant::now() >= deadline {
                if let Err(err) = self.child.kill().await {
                    warn!(error = %err, "failed to kill unresponsive hyperd");
                }
                return Err(ExtractError::StartupTimeout(limit));
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl ExtractProcess for HyperdProcess {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn open_connection(
        &self,
        database: &Path,
        mode: CreateMode,
    ) -> Result<Box<dyn ExtractConnection>, ExtractError> {
        let connection = HyperConnection::open(&self.endpoint, database, mode).await?;
        Ok(Box::new(connection))
    }

    async fn shutdown(mut self: Box<Self>) -> Result<(), ExtractError> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }
        self.child.start_kill()?;
        match timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                info!(%status, "hyperd stopped");
            }
            Err(_) => warn!("hyperd did not exit within {SHUTDOWN_GRACE:?} of being killed"),
        }
        Ok(())
    }
}

fn free_local_port() -> Result<u16, ExtractError> {
    let listener = StdTcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    Ok(listener.local_addr()?.port())
}
