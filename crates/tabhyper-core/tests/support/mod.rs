#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tabhyper_core::config::{
    AppConfig, TableauCredentials, API_VERSION_VAR, PAT_NAME_VAR, PAT_SECRET_VAR, SITE_ID_VAR,
    SITE_URL_VAR,
};
use tabhyper_core::error::{ExtractError, SessionError};
use tabhyper_core::hyper::{
    CreateMode, Endpoint, ExtractConnection, ExtractEngine, ExtractProcess, ProcessOptions,
};
use tabhyper_core::scripts::{Script, ScriptArgs};
use tabhyper_core::session::{
    PublishRequest, PublishedDatasource, SessionConnector, SiteSession,
};

pub fn full_env() -> HashMap<String, String> {
    [
        (PAT_NAME_VAR, "ci-token"),
        (PAT_SECRET_VAR, "ci-secret"),
        (SITE_ID_VAR, "analytics"),
        (SITE_URL_VAR, "https://tableau.example.com"),
        (API_VERSION_VAR, "3.21"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub fn lookup(vars: HashMap<String, String>) -> impl Fn(&str) -> Option<String> {
    move |name| vars.get(name).cloned()
}

pub fn test_config() -> AppConfig {
    AppConfig::from_lookup(lookup(full_env())).expect("complete test config")
}

/// Session double that counts sign-outs and remembers publish requests.
#[derive(Debug, Default, Clone)]
pub struct SessionLog {
    pub opens: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    pub published: Arc<Mutex<Vec<(String, String, bool)>>>,
}

impl SessionLog {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct RecordingSession {
    log: SessionLog,
    open: bool,
}

impl RecordingSession {
    pub fn new(log: SessionLog) -> Self {
        Self { log, open: true }
    }
}

#[async_trait]
impl SiteSession for RecordingSession {
    fn site_content_url(&self) -> &str {
        "analytics"
    }

    fn site_luid(&self) -> &str {
        "site-luid"
    }

    fn api_version(&self) -> &str {
        "3.21"
    }

    async fn publish_datasource(
        &self,
        request: &PublishRequest<'_>,
    ) -> Result<PublishedDatasource, SessionError> {
        self.log.published.lock().unwrap().push((
            request.name.to_string(),
            request.project_id.to_string(),
            request.overwrite,
        ));
        Ok(PublishedDatasource {
            id: "ds-1".to_string(),
            name: request.name.to_string(),
            project: None,
        })
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if self.open {
            self.open = false;
            self.log.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct RecordingConnector {
    pub log: SessionLog,
    pub refuse: bool,
}

#[async_trait]
impl SessionConnector for RecordingConnector {
    async fn open(
        &self,
        credentials: &TableauCredentials,
    ) -> Result<Box<dyn SiteSession>, SessionError> {
        self.log.opens.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(SessionError::Api {
                status: 401,
                code: "401001".to_string(),
                summary: "Signin Error".to_string(),
                detail: format!("bad token for {}", credentials.pat_name),
            });
        }
        Ok(Box::new(RecordingSession::new(self.log.clone())))
    }
}

/// Script double recording the address of every session it was handed.
#[derive(Debug, Default, Clone)]
pub struct RecordingScript {
    pub calls: Arc<Mutex<Vec<usize>>>,
    pub failure: Option<&'static str>,
}

impl RecordingScript {
    pub fn failing(message: &'static str) -> Self {
        Self {
            failure: Some(message),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

pub fn session_addr(session: &dyn SiteSession) -> usize {
    session as *const _ as *const () as usize
}

#[async_trait]
impl Script for RecordingScript {
    async fn run(
        &self,
        session: &dyn SiteSession,
        _config: &AppConfig,
        _args: &ScriptArgs,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(session_addr(session));
        match self.failure {
            Some(message) => Err(anyhow!(message)),
            None => Ok(()),
        }
    }
}

/// Extract engine double that records every call in order.
#[derive(Debug, Default, Clone)]
pub struct RecordingEngine {
    pub events: Arc<Mutex<Vec<String>>>,
    pub fail_execute: bool,
}

impl RecordingEngine {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events()
            .iter()
            .filter(|event| event.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl ExtractEngine for RecordingEngine {
    async fn start_process(
        &self,
        options: &ProcessOptions,
    ) -> Result<Box<dyn ExtractProcess>, ExtractError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("start:{}", options.hyperd_path.display()));
        Ok(Box::new(RecordingProcess {
            engine: self.clone(),
            endpoint: Endpoint {
                host: "127.0.0.1".to_string(),
                port: 7483,
            },
        }))
    }
}

struct RecordingProcess {
    engine: RecordingEngine,
    endpoint: Endpoint,
}

#[async_trait]
impl ExtractProcess for RecordingProcess {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn open_connection(
        &self,
        database: &Path,
        mode: CreateMode,
    ) -> Result<Box<dyn ExtractConnection>, ExtractError> {
        self.engine
            .events
            .lock()
            .unwrap()
            .push(format!("open:{}:{mode:?}", database.display()));
        Ok(Box::new(RecordingConnection {
            engine: self.engine.clone(),
        }))
    }

    async fn shutdown(self: Box<Self>) -> Result<(), ExtractError> {
        self.engine.events.lock().unwrap().push("shutdown".to_string());
        Ok(())
    }
}

struct RecordingConnection {
    engine: RecordingEngine,
}

#[async_trait]
impl ExtractConnection for RecordingConnection {
    async fn create_schema(&mut self, schema: &str) -> Result<(), ExtractError> {
        self.engine
            .events
            .lock()
            .unwrap()
            .push(format!("create_schema:{schema}"));
        Ok(())
    }

    async fn execute_command(&mut self, sql: &str) -> Result<u64, ExtractError> {
        self.engine
            .events
            .lock()
            .unwrap()
            .push(format!("execute:{sql}"));
        if self.engine.fail_execute {
            return Err(ExtractError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "external file rejected",
            )));
        }
        Ok(3)
    }

    async fn close(self: Box<Self>) -> Result<(), ExtractError> {
        self.engine
            .events
            .lock()
            .unwrap()
            .push("close_connection".to_string());
        Ok(())
    }
}

pub fn write_csv(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write csv fixture");
    path
}
