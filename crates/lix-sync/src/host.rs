use std::path::PathBuf;
use std::sync::Arc;

use lix_sdk::{Lix, OpenOptions, Plugin};
use serde_json::Value;
use tracing::{debug, info};

use crate::call::Call;
use crate::error::{EnvironmentError, EnvironmentResult};

/// Where and how an environment keeps its database.
#[derive(Clone, Default)]
pub struct HostConfig {
    /// Blob file the database is loaded from on open and written to on
    /// close. `None` keeps it in memory only.
    pub path: Option<PathBuf>,
    /// Plugins registered on every database the host opens.
    pub plugins: Vec<Arc<dyn Plugin>>,
}

impl HostConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            plugins: Vec::new(),
        }
    }

    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }
}

/// The synchronous side of an environment: at most one open database.
pub(crate) struct Host {
    config: HostConfig,
    lix: Option<Lix>,
}

impl Host {
    pub(crate) fn new(config: HostConfig) -> Self {
        Self { config, lix: None }
    }

    /// Open the database: the blob in `options`, else the host's file when
    /// it exists, else a new one.
    pub(crate) fn open(&mut self, options: OpenOptions) -> EnvironmentResult<()> {
        if self.lix.is_some() {
            return Err(EnvironmentError::AlreadyOpen);
        }
        let lix = match &self.config.path {
            Some(path) if options.blob.is_none() && path.exists() => Lix::open_file(path, options)?,
            _ => Lix::open(options)?,
        };
        self.install(lix)
    }

    /// Open the database from an exported blob.
    pub(crate) fn create(&mut self, blob: Vec<u8>) -> EnvironmentResult<()> {
        if self.lix.is_some() {
            return Err(EnvironmentError::AlreadyOpen);
        }
        let lix = Lix::open(OpenOptions::new().blob(blob))?;
        if let Some(path) = &self.config.path {
            lix.export_to_file(path)?;
        }
        self.install(lix)
    }

    fn install(&mut self, mut lix: Lix) -> EnvironmentResult<()> {
        for plugin in &self.config.plugins {
            lix.register_plugin(Arc::clone(plugin))?;
        }
        info!(lix_id = %lix.lix_id(), persisted = self.config.path.is_some(), "environment opened database");
        self.lix = Some(lix);
        Ok(())
    }

    /// Whether a database is open, or persisted where the host would open it.
    pub(crate) fn exists(&self) -> bool {
        self.lix.is_some() || self.config.path.as_ref().is_some_and(|p| p.exists())
    }

    pub(crate) fn export(&self) -> EnvironmentResult<Vec<u8>> {
        Ok(self.lix()?.export()?)
    }

    /// Persist (when file-backed) and drop the open database.
    pub(crate) fn close(&mut self) -> EnvironmentResult<()> {
        let Some(lix) = self.lix.take() else {
            return Ok(());
        };
        if let Some(path) = &self.config.path {
            lix.export_to_file(path)?;
        }
        info!(lix_id = %lix.lix_id(), "environment closed database");
        Ok(())
    }

    pub(crate) fn call(&mut self, call: Call) -> EnvironmentResult<Value> {
        let op = call.op();
        let lix = self.lix.as_mut().ok_or(EnvironmentError::NotOpen)?;
        debug!(op, "environment call");
        call.apply(lix)
    }

    fn lix(&self) -> EnvironmentResult<&Lix> {
        self.lix.as_ref().ok_or(EnvironmentError::NotOpen)
    }
}
