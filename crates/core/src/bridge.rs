use crate::traits::ScriptRuntime;
use crate::{EngineError, ModelArtifacts, ReadinessState, SearchResultSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Brings the ranking engine online and mediates every call to it.
pub struct SearchEngineBridge<R> {
    runtime: R,
    readiness: Arc<ReadinessState>,
    packages: Vec<String>,
    module_source: String,
}

impl<R> SearchEngineBridge<R>
where
    R: ScriptRuntime + Send + Sync,
{
    pub fn new(
        runtime: R,
        readiness: Arc<ReadinessState>,
        packages: Vec<String>,
        module_source: impl Into<String>,
    ) -> Self {
        Self {
            runtime,
            readiness,
            packages,
            module_source: module_source.into(),
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.models_ready()
    }

    /// Runs the boot sequence strictly in order and marks the models ready
    /// only once every artifact has been handed to the engine. Any failure
    /// leaves readiness untouched.
    pub async fn boot(&self, artifacts: ModelArtifacts) -> Result<(), EngineError> {
        self.runtime.start().await?;
        debug!("engine runtime started");

        self.runtime.install_packages(&self.packages).await?;
        debug!(packages = ?self.packages, "engine packages installed");

        self.runtime.load_module(&self.module_source).await?;
        debug!(source_bytes = self.module_source.len(), "ranking module loaded");

        for (name, data) in artifacts.iter() {
            self.runtime.set_model_file_data(name, data).await?;
            debug!(artifact = name, bytes = data.len(), "artifact handed to engine");
        }

        if self.readiness.mark_models_ready() {
            info!(artifact_count = artifacts.len(), "engine ready");
        }
        Ok(())
    }

    pub async fn search(&self, query: &str) -> Result<SearchResultSet, EngineError> {
        if !self.readiness.models_ready() {
            return Err(EngineError::NotReady);
        }

        let raw = self.runtime.search(query).await?;
        let results: SearchResultSet = serde_json::from_str(&raw)?;
        debug!(result_count = results.len(), "engine answered");
        Ok(results)
    }
}
