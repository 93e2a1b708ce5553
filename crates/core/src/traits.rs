use crate::{AssetError, EngineError, HostError, MenuItem, WindowSpec};
use async_trait::async_trait;

/// Storage the model artifacts are read from.
#[async_trait]
pub trait AssetSource {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>, AssetError>;
}

/// The embedded scripting runtime hosting the ranking module.
///
/// The first three methods are the ordered boot steps; the last two are the
/// entry points the ranking module registers.
#[async_trait]
pub trait ScriptRuntime {
    async fn start(&self) -> Result<(), EngineError>;

    async fn install_packages(&self, packages: &[String]) -> Result<(), EngineError>;

    async fn load_module(&self, source: &str) -> Result<(), EngineError>;

    async fn set_model_file_data(&self, name: &str, data: &[u8]) -> Result<(), EngineError>;

    /// Returns the JSON-encoded ranked result array.
    async fn search(&self, query: &str) -> Result<String, EngineError>;
}

/// Native context-menu registry of the host browser.
#[async_trait]
pub trait ContextMenuHost {
    async fn create(&self, item: &MenuItem) -> Result<(), HostError>;
}

/// Opens rendered markup in a new, separate window.
#[async_trait]
pub trait DisplaySurface {
    async fn open(&self, window: &WindowSpec, markup: String) -> Result<(), HostError>;
}
