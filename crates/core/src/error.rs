use thiserror::Error;

use crate::TabId;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("artifact is not registered: {0}")]
    UnknownArtifact(String),

    #[error("artifact set is incomplete, missing: {0}")]
    Incomplete(String),

    #[error("fetching {name} returned status {status}")]
    Status { name: String, status: u16 },

    #[error("reading {name} failed: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("runtime failed to start: {0}")]
    RuntimeStart(String),

    #[error("package installation failed: {0}")]
    PackageInstall(String),

    #[error("ranking module failed to load: {0}")]
    ModuleLoad(String),

    #[error("engine rejected artifact {name}: {details}")]
    Ingest { name: String, details: String },

    #[error("engine call failed: {0}")]
    Call(String),

    #[error("engine returned malformed results: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("engine is not ready")]
    NotReady,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Boot failures permanently disable search; call failures only affect one activation.
    pub fn is_boot_failure(&self) -> bool {
        matches!(
            self,
            EngineError::RuntimeStart(_)
                | EngineError::PackageInstall(_)
                | EngineError::ModuleLoad(_)
                | EngineError::Ingest { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("asset load failed: {0}")]
    Assets(#[from] AssetError),

    #[error("engine boot failed: {0}")]
    Engine(#[from] EngineError),
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("no page connected for {0}")]
    PageClosed(TabId),

    #[error("background context is gone")]
    BackgroundClosed,
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("context menu item already exists: {0}")]
    DuplicateMenuItem(String),

    #[error("display surface failed: {0}")]
    Display(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SuggestError {
    #[error("menu item {0} is not handled here")]
    UnrelatedMenuItem(String),

    #[error("context menu is not installed")]
    MenuNotInstalled,

    #[error("activation carried no selected text")]
    EmptySelection,

    #[error("models are not ready")]
    NotReady,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Delivery(#[from] RouterError),
}
