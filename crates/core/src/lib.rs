pub mod assets;
pub mod background;
pub mod bridge;
pub mod config;
pub mod controller;
pub mod error;
pub mod hosts;
pub mod models;
pub mod page;
pub mod presenter;
pub mod readiness;
pub mod router;
pub mod runtime;
pub mod traits;

pub use assets::{source_for_base, AssetFetcher, DirectoryAssetSource, HttpAssetSource};
pub use background::BackgroundContext;
pub use bridge::SearchEngineBridge;
pub use config::{ExtensionConfig, DEFAULT_MAX_RESULTS, SUGGEST_MENU_ID, WIKI_BASE_URL};
pub use controller::ContextActionController;
pub use error::{AssetError, EngineError, HostError, LoadError, RouterError, SuggestError};
pub use hosts::{DirectorySurface, MenuRegistry};
pub use models::{
    Activation, ArtifactRegistry, MenuContext, MenuItem, Message, ModelArtifacts, SearchResult,
    SearchResultSet, TabId, WindowSpec,
};
pub use page::PageContext;
pub use presenter::ResultPresenter;
pub use readiness::ReadinessState;
pub use router::{
    BackgroundHandler, BackgroundInbox, Envelope, MessageRouter, PageHandler, PagePort,
};
pub use runtime::{ProcessRuntime, ProcessRuntimeConfig};
pub use traits::{AssetSource, ContextMenuHost, DisplaySurface, ScriptRuntime};
