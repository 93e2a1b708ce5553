use crate::{ArtifactRegistry, MenuContext, MenuItem, WindowSpec};

pub const SUGGEST_MENU_ID: &str = "suggest";
pub const DEFAULT_MAX_RESULTS: usize = 10;
pub const WIKI_BASE_URL: &str = "https://en.wikipedia.org/wiki";

#[derive(Debug, Clone)]
pub struct ExtensionConfig {
    /// Root of the packaged extension; artifacts live under `models/`.
    pub extension_base: String,
    pub artifacts: ArtifactRegistry,
    /// Packages the engine runtime installs before the ranking module runs.
    pub packages: Vec<String>,
    pub menu_item: MenuItem,
    pub results_window: WindowSpec,
    pub max_results: usize,
    pub wiki_base_url: String,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            extension_base: "./extension".to_string(),
            artifacts: ArtifactRegistry::default(),
            packages: ["nltk", "numpy", "pandas", "scikit-learn"]
                .into_iter()
                .map(String::from)
                .collect(),
            menu_item: MenuItem {
                id: SUGGEST_MENU_ID.to_string(),
                title: "WikiWhatsThis - Suggest".to_string(),
                contexts: vec![MenuContext::Selection],
            },
            results_window: WindowSpec {
                name: "WikiWhatsThis - Results".to_string(),
                width: 640,
                height: 680,
            },
            max_results: DEFAULT_MAX_RESULTS,
            wiki_base_url: WIKI_BASE_URL.to_string(),
        }
    }
}

impl ExtensionConfig {
    /// Base URL the page uses for static assets such as the icon.
    pub fn asset_base_url(&self) -> String {
        if self.extension_base.ends_with('/') {
            self.extension_base.clone()
        } else {
            format!("{}/", self.extension_base)
        }
    }
}
