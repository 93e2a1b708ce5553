use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::AssetError;

/// Identifier of the page (browser tab) a message comes from or goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab-{}", self.0)
    }
}

/// One ranked candidate article as produced by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub page_id: i64,
    pub page_title: String,
    pub item_id: i64,
    pub score: f64,
    pub views: u64,
    pub in_link_count: u64,
    pub out_link_count: u64,
    pub isa_featured_article: bool,
    pub isa_good_article: bool,
}

/// Results in engine rank order. Never re-sorted on this side.
pub type SearchResultSet = Vec<SearchResult>;

/// Messages exchanged between the background and page contexts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Message {
    Initialize,
    Suggest {
        query: String,
        result: SearchResultSet,
    },
}

impl Message {
    pub fn action(&self) -> &'static str {
        match self {
            Message::Initialize => "initialize",
            Message::Suggest { .. } => "suggest",
        }
    }
}

/// The closed set of artifact names the engine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRegistry {
    names: Vec<String>,
}

impl ArtifactRegistry {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort_unstable();
        names.dedup();
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|known| known == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for ArtifactRegistry {
    fn default() -> Self {
        Self::new(["cv.joblib", "df_articles.csv", "wwt_config.json", "xbm25.npz"])
    }
}

/// Raw bytes of every registered artifact.
///
/// Only constructible complete: a value of this type always covers the
/// whole registry it was built for.
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    files: BTreeMap<String, Vec<u8>>,
}

impl ModelArtifacts {
    pub fn from_complete(
        registry: &ArtifactRegistry,
        files: BTreeMap<String, Vec<u8>>,
    ) -> Result<Self, AssetError> {
        if let Some(missing) = registry
            .names()
            .iter()
            .find(|name| !files.contains_key(name.as_str()))
        {
            return Err(AssetError::Incomplete(missing.clone()));
        }

        if let Some(extra) = files.keys().find(|name| !registry.contains(name)) {
            return Err(AssetError::UnknownArtifact(extra.clone()));
        }

        Ok(Self { files })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    pub fn total_bytes(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files
            .iter()
            .map(|(name, data)| (name.as_str(), data.as_slice()))
    }
}

/// Where a native context-menu item is offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuContext {
    Selection,
    Page,
    Link,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: String,
    pub title: String,
    pub contexts: Vec<MenuContext>,
}

/// A user click on a context-menu item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub menu_item_id: String,
    pub selection_text: Option<String>,
    pub tab_id: TabId,
}

impl Activation {
    pub fn new(menu_item_id: impl Into<String>, selection: impl Into<String>, tab_id: TabId) -> Self {
        Self {
            menu_item_id: menu_item_id.into(),
            selection_text: Some(selection.into()),
            tab_id,
        }
    }
}

/// Fixed-size display surface the results open in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpec {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn messages_use_action_tag() -> Result<(), Box<dyn Error>> {
        let encoded = serde_json::to_value(&Message::Initialize)?;
        assert_eq!(encoded, serde_json::json!({"action": "initialize"}));

        let decoded: Message = serde_json::from_str(
            r#"{"action":"suggest","query":"rust","result":[]}"#,
        )?;
        assert_eq!(
            decoded,
            Message::Suggest {
                query: "rust".to_string(),
                result: Vec::new(),
            }
        );
        assert_eq!(decoded.action(), "suggest");
        Ok(())
    }

    #[test]
    fn engine_json_keeps_every_field() -> Result<(), Box<dyn Error>> {
        let raw = r#"[{"page_id":1,"page_title":"Ada_Lovelace","item_id":10,"score":0.9712345678901234,"views":5000,"in_link_count":50,"out_link_count":20,"isa_featured_article":true,"isa_good_article":false}]"#;
        let results: SearchResultSet = serde_json::from_str(raw)?;

        assert_eq!(results.len(), 1);
        let first = &results[0];
        assert_eq!(first.page_id, 1);
        assert_eq!(first.page_title, "Ada_Lovelace");
        assert_eq!(first.item_id, 10);
        assert_eq!(first.score, 0.9712345678901234);
        assert_eq!(first.views, 5000);
        assert_eq!(first.in_link_count, 50);
        assert_eq!(first.out_link_count, 20);
        assert!(first.isa_featured_article);
        assert!(!first.isa_good_article);
        Ok(())
    }

    #[test]
    fn artifacts_must_cover_registry() {
        let registry = ArtifactRegistry::new(["a.bin", "b.bin"]);
        let mut files = BTreeMap::new();
        files.insert("a.bin".to_string(), vec![1, 2, 3]);

        let partial = ModelArtifacts::from_complete(&registry, files.clone());
        assert!(matches!(partial, Err(AssetError::Incomplete(name)) if name == "b.bin"));

        files.insert("b.bin".to_string(), vec![4]);
        let complete = ModelArtifacts::from_complete(&registry, files);
        assert!(matches!(complete, Ok(ref artifacts) if artifacts.total_bytes() == 4));
    }

    #[test]
    fn default_registry_lists_engine_files() {
        let registry = ArtifactRegistry::default();
        assert_eq!(registry.len(), 4);
        assert!(registry.contains("xbm25.npz"));
        assert!(!registry.contains("icon.png"));
    }
}
