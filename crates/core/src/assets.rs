use crate::traits::AssetSource;
use crate::{ArtifactRegistry, AssetError, ModelArtifacts};
use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::Client;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

const MODELS_DIR: &str = "models";

/// Reads artifacts over HTTP from `<base>/models/<name>`.
pub struct HttpAssetSource {
    client: Arc<Client>,
    models_base: Url,
}

impl HttpAssetSource {
    pub fn new(extension_base: &str) -> Result<Self, AssetError> {
        let base = if extension_base.ends_with('/') {
            Url::parse(extension_base)?
        } else {
            Url::parse(&format!("{extension_base}/"))?
        };

        Ok(Self {
            client: Arc::new(Client::new()),
            models_base: base.join(&format!("{MODELS_DIR}/"))?,
        })
    }

    pub fn artifact_url(&self, name: &str) -> Result<Url, AssetError> {
        Ok(self.models_base.join(name)?)
    }
}

#[async_trait]
impl AssetSource for HttpAssetSource {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        let url = self.artifact_url(name)?;
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(AssetError::Status {
                name: name.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Reads artifacts from an unpacked extension directory.
pub struct DirectoryAssetSource {
    root: PathBuf,
}

impl DirectoryAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AssetSource for DirectoryAssetSource {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        let path = self.root.join(MODELS_DIR).join(name);
        tokio::fs::read(&path).await.map_err(|source| AssetError::Io {
            name: name.to_string(),
            source,
        })
    }
}

#[async_trait]
impl AssetSource for Box<dyn AssetSource + Send + Sync> {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        (**self).fetch(name).await
    }
}

/// Picks HTTP for `http(s)://` bases and the filesystem otherwise.
pub fn source_for_base(extension_base: &str) -> Result<Box<dyn AssetSource + Send + Sync>, AssetError> {
    if extension_base.starts_with("http://") || extension_base.starts_with("https://") {
        Ok(Box::new(HttpAssetSource::new(extension_base)?))
    } else {
        Ok(Box::new(DirectoryAssetSource::new(extension_base)))
    }
}

/// Fetches the whole artifact registry, all-or-nothing.
pub struct AssetFetcher<S> {
    source: S,
    registry: ArtifactRegistry,
}

impl<S> AssetFetcher<S>
where
    S: AssetSource + Send + Sync,
{
    pub fn new(source: S, registry: ArtifactRegistry) -> Self {
        Self { source, registry }
    }

    pub fn registry(&self) -> &ArtifactRegistry {
        &self.registry
    }

    pub async fn fetch(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        if !self.registry.contains(name) {
            return Err(AssetError::UnknownArtifact(name.to_string()));
        }

        let data = self.source.fetch(name).await?;
        debug!(artifact = name, bytes = data.len(), "artifact fetched");
        Ok(data)
    }

    /// Fetches every registered artifact in parallel and waits for all of them.
    pub async fn fetch_all(&self) -> Result<ModelArtifacts, AssetError> {
        let fetches = self.registry.names().iter().map(|name| async move {
            let data = self.fetch(name).await?;
            Ok::<_, AssetError>((name.clone(), data))
        });

        let files: BTreeMap<String, Vec<u8>> = try_join_all(fetches).await?.into_iter().collect();
        let artifacts = ModelArtifacts::from_complete(&self.registry, files)?;

        info!(
            artifact_count = artifacts.len(),
            total_bytes = artifacts.total_bytes(),
            "model artifacts loaded"
        );
        Ok(artifacts)
    }
}
