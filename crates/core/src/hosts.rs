use crate::traits::{ContextMenuHost, DisplaySurface};
use crate::{HostError, MenuItem, WindowSpec};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// In-process stand-in for the browser's context-menu registry.
/// Like the browser, it refuses a second item with the same id.
#[derive(Debug, Default)]
pub struct MenuRegistry {
    items: Mutex<Vec<MenuItem>>,
}

impl MenuRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> Vec<MenuItem> {
        self.items.lock().clone()
    }
}

#[async_trait]
impl ContextMenuHost for MenuRegistry {
    async fn create(&self, item: &MenuItem) -> Result<(), HostError> {
        let mut items = self.items.lock();
        if items.iter().any(|existing| existing.id == item.id) {
            return Err(HostError::DuplicateMenuItem(item.id.clone()));
        }
        items.push(item.clone());
        Ok(())
    }
}

/// Writes every opened window as a numbered HTML file.
#[derive(Debug)]
pub struct DirectorySurface {
    out_dir: PathBuf,
    opened: AtomicUsize,
}

impl DirectorySurface {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            opened: AtomicUsize::new(0),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DisplaySurface for DirectorySurface {
    async fn open(&self, window: &WindowSpec, markup: String) -> Result<(), HostError> {
        tokio::fs::create_dir_all(&self.out_dir).await?;

        let sequence = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        let path = self.out_dir.join(format!("results-{sequence:03}.html"));
        tokio::fs::write(&path, markup).await?;

        info!(
            path = %path.display(),
            window = %window.name,
            width = window.width,
            height = window.height,
            "results window opened"
        );
        Ok(())
    }
}
