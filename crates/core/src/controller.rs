use crate::bridge::SearchEngineBridge;
use crate::router::MessageRouter;
use crate::traits::{ContextMenuHost, ScriptRuntime};
use crate::{Activation, HostError, MenuItem, Message, ReadinessState, SuggestError};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Installs the "suggest" menu action and turns activations into
/// `suggest` messages for the originating page.
pub struct ContextActionController<R, M> {
    bridge: Arc<SearchEngineBridge<R>>,
    readiness: Arc<ReadinessState>,
    menu_host: M,
    router: Arc<MessageRouter>,
    menu_item: MenuItem,
    install_guard: Mutex<()>,
}

impl<R, M> ContextActionController<R, M>
where
    R: ScriptRuntime + Send + Sync,
    M: ContextMenuHost + Send + Sync,
{
    pub fn new(
        bridge: Arc<SearchEngineBridge<R>>,
        readiness: Arc<ReadinessState>,
        menu_host: M,
        router: Arc<MessageRouter>,
        menu_item: MenuItem,
    ) -> Self {
        Self {
            bridge,
            readiness,
            menu_host,
            router,
            menu_item,
            install_guard: Mutex::new(()),
        }
    }

    pub fn menu_host(&self) -> &M {
        &self.menu_host
    }

    /// Installs the menu item once. Returns `false` when it was already installed.
    pub async fn initialize(&self) -> Result<bool, HostError> {
        if self.readiness.context_menu_ready() {
            return Ok(false);
        }

        let _guard = self.install_guard.lock().await;
        if self.readiness.context_menu_ready() {
            return Ok(false);
        }

        self.menu_host.create(&self.menu_item).await?;
        self.readiness.mark_context_menu_ready();
        info!(menu_item = %self.menu_item.id, "context menu installed");
        Ok(true)
    }

    /// Handles one activation end to end. On any error nothing is sent to the page.
    pub async fn activate(&self, activation: Activation) -> Result<usize, SuggestError> {
        let request_id = Uuid::new_v4();

        if activation.menu_item_id != self.menu_item.id {
            return Err(SuggestError::UnrelatedMenuItem(activation.menu_item_id));
        }
        if !self.readiness.context_menu_ready() {
            return Err(SuggestError::MenuNotInstalled);
        }
        if !self.readiness.models_ready() {
            return Err(SuggestError::NotReady);
        }

        let query = match activation.selection_text {
            Some(text) if !text.is_empty() => text,
            _ => return Err(SuggestError::EmptySelection),
        };

        debug!(%request_id, tab = %activation.tab_id, query_chars = query.chars().count(), "searching");
        let result = self.bridge.search(&query).await?;
        let result_count = result.len();

        self.router
            .send_to_tab(activation.tab_id, Message::Suggest { query, result })?;
        info!(%request_id, tab = %activation.tab_id, result_count, "suggestions delivered");
        Ok(result_count)
    }
}
