use crate::assets::AssetFetcher;
use crate::bridge::SearchEngineBridge;
use crate::controller::ContextActionController;
use crate::router::{dispatch_to_background, BackgroundHandler, BackgroundInbox, MessageRouter};
use crate::traits::{AssetSource, ContextMenuHost, ScriptRuntime};
use crate::{Activation, ExtensionConfig, LoadError, ReadinessState, SuggestError, TabId};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// The extension's background side: loads the models, installs the menu
/// action on request and serves activations.
pub struct BackgroundContext<S, R, M> {
    fetcher: AssetFetcher<S>,
    bridge: Arc<SearchEngineBridge<R>>,
    controller: Arc<ContextActionController<R, M>>,
    readiness: Arc<ReadinessState>,
}

impl<S, R, M> BackgroundContext<S, R, M>
where
    S: AssetSource + Send + Sync + 'static,
    R: ScriptRuntime + Send + Sync + 'static,
    M: ContextMenuHost + Send + Sync + 'static,
{
    pub fn new(
        config: &ExtensionConfig,
        source: S,
        runtime: R,
        menu_host: M,
        router: Arc<MessageRouter>,
        module_source: impl Into<String>,
    ) -> Self {
        let readiness = Arc::new(ReadinessState::new());
        let bridge = Arc::new(SearchEngineBridge::new(
            runtime,
            Arc::clone(&readiness),
            config.packages.clone(),
            module_source,
        ));
        let controller = Arc::new(ContextActionController::new(
            Arc::clone(&bridge),
            Arc::clone(&readiness),
            menu_host,
            router,
            config.menu_item.clone(),
        ));

        Self {
            fetcher: AssetFetcher::new(source, config.artifacts.clone()),
            bridge,
            controller,
            readiness,
        }
    }

    pub fn readiness(&self) -> Arc<ReadinessState> {
        Arc::clone(&self.readiness)
    }

    pub fn bridge(&self) -> &SearchEngineBridge<R> {
        &self.bridge
    }

    pub fn controller(&self) -> &ContextActionController<R, M> {
        &self.controller
    }

    /// Fetches every artifact, then boots the engine with them. Failures are
    /// final for this session: readiness is never set and nothing retries.
    pub async fn load_models(&self) -> Result<(), LoadError> {
        info!(artifacts = ?self.fetcher.registry().names(), "loading models");

        let artifacts = match self.fetcher.fetch_all().await {
            Ok(artifacts) => artifacts,
            Err(load_error) => {
                error!(error = %load_error, "model artifacts failed to load; suggestions disabled");
                return Err(load_error.into());
            }
        };

        if let Err(boot_error) = self.bridge.boot(artifacts).await {
            error!(error = %boot_error, "engine failed to boot; suggestions disabled");
            return Err(boot_error.into());
        }

        info!("WikiWhatsThis ready");
        Ok(())
    }

    pub fn spawn_model_load(self: &Arc<Self>) -> JoinHandle<Result<(), LoadError>> {
        let context = Arc::clone(self);
        tokio::spawn(async move { context.load_models().await })
    }

    /// Serves page messages and menu activations until the activation
    /// channel closes, then waits for in-flight activations.
    ///
    /// Each activation runs as its own task; overlapping activations are
    /// neither merged nor cancelled.
    pub async fn run(
        self: Arc<Self>,
        mut inbox: BackgroundInbox,
        mut activations: UnboundedReceiver<Activation>,
    ) {
        let mut in_flight = JoinSet::new();
        let mut inbox_open = true;

        loop {
            tokio::select! {
                envelope = inbox.recv(), if inbox_open => match envelope {
                    Some(envelope) => dispatch_to_background(self.as_ref(), envelope).await,
                    None => inbox_open = false,
                },
                activation = activations.recv() => match activation {
                    Some(activation) => {
                        let controller = Arc::clone(&self.controller);
                        in_flight.spawn(async move { serve_activation(&controller, activation).await });
                    }
                    None => break,
                },
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
            }
        }

        while in_flight.join_next().await.is_some() {}
        debug!("background context stopped");
    }
}

async fn serve_activation<R, M>(controller: &ContextActionController<R, M>, activation: Activation)
where
    R: ScriptRuntime + Send + Sync,
    M: ContextMenuHost + Send + Sync,
{
    let tab = activation.tab_id;
    match controller.activate(activation).await {
        Ok(_) => {}
        Err(SuggestError::UnrelatedMenuItem(menu_item)) => {
            debug!(%menu_item, "activation for another menu item")
        }
        Err(drop_reason) => warn!(%tab, error = %drop_reason, "activation dropped"),
    }
}

#[async_trait]
impl<S, R, M> BackgroundHandler for BackgroundContext<S, R, M>
where
    S: AssetSource + Send + Sync + 'static,
    R: ScriptRuntime + Send + Sync + 'static,
    M: ContextMenuHost + Send + Sync + 'static,
{
    async fn on_initialize(&self, sender: TabId) {
        match self.controller.initialize().await {
            Ok(installed) => debug!(tab = %sender, installed, "initialize handled"),
            Err(install_error) => warn!(tab = %sender, error = %install_error, "menu install failed"),
        }
    }
}
