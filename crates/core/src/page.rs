use crate::presenter::ResultPresenter;
use crate::router::{dispatch_to_page, PageHandler, PagePort};
use crate::traits::DisplaySurface;
use crate::{Message, RouterError, SearchResultSet, WindowSpec};
use async_trait::async_trait;
use tracing::{debug, warn};

/// The script injected into every page: asks the background to initialize,
/// then opens a results window for each `suggest` message it receives.
pub struct PageContext<D> {
    presenter: ResultPresenter,
    display: D,
    window: WindowSpec,
    asset_base_url: String,
}

impl<D> PageContext<D>
where
    D: DisplaySurface + Send + Sync,
{
    pub fn new(
        presenter: ResultPresenter,
        display: D,
        window: WindowSpec,
        asset_base_url: impl Into<String>,
    ) -> Self {
        Self {
            presenter,
            display,
            window,
            asset_base_url: asset_base_url.into(),
        }
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    /// Runs until the router disconnects this page.
    pub async fn run(&self, mut port: PagePort) -> Result<(), RouterError> {
        port.send(Message::Initialize)?;
        debug!(tab = %port.tab_id(), "initialize requested");

        while let Some(message) = port.recv().await {
            dispatch_to_page(self, message).await;
        }
        Ok(())
    }
}

#[async_trait]
impl<D> PageHandler for PageContext<D>
where
    D: DisplaySurface + Send + Sync,
{
    async fn on_suggest(&self, query: String, results: SearchResultSet) {
        let markup = self.presenter.render(&query, &results, &self.asset_base_url);
        if let Err(error) = self.display.open(&self.window, markup).await {
            warn!(%error, "could not open results window");
        }
    }
}
