use crate::{Message, RouterError, SearchResultSet, TabId};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::debug;

/// A message received by the background context along with the page it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub sender: TabId,
    pub message: Message,
}

/// Cross-context transport. Sends never block and are never acknowledged.
pub struct MessageRouter {
    background: UnboundedSender<Envelope>,
    pages: RwLock<HashMap<TabId, UnboundedSender<Message>>>,
}

impl MessageRouter {
    pub fn new() -> (Self, BackgroundInbox) {
        let (background, inbox) = unbounded_channel();
        let router = Self {
            background,
            pages: RwLock::new(HashMap::new()),
        };
        (router, BackgroundInbox { inbox })
    }

    /// Registers a page and hands back its end of the transport.
    pub fn connect_page(&self, tab_id: TabId) -> PagePort {
        let (sender, inbox) = unbounded_channel();
        self.pages.write().insert(tab_id, sender);
        debug!(tab = %tab_id, "page connected");

        PagePort {
            tab_id,
            background: self.background.clone(),
            inbox,
        }
    }

    /// Drops the router's sender for a page so its listener loop ends.
    pub fn disconnect_page(&self, tab_id: TabId) -> bool {
        self.pages.write().remove(&tab_id).is_some()
    }

    /// Sends to one page only. There is no broadcast.
    pub fn send_to_tab(&self, tab_id: TabId, message: Message) -> Result<(), RouterError> {
        let pages = self.pages.read();
        let sender = pages.get(&tab_id).ok_or(RouterError::PageClosed(tab_id))?;
        sender
            .send(message)
            .map_err(|_| RouterError::PageClosed(tab_id))
    }
}

pub struct BackgroundInbox {
    inbox: UnboundedReceiver<Envelope>,
}

impl BackgroundInbox {
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.inbox.recv().await
    }
}

/// A page's end of the transport.
pub struct PagePort {
    tab_id: TabId,
    background: UnboundedSender<Envelope>,
    inbox: UnboundedReceiver<Message>,
}

impl PagePort {
    pub fn tab_id(&self) -> TabId {
        self.tab_id
    }

    pub fn send(&self, message: Message) -> Result<(), RouterError> {
        self.background
            .send(Envelope {
                sender: self.tab_id,
                message,
            })
            .map_err(|_| RouterError::BackgroundClosed)
    }

    pub async fn recv(&mut self) -> Option<Message> {
        self.inbox.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Message> {
        self.inbox.try_recv().ok()
    }
}

/// Reactions of the background context, keyed by message action.
#[async_trait]
pub trait BackgroundHandler {
    async fn on_initialize(&self, sender: TabId);
}

/// Reactions of a page context, keyed by message action.
#[async_trait]
pub trait PageHandler {
    async fn on_suggest(&self, query: String, results: SearchResultSet);
}

pub async fn dispatch_to_background<H>(handler: &H, envelope: Envelope)
where
    H: BackgroundHandler + Sync,
{
    match envelope.message {
        Message::Initialize => handler.on_initialize(envelope.sender).await,
        other => debug!(
            tab = %envelope.sender,
            action = other.action(),
            "background ignores message"
        ),
    }
}

pub async fn dispatch_to_page<H>(handler: &H, message: Message)
where
    H: PageHandler + Sync,
{
    match message {
        Message::Suggest { query, result } => handler.on_suggest(query, result).await,
        other => debug!(action = other.action(), "page ignores message"),
    }
}
