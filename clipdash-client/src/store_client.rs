use std::{
    collections::HashMap,
    future::Future,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use clipdash_core::{
    Collection, ItemId, MovedItem, NewItemFields, PinnedChange, RequestId, StoreOp, StoreReply,
    StoreRequest, Tab, WireMessage, decode_frame, encode_frame,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::ClientError;

/// The external item-store as seen by a drag session.
pub trait ItemStore: Clone + Send + Sync + 'static {
    fn get_collection(&self) -> impl Future<Output = Result<Collection, ClientError>> + Send;

    fn create_item(
        &self,
        fields: NewItemFields,
    ) -> impl Future<Output = Result<ItemId, ClientError>> + Send;

    /// Must be safe to call repeatedly with the same batch.
    fn apply_moved_items(
        &self,
        changes: Vec<MovedItem>,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    fn update_tab_order(&self, tabs: Vec<Tab>)
    -> impl Future<Output = Result<(), ClientError>> + Send;

    fn update_pinned_clips(
        &self,
        changes: Vec<PinnedChange>,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;
}

type PendingReplies = Arc<Mutex<HashMap<RequestId, oneshot::Sender<StoreReply>>>>;

/// Store client speaking the framed request/response protocol over a
/// websocket. Cheap to clone; clones share one connection.
#[derive(Debug, Clone)]
pub struct WsStoreClient {
    outbound: mpsc::UnboundedSender<Message>,
    pending: PendingReplies,
    next_request_id: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

impl WsStoreClient {
    pub async fn connect(server_url: &str) -> Result<Self, ClientError> {
        let url = Url::parse(server_url).map_err(|err| ClientError::InvalidUrl(err.to_string()))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ClientError::InvalidUrl(format!(
                "unsupported scheme {}",
                url.scheme()
            )));
        }

        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|err| ClientError::Connect(err.to_string()))?;
        info!(server_url = %url, "connected to store");

        let (mut write, mut read) = ws_stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let pending: PendingReplies = Arc::default();
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if write.send(message).await.is_err() {
                    break;
                }
            }
        });

        let pending_for_reader = Arc::clone(&pending);
        let closed_for_reader = Arc::clone(&closed);
        tokio::spawn(async move {
            while let Some(next) = read.next().await {
                let message = match next {
                    Ok(message) => message,
                    Err(err) => {
                        warn!("store receive error: {}", err);
                        break;
                    }
                };
                match message {
                    Message::Binary(data) => match decode_frame(&data) {
                        Ok(WireMessage::Response(response)) => {
                            let waiter = pending_for_reader
                                .lock()
                                .ok()
                                .and_then(|mut pending| pending.remove(&response.request_id));
                            match waiter {
                                Some(waiter) => {
                                    let _ = waiter.send(response.reply);
                                }
                                None => warn!(
                                    request_id = response.request_id,
                                    "response without pending request"
                                ),
                            }
                        }
                        Ok(WireMessage::Request(_)) => warn!("unexpected request frame from store"),
                        Err(err) => warn!("decode frame failed: {}", err),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }

            closed_for_reader.store(true, Ordering::SeqCst);
            if let Ok(mut pending) = pending_for_reader.lock() {
                pending.clear();
            }
            info!("store connection closed");
        });

        Ok(Self {
            outbound,
            pending,
            next_request_id: Arc::new(AtomicU64::new(1)),
            closed,
        })
    }

    async fn call(&self, op: StoreOp) -> Result<StoreReply, ClientError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let frame = encode_frame(&WireMessage::Request(StoreRequest { request_id, op }))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|_| ClientError::ConnectionClosed)?
            .insert(request_id, reply_tx);
        if self.closed.load(Ordering::SeqCst) {
            self.forget(request_id);
            return Err(ClientError::ConnectionClosed);
        }

        if self.outbound.send(Message::Binary(frame.into())).is_err() {
            self.forget(request_id);
            return Err(ClientError::ConnectionClosed);
        }
        debug!(request_id, "store request sent");

        let reply = reply_rx.await.map_err(|_| ClientError::ConnectionClosed)?;
        match reply {
            StoreReply::Error { message } => Err(ClientError::Store(message)),
            reply => Ok(reply),
        }
    }

    fn forget(&self, request_id: RequestId) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&request_id);
        }
    }

    async fn call_applied(&self, op: StoreOp) -> Result<(), ClientError> {
        match self.call(op).await? {
            StoreReply::Applied { count } => {
                debug!(count, "store applied changes");
                Ok(())
            }
            other => Err(ClientError::UnexpectedReply(format!("{other:?}"))),
        }
    }
}

impl ItemStore for WsStoreClient {
    async fn get_collection(&self) -> Result<Collection, ClientError> {
        match self.call(StoreOp::GetCollection).await? {
            StoreReply::Collection(collection) => Ok(collection),
            other => Err(ClientError::UnexpectedReply(format!("{other:?}"))),
        }
    }

    async fn create_item(&self, fields: NewItemFields) -> Result<ItemId, ClientError> {
        match self.call(StoreOp::CreateItem(fields)).await? {
            StoreReply::Created { item_id } => Ok(item_id),
            other => Err(ClientError::UnexpectedReply(format!("{other:?}"))),
        }
    }

    async fn apply_moved_items(&self, changes: Vec<MovedItem>) -> Result<(), ClientError> {
        self.call_applied(StoreOp::ApplyMovedItems(changes)).await
    }

    async fn update_tab_order(&self, tabs: Vec<Tab>) -> Result<(), ClientError> {
        self.call_applied(StoreOp::UpdateTabOrder(tabs)).await
    }

    async fn update_pinned_clips(&self, changes: Vec<PinnedChange>) -> Result<(), ClientError> {
        self.call_applied(StoreOp::UpdatePinnedClips(changes)).await
    }
}
