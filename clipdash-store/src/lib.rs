use std::{path::Path, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade, ws::Message},
    response::IntoResponse,
    routing::get,
};
use clipdash_core::{
    Collection, ItemId, MovedItem, NewItemFields, PinnedChange, StoreOp, StoreReply,
    StoreRequest, StoreResponse, Tab, WireMessage, decode_frame, encode_frame, wire::MAX_FRAME_BYTES,
};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    net::TcpListener,
    sync::{RwLock, mpsc},
};
use tracing::{debug, error, info, warn};

/// Seed files are expected to be small; refuse anything larger.
pub const MAX_SEED_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown item {0}")]
    UnknownItem(ItemId),
    #[error("unknown tab {0}")]
    UnknownTab(String),
    #[error("parent {0} is not a board")]
    ParentNotBoard(ItemId),
    #[error("seed file too large: {size} bytes (max {max})")]
    SeedTooLarge { size: u64, max: u64 },
    #[error("seed file read failed: {0}")]
    SeedRead(#[from] std::io::Error),
    #[error("seed file parse failed: {0}")]
    SeedParse(#[from] serde_json::Error),
}

/// The authoritative collection held by the store.
#[derive(Debug, Default)]
pub struct StoreState {
    collection: Collection,
}

impl StoreState {
    pub fn new(collection: Collection) -> Self {
        Self { collection }
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn apply(&mut self, op: StoreOp) -> Result<StoreReply, StoreError> {
        match op {
            StoreOp::GetCollection => Ok(StoreReply::Collection(self.collection.clone())),
            StoreOp::CreateItem(fields) => {
                let item_id = self.create_item(fields)?;
                Ok(StoreReply::Created { item_id })
            }
            StoreOp::ApplyMovedItems(changes) => Ok(StoreReply::Applied {
                count: self.apply_moved_items(&changes),
            }),
            StoreOp::UpdateTabOrder(tabs) => Ok(StoreReply::Applied {
                count: self.update_tab_order(&tabs),
            }),
            StoreOp::UpdatePinnedClips(changes) => Ok(StoreReply::Applied {
                count: self.update_pinned_clips(&changes),
            }),
        }
    }

    fn create_item(&mut self, fields: NewItemFields) -> Result<ItemId, StoreError> {
        if self.collection.tab(&fields.tab_id).is_none() {
            return Err(StoreError::UnknownTab(fields.tab_id));
        }
        if let Some(parent_id) = fields.parent_id.as_deref() {
            match self.collection.item(parent_id) {
                None => return Err(StoreError::UnknownItem(parent_id.to_owned())),
                Some(parent) if !parent.is_board() => {
                    return Err(StoreError::ParentNotBoard(parent_id.to_owned()));
                }
                Some(_) => {}
            }
        }

        let item_id = new_item_id();
        info!(item_id = %item_id, name = %fields.name, tab_id = %fields.tab_id, "created item");
        self.collection.items.push(fields.into_item(item_id.clone()));
        self.collection.revision += 1;
        Ok(item_id)
    }

    /// Writes absolute positions, so replaying a batch is harmless.
    fn apply_moved_items(&mut self, changes: &[MovedItem]) -> usize {
        let mut applied = 0;
        for change in changes {
            if change.collection_id != self.collection.collection_id {
                warn!(item_id = %change.item_id, collection_id = %change.collection_id, "change for another collection ignored");
                continue;
            }
            match self.collection.item_mut(&change.item_id) {
                Some(item) => {
                    item.parent_id = change.parent_id.clone();
                    item.tab_id = Some(change.tab_id.clone());
                    item.order_number = change.order_number;
                    applied += 1;
                }
                None => warn!(item_id = %change.item_id, "moved item not found"),
            }
        }
        if applied > 0 {
            self.collection.revision += 1;
        }
        applied
    }

    fn update_tab_order(&mut self, tabs: &[Tab]) -> usize {
        let mut applied = 0;
        for update in tabs {
            match self.collection.tabs.iter_mut().find(|tab| tab.tab_id == update.tab_id) {
                Some(tab) => {
                    tab.tab_order_number = update.tab_order_number;
                    applied += 1;
                }
                None => warn!(tab_id = %update.tab_id, "tab not found"),
            }
        }
        applied
    }

    fn update_pinned_clips(&mut self, changes: &[PinnedChange]) -> usize {
        let mut applied = 0;
        for change in changes {
            match self.collection.item_mut(&change.item_id) {
                Some(item) => {
                    item.is_pinned = change.is_pinned;
                    item.pinned_order_number = change.pinned_order_number;
                    applied += 1;
                }
                None => warn!(item_id = %change.item_id, "pinned item not found"),
            }
        }
        if applied > 0 {
            self.collection.revision += 1;
        }
        applied
    }
}

fn new_item_id() -> ItemId {
    hex::encode(rand::random::<[u8; 8]>())
}

pub fn load_seed(path: &Path) -> Result<Collection, StoreError> {
    let meta = std::fs::metadata(path)?;
    if meta.len() > MAX_SEED_BYTES {
        return Err(StoreError::SeedTooLarge {
            size: meta.len(),
            max: MAX_SEED_BYTES,
        });
    }
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

#[derive(Debug, Clone)]
pub struct AppState {
    inner: Arc<RwLock<StoreState>>,
}

impl AppState {
    #[must_use]
    pub fn new() -> Self {
        Self::with_collection(Collection::default())
    }

    #[must_use]
    pub fn with_collection(collection: Collection) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreState::new(collection))),
        }
    }

    pub async fn snapshot(&self) -> Collection {
        self.inner.read().await.collection().clone()
    }

    pub async fn handle(&self, request: StoreRequest) -> StoreResponse {
        let StoreRequest { request_id, op } = request;
        let reply = match self.inner.write().await.apply(op) {
            Ok(reply) => reply,
            Err(err) => {
                warn!(request_id, "store request failed: {}", err);
                StoreReply::Error {
                    message: err.to_string(),
                }
            }
        };
        StoreResponse { request_id, reply }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), String> {
    info!(
        "store listening on {}",
        listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_owned())
    );
    axum::serve(listener, build_router(state))
        .await
        .map_err(|err| err.to_string())
}

async fn healthz_handler() -> impl IntoResponse {
    Json(serde_json::json!({"ok": true}))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.max_frame_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| async move {
            if let Err(err) = handle_socket(state, socket).await {
                warn!("socket session ended with error: {}", err);
            }
        })
}

async fn handle_socket(
    state: AppState,
    socket: axum::extract::ws::WebSocket,
) -> Result<(), String> {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Split streams only flush queued pongs when the write half sends.
    const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

    let send_task = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(KEEPALIVE_INTERVAL);
        ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = outbound_rx.recv() => {
                    match msg {
                        Some(message) => {
                            if ws_sender.send(message).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    info!("client connected");

    while let Some(next_message) = ws_receiver.next().await {
        let message = match next_message {
            Ok(message) => message,
            Err(err) => {
                warn!("websocket receive error: {}", err);
                break;
            }
        };

        match message {
            Message::Binary(data) => {
                let request = match decode_frame(&data) {
                    Ok(WireMessage::Request(request)) => request,
                    Ok(WireMessage::Response(_)) => {
                        warn!("unexpected response frame from client");
                        continue;
                    }
                    Err(err) => {
                        warn!("failed to decode frame: {}", err);
                        continue;
                    }
                };

                debug!(request_id = request.request_id, op = ?request.op, "store request");
                let response = state.handle(request).await;
                match encode_frame(&WireMessage::Response(response)) {
                    Ok(frame) => {
                        if outbound_tx.send(Message::Binary(frame.into())).is_err() {
                            break;
                        }
                    }
                    Err(err) => error!("failed to encode response: {}", err),
                }
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Text(_) => {}
        }
    }

    send_task.abort();
    info!("client disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use clipdash_core::{BoardMeta, ClipMeta, Item, ItemKind, TabLayout};

    use super::*;

    fn seeded() -> StoreState {
        let item = |id: &str, parent: Option<&str>, order: u32, kind: ItemKind| Item {
            id: id.to_owned(),
            name: id.to_owned(),
            description: None,
            color: None,
            parent_id: parent.map(str::to_owned),
            tab_id: Some("t1".to_owned()),
            order_number: order,
            kind,
            is_pinned: false,
            pinned_order_number: None,
            updated_at: 0,
        };
        StoreState::new(Collection {
            collection_id: "col".to_owned(),
            items: vec![
                item("b", None, 0, ItemKind::Board(BoardMeta::default())),
                item("c", Some("b"), 0, ItemKind::Clip(ClipMeta::default())),
            ],
            tabs: vec![Tab {
                tab_id: "t1".to_owned(),
                tab_name: "One".to_owned(),
                tab_order_number: 0,
                tab_layout: TabLayout::Auto,
                tab_layout_split: 1,
                tab_color: None,
            }],
            revision: 0,
        })
    }

    fn fields(parent: Option<&str>, tab: &str) -> NewItemFields {
        NewItemFields {
            name: "new".to_owned(),
            description: None,
            color: None,
            parent_id: parent.map(str::to_owned),
            tab_id: tab.to_owned(),
            order_number: 0,
            kind: ItemKind::Board(BoardMeta::default()),
            collection_id: "col".to_owned(),
        }
    }

    #[test]
    fn create_item_validates_tab_and_parent() {
        let mut state = seeded();
        assert!(matches!(
            state.apply(StoreOp::CreateItem(fields(None, "nope"))),
            Err(StoreError::UnknownTab(_))
        ));
        assert!(matches!(
            state.apply(StoreOp::CreateItem(fields(Some("c"), "t1"))),
            Err(StoreError::ParentNotBoard(_))
        ));
        let Ok(StoreReply::Created { item_id }) = state.apply(StoreOp::CreateItem(fields(Some("b"), "t1"))) else {
            panic!("expected created reply");
        };
        assert_eq!(item_id.len(), 16);
        assert!(state.collection().item(&item_id).is_some());
    }

    #[test]
    fn applying_moved_items_twice_is_stable() {
        let mut state = seeded();
        let batch = vec![
            MovedItem {
                item_id: "c".to_owned(),
                parent_id: None,
                tab_id: "t1".to_owned(),
                order_number: 1,
                collection_id: "col".to_owned(),
            },
            MovedItem {
                item_id: "ghost".to_owned(),
                parent_id: None,
                tab_id: "t1".to_owned(),
                order_number: 2,
                collection_id: "col".to_owned(),
            },
        ];
        let first = state.apply(StoreOp::ApplyMovedItems(batch.clone())).unwrap();
        let items_after_first = state.collection().items.clone();
        let second = state.apply(StoreOp::ApplyMovedItems(batch)).unwrap();

        assert_eq!(first, StoreReply::Applied { count: 1 });
        assert_eq!(second, first);
        assert_eq!(state.collection().items, items_after_first);
        let clip = state.collection().item("c").unwrap();
        assert_eq!(clip.parent_id, None);
        assert_eq!(clip.order_number, 1);
    }

    #[test]
    fn tab_order_and_pinned_updates_skip_unknown_ids() {
        let mut state = seeded();
        let mut tab = state.collection().tabs[0].clone();
        tab.tab_order_number = 3;
        let mut ghost = tab.clone();
        ghost.tab_id = "ghost".to_owned();

        let reply = state.apply(StoreOp::UpdateTabOrder(vec![tab, ghost])).unwrap();
        assert_eq!(reply, StoreReply::Applied { count: 1 });
        assert_eq!(state.collection().tabs[0].tab_order_number, 3);

        let reply = state
            .apply(StoreOp::UpdatePinnedClips(vec![PinnedChange {
                item_id: "c".to_owned(),
                is_pinned: true,
                pinned_order_number: Some(0),
            }]))
            .unwrap();
        assert_eq!(reply, StoreReply::Applied { count: 1 });
        let clip = state.collection().item("c").unwrap();
        assert!(clip.is_pinned);
        assert_eq!(clip.pinned_order_number, Some(0));
        assert_eq!(clip.parent_id.as_deref(), Some("b"));
    }

    #[test]
    fn seed_file_loads_collection() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let path = dir.path().join("seed.json");
        std::fs::write(&path, serde_json::to_string(seeded().collection()).unwrap()).unwrap();

        let loaded = load_seed(&path).unwrap();
        assert_eq!(loaded.items.len(), 2);
    }
}
