use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use clipdash_client::{ClientError, DragSession, ItemStore, SessionConfig, WsStoreClient};
use clipdash_core::{
    BoardMeta, ClipMeta, Collection, DragDescriptor, Droppable, Item, ItemId, ItemKind,
    LANDING_BOARD_NAME, MoveFlags, MovePlan, MovedItem, NewItemFields, NoOpReason, PinnedChange,
    Point, Rect, StoreOp, StoreReply, StoreRequest, Tab, find_landing_board, validate_order,
};
use clipdash_store::AppState;

/// Item store backed by the real store state, without the socket.
#[derive(Clone, Default)]
struct InMemoryStore {
    state: AppState,
    next_request_id: Arc<AtomicU64>,
    creates: Arc<AtomicUsize>,
    move_batches: Arc<AtomicUsize>,
    fail_create: Arc<AtomicBool>,
}

impl InMemoryStore {
    fn new(collection: Collection) -> Self {
        Self {
            state: AppState::with_collection(collection),
            ..Self::default()
        }
    }

    async fn call(&self, op: StoreOp) -> Result<StoreReply, ClientError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        match self.state.handle(StoreRequest { request_id, op }).await.reply {
            StoreReply::Error { message } => Err(ClientError::Store(message)),
            reply => Ok(reply),
        }
    }

    async fn snapshot(&self) -> Collection {
        self.state.snapshot().await
    }
}

impl ItemStore for InMemoryStore {
    async fn get_collection(&self) -> Result<Collection, ClientError> {
        match self.call(StoreOp::GetCollection).await? {
            StoreReply::Collection(collection) => Ok(collection),
            other => Err(ClientError::UnexpectedReply(format!("{other:?}"))),
        }
    }

    async fn create_item(&self, fields: NewItemFields) -> Result<ItemId, ClientError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ClientError::Store("create rejected".to_owned()));
        }
        match self.call(StoreOp::CreateItem(fields)).await? {
            StoreReply::Created { item_id } => Ok(item_id),
            other => Err(ClientError::UnexpectedReply(format!("{other:?}"))),
        }
    }

    async fn apply_moved_items(&self, changes: Vec<MovedItem>) -> Result<(), ClientError> {
        self.move_batches.fetch_add(1, Ordering::SeqCst);
        self.call(StoreOp::ApplyMovedItems(changes)).await.map(|_| ())
    }

    async fn update_tab_order(&self, tabs: Vec<Tab>) -> Result<(), ClientError> {
        self.call(StoreOp::UpdateTabOrder(tabs)).await.map(|_| ())
    }

    async fn update_pinned_clips(&self, changes: Vec<PinnedChange>) -> Result<(), ClientError> {
        self.call(StoreOp::UpdatePinnedClips(changes)).await.map(|_| ())
    }
}

fn item(id: &str, parent: Option<&str>, tab: &str, order: u32, kind: ItemKind) -> Item {
    Item {
        id: id.to_owned(),
        name: id.to_owned(),
        description: None,
        color: None,
        parent_id: parent.map(str::to_owned),
        tab_id: Some(tab.to_owned()),
        order_number: order,
        kind,
        is_pinned: false,
        pinned_order_number: None,
        updated_at: 0,
    }
}

fn board(id: &str, parent: Option<&str>, tab: &str, order: u32) -> Item {
    item(id, parent, tab, order, ItemKind::Board(BoardMeta::default()))
}

fn clip(id: &str, parent: Option<&str>, tab: &str, order: u32) -> Item {
    item(id, parent, tab, order, ItemKind::Clip(ClipMeta::default()))
}

fn tab(id: &str, order: u32) -> Tab {
    Tab {
        tab_id: id.to_owned(),
        tab_name: id.to_uppercase(),
        tab_order_number: order,
        tab_layout: Default::default(),
        tab_layout_split: 1,
        tab_color: Some("#336699".to_owned()),
    }
}

/// Tab `home` holds board `b1` with clips `c1..c3`; tab `work` holds board `w1`.
fn dashboard() -> Collection {
    Collection {
        collection_id: "col".to_owned(),
        items: vec![
            board("b1", None, "home", 0),
            clip("c1", Some("b1"), "home", 0),
            clip("c2", Some("b1"), "home", 1),
            clip("c3", Some("b1"), "home", 2),
            board("w1", None, "work", 0),
        ],
        tabs: vec![tab("home", 0), tab("work", 1)],
        revision: 0,
    }
}

fn order_of(collection: &Collection, id: &str) -> Option<(Option<String>, Option<String>, u32)> {
    collection
        .item(id)
        .map(|item| (item.parent_id.clone(), item.tab_id.clone(), item.order_number))
}

fn config() -> SessionConfig {
    SessionConfig {
        debounce: Duration::from_millis(300),
        refetch_delay: Duration::from_millis(100),
    }
}

#[tokio::test(start_paused = true)]
async fn drag_over_applies_locally_and_persists_after_quiet_window() {
    let store = InMemoryStore::new(dashboard());
    let mut session = DragSession::open(store.clone(), "home", config())
        .await
        .expect("open session");

    let active = DragDescriptor::clip("c3");
    session.on_drag_start(active.clone());
    let plan = session
        .on_drag_over(&active, &DragDescriptor::clip("c1"))
        .expect("drag over");
    assert_eq!(
        plan,
        MovePlan::ReorderSiblings {
            item_id: "c3".to_owned(),
            index: 0
        }
    );
    assert_eq!(session.collection().item("c3").map(|i| i.order_number), Some(0));
    assert_eq!(session.collection().item("c1").map(|i| i.order_number), Some(1));

    // Hovering the same target again must not swap back.
    session
        .on_drag_over(&active, &DragDescriptor::clip("c1"))
        .expect("repeat drag over");
    assert_eq!(session.collection().item("c3").map(|i| i.order_number), Some(0));

    session.settle().await;
    assert_eq!(order_of(&store.snapshot().await, "c3").map(|o| o.2), Some(2));

    tokio::time::sleep(Duration::from_millis(400)).await;
    session.settle().await;
    let persisted = store.snapshot().await;
    assert_eq!(order_of(&persisted, "c3").map(|o| o.2), Some(0));
    assert_eq!(order_of(&persisted, "c1").map(|o| o.2), Some(1));
    assert_eq!(order_of(&persisted, "c2").map(|o| o.2), Some(2));
    assert!(validate_order(&persisted).is_ok());

    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn drag_end_flushes_without_waiting_for_debounce() {
    let store = InMemoryStore::new(dashboard());
    let mut session = DragSession::open(store.clone(), "home", config())
        .await
        .expect("open session");

    let active = DragDescriptor::clip("c3");
    let over = DragDescriptor::clip("c1");
    session.on_drag_start(active.clone());
    session.on_drag_over(&active, &over).expect("drag over");
    let plan = session
        .on_drag_end(&active, Some(&over))
        .await
        .expect("drag end");
    assert!(plan.is_live());
    assert!(session.active().is_none());

    session.settle().await;
    assert_eq!(store.move_batches.load(Ordering::SeqCst), 1);
    assert_eq!(order_of(&store.snapshot().await, "c3").map(|o| o.2), Some(0));

    tokio::time::sleep(Duration::from_secs(1)).await;
    session.settle().await;
    assert_eq!(store.move_batches.load(Ordering::SeqCst), 1);

    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn clip_dropped_on_tab_creates_landing_board_once() {
    let store = InMemoryStore::new(dashboard());
    let mut session = DragSession::open(store.clone(), "home", config())
        .await
        .expect("open session");

    let work = DragDescriptor::tab("work");
    for id in ["c1", "c2"] {
        let active = DragDescriptor::clip(id);
        session.on_drag_start(active.clone());
        let plan = session
            .on_drag_end(&active, Some(&work))
            .await
            .expect("cross-tab drop");
        assert!(matches!(plan, MovePlan::CrossTabClip { .. }));
    }
    assert_eq!(store.creates.load(Ordering::SeqCst), 1);

    let landing_id = find_landing_board(session.collection(), "work")
        .map(|board| board.id.clone())
        .expect("landing board");
    let landing = session.collection().item(&landing_id).expect("landing item");
    assert_eq!(landing.name, LANDING_BOARD_NAME);
    assert_eq!(landing.order_number, 0);
    assert_eq!(landing.color.as_deref(), Some("#336699"));
    assert_eq!(session.collection().item("w1").map(|i| i.order_number), Some(1));

    session.settle().await;
    let persisted = store.snapshot().await;
    assert_eq!(
        order_of(&persisted, "c2"),
        Some((Some(landing_id.clone()), Some("work".to_owned()), 0))
    );
    assert_eq!(
        order_of(&persisted, "c1"),
        Some((Some(landing_id.clone()), Some("work".to_owned()), 1))
    );
    assert_eq!(order_of(&persisted, "c3"), Some((Some("b1".to_owned()), Some("home".to_owned()), 0)));
    assert_eq!(order_of(&persisted, "w1").map(|o| o.2), Some(1));
    assert!(validate_order(&persisted).is_ok());

    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn failed_landing_board_creation_abandons_the_move() {
    let store = InMemoryStore::new(dashboard());
    store.fail_create.store(true, Ordering::SeqCst);
    let mut session = DragSession::open(store.clone(), "home", config())
        .await
        .expect("open session");

    let active = DragDescriptor::clip("c3");
    session.on_drag_start(active.clone());
    session
        .on_drag_over(&active, &DragDescriptor::clip("c1"))
        .expect("drag over");
    assert_eq!(session.collection().item("c3").map(|i| i.order_number), Some(0));

    let err = session
        .on_drag_end(&active, Some(&DragDescriptor::tab("work")))
        .await
        .expect_err("landing creation should fail");
    assert!(matches!(err, ClientError::LandingBoard(_)));
    assert!(session.active().is_none());

    let pre_drag = Some((Some("b1".to_owned()), Some("home".to_owned()), 2));
    assert_eq!(order_of(session.collection(), "c3"), pre_drag);
    assert!(find_landing_board(session.collection(), "work").is_none());

    tokio::time::sleep(Duration::from_secs(1)).await;
    session.settle().await;
    assert_eq!(store.move_batches.load(Ordering::SeqCst), 0);
    assert_eq!(order_of(&store.snapshot().await, "c3"), pre_drag);

    session.close().await;
}

/// Clip rows `c1` and `c2` stacked in board `b1`.
fn clip_rows() -> Vec<Droppable> {
    vec![
        Droppable::new(DragDescriptor::clip("c1"), Rect::new(0.0, 0.0, 100.0, 20.0)),
        Droppable::new(DragDescriptor::clip("c2"), Rect::new(0.0, 30.0, 100.0, 20.0)),
    ]
}

fn far_away() -> Rect {
    Rect::new(500.0, 500.0, 100.0, 20.0)
}

#[tokio::test(start_paused = true)]
async fn pointer_moves_drive_drag_over_and_drop_falls_back_to_last_target() {
    let store = InMemoryStore::new(dashboard());
    let mut session = DragSession::open(store.clone(), "home", config())
        .await
        .expect("open session");
    let rows = clip_rows();

    let active = DragDescriptor::clip("c3");
    session.on_drag_start(active.clone());
    let plan = session
        .on_pointer_move(Some(Point::new(50.0, 10.0)), Rect::new(0.0, 5.0, 100.0, 20.0), &rows)
        .expect("pointer over c1");
    let expected = MovePlan::ReorderSiblings {
        item_id: "c3".to_owned(),
        index: 0,
    };
    assert_eq!(plan, Some(expected.clone()));
    assert_eq!(session.collection().item("c3").map(|i| i.order_number), Some(0));

    // Leaving every region keeps the previous target without re-applying it.
    let plan = session
        .on_pointer_move(None, far_away(), &rows)
        .expect("pointer outside");
    assert_eq!(plan, Some(expected.clone()));
    assert_eq!(session.collection().item("c3").map(|i| i.order_number), Some(0));

    let plan = session.on_drag_end(&active, None).await.expect("drop");
    assert_eq!(plan, expected);
    session.settle().await;
    assert_eq!(order_of(&store.snapshot().await, "c3").map(|o| o.2), Some(0));

    let err = session
        .on_pointer_move(None, far_away(), &rows)
        .expect_err("no drag in progress");
    assert!(matches!(err, ClientError::NoActiveDrag));

    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn drag_start_forgets_previous_target() {
    let store = InMemoryStore::new(dashboard());
    let mut session = DragSession::open(store.clone(), "home", config())
        .await
        .expect("open session");
    let rows = clip_rows();

    let first = DragDescriptor::clip("c3");
    session.on_drag_start(first.clone());
    session
        .on_pointer_move(Some(Point::new(50.0, 40.0)), Rect::new(0.0, 35.0, 100.0, 20.0), &rows)
        .expect("pointer over c2");
    session.on_drag_end(&first, None).await.expect("first drop");
    let after_first = session.collection().clone();

    let second = DragDescriptor::clip("c1");
    session.on_drag_start(second.clone());
    let plan = session
        .on_pointer_move(None, far_away(), &rows)
        .expect("pointer outside");
    assert_eq!(plan, None);

    let plan = session.on_drag_end(&second, None).await.expect("second drop");
    assert!(plan.is_noop());
    assert_eq!(session.collection().items, after_first.items);

    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn changed_modifiers_reclassify_the_same_target() {
    let mut collection = dashboard();
    collection.items.push(board("b2", None, "home", 1));
    let store = InMemoryStore::new(collection);
    let mut session = DragSession::open(store.clone(), "home", config())
        .await
        .expect("open session");

    let active = DragDescriptor::clip("c1");
    let over = DragDescriptor::board("b2");
    session.on_drag_start(active.clone());
    let plan = session.on_drag_over(&active, &over).expect("drag over");
    assert_eq!(
        plan,
        MovePlan::ReparentIntoBoard {
            item_id: "c1".to_owned(),
            board_id: "b2".to_owned(),
        }
    );

    session.set_flags(MoveFlags {
        alt_pressed: true,
        reparent_locked: false,
    });
    let plan = session.on_drag_over(&active, &over).expect("drag over with alt");
    assert_eq!(plan, MovePlan::NoOp(NoOpReason::Blocked));

    let plan = session
        .on_drag_end(&active, Some(&over))
        .await
        .expect("drop with alt");
    assert_eq!(plan, MovePlan::NoOp(NoOpReason::Blocked));

    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn cancel_keeps_optimistic_moves_and_refetches() {
    let store = InMemoryStore::new(dashboard());
    let mut session = DragSession::open(store.clone(), "home", config())
        .await
        .expect("open session");

    let active = DragDescriptor::clip("c1");
    session.on_drag_start(active.clone());
    session
        .on_drag_over(&active, &DragDescriptor::clip("c3"))
        .expect("drag over");
    session.on_drag_cancel().await;

    assert!(session.active().is_none());
    assert_eq!(session.collection().item("c1").map(|i| i.order_number), Some(2));
    assert_eq!(order_of(&store.snapshot().await, "c1").map(|o| o.2), Some(2));
    assert!(validate_order(session.collection()).is_ok());

    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn pinning_is_persisted_immediately() {
    let store = InMemoryStore::new(dashboard());
    let mut session = DragSession::open(store.clone(), "home", config())
        .await
        .expect("open session");

    session.pin("c2").expect("pin c2");
    session.pin("c3").expect("pin c3");
    session.settle().await;

    let persisted = store.snapshot().await;
    assert_eq!(clipdash_core::pinned_ids(&persisted), vec!["c3", "c2"]);
    assert_eq!(
        persisted.item("c2").and_then(|item| item.pinned_order_number),
        Some(1)
    );
    assert_eq!(order_of(&persisted, "c2").map(|o| o.2), Some(1));

    let err = session.pin("b1").expect_err("boards cannot be pinned");
    assert!(matches!(err, ClientError::Core(_)));

    session.unpin("c3").expect("unpin c3");
    session.settle().await;
    assert_eq!(clipdash_core::pinned_ids(&store.snapshot().await), vec!["c2"]);

    session.close().await;
}

#[tokio::test]
async fn session_round_trips_through_websocket_store() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind store");
    let addr = listener.local_addr().expect("store addr");
    let state = AppState::with_collection(dashboard());
    tokio::spawn(clipdash_store::serve(listener, state.clone()));

    let client = WsStoreClient::connect(&format!("ws://{addr}/ws"))
        .await
        .expect("connect store");
    let mut session = DragSession::open(client, "home", config())
        .await
        .expect("open session");

    let active = DragDescriptor::clip("c1");
    session.on_drag_start(active.clone());
    session
        .on_drag_end(&active, Some(&DragDescriptor::tab("work")))
        .await
        .expect("cross-tab drop");
    session.settle().await;

    let persisted = state.snapshot().await;
    let landing = find_landing_board(&persisted, "work").expect("landing board persisted");
    assert_eq!(
        order_of(&persisted, "c1"),
        Some((Some(landing.id.clone()), Some("work".to_owned()), 0))
    );
    assert_eq!(order_of(&persisted, "c2").map(|o| o.2), Some(0));

    session.close().await;
}
