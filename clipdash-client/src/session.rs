//! Drives one dashboard view through drag-start / over / end / cancel.
//!
//! Every event is resolved synchronously against the optimistic local
//! collection; persistence goes through the [`Persister`]. The session is the
//! only writer of its collection and its drag state.

use std::time::Duration;

use clipdash_core::{
    ChangeSet, Collection, CollisionDetector, DragDescriptor, Droppable, MoveFlags, MovePlan,
    MoveRequest, Point, Rect, TabId, TreeCache, TreeNode, apply_plan, classify_move,
    find_landing_board, insert_landing_board, landing_board_fields, pin_clip, unpin_clip,
};
use tracing::{debug, info, warn};

use crate::{ClientError, persist::Persister, store_client::ItemStore};

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub debounce: Duration,
    pub refetch_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(400),
            refetch_delay: Duration::from_millis(300),
        }
    }
}

#[derive(Debug)]
struct LiveOver {
    over: DragDescriptor,
    flags: MoveFlags,
    plan: MovePlan,
}

impl LiveOver {
    fn matches(&self, over: &DragDescriptor, flags: MoveFlags) -> bool {
        self.over == *over && self.flags == flags
    }
}

pub struct DragSession<S: ItemStore> {
    store: S,
    persister: Persister,
    collection: Collection,
    current_tab_id: TabId,
    flags: MoveFlags,
    active: Option<DragDescriptor>,
    last_over: Option<LiveOver>,
    detector: CollisionDetector,
    tree_cache: TreeCache,
    refetch_delay: Duration,
}

impl<S: ItemStore> DragSession<S> {
    /// Loads the collection from the store and starts the persister.
    pub async fn open(
        store: S,
        current_tab_id: impl Into<TabId>,
        config: SessionConfig,
    ) -> Result<Self, ClientError> {
        let collection = store.get_collection().await?;
        let persister = Persister::spawn(store.clone(), config.debounce);
        let current_tab_id = current_tab_id.into();
        info!(
            collection_id = %collection.collection_id,
            items = collection.items.len(),
            tab_id = %current_tab_id,
            "drag session opened"
        );
        Ok(Self {
            store,
            persister,
            collection,
            current_tab_id,
            flags: MoveFlags::default(),
            active: None,
            last_over: None,
            detector: CollisionDetector::new(),
            tree_cache: TreeCache::new(),
            refetch_delay: config.refetch_delay,
        })
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn active(&self) -> Option<&DragDescriptor> {
        self.active.as_ref()
    }

    pub fn current_tab_id(&self) -> &str {
        &self.current_tab_id
    }

    pub fn set_current_tab(&mut self, tab_id: impl Into<TabId>) {
        self.current_tab_id = tab_id.into();
    }

    pub fn set_flags(&mut self, flags: MoveFlags) {
        self.flags = flags;
    }

    /// Tree of the current tab, rebuilt only when the collection changed.
    pub fn tree(&mut self) -> &[TreeNode] {
        self.tree_cache
            .tree(&self.collection, &self.current_tab_id, None)
    }

    pub fn on_drag_start(&mut self, active: DragDescriptor) {
        debug!(active = %active.id, kind = ?active.kind, "drag start");
        self.detector.reset();
        self.last_over = None;
        self.active = Some(active);
    }

    /// Applies live moves immediately and queues them behind the debounce.
    /// Hovering the same target again with the same modifiers is a no-op.
    pub fn on_drag_over(
        &mut self,
        active: &DragDescriptor,
        over: &DragDescriptor,
    ) -> Result<MovePlan, ClientError> {
        if let Some(last) = &self.last_over
            && last.matches(over, self.flags)
        {
            return Ok(last.plan.clone());
        }

        let plan = self.classify(active, over);
        if plan.is_live() {
            let changes = apply_plan(&mut self.collection, &plan)?;
            self.persister.queue(changes);
            self.last_over = Some(LiveOver {
                over: over.clone(),
                flags: self.flags,
                plan: plan.clone(),
            });
        }
        Ok(plan)
    }

    /// Resolves a drag-over tick from pointer geometry.
    pub fn on_pointer_move(
        &mut self,
        pointer: Option<Point>,
        active_rect: Rect,
        droppables: &[Droppable],
    ) -> Result<Option<MovePlan>, ClientError> {
        let active = self.active.clone().ok_or(ClientError::NoActiveDrag)?;
        match self.detector.detect(pointer, active_rect, droppables) {
            Some(collision) => self.on_drag_over(&active, &collision.target).map(Some),
            None => Ok(None),
        }
    }

    /// Finalises the move and flushes it at once. With no `over`, the last
    /// collision target is used.
    ///
    /// A cross-tab clip drop waits for the landing board to be created; if
    /// that fails the move is abandoned, unsent drag-over changes are
    /// dropped and the collection is refetched.
    pub async fn on_drag_end(
        &mut self,
        active: &DragDescriptor,
        over: Option<&DragDescriptor>,
    ) -> Result<MovePlan, ClientError> {
        let over = over.cloned().or_else(|| self.detector.last_target().cloned());
        let last_over = self.last_over.take();
        self.active = None;

        let Some(over) = over else {
            self.persister.flush_now(ChangeSet::default());
            return Ok(MovePlan::NoOp(clipdash_core::NoOpReason::Unsupported));
        };

        let plan = match last_over {
            Some(last) if last.matches(&over, self.flags) => last.plan,
            _ => self.classify(active, &over),
        };

        let mut changes = ChangeSet::default();
        if let Some(tab_id) = plan.landing_tab()
            && find_landing_board(&self.collection, tab_id).is_none()
        {
            let fields = landing_board_fields(&self.collection, tab_id)?;
            match self.store.create_item(fields.clone()).await {
                Ok(board_id) => {
                    info!(board_id = %board_id, tab_id = %tab_id, "created landing board");
                    changes.merge(insert_landing_board(&mut self.collection, board_id, fields));
                }
                Err(err) => {
                    warn!(tab_id = %tab_id, "landing board creation failed: {}", err);
                    self.persister.discard();
                    self.refetch().await;
                    return Err(ClientError::LandingBoard(err.to_string()));
                }
            }
        }

        changes.merge(apply_plan(&mut self.collection, &plan)?);
        self.persister.flush_now(changes);
        debug!(?plan, "drag end");
        Ok(plan)
    }

    /// Clears the drag. Optimistic drag-over moves stay; the collection is
    /// refetched after the configured delay to reconcile with the store.
    pub async fn on_drag_cancel(&mut self) {
        debug!(active = ?self.active.as_ref().map(|a| &a.id), "drag cancel");
        self.active = None;
        self.last_over = None;
        self.persister.flush_now(ChangeSet::default());
        self.persister.sync().await;
        tokio::time::sleep(self.refetch_delay).await;
        self.refetch().await;
    }

    /// Replaces the local collection with the store's. Keeps the local one
    /// if the store cannot be reached.
    pub async fn refetch(&mut self) {
        self.persister.sync().await;
        match self.store.get_collection().await {
            Ok(collection) => {
                self.collection = collection;
                self.tree_cache.invalidate();
            }
            Err(err) => warn!("refetch failed: {}", err),
        }
    }

    pub fn pin(&mut self, item_id: &str) -> Result<(), ClientError> {
        let changes = pin_clip(&mut self.collection, item_id)?;
        self.persister.flush_now(changes);
        Ok(())
    }

    pub fn unpin(&mut self, item_id: &str) -> Result<(), ClientError> {
        let changes = unpin_clip(&mut self.collection, item_id)?;
        self.persister.flush_now(changes);
        Ok(())
    }

    /// Waits until everything sent so far has reached the store.
    pub async fn settle(&self) {
        self.persister.sync().await;
    }

    pub async fn close(self) {
        self.persister.shutdown().await;
    }

    fn classify(&self, active: &DragDescriptor, over: &DragDescriptor) -> MovePlan {
        classify_move(
            &self.collection,
            &MoveRequest {
                active,
                over,
                current_tab_id: &self.current_tab_id,
                flags: self.flags,
            },
        )
    }
}
