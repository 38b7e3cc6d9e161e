//! Tree model and drag-and-drop move resolution for a dashboard of boards,
//! clips and tabs.
//!
//! Items live in a flat [`Collection`]; [`build_tree`] projects one tab into
//! nested [`TreeNode`]s and [`resolve_move`] turns a drag of one entity over
//! another into a new consistent collection plus the [`ChangeSet`] the store
//! must persist.

use thiserror::Error;

pub mod changes;
pub mod collision;
pub mod landing;
pub mod model;
pub mod ordering;
pub mod pinned;
pub mod resolver;
pub mod tree;
pub mod wire;

#[cfg(test)]
mod fixtures;

pub use changes::{ChangeSet, MovedItem, PinnedChange};
pub use collision::{Collision, CollisionDetector, CollisionSource, Droppable, Point, Rect};
pub use landing::{
    LANDING_BOARD_NAME, ensure_landing_board, find_landing_board, insert_landing_board,
    landing_board_fields,
};
pub use model::{
    BoardLayout, BoardMeta, ClipKind, ClipMeta, Collection, GroupKey, Item, ItemKind,
    NewItemFields, Tab, TabLayout,
};
pub use ordering::validate_order;
pub use pinned::{pin_clip, pinned_ids, unpin_clip};
pub use resolver::{
    DragDescriptor, DragKind, MoveFlags, MovePlan, MoveRequest, NoOpReason, PINNED_ZONE_ID,
    Resolution, apply_plan, classify_move, resolve_move,
};
pub use tree::{TreeCache, TreeNode, all_children_ids, build_tree, flatten, is_descendant};
pub use wire::{
    RequestId, StoreOp, StoreReply, StoreRequest, StoreResponse, WireMessage, decode_frame,
    encode_frame,
};

pub type ItemId = String;
pub type TabId = String;
pub type CollectionId = String;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown item {0}")]
    UnknownItem(ItemId),
    #[error("unknown tab {0}")]
    UnknownTab(TabId),
    #[error("item {0} is not a clip")]
    NotAClip(ItemId),
    #[error("moving {item_id} under {parent_id} would make it its own ancestor")]
    WouldCreateCycle { item_id: ItemId, parent_id: ItemId },
    #[error("tab {0} has no landing board")]
    LandingBoardMissing(TabId),
    #[error("order numbers of group (parent {parent_id:?}, tab {tab_id:?}) are not contiguous: {orders:?}")]
    OrderNotContiguous {
        parent_id: Option<ItemId>,
        tab_id: Option<TabId>,
        orders: Vec<u32>,
    },
    #[error("invalid frame length")]
    InvalidFrameLength,
    #[error("unsupported message type {0}")]
    UnsupportedMessageType(u8),
    #[error("serialization error: {0}")]
    Serialization(String),
}
