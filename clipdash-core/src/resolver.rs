//! Classifies a drag of one entity over another and applies the resulting
//! reorder, re-parent, cross-tab or pin move to a flat collection.
//!
//! Classification ([`classify_move`]) only reads. It resolves the target
//! parent, tab and index up front, so applying the same [`MovePlan`] a second
//! time finds the item already in place and changes nothing.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    ChangeSet, Collection, CoreError, GroupKey, ItemId, MovedItem, NewItemFields, TabId,
    landing::{ensure_landing_board, find_landing_board},
    ordering::{array_move, index_in_group, place_in_group, renumber_group},
    pinned::{pinned_ids, place_pinned},
    tree::{all_children_ids, is_descendant},
};

/// Id used by the pinned side-list's own drop zone.
pub const PINNED_ZONE_ID: &str = "pinned-zone";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DragKind {
    Board,
    Clip,
    Tab,
    /// A clip inside the pinned list, or the pinned zone itself.
    Pinned,
}

/// The typed payload carried by drag-start/over/end events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DragDescriptor {
    pub id: String,
    pub kind: DragKind,
    /// Set when a nested board is dragged by its own handle.
    #[serde(default)]
    pub is_sub_board: bool,
}

impl DragDescriptor {
    pub fn new(id: impl Into<String>, kind: DragKind) -> Self {
        Self {
            id: id.into(),
            kind,
            is_sub_board: false,
        }
    }

    pub fn board(id: impl Into<String>) -> Self {
        Self::new(id, DragKind::Board)
    }

    pub fn sub_board(id: impl Into<String>) -> Self {
        Self {
            is_sub_board: true,
            ..Self::new(id, DragKind::Board)
        }
    }

    pub fn clip(id: impl Into<String>) -> Self {
        Self::new(id, DragKind::Clip)
    }

    pub fn tab(id: impl Into<String>) -> Self {
        Self::new(id, DragKind::Tab)
    }

    pub fn pinned(id: impl Into<String>) -> Self {
        Self::new(id, DragKind::Pinned)
    }
}

/// Modifier state that can veto re-parenting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveFlags {
    /// Alt held: dropping a clip on a board does not move it inside.
    #[serde(default)]
    pub alt_pressed: bool,
    /// "Move on this board" lock: items may only be reordered in place.
    #[serde(default)]
    pub reparent_locked: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct MoveRequest<'a> {
    pub active: &'a DragDescriptor,
    pub over: &'a DragDescriptor,
    pub current_tab_id: &'a str,
    pub flags: MoveFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    SameTarget,
    UnknownItem,
    WouldCreateCycle,
    Blocked,
    AlreadyInPlace,
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MovePlan {
    NoOp(NoOpReason),
    ReorderTabs {
        tab_id: TabId,
        index: usize,
    },
    ReorderSiblings {
        item_id: ItemId,
        index: usize,
    },
    ReparentIntoBoard {
        item_id: ItemId,
        board_id: ItemId,
    },
    ReparentBesideClip {
        item_id: ItemId,
        parent_id: Option<ItemId>,
        tab_id: TabId,
        index: usize,
    },
    ReparentSubBoard {
        item_id: ItemId,
        board_id: ItemId,
    },
    CrossTabBoard {
        item_id: ItemId,
        tab_id: TabId,
        parent_id: Option<ItemId>,
    },
    CrossTabClip {
        item_id: ItemId,
        tab_id: TabId,
    },
    Pin {
        item_id: ItemId,
    },
    ReorderPinned {
        item_id: ItemId,
        index: usize,
    },
}

impl MovePlan {
    pub fn is_noop(&self) -> bool {
        matches!(self, MovePlan::NoOp(_))
    }

    /// Moves that are applied optimistically on every drag-over tick.
    /// Cross-tab, tab and pin moves wait for the drop.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            MovePlan::ReorderSiblings { .. }
                | MovePlan::ReparentIntoBoard { .. }
                | MovePlan::ReparentBesideClip { .. }
                | MovePlan::ReparentSubBoard { .. }
                | MovePlan::ReorderPinned { .. }
        )
    }

    /// The tab whose landing board must exist before this plan can apply.
    pub fn landing_tab(&self) -> Option<&str> {
        match self {
            MovePlan::CrossTabClip { tab_id, .. } => Some(tab_id),
            _ => None,
        }
    }
}

/// Decides what dropping `request.active` on `request.over` means.
pub fn classify_move(collection: &Collection, request: &MoveRequest<'_>) -> MovePlan {
    let plan = classify(collection, request);
    debug!(
        active = %request.active.id,
        over = %request.over.id,
        ?plan,
        "classified move"
    );
    plan
}

fn classify(collection: &Collection, request: &MoveRequest<'_>) -> MovePlan {
    use DragKind::{Board, Clip, Pinned, Tab};

    let MoveRequest {
        active,
        over,
        current_tab_id,
        flags,
    } = *request;

    if active.id == over.id {
        return MovePlan::NoOp(NoOpReason::SameTarget);
    }

    match (active.kind, over.kind) {
        (Tab, Tab) => classify_tab_reorder(collection, &active.id, &over.id),
        (Board | Clip, Tab) => {
            if flags.reparent_locked {
                return MovePlan::NoOp(NoOpReason::Blocked);
            }
            classify_cross_tab(collection, active, &over.id, current_tab_id)
        }
        (Pinned, Pinned) => classify_pinned_reorder(collection, &active.id, &over.id),
        (Clip, Pinned) => match collection.item(&active.id) {
            None => MovePlan::NoOp(NoOpReason::UnknownItem),
            Some(item) if item.is_pinned => MovePlan::NoOp(NoOpReason::AlreadyInPlace),
            Some(_) => MovePlan::Pin {
                item_id: active.id.clone(),
            },
        },
        (Board | Clip, Board | Clip) => classify_tree_move(collection, active, over, flags),
        _ => MovePlan::NoOp(NoOpReason::Unsupported),
    }
}

fn classify_tab_reorder(collection: &Collection, active_id: &str, over_id: &str) -> MovePlan {
    let tabs = collection.sorted_tabs();
    let Some(index) = tabs.iter().position(|tab| tab.tab_id == over_id) else {
        return MovePlan::NoOp(NoOpReason::UnknownItem);
    };
    if !tabs.iter().any(|tab| tab.tab_id == active_id) {
        return MovePlan::NoOp(NoOpReason::UnknownItem);
    }
    MovePlan::ReorderTabs {
        tab_id: active_id.to_owned(),
        index,
    }
}

fn classify_cross_tab(
    collection: &Collection,
    active: &DragDescriptor,
    target_tab: &str,
    current_tab_id: &str,
) -> MovePlan {
    let Some(item) = collection.item(&active.id) else {
        return MovePlan::NoOp(NoOpReason::UnknownItem);
    };
    if collection.tab(target_tab).is_none() {
        return MovePlan::NoOp(NoOpReason::UnknownItem);
    }
    let source_tab = item.tab_id.as_deref().unwrap_or(current_tab_id);
    if source_tab == target_tab {
        return MovePlan::NoOp(NoOpReason::AlreadyInPlace);
    }

    if item.is_clip() {
        return MovePlan::CrossTabClip {
            item_id: item.id.clone(),
            tab_id: target_tab.to_owned(),
        };
    }

    // Nested boards land inside the target tab's first board when there is one.
    let parent_id = match item.parent_id {
        None => None,
        Some(_) => collection
            .top_level_boards(target_tab)
            .first()
            .map(|board| board.id.clone()),
    };
    if let Some(parent) = parent_id.as_deref()
        && is_descendant(&collection.items, &item.id, parent)
    {
        return MovePlan::NoOp(NoOpReason::WouldCreateCycle);
    }
    MovePlan::CrossTabBoard {
        item_id: item.id.clone(),
        tab_id: target_tab.to_owned(),
        parent_id,
    }
}

fn classify_pinned_reorder(collection: &Collection, active_id: &str, over_id: &str) -> MovePlan {
    let ids = pinned_ids(collection);
    if !ids.iter().any(|id| id == active_id) {
        return MovePlan::NoOp(NoOpReason::UnknownItem);
    }
    match ids.iter().position(|id| id == over_id) {
        Some(index) => MovePlan::ReorderPinned {
            item_id: active_id.to_owned(),
            index,
        },
        None if over_id == PINNED_ZONE_ID => MovePlan::NoOp(NoOpReason::AlreadyInPlace),
        None => MovePlan::NoOp(NoOpReason::UnknownItem),
    }
}

fn classify_tree_move(
    collection: &Collection,
    active: &DragDescriptor,
    over: &DragDescriptor,
    flags: MoveFlags,
) -> MovePlan {
    let (Some(active_item), Some(over_item)) = (collection.item(&active.id), collection.item(&over.id))
    else {
        return MovePlan::NoOp(NoOpReason::UnknownItem);
    };

    let same_role = active_item.is_clip() == over_item.is_clip();
    if same_role && active_item.group_key() == over_item.group_key() {
        let key = active_item.group_key();
        return match index_in_group(collection, &key, &over_item.id) {
            Some(index) => MovePlan::ReorderSiblings {
                item_id: active_item.id.clone(),
                index,
            },
            None => MovePlan::NoOp(NoOpReason::UnknownItem),
        };
    }

    if flags.reparent_locked {
        return MovePlan::NoOp(NoOpReason::Blocked);
    }

    match (active_item.is_clip(), over_item.is_clip()) {
        // Clip over a board.
        (true, false) => {
            if flags.alt_pressed {
                return MovePlan::NoOp(NoOpReason::Blocked);
            }
            if active_item.parent_id.as_deref() == Some(over_item.id.as_str()) {
                return MovePlan::NoOp(NoOpReason::AlreadyInPlace);
            }
            MovePlan::ReparentIntoBoard {
                item_id: active_item.id.clone(),
                board_id: over_item.id.clone(),
            }
        }
        // Clip over a clip in another board.
        (true, true) => {
            if let Some(parent) = over_item.parent_id.as_deref()
                && !collection.item(parent).is_some_and(|p| p.is_board())
            {
                return MovePlan::NoOp(NoOpReason::UnknownItem);
            }
            let Some(tab_id) = over_item.tab_id.clone() else {
                return MovePlan::NoOp(NoOpReason::UnknownItem);
            };
            let key = over_item.group_key();
            match index_in_group(collection, &key, &over_item.id) {
                Some(index) => MovePlan::ReparentBesideClip {
                    item_id: active_item.id.clone(),
                    parent_id: over_item.parent_id.clone(),
                    tab_id,
                    index,
                },
                None => MovePlan::NoOp(NoOpReason::UnknownItem),
            }
        }
        // Board over a board with a different parent.
        (false, false) => {
            if !active.is_sub_board {
                return MovePlan::NoOp(NoOpReason::Unsupported);
            }
            if active_item.parent_id.as_deref() == Some(over_item.id.as_str()) {
                return MovePlan::NoOp(NoOpReason::AlreadyInPlace);
            }
            if is_descendant(&collection.items, &active_item.id, &over_item.id) {
                return MovePlan::NoOp(NoOpReason::WouldCreateCycle);
            }
            MovePlan::ReparentSubBoard {
                item_id: active_item.id.clone(),
                board_id: over_item.id.clone(),
            }
        }
        (false, true) => MovePlan::NoOp(NoOpReason::Unsupported),
    }
}

/// Applies a plan in place and returns what must be persisted.
///
/// Every group an item leaves or enters is renumbered as a whole.
pub fn apply_plan(collection: &mut Collection, plan: &MovePlan) -> Result<ChangeSet, CoreError> {
    let changes = match plan {
        MovePlan::NoOp(_) => return Ok(ChangeSet::default()),
        MovePlan::ReorderTabs { tab_id, index } => reorder_tabs(collection, tab_id, *index)?,
        MovePlan::ReorderSiblings { item_id, index } => {
            let item = collection
                .item(item_id)
                .ok_or_else(|| CoreError::UnknownItem(item_id.clone()))?;
            let key = item.group_key();
            let ids = place_in_group(collection, &key, item_id, *index);
            moved_items(collection, &ids)
        }
        MovePlan::ReparentIntoBoard { item_id, board_id }
        | MovePlan::ReparentSubBoard { item_id, board_id } => {
            let board = collection
                .item(board_id)
                .filter(|board| board.is_board())
                .ok_or_else(|| CoreError::UnknownItem(board_id.clone()))?;
            let tab_id = board
                .tab_id
                .clone()
                .ok_or_else(|| CoreError::UnknownItem(board_id.clone()))?;
            if board_id == item_id || is_descendant(&collection.items, item_id, board_id) {
                return Err(CoreError::WouldCreateCycle {
                    item_id: item_id.clone(),
                    parent_id: board_id.clone(),
                });
            }
            relocate(collection, item_id, Some(board_id.clone()), tab_id, 0)?
        }
        MovePlan::ReparentBesideClip {
            item_id,
            parent_id,
            tab_id,
            index,
        } => relocate(collection, item_id, parent_id.clone(), tab_id.clone(), *index)?,
        MovePlan::CrossTabBoard {
            item_id,
            tab_id,
            parent_id,
        } => relocate(collection, item_id, parent_id.clone(), tab_id.clone(), 0)?,
        MovePlan::CrossTabClip { item_id, tab_id } => {
            let landing = find_landing_board(collection, tab_id)
                .map(|board| board.id.clone())
                .ok_or_else(|| CoreError::LandingBoardMissing(tab_id.clone()))?;
            relocate(collection, item_id, Some(landing), tab_id.clone(), 0)?
        }
        MovePlan::Pin { item_id } => place_pinned(collection, item_id, 0)?,
        MovePlan::ReorderPinned { item_id, index } => place_pinned(collection, item_id, *index)?,
    };
    collection.revision += 1;
    Ok(changes)
}

fn relocate(
    collection: &mut Collection,
    item_id: &str,
    parent_id: Option<ItemId>,
    tab_id: TabId,
    index: usize,
) -> Result<ChangeSet, CoreError> {
    let item = collection
        .item(item_id)
        .ok_or_else(|| CoreError::UnknownItem(item_id.to_owned()))?;
    if let Some(parent) = parent_id.as_deref()
        && (parent == item_id || is_descendant(&collection.items, item_id, parent))
    {
        return Err(CoreError::WouldCreateCycle {
            item_id: item_id.to_owned(),
            parent_id: parent.to_owned(),
        });
    }

    let old_key = item.group_key();
    let crosses_tab = item.tab_id.as_deref() != Some(tab_id.as_str());
    let descendants = if crosses_tab {
        all_children_ids(&collection.items, item_id)
    } else {
        Vec::new()
    };

    for item in &mut collection.items {
        if item.id == item_id {
            item.parent_id = parent_id.clone();
            item.tab_id = Some(tab_id.clone());
        } else if descendants.contains(&item.id) {
            item.tab_id = Some(tab_id.clone());
        }
    }

    let new_key = GroupKey {
        parent_id,
        tab_id: Some(tab_id),
    };
    let mut touched = place_in_group(collection, &new_key, item_id, index);
    if old_key != new_key {
        touched.extend(renumber_group(collection, &old_key));
    }
    touched.extend(descendants);
    Ok(moved_items(collection, &touched))
}

fn reorder_tabs(collection: &mut Collection, tab_id: &str, index: usize) -> Result<ChangeSet, CoreError> {
    let mut ids = collection
        .sorted_tabs()
        .into_iter()
        .map(|tab| tab.tab_id.clone())
        .collect::<Vec<_>>();
    let from = ids
        .iter()
        .position(|id| id == tab_id)
        .ok_or_else(|| CoreError::UnknownTab(tab_id.to_owned()))?;
    array_move(&mut ids, from, index);

    for tab in &mut collection.tabs {
        if let Some(order) = ids.iter().position(|id| *id == tab.tab_id) {
            tab.tab_order_number = order as u32;
        }
    }
    let mut tabs = collection.tabs.clone();
    tabs.sort_by_key(|tab| tab.tab_order_number);
    Ok(ChangeSet {
        tabs,
        ..ChangeSet::default()
    })
}

/// Full `(id, parent, tab, order)` tuples for `ids`, in the given order.
pub fn moved_items(collection: &Collection, ids: &[ItemId]) -> ChangeSet {
    let moved = ids
        .iter()
        .filter_map(|id| collection.item(id))
        .filter_map(|item| {
            Some(MovedItem {
                item_id: item.id.clone(),
                parent_id: item.parent_id.clone(),
                tab_id: item.tab_id.clone()?,
                order_number: item.order_number,
                collection_id: collection.collection_id.clone(),
            })
        })
        .collect();
    ChangeSet {
        moved,
        ..ChangeSet::default()
    }
}

/// A move resolved against a snapshot: the new collection and what changed.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub plan: MovePlan,
    pub collection: Collection,
    pub changes: ChangeSet,
}

/// Classifies and applies a move to a copy of `collection`.
///
/// Cross-tab clip moves ask `create_landing` for a landing board when the
/// target tab has none; if it fails nothing is applied.
pub fn resolve_move<E>(
    collection: &Collection,
    request: &MoveRequest<'_>,
    create_landing: impl FnOnce(NewItemFields) -> Result<ItemId, E>,
) -> Result<Resolution, E>
where
    E: From<CoreError>,
{
    let plan = classify_move(collection, request);
    let mut next = collection.clone();
    let mut changes = ChangeSet::default();
    if let Some(tab_id) = plan.landing_tab() {
        let (_, created) = ensure_landing_board(&mut next, tab_id, create_landing)?;
        changes.merge(created);
    }
    changes.merge(apply_plan(&mut next, &plan)?);
    Ok(Resolution {
        plan,
        collection: next,
        changes,
    })
}
