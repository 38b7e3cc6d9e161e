use serde::{Deserialize, Serialize};

use crate::{CollectionId, Item, ItemId, Tab, TabId};

/// Authoritative position of one item after a move.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MovedItem {
    pub item_id: ItemId,
    pub parent_id: Option<ItemId>,
    pub tab_id: TabId,
    pub order_number: u32,
    pub collection_id: CollectionId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PinnedChange {
    pub item_id: ItemId,
    pub is_pinned: bool,
    pub pinned_order_number: Option<u32>,
}

impl PinnedChange {
    pub fn from_item(item: &Item) -> Self {
        Self {
            item_id: item.id.clone(),
            is_pinned: item.is_pinned,
            pinned_order_number: item.pinned_order_number,
        }
    }
}

/// Everything one or more moves asked the store to persist.
///
/// Whole sibling groups are recorded, never deltas, so flushing an older set
/// after a newer one can only ever restore a consistent group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub moved: Vec<MovedItem>,
    pub tabs: Vec<Tab>,
    pub pinned: Vec<PinnedChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.moved.is_empty() && self.tabs.is_empty() && self.pinned.is_empty()
    }

    /// Folds `newer` into `self`; an id present in both keeps the newer value.
    pub fn merge(&mut self, newer: ChangeSet) {
        upsert(&mut self.moved, newer.moved, |m| m.item_id.clone());
        upsert(&mut self.tabs, newer.tabs, |t| t.tab_id.clone());
        upsert(&mut self.pinned, newer.pinned, |p| p.item_id.clone());
    }

    pub fn take(&mut self) -> ChangeSet {
        std::mem::take(self)
    }
}

fn upsert<T>(existing: &mut Vec<T>, newer: Vec<T>, key: impl Fn(&T) -> String) {
    for value in newer {
        let id = key(&value);
        match existing.iter_mut().find(|current| key(current) == id) {
            Some(slot) => *slot = value,
            None => existing.push(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moved(id: &str, order: u32) -> MovedItem {
        MovedItem {
            item_id: id.to_owned(),
            parent_id: None,
            tab_id: "t".to_owned(),
            order_number: order,
            collection_id: "c".to_owned(),
        }
    }

    #[test]
    fn merge_keeps_latest_value_per_item() {
        let mut pending = ChangeSet {
            moved: vec![moved("a", 0), moved("b", 1)],
            ..ChangeSet::default()
        };
        pending.merge(ChangeSet {
            moved: vec![moved("b", 0), moved("c", 2)],
            ..ChangeSet::default()
        });
        assert_eq!(pending.moved, vec![moved("a", 0), moved("b", 0), moved("c", 2)]);

        let taken = pending.take();
        assert_eq!(taken.moved.len(), 3);
        assert!(pending.is_empty());
    }
}
