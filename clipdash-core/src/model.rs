use serde::{Deserialize, Serialize};

use crate::{CollectionId, ItemId, TabId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BoardLayout {
    #[default]
    Flex,
    Grid,
}

/// Layout metadata carried by boards. Never read by the move algorithm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoardMeta {
    #[serde(default = "default_split")]
    pub layout_split: u8,
    #[serde(default)]
    pub layout: BoardLayout,
    #[serde(default)]
    pub layout_items_max_width: Option<u32>,
}

impl Default for BoardMeta {
    fn default() -> Self {
        Self {
            layout_split: 1,
            layout: BoardLayout::Flex,
            layout_items_max_width: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClipKind {
    #[default]
    Text,
    Link,
    Image,
    Path,
    Code,
    Command,
}

/// Content metadata carried by clips. Never read by the move algorithm.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ClipMeta {
    #[serde(default)]
    pub clip_kind: ClipKind,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "meta", rename_all = "lowercase")]
pub enum ItemKind {
    Board(BoardMeta),
    Clip(ClipMeta),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    pub parent_id: Option<ItemId>,
    pub tab_id: Option<TabId>,
    pub order_number: u32,
    pub kind: ItemKind,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub pinned_order_number: Option<u32>,
    #[serde(default)]
    pub updated_at: u64,
}

impl Item {
    pub fn is_board(&self) -> bool {
        matches!(self.kind, ItemKind::Board(_))
    }

    pub fn is_clip(&self) -> bool {
        matches!(self.kind, ItemKind::Clip(_))
    }

    pub fn in_tab(&self, tab_id: &str) -> bool {
        self.tab_id.as_deref() == Some(tab_id)
    }

    /// Sibling groups are keyed by `(parent_id, tab_id)`.
    pub fn group_key(&self) -> GroupKey {
        GroupKey {
            parent_id: self.parent_id.clone(),
            tab_id: self.tab_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub parent_id: Option<ItemId>,
    pub tab_id: Option<TabId>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TabLayout {
    #[default]
    Auto,
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tab {
    pub tab_id: TabId,
    pub tab_name: String,
    pub tab_order_number: u32,
    #[serde(default)]
    pub tab_layout: TabLayout,
    #[serde(default = "default_split")]
    pub tab_layout_split: u8,
    #[serde(default)]
    pub tab_color: Option<String>,
}

fn default_split() -> u8 {
    1
}

/// Fields for an item the store is asked to create. The store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewItemFields {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    pub parent_id: Option<ItemId>,
    pub tab_id: TabId,
    pub order_number: u32,
    pub kind: ItemKind,
    pub collection_id: CollectionId,
}

impl NewItemFields {
    pub fn into_item(self, id: ItemId) -> Item {
        Item {
            id,
            name: self.name,
            description: self.description,
            color: self.color,
            parent_id: self.parent_id,
            tab_id: Some(self.tab_id),
            order_number: self.order_number,
            kind: self.kind,
            is_pinned: false,
            pinned_order_number: None,
            updated_at: 0,
        }
    }
}

/// The flat, authoritative state: every item and tab of one collection.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Collection {
    pub collection_id: CollectionId,
    pub items: Vec<Item>,
    pub tabs: Vec<Tab>,
    /// Bumped on every applied mutation; part of the tree cache key.
    #[serde(default)]
    pub revision: u64,
}

impl Collection {
    pub fn new(collection_id: impl Into<CollectionId>) -> Self {
        Self {
            collection_id: collection_id.into(),
            ..Self::default()
        }
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn item_mut(&mut self, id: &str) -> Option<&mut Item> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    pub fn tab(&self, tab_id: &str) -> Option<&Tab> {
        self.tabs.iter().find(|tab| tab.tab_id == tab_id)
    }

    /// Ids of the group's members, ascending by prior order number.
    /// Ties keep their position in `items`.
    pub fn group_ids(&self, key: &GroupKey) -> Vec<ItemId> {
        let mut members = self
            .items
            .iter()
            .filter(|item| item.parent_id == key.parent_id && item.tab_id == key.tab_id)
            .collect::<Vec<_>>();
        members.sort_by_key(|item| item.order_number);
        members.into_iter().map(|item| item.id.clone()).collect()
    }

    /// Top-level boards of a tab, ascending by order number.
    pub fn top_level_boards(&self, tab_id: &str) -> Vec<&Item> {
        let mut boards = self
            .items
            .iter()
            .filter(|item| item.is_board() && item.parent_id.is_none() && item.in_tab(tab_id))
            .collect::<Vec<_>>();
        boards.sort_by_key(|item| item.order_number);
        boards
    }

    /// Tabs ascending by tab order number.
    pub fn sorted_tabs(&self) -> Vec<&Tab> {
        let mut tabs = self.tabs.iter().collect::<Vec<_>>();
        tabs.sort_by_key(|tab| tab.tab_order_number);
        tabs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_kind_serializes_as_tagged_union() {
        let item = Item {
            id: "b1".to_owned(),
            name: "Board".to_owned(),
            description: None,
            color: None,
            parent_id: None,
            tab_id: Some("t1".to_owned()),
            order_number: 0,
            kind: ItemKind::Board(BoardMeta::default()),
            is_pinned: false,
            pinned_order_number: None,
            updated_at: 0,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["kind"]["type"], "board");
        assert_eq!(json["kind"]["meta"]["layout"], "flex");

        let back: Item = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn group_ids_sort_by_order_number() {
        let mut collection = Collection::new("c");
        for (id, order) in [("x", 2), ("y", 0), ("z", 1)] {
            collection.items.push(Item {
                id: id.to_owned(),
                name: id.to_owned(),
                description: None,
                color: None,
                parent_id: None,
                tab_id: Some("t".to_owned()),
                order_number: order,
                kind: ItemKind::Clip(ClipMeta::default()),
                is_pinned: false,
                pinned_order_number: None,
                updated_at: 0,
            });
        }
        let key = GroupKey {
            parent_id: None,
            tab_id: Some("t".to_owned()),
        };
        assert_eq!(collection.group_ids(&key), vec!["y", "z", "x"]);
    }
}
