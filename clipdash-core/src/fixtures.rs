use crate::{BoardMeta, ClipMeta, Collection, Item, ItemKind, Tab};

pub fn board(id: &str, parent: Option<&str>, tab: &str, order: u32) -> Item {
    item(id, parent, tab, order, ItemKind::Board(BoardMeta::default()))
}

pub fn clip(id: &str, parent: Option<&str>, tab: &str, order: u32) -> Item {
    item(id, parent, tab, order, ItemKind::Clip(ClipMeta::default()))
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

pub fn tab(id: &str, order: u32) -> Tab {
    Tab {
        tab_id: id.to_owned(),
        tab_name: id.to_uppercase(),
        tab_order_number: order,
        tab_layout: Default::default(),
        tab_layout_split: 1,
        tab_color: Some(format!("{id}-color")),
    }
}

pub fn collection(items: Vec<Item>, tabs: &[&str]) -> Collection {
    Collection {
        collection_id: "col".to_owned(),
        items,
        tabs: tabs
            .iter()
            .enumerate()
            .map(|(order, id)| tab(id, order as u32))
            .collect(),
        revision: 0,
    }
}

/// `(id, order)` pairs of a sibling group, ascending.
pub fn group<'a>(
    collection: &'a Collection,
    parent: Option<&str>,
    tab: &str,
) -> Vec<(&'a str, u32)> {
    let mut members = collection
        .items
        .iter()
        .filter(|item| item.parent_id.as_deref() == parent && item.in_tab(tab))
        .map(|item| (item.id.as_str(), item.order_number))
        .collect::<Vec<_>>();
    members.sort_by_key(|(_, order)| *order);
    members
}
