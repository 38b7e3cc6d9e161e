//! Lazily created "Moved Clips Panel" boards that receive clips dropped on a
//! tab handle.

use crate::{
    BoardMeta, ChangeSet, Collection, CoreError, GroupKey, Item, ItemId, ItemKind, NewItemFields,
    TabId, ordering::place_in_group,
};

pub const LANDING_BOARD_NAME: &str = "Moved Clips Panel";
pub const LANDING_BOARD_DESCRIPTION: &str = "Clips moved here from other tabs";

/// The tab's landing board, if one exists among its top-level boards.
pub fn find_landing_board<'a>(collection: &'a Collection, tab_id: &str) -> Option<&'a Item> {
    collection
        .top_level_boards(tab_id)
        .into_iter()
        .find(|board| board.name == LANDING_BOARD_NAME)
}

/// What the store is asked to create when a tab has no landing board.
pub fn landing_board_fields(collection: &Collection, tab_id: &str) -> Result<NewItemFields, CoreError> {
    let tab = collection
        .tab(tab_id)
        .ok_or_else(|| CoreError::UnknownTab(tab_id.to_owned()))?;
    Ok(NewItemFields {
        name: LANDING_BOARD_NAME.to_owned(),
        description: Some(LANDING_BOARD_DESCRIPTION.to_owned()),
        color: tab.tab_color.clone(),
        parent_id: None,
        tab_id: tab_id.to_owned(),
        order_number: 0,
        kind: ItemKind::Board(BoardMeta::default()),
        collection_id: collection.collection_id.clone(),
    })
}

/// Adds a freshly created landing board at the front of its tab's top level
/// and renumbers that group.
pub fn insert_landing_board(
    collection: &mut Collection,
    id: ItemId,
    fields: NewItemFields,
) -> ChangeSet {
    let tab_id: TabId = fields.tab_id.clone();
    collection.items.retain(|item| item.id != id);
    collection.items.push(fields.into_item(id.clone()));
    let key = GroupKey {
        parent_id: None,
        tab_id: Some(tab_id),
    };
    let ids = place_in_group(collection, &key, &id, 0);
    collection.revision += 1;
    crate::resolver::moved_items(collection, &ids)
}

/// Returns the tab's landing board id, asking `create` for a new board when
/// the tab has none. Nothing is inserted if `create` fails.
pub fn ensure_landing_board<E>(
    collection: &mut Collection,
    tab_id: &str,
    create: impl FnOnce(NewItemFields) -> Result<ItemId, E>,
) -> Result<(ItemId, ChangeSet), E>
where
    E: From<CoreError>,
{
    if let Some(board) = find_landing_board(collection, tab_id) {
        return Ok((board.id.clone(), ChangeSet::default()));
    }
    let fields = landing_board_fields(collection, tab_id)?;
    let id = create(fields.clone())?;
    let changes = insert_landing_board(collection, id.clone(), fields);
    Ok((id, changes))
}
