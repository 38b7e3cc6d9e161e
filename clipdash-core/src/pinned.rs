//! The pinned side-list. Membership is orthogonal to tree position: pinning
//! or reordering here never touches `parent_id`, `tab_id` or `order_number`.

use std::collections::HashMap;

use crate::{ChangeSet, Collection, CoreError, ItemId, PinnedChange};

/// Pinned clip ids in display order.
pub fn pinned_ids(collection: &Collection) -> Vec<ItemId> {
    let mut pinned = collection
        .items
        .iter()
        .filter(|item| item.is_pinned)
        .collect::<Vec<_>>();
    pinned.sort_by_key(|item| item.pinned_order_number.unwrap_or(u32::MAX));
    pinned.into_iter().map(|item| item.id.clone()).collect()
}

/// Pins a clip at the front of the pinned list.
pub fn pin_clip(collection: &mut Collection, id: &str) -> Result<ChangeSet, CoreError> {
    place_pinned(collection, id, 0)
}

/// Puts a clip at `index` in the pinned list, pinning it if needed.
pub fn place_pinned(
    collection: &mut Collection,
    id: &str,
    index: usize,
) -> Result<ChangeSet, CoreError> {
    let item = collection
        .item(id)
        .ok_or_else(|| CoreError::UnknownItem(id.to_owned()))?;
    if !item.is_clip() {
        return Err(CoreError::NotAClip(id.to_owned()));
    }

    let mut ids = pinned_ids(collection);
    ids.retain(|member| member != id);
    let index = index.min(ids.len());
    ids.insert(index, id.to_owned());
    if let Some(item) = collection.item_mut(id) {
        item.is_pinned = true;
    }
    Ok(assign_pinned_order(collection, &ids))
}

/// Removes a clip from the pinned list and closes the gap it leaves.
pub fn unpin_clip(collection: &mut Collection, id: &str) -> Result<ChangeSet, CoreError> {
    let item = collection
        .item_mut(id)
        .ok_or_else(|| CoreError::UnknownItem(id.to_owned()))?;
    item.is_pinned = false;
    item.pinned_order_number = None;
    let unpinned = PinnedChange::from_item(item);

    let ids = pinned_ids(collection);
    let mut changes = assign_pinned_order(collection, &ids);
    changes.pinned.push(unpinned);
    Ok(changes)
}

fn assign_pinned_order(collection: &mut Collection, ids: &[ItemId]) -> ChangeSet {
    let positions = ids
        .iter()
        .enumerate()
        .map(|(index, id)| (id.as_str(), index as u32))
        .collect::<HashMap<_, _>>();
    let mut pinned = Vec::with_capacity(ids.len());
    for item in &mut collection.items {
        if let Some(order) = positions.get(item.id.as_str()) {
            item.pinned_order_number = Some(*order);
            pinned.push(PinnedChange::from_item(item));
        }
    }
    pinned.sort_by_key(|change| change.pinned_order_number);
    collection.revision += 1;
    ChangeSet {
        pinned,
        ..ChangeSet::default()
    }
}
