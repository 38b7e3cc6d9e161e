use std::collections::{BTreeMap, HashMap};

use crate::{Collection, CoreError, GroupKey, ItemId};

/// Puts `id` at `index` within its sibling group and rewrites the whole group
/// to `0..N-1`. `id` must already carry the group's parent and tab.
///
/// Returns the group's ids in their new order. Placing an item at the index
/// it already holds changes nothing.
pub fn place_in_group(
    collection: &mut Collection,
    key: &GroupKey,
    id: &str,
    index: usize,
) -> Vec<ItemId> {
    let mut ids = collection.group_ids(key);
    ids.retain(|member| member != id);
    let index = index.min(ids.len());
    ids.insert(index, id.to_owned());
    assign_order(collection, &ids);
    ids
}

/// Rewrites a sibling group to `0..N-1`, keeping its current relative order.
pub fn renumber_group(collection: &mut Collection, key: &GroupKey) -> Vec<ItemId> {
    let ids = collection.group_ids(key);
    assign_order(collection, &ids);
    ids
}

fn assign_order(collection: &mut Collection, ids: &[ItemId]) {
    let positions = ids
        .iter()
        .enumerate()
        .map(|(index, id)| (id.as_str(), index as u32))
        .collect::<HashMap<_, _>>();
    for item in &mut collection.items {
        if let Some(order) = positions.get(item.id.as_str()) {
            item.order_number = *order;
        }
    }
}

/// Index of `id` within its group, ascending by order number.
pub fn index_in_group(collection: &Collection, key: &GroupKey, id: &str) -> Option<usize> {
    collection
        .group_ids(key)
        .iter()
        .position(|member| member == id)
}

/// Moves the element at `from` to `to`, shifting the ones in between.
pub fn array_move<T>(values: &mut Vec<T>, from: usize, to: usize) {
    if from >= values.len() {
        return;
    }
    let value = values.remove(from);
    let to = to.min(values.len());
    values.insert(to, value);
}

/// Checks that every sibling group, and the tab list, is numbered `0..N-1`.
pub fn validate_order(collection: &Collection) -> Result<(), CoreError> {
    let mut groups: BTreeMap<GroupKey, Vec<u32>> = BTreeMap::new();
    for item in &collection.items {
        groups
            .entry(item.group_key())
            .or_default()
            .push(item.order_number);
    }

    for (key, mut orders) in groups {
        orders.sort_unstable();
        if orders.iter().enumerate().any(|(i, order)| *order != i as u32) {
            return Err(CoreError::OrderNotContiguous {
                parent_id: key.parent_id,
                tab_id: key.tab_id,
                orders,
            });
        }
    }

    let mut tab_orders = collection
        .tabs
        .iter()
        .map(|tab| tab.tab_order_number)
        .collect::<Vec<_>>();
    tab_orders.sort_unstable();
    if tab_orders.iter().enumerate().any(|(i, order)| *order != i as u32) {
        return Err(CoreError::OrderNotContiguous {
            parent_id: None,
            tab_id: None,
            orders: tab_orders,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{clip, collection, group};

    fn key(parent: Option<&str>, tab: &str) -> GroupKey {
        GroupKey {
            parent_id: parent.map(str::to_owned),
            tab_id: Some(tab.to_owned()),
        }
    }

    #[test]
    fn place_moves_and_renumbers() {
        let mut col = collection(
            vec![
                clip("a", None, "t", 0),
                clip("b", None, "t", 1),
                clip("c", None, "t", 2),
            ],
            &["t"],
        );
        place_in_group(&mut col, &key(None, "t"), "a", 2);
        assert_eq!(
            group(&col, None, "t"),
            vec![("b", 0), ("c", 1), ("a", 2)]
        );

        let again = col.clone();
        place_in_group(&mut col, &key(None, "t"), "a", 2);
        assert_eq!(col, again);
    }

    #[test]
    fn renumber_closes_gaps() {
        let mut col = collection(
            vec![clip("a", None, "t", 3), clip("b", None, "t", 7)],
            &["t"],
        );
        assert!(validate_order(&col).is_err());
        renumber_group(&mut col, &key(None, "t"));
        assert_eq!(group(&col, None, "t"), vec![("a", 0), ("b", 1)]);
        assert!(validate_order(&col).is_ok());
    }

    #[test]
    fn array_move_shifts_between() {
        let mut values = vec![1, 2, 3, 4];
        array_move(&mut values, 0, 2);
        assert_eq!(values, vec![2, 3, 1, 4]);
        array_move(&mut values, 3, 0);
        assert_eq!(values, vec![4, 2, 3, 1]);
    }
}
