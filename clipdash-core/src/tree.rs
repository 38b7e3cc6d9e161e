use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::{Collection, Item, ItemId, TabId};

/// Read projection of an item and its nested children. Rebuilt, never mutated.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TreeNode {
    #[serde(flatten)]
    pub item: Item,
    pub children: Vec<TreeNode>,
}

/// Builds the nested tree of one tab, starting at `start_parent_id`
/// (`None` means top-level items).
///
/// Orphans never match a parent bucket and are left out. Cycles in the input
/// are cut where an id would reappear on its own ancestor path.
pub fn build_tree(items: &[Item], tab_id: &str, start_parent_id: Option<&str>) -> Vec<TreeNode> {
    let mut buckets: HashMap<Option<&str>, Vec<&Item>> = HashMap::new();
    for item in items.iter().filter(|item| item.in_tab(tab_id)) {
        buckets
            .entry(item.parent_id.as_deref())
            .or_default()
            .push(item);
    }
    for bucket in buckets.values_mut() {
        bucket.sort_by_key(|item| item.order_number);
    }

    let mut path = HashSet::new();
    if let Some(start) = start_parent_id {
        path.insert(start);
    }
    attach_children(&buckets, start_parent_id, &mut path)
}

fn attach_children<'a>(
    buckets: &HashMap<Option<&'a str>, Vec<&'a Item>>,
    parent_id: Option<&'a str>,
    path: &mut HashSet<&'a str>,
) -> Vec<TreeNode> {
    let Some(bucket) = buckets.get(&parent_id) else {
        return Vec::new();
    };

    let mut nodes = Vec::with_capacity(bucket.len());
    for item in bucket {
        if !path.insert(item.id.as_str()) {
            debug!(item_id = %item.id, "cycle in item parents; not descending");
            continue;
        }
        let children = attach_children(buckets, Some(item.id.as_str()), path);
        path.remove(item.id.as_str());
        nodes.push(TreeNode {
            item: (*item).clone(),
            children,
        });
    }
    nodes
}

/// Depth-first, pre-order ids of a built tree.
pub fn flatten(nodes: &[TreeNode]) -> Vec<ItemId> {
    let mut out = Vec::new();
    let mut stack = nodes.iter().rev().collect::<Vec<_>>();
    while let Some(node) = stack.pop() {
        out.push(node.item.id.clone());
        stack.extend(node.children.iter().rev());
    }
    out
}

/// Every descendant id of `id`, at any depth. `id` itself is not included.
pub fn all_children_ids(items: &[Item], id: &str) -> Vec<ItemId> {
    let mut children_of: HashMap<&str, Vec<&str>> = HashMap::new();
    for item in items {
        if let Some(parent) = item.parent_id.as_deref() {
            children_of.entry(parent).or_default().push(item.id.as_str());
        }
    }

    let mut seen = HashSet::from([id]);
    let mut out = Vec::new();
    let mut queue = vec![id];
    while let Some(current) = queue.pop() {
        for child in children_of.get(current).into_iter().flatten() {
            if seen.insert(child) {
                out.push((*child).to_owned());
                queue.push(child);
            }
        }
    }
    out
}

/// True when `candidate` sits somewhere below `ancestor`.
pub fn is_descendant(items: &[Item], ancestor: &str, candidate: &str) -> bool {
    let mut current = candidate;
    let mut seen = HashSet::new();
    while let Some(parent) = items
        .iter()
        .find(|item| item.id == current)
        .and_then(|item| item.parent_id.as_deref())
    {
        if parent == ancestor {
            return true;
        }
        if !seen.insert(parent) {
            return false;
        }
        current = parent;
    }
    false
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TreeKey {
    tab_id: TabId,
    start_parent_id: Option<ItemId>,
    item_count: usize,
    revision: u64,
}

/// Single-entry memo over [`build_tree`], keyed by a cheap structural key.
#[derive(Debug, Default)]
pub struct TreeCache {
    entry: Option<(TreeKey, Vec<TreeNode>)>,
}

impl TreeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tree(
        &mut self,
        collection: &Collection,
        tab_id: &str,
        start_parent_id: Option<&str>,
    ) -> &[TreeNode] {
        let key = TreeKey {
            tab_id: tab_id.to_owned(),
            start_parent_id: start_parent_id.map(str::to_owned),
            item_count: collection.items.len(),
            revision: collection.revision,
        };
        let stale = self.entry.as_ref().is_none_or(|(cached, _)| *cached != key);
        if stale {
            let nodes = build_tree(&collection.items, tab_id, start_parent_id);
            self.entry = Some((key, nodes));
        }
        match &self.entry {
            Some((_, nodes)) => nodes,
            None => &[],
        }
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{board, clip, collection};

    fn sample() -> Vec<Item> {
        vec![
            board("b1", None, "t1", 1),
            board("b0", None, "t1", 0),
            clip("c1", Some("b1"), "t1", 1),
            clip("c0", Some("b1"), "t1", 0),
            board("sub", Some("b1"), "t1", 2),
            clip("deep", Some("sub"), "t1", 0),
            board("other", None, "t2", 0),
        ]
    }

    #[test]
    fn builds_nested_tree_ordered_by_order_number() {
        let tree = build_tree(&sample(), "t1", None);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].item.id, "b0");
        assert_eq!(tree[1].item.id, "b1");
        let kids = tree[1]
            .children
            .iter()
            .map(|node| node.item.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(kids, vec!["c0", "c1", "sub"]);
        assert_eq!(tree[1].children[2].children[0].item.id, "deep");
    }

    #[test]
    fn start_parent_scopes_the_tree() {
        let tree = build_tree(&sample(), "t1", Some("b1"));
        assert_eq!(flatten(&tree), vec!["c0", "c1", "sub", "deep"]);
    }

    #[test]
    fn flattened_tree_matches_tab_items() {
        let items = sample();
        let mut flat = flatten(&build_tree(&items, "t1", None));
        flat.sort();
        let mut expected = items
            .iter()
            .filter(|item| item.in_tab("t1"))
            .map(|item| item.id.clone())
            .collect::<Vec<_>>();
        expected.sort();
        assert_eq!(flat, expected);
    }

    #[test]
    fn orphans_are_excluded() {
        let mut items = sample();
        items.push(clip("orphan", Some("missing"), "t1", 0));
        let flat = flatten(&build_tree(&items, "t1", None));
        assert!(!flat.contains(&"orphan".to_owned()));
    }

    #[test]
    fn cyclic_input_terminates() {
        let items = vec![
            board("a", Some("b"), "t1", 0),
            board("b", Some("a"), "t1", 0),
            board("root", None, "t1", 0),
        ];
        assert_eq!(flatten(&build_tree(&items, "t1", None)), vec!["root"]);
        assert_eq!(flatten(&build_tree(&items, "t1", Some("a"))), vec!["b"]);
    }

    #[test]
    fn descendants_and_ancestry() {
        let items = sample();
        let mut ids = all_children_ids(&items, "b1");
        ids.sort();
        assert_eq!(ids, vec!["c0", "c1", "deep", "sub"]);
        assert!(is_descendant(&items, "b1", "deep"));
        assert!(!is_descendant(&items, "sub", "b1"));
        assert!(!is_descendant(&items, "b1", "b1"));
    }

    #[test]
    fn cache_rebuilds_on_revision_change() {
        let mut col = collection(sample(), &["t1", "t2"]);
        let mut cache = TreeCache::new();
        assert_eq!(cache.tree(&col, "t1", None).len(), 2);

        col.items.retain(|item| item.id != "b0");
        col.revision += 1;
        assert_eq!(cache.tree(&col, "t1", None).len(), 1);
    }
}
