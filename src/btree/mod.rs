//! Order-preserving B+Tree over pluggable node storage.
//!
//! The engine only talks to a [`NodeAdapter`]; the same split, borrow and
//! merge logic runs over [`MemoryAdapter`] and the page-backed
//! [`PagedAdapter`].
//!
//! # Rebalancing on delete
//!
//! A non-root node that drops below half capacity first borrows one entry
//! from its right sibling, then from its left sibling, and only merges when
//! neither sibling has an entry to spare. Merges always fold the right node
//! into the left one and remove their separator from the parent, which may
//! cascade up to the root. A root branch left with a single child is
//! replaced by that child.

pub mod adapter;
pub mod memory;
pub mod node;
pub mod paged;

use std::{fmt::Debug, marker::PhantomData};

use tracing::debug;

pub use adapter::NodeAdapter;
pub use memory::MemoryAdapter;
pub use node::{Branch, Leaf, Node, NodeId};
pub use paged::{FixedCodec, PagedAdapter};

use crate::error::{Result, StoreError};

/// Maximum entries per leaf and keys per branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub leaf: usize,
    pub branch: usize,
}

impl Capacity {
    pub fn new(leaf: usize, branch: usize) -> Self {
        Self { leaf, branch }
    }

    /// Fewest entries a non-root leaf may hold.
    pub fn half_leaf(&self) -> usize {
        self.leaf / 2
    }

    /// Fewest keys a non-root branch may hold.
    pub fn half_branch(&self) -> usize {
        self.branch / 2
    }

    fn half(&self, leaf: bool) -> usize {
        if leaf {
            self.half_leaf()
        } else {
            self.half_branch()
        }
    }

    fn max(&self, leaf: bool) -> usize {
        if leaf {
            self.leaf
        } else {
            self.branch
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.leaf < 2 || self.branch < 2 {
            return Err(StoreError::config(format!(
                "node capacity must be at least 2, got leaf {} branch {}",
                self.leaf, self.branch
            )));
        }
        Ok(())
    }
}

/// Summary returned by [`BTree::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeShape {
    pub entries: usize,
    pub nodes: usize,
    pub height: usize,
}

/// One node as seen by [`BTree::check`], in level order.
struct LevelEntry {
    id: NodeId,
    left: Option<NodeId>,
    right: Option<NodeId>,
    is_leaf: bool,
}

pub struct BTree<K, I, A> {
    adapter: A,
    capacity: Capacity,
    _marker: PhantomData<(K, I)>,
}

impl<K, I, A> BTree<K, I, A>
where
    K: Ord + Clone + Debug,
    I: Clone + Debug,
    A: NodeAdapter<K, I>,
{
    /// Open the tree held by `adapter`, creating an empty root leaf if the
    /// adapter holds none yet.
    pub fn new(mut adapter: A, capacity: Capacity) -> Result<Self> {
        capacity.validate()?;
        adapter.init()?;
        Ok(Self {
            adapter,
            capacity,
            _marker: PhantomData,
        })
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn into_adapter(self) -> A {
        self.adapter
    }

    pub fn find(&mut self, key: &K) -> Result<I> {
        let leaf = self.find_leaf(key)?;
        match leaf.search(key) {
            Ok(pos) => Ok(leaf.entries[pos].1.clone()),
            Err(_) => Err(StoreError::key_not_found(key)),
        }
    }

    pub fn contains(&mut self, key: &K) -> Result<bool> {
        let leaf = self.find_leaf(key)?;
        Ok(leaf.search(key).is_ok())
    }

    /// Insert `key`. An existing key is rejected and the tree is untouched.
    ///
    /// If a split needs more nodes than the adapter can create, the insert
    /// fails with `OutOfSpace` before anything is written.
    pub fn insert(&mut self, key: K, item: I) -> Result<()> {
        let mut leaf = self.find_leaf(&key)?;
        let pos = match leaf.search(&key) {
            Ok(_) => return Err(StoreError::duplicate_key(&key)),
            Err(pos) => pos,
        };
        if leaf.entries.len() < self.capacity.leaf {
            leaf.entries.insert(pos, (key, item));
            return self.adapter.store_leaf(&leaf);
        }
        let needed = self.nodes_for_split(&leaf)?;
        self.adapter.ensure_room(needed)?;
        leaf.entries.insert(pos, (key, item));
        self.split_leaf(leaf)
    }

    /// Nodes created by splitting the full `leaf`: one per full ancestor
    /// that the split cascades into, plus a new root if it reaches the top.
    fn nodes_for_split(&mut self, leaf: &Leaf<K, I>) -> Result<usize> {
        let mut needed = 1;
        let mut parent = leaf.parent;
        while let Some(id) = parent {
            let branch = self.adapter.load_branch(id)?;
            if branch.keys.len() < self.capacity.branch {
                return Ok(needed);
            }
            needed += 1;
            parent = branch.parent;
        }
        Ok(needed + 1)
    }

    /// Remove `key` and return its item.
    pub fn delete(&mut self, key: &K) -> Result<I> {
        let mut leaf = self.find_leaf(key)?;
        let pos = leaf
            .search(key)
            .map_err(|_| StoreError::key_not_found(key))?;
        let (_, item) = leaf.entries.remove(pos);
        self.adapter.store_leaf(&leaf)?;
        self.rebalance(Node::Leaf(leaf))?;
        Ok(item)
    }

    /// Visit every entry in ascending key order.
    pub fn all(&mut self, mut visit: impl FnMut(&K, &I)) -> Result<()> {
        let mut next = Some(self.adapter.load_first_leaf()?);
        while let Some(id) = next {
            let leaf = self.adapter.load_leaf(id)?;
            for (key, item) in &leaf.entries {
                visit(key, item);
            }
            next = leaf.right;
        }
        Ok(())
    }

    /// Entries in key order.
    pub fn entries(&mut self) -> Result<Vec<(K, I)>> {
        let mut entries = Vec::new();
        self.all(|key, item| entries.push((key.clone(), item.clone())))?;
        Ok(entries)
    }

    pub fn len(&mut self) -> Result<usize> {
        let mut len = 0;
        self.all(|_, _| len += 1)?;
        Ok(len)
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        let root = self.adapter.load_root()?;
        Ok(match self.adapter.load_node(root)? {
            Node::Leaf(leaf) => leaf.entries.is_empty(),
            Node::Branch(_) => false,
        })
    }

    /// Levels from the root down to the leaves; a lone root leaf is 1.
    pub fn height(&mut self) -> Result<usize> {
        let mut height = 1;
        let mut id = self.adapter.load_root()?;
        while let Node::Branch(branch) = self.adapter.load_node(id)? {
            id = branch.children[0];
            height += 1;
        }
        Ok(height)
    }

    fn find_leaf(&mut self, key: &K) -> Result<Leaf<K, I>> {
        let mut id = self.adapter.load_root()?;
        loop {
            match self.adapter.load_node(id)? {
                Node::Leaf(leaf) => return Ok(leaf),
                Node::Branch(branch) => id = branch.children[branch.route(key)],
            }
        }
    }

    fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) -> Result<()> {
        let mut node = self.adapter.load_node(id)?;
        node.set_parent(parent);
        self.adapter.store_node(&node)
    }

    fn set_left(&mut self, id: NodeId, left: Option<NodeId>) -> Result<()> {
        let mut node = self.adapter.load_node(id)?;
        node.set_left(left);
        self.adapter.store_node(&node)
    }

    /// Move the upper half of an overfull leaf into a new right sibling.
    fn split_leaf(&mut self, mut leaf: Leaf<K, I>) -> Result<()> {
        let mut right = self.adapter.create_leaf()?;
        let split = leaf.entries.len() / 2;
        right.entries = leaf.entries.split_off(split);
        right.parent = leaf.parent;
        right.left = Some(leaf.id);
        right.right = leaf.right;
        if let Some(next) = leaf.right {
            self.set_left(next, Some(right.id))?;
        }
        leaf.right = Some(right.id);

        let separator = right.entries[0].0.clone();
        self.adapter.store_leaf(&leaf)?;
        self.adapter.store_leaf(&right)?;
        debug!(left = %leaf.id, right = %right.id, ?separator, "split leaf");
        self.promote(leaf.id, leaf.parent, separator, right.id)
    }

    /// Move the upper half of an overfull branch into a new right sibling,
    /// pushing the middle key up.
    fn split_branch(&mut self, mut branch: Branch<K>) -> Result<()> {
        let mut right = self.adapter.create_branch()?;
        let mid = branch.keys.len() / 2;
        right.keys = branch.keys.split_off(mid + 1);
        let separator = branch
            .keys
            .pop()
            .expect("an overfull branch has a middle key");
        right.children = branch.children.split_off(mid + 1);
        right.parent = branch.parent;
        right.left = Some(branch.id);
        right.right = branch.right;
        if let Some(next) = branch.right {
            self.set_left(next, Some(right.id))?;
        }
        branch.right = Some(right.id);

        self.adapter.store_branch(&branch)?;
        self.adapter.store_branch(&right)?;
        for &child in &right.children {
            self.set_parent(child, Some(right.id))?;
        }
        debug!(left = %branch.id, right = %right.id, ?separator, "split branch");
        self.promote(branch.id, branch.parent, separator, right.id)
    }

    /// Insert `separator` between `left` and its new sibling `right` in their
    /// parent, growing a new root if `left` was the root.
    fn promote(
        &mut self,
        left: NodeId,
        parent: Option<NodeId>,
        separator: K,
        right: NodeId,
    ) -> Result<()> {
        let Some(parent_id) = parent else {
            let mut root = self.adapter.create_branch()?;
            root.keys.push(separator);
            root.children = vec![left, right];
            self.adapter.store_branch(&root)?;
            self.set_parent(left, Some(root.id))?;
            self.set_parent(right, Some(root.id))?;
            self.adapter.set_root(root.id)?;
            debug!(root = %root.id, "grew new root");
            return Ok(());
        };

        let mut parent = self.adapter.load_branch(parent_id)?;
        let idx = parent.child_index(left);
        parent.keys.insert(idx, separator);
        parent.children.insert(idx + 1, right);
        if parent.keys.len() <= self.capacity.branch {
            return self.adapter.store_branch(&parent);
        }
        self.split_branch(parent)
    }

    fn load_sibling(&mut self, node: &Node<K, I>, id: NodeId) -> Result<Node<K, I>> {
        let sibling = self.adapter.load_node(id)?;
        assert_eq!(
            sibling.parent(),
            node.parent(),
            "nodes {} and {} are not siblings",
            node.id(),
            id
        );
        assert_eq!(
            sibling.is_leaf(),
            node.is_leaf(),
            "siblings {} and {} are on different levels",
            node.id(),
            id
        );
        Ok(sibling)
    }

    /// Restore the fill invariant of `node` after it lost an entry.
    fn rebalance(&mut self, node: Node<K, I>) -> Result<()> {
        if self.adapter.is_root(node.id())? {
            assert_eq!(node.parent(), None, "root {} has a parent", node.id());
            return self.collapse_root(node);
        }
        let half = self.capacity.half(node.is_leaf());
        if node.len() >= half {
            return Ok(());
        }

        let parent_id = node
            .parent()
            .unwrap_or_else(|| panic!("non-root node {} has no parent", node.id()));
        let parent = self.adapter.load_branch(parent_id)?;
        let idx = parent.child_index(node.id());
        let right = match parent.children.get(idx + 1) {
            Some(&id) => Some(self.load_sibling(&node, id)?),
            None => None,
        };
        let left = match idx.checked_sub(1) {
            Some(left_idx) => Some(self.load_sibling(&node, parent.children[left_idx])?),
            None => None,
        };

        match (left, right) {
            (_, Some(right)) if right.len() > half => {
                self.borrow_from_right(node, right, parent, idx)
            }
            (Some(left), _) if left.len() > half => self.borrow_from_left(node, left, parent, idx),
            (_, Some(right)) => self.merge(node, right, parent, idx),
            (Some(left), None) => self.merge(left, node, parent, idx - 1),
            (None, None) => panic!("non-root node {} has no siblings", node.id()),
        }
    }

    /// Move the first entry of `right` to the end of `node`.
    fn borrow_from_right(
        &mut self,
        node: Node<K, I>,
        right: Node<K, I>,
        mut parent: Branch<K>,
        idx: usize,
    ) -> Result<()> {
        match (node, right) {
            (Node::Leaf(mut node), Node::Leaf(mut right)) => {
                node.entries.push(right.entries.remove(0));
                parent.keys[idx] = right.entries[0].0.clone();
                self.adapter.store_leaf(&node)?;
                self.adapter.store_leaf(&right)?;
                debug!(node = %node.id, from = %right.id, "borrowed from right leaf");
            }
            (Node::Branch(mut node), Node::Branch(mut right)) => {
                let child = right.children.remove(0);
                let key = right.keys.remove(0);
                node.keys.push(std::mem::replace(&mut parent.keys[idx], key));
                node.children.push(child);
                self.adapter.store_branch(&node)?;
                self.adapter.store_branch(&right)?;
                self.set_parent(child, Some(node.id))?;
                debug!(node = %node.id, from = %right.id, "borrowed from right branch");
            }
            _ => unreachable!("siblings are checked to be on the same level"),
        }
        self.adapter.store_branch(&parent)
    }

    /// Move the last entry of `left` to the front of `node`.
    fn borrow_from_left(
        &mut self,
        node: Node<K, I>,
        left: Node<K, I>,
        mut parent: Branch<K>,
        idx: usize,
    ) -> Result<()> {
        match (node, left) {
            (Node::Leaf(mut node), Node::Leaf(mut left)) => {
                let entry = left.entries.pop().expect("lender has spare entries");
                node.entries.insert(0, entry);
                parent.keys[idx - 1] = node.entries[0].0.clone();
                self.adapter.store_leaf(&node)?;
                self.adapter.store_leaf(&left)?;
                debug!(node = %node.id, from = %left.id, "borrowed from left leaf");
            }
            (Node::Branch(mut node), Node::Branch(mut left)) => {
                let child = left.children.pop().expect("lender has spare children");
                let key = left.keys.pop().expect("lender has spare keys");
                node.keys.insert(0, std::mem::replace(&mut parent.keys[idx - 1], key));
                node.children.insert(0, child);
                self.adapter.store_branch(&node)?;
                self.adapter.store_branch(&left)?;
                self.set_parent(child, Some(node.id))?;
                debug!(node = %node.id, from = %left.id, "borrowed from left branch");
            }
            _ => unreachable!("siblings are checked to be on the same level"),
        }
        self.adapter.store_branch(&parent)
    }

    /// Fold `right` into `left`, drop separator `sep` from the parent and
    /// rebalance the parent.
    fn merge(
        &mut self,
        left: Node<K, I>,
        right: Node<K, I>,
        mut parent: Branch<K>,
        sep: usize,
    ) -> Result<()> {
        let separator = parent.keys.remove(sep);
        let absorbed = parent.children.remove(sep + 1);
        assert_eq!(absorbed, right.id(), "merge partner is not the next child");
        let next = right.right();

        let left_id = match (left, right) {
            (Node::Leaf(mut left), Node::Leaf(right)) => {
                left.entries.extend(right.entries);
                left.right = next;
                self.adapter.store_leaf(&left)?;
                left.id
            }
            (Node::Branch(mut left), Node::Branch(right)) => {
                left.keys.push(separator);
                left.keys.extend(right.keys);
                left.right = next;
                for &child in &right.children {
                    self.set_parent(child, Some(left.id))?;
                }
                left.children.extend(right.children);
                self.adapter.store_branch(&left)?;
                left.id
            }
            _ => unreachable!("siblings are checked to be on the same level"),
        };
        if let Some(next) = next {
            self.set_left(next, Some(left_id))?;
        }
        self.adapter.free(absorbed)?;
        self.adapter.store_branch(&parent)?;
        debug!(node = %left_id, absorbed = %absorbed, "merged nodes");
        self.rebalance(Node::Branch(parent))
    }

    /// Replace a root branch that lost its last key by its only child.
    fn collapse_root(&mut self, root: Node<K, I>) -> Result<()> {
        let Node::Branch(branch) = root else {
            return Ok(());
        };
        if !branch.keys.is_empty() {
            return Ok(());
        }
        let child = branch.children[0];
        self.set_parent(child, None)?;
        self.adapter.set_root(child)?;
        self.adapter.free(branch.id)?;
        debug!(old = %branch.id, new = %child, "collapsed root");
        Ok(())
    }

    /// Walk the whole tree and panic on any broken structural invariant:
    /// key order and separator bounds, fill limits, parent pointers, equal
    /// leaf depth and sibling links on every level.
    pub fn check(&mut self) -> Result<TreeShape> {
        let root = self.adapter.load_root()?;
        let mut levels: Vec<Vec<LevelEntry>> = Vec::new();
        let entries = self.check_node(root, None, None, None, 0, &mut levels)?;

        let height = levels.len();
        for (depth, level) in levels.iter().enumerate() {
            for (pos, entry) in level.iter().enumerate() {
                assert_eq!(
                    entry.is_leaf,
                    depth + 1 == height,
                    "leaves are not all at depth {}",
                    height - 1
                );
                let expected_left = pos.checked_sub(1).map(|p| level[p].id);
                let expected_right = level.get(pos + 1).map(|n| n.id);
                assert_eq!(entry.left, expected_left, "node {} has a wrong left link", entry.id);
                assert_eq!(entry.right, expected_right, "node {} has a wrong right link", entry.id);
            }
        }
        assert_eq!(
            self.adapter.load_first_leaf()?,
            levels[height - 1][0].id,
            "first leaf pointer is stale"
        );
        let nodes = levels.iter().map(Vec::len).sum();
        debug!(entries, nodes, height, "checked tree");
        Ok(TreeShape {
            entries,
            nodes,
            height,
        })
    }

    fn check_node(
        &mut self,
        id: NodeId,
        parent: Option<NodeId>,
        lower: Option<&K>,
        upper: Option<&K>,
        depth: usize,
        levels: &mut Vec<Vec<LevelEntry>>,
    ) -> Result<usize> {
        let node = self.adapter.load_node(id)?;
        assert_eq!(node.parent(), parent, "node {id} has a wrong parent");
        if levels.len() <= depth {
            levels.push(Vec::new());
        }
        levels[depth].push(LevelEntry {
            id,
            left: node.left(),
            right: node.right(),
            is_leaf: node.is_leaf(),
        });

        let leaf = node.is_leaf();
        assert!(node.len() <= self.capacity.max(leaf), "node {id} is overfull");
        if parent.is_some() {
            assert!(
                node.len() >= self.capacity.half(leaf),
                "node {id} is below half capacity"
            );
        }

        let in_bounds = |key: &K| {
            lower.map_or(true, |lower| key >= lower) && upper.map_or(true, |upper| key < upper)
        };
        match node {
            Node::Leaf(leaf) => {
                assert!(
                    leaf.entries.windows(2).all(|w| w[0].0 < w[1].0),
                    "leaf {id} keys are not strictly increasing"
                );
                assert!(
                    leaf.entries.iter().all(|(key, _)| in_bounds(key)),
                    "leaf {id} holds a key outside its parent's separators"
                );
                Ok(leaf.entries.len())
            }
            Node::Branch(branch) => {
                assert_eq!(
                    branch.children.len(),
                    branch.keys.len() + 1,
                    "branch {id} has mismatched children"
                );
                assert!(
                    branch.keys.windows(2).all(|w| w[0] < w[1]),
                    "branch {id} keys are not strictly increasing"
                );
                assert!(
                    branch.keys.iter().all(|key| in_bounds(key)),
                    "branch {id} holds a key outside its parent's separators"
                );
                let mut entries = 0;
                for (idx, &child) in branch.children.iter().enumerate() {
                    let child_lower = if idx == 0 { lower } else { Some(&branch.keys[idx - 1]) };
                    let child_upper = branch.keys.get(idx).or(upper);
                    entries +=
                        self.check_node(child, Some(id), child_lower, child_upper, depth + 1, levels)?;
                }
                Ok(entries)
            }
        }
    }
}


#[cfg(test)]
mod btree_tests {
    use super::{conformance::*, *};

    fn memory() -> MemoryAdapter<u32, u32> {
        MemoryAdapter::new()
    }

    #[test]
    fn test_single_leaf_traversal() {
        single_leaf_traversal(memory());
    }

    #[test]
    fn test_one_split() {
        one_split(memory());
    }

    #[test]
    fn test_one_split_allocates_three_nodes() {
        let mut tree = Tree::new(memory(), Capacity::new(4, 4)).unwrap();
        for key in 0..=4 {
            tree.insert(key, key).unwrap();
        }
        assert_eq!(tree.adapter().len(), 3);
    }

    #[test]
    fn test_borrow_from_sibling() {
        borrow_from_sibling(memory());
    }

    #[test]
    fn test_merge_and_collapse() {
        merge_and_collapse(memory());
    }

    #[test]
    fn test_merge_without_collapse() {
        merge_without_collapse(memory());
    }

    #[test]
    fn test_duplicate_and_missing_keys() {
        duplicate_and_missing_keys(memory());
    }

    #[test]
    fn test_empty_tree() {
        empty_tree(memory());
    }

    #[test]
    fn test_grow_and_shrink() {
        grow_and_shrink(memory());
    }

    #[test]
    fn test_split_without_room_changes_nothing() {
        split_without_room(MemoryAdapter::with_node_limit(4));
    }

    #[test]
    fn test_randomized() {
        for (capacity, seed) in [
            (Capacity::new(2, 2), 1),
            (Capacity::new(3, 3), 7),
            (Capacity::new(4, 5), 42),
            (Capacity::new(7, 4), 1234),
        ] {
            randomized(memory(), capacity, seed);
        }
    }

    #[test]
    fn test_borrow_from_left_leaf() {
        let mut tree = Tree::new(memory(), Capacity::new(4, 4)).unwrap();
        for key in [0, 1, 2, 3, 4] {
            tree.insert(key * 10, key).unwrap();
        }
        // [0 10] [20 30 40]; grow the left leaf, then drain the right one.
        tree.insert(5, 0).unwrap();
        tree.delete(&40).unwrap();
        tree.delete(&30).unwrap();
        tree.check().unwrap();
        let root = tree.adapter.load_root().unwrap();
        let root = tree.adapter.load_branch(root).unwrap();
        assert_eq!(root.keys, vec![10]);
        let right = tree.adapter.load_leaf(root.children[1]).unwrap();
        assert_eq!(right.entries, vec![(10, 1), (20, 2)]);
    }

    #[test]
    fn test_branch_rotation_keeps_order() {
        let mut tree = Tree::new(memory(), Capacity::new(2, 2)).unwrap();
        for key in 0..40 {
            tree.insert(key, key).unwrap();
        }
        for key in (0..40).step_by(3) {
            tree.delete(&key).unwrap();
            tree.check().unwrap();
        }
        let expected: Vec<u32> = (0..40).filter(|k| k % 3 != 0).collect();
        let mut seen = Vec::new();
        tree.all(|k, _| seen.push(*k)).unwrap();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_string_keys() {
        let mut tree: BTree<String, u32, _> =
            BTree::new(MemoryAdapter::new(), Capacity::new(3, 3)).unwrap();
        for (i, word) in ["pear", "apple", "fig", "kiwi", "plum", "date"].iter().enumerate() {
            tree.insert(word.to_string(), i as u32).unwrap();
        }
        let words: Vec<String> = tree.entries().unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(words, ["apple", "date", "fig", "kiwi", "pear", "plum"]);
        assert_eq!(tree.find(&"kiwi".to_string()).unwrap(), 3);
    }

    #[test]
    fn test_invalid_capacity_is_rejected() {
        assert!(Tree::new(memory(), Capacity::new(1, 4)).is_err());
        assert!(Tree::new(memory(), Capacity::new(4, 1)).is_err());
    }

    #[test]
    #[should_panic(expected = "are not siblings")]
    fn test_sibling_with_other_parent_panics() {
        let mut tree = Tree::new(memory(), Capacity::new(4, 4)).unwrap();
        for key in 0..=4 {
            tree.insert(key, key).unwrap();
        }
        let root = tree.adapter.load_root().unwrap();
        let root = tree.adapter.load_branch(root).unwrap();
        let mut right = tree.adapter.load_leaf(root.children[1]).unwrap();
        right.parent = Some(NodeId(999));
        tree.adapter.store_leaf(&right).unwrap();
        tree.delete(&0).unwrap();
    }
}
