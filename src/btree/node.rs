//! Storage-agnostic B+Tree nodes.
//!
//! Nodes refer to each other by [`NodeId`] only. Whatever stores them (a map,
//! a set of pages) resolves ids through a
//! [`NodeAdapter`](super::adapter::NodeAdapter), so parent and sibling links
//! never form ownership cycles.

use std::fmt;

/// Opaque node identity handed out by an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Leaf node: ordered `(key, item)` entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf<K, I> {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
    pub entries: Vec<(K, I)>,
}

impl<K: Ord, I> Leaf<K, I> {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            parent: None,
            left: None,
            right: None,
            entries: Vec::new(),
        }
    }

    /// Position of `key`, or where it would be inserted.
    pub fn search(&self, key: &K) -> Result<usize, usize> {
        self.entries.binary_search_by(|(k, _)| k.cmp(key))
    }

    pub fn first_key(&self) -> Option<&K> {
        self.entries.first().map(|(k, _)| k)
    }
}

/// Branch node: `children.len() == keys.len() + 1`.
///
/// Every key under `children[i]` is `>= keys[i - 1]` and `< keys[i]`, so
/// `keys[i]` is shared by the lower-than child `children[i]` and the
/// greater-or-equal child `children[i + 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch<K> {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
    pub keys: Vec<K>,
    pub children: Vec<NodeId>,
}

impl<K: Ord> Branch<K> {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            parent: None,
            left: None,
            right: None,
            keys: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Index of the child to follow for `key`. A key equal to a separator
    /// goes to the greater-or-equal side.
    pub fn route(&self, key: &K) -> usize {
        self.keys.partition_point(|k| k <= key)
    }

    /// Position of `child` among the children. Panics if it is not one.
    pub fn child_index(&self, child: NodeId) -> usize {
        self.children
            .iter()
            .position(|&id| id == child)
            .unwrap_or_else(|| panic!("node {child} is not a child of branch {}", self.id))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node<K, I> {
    Leaf(Leaf<K, I>),
    Branch(Branch<K>),
}

impl<K, I> Node<K, I> {
    pub fn id(&self) -> NodeId {
        match self {
            Node::Leaf(leaf) => leaf.id,
            Node::Branch(branch) => branch.id,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        match self {
            Node::Leaf(leaf) => leaf.parent,
            Node::Branch(branch) => branch.parent,
        }
    }

    pub fn set_parent(&mut self, parent: Option<NodeId>) {
        match self {
            Node::Leaf(leaf) => leaf.parent = parent,
            Node::Branch(branch) => branch.parent = parent,
        }
    }

    pub fn left(&self) -> Option<NodeId> {
        match self {
            Node::Leaf(leaf) => leaf.left,
            Node::Branch(branch) => branch.left,
        }
    }

    pub fn set_left(&mut self, left: Option<NodeId>) {
        match self {
            Node::Leaf(leaf) => leaf.left = left,
            Node::Branch(branch) => branch.left = left,
        }
    }

    pub fn right(&self) -> Option<NodeId> {
        match self {
            Node::Leaf(leaf) => leaf.right,
            Node::Branch(branch) => branch.right,
        }
    }

    pub fn set_right(&mut self, right: Option<NodeId>) {
        match self {
            Node::Leaf(leaf) => leaf.right = right,
            Node::Branch(branch) => branch.right = right,
        }
    }

    /// Entries in a leaf, keys in a branch.
    pub fn len(&self) -> usize {
        match self {
            Node::Leaf(leaf) => leaf.entries.len(),
            Node::Branch(branch) => branch.keys.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }
}

impl<K, I> From<Leaf<K, I>> for Node<K, I> {
    fn from(leaf: Leaf<K, I>) -> Self {
        Node::Leaf(leaf)
    }
}

impl<K, I> From<Branch<K>> for Node<K, I> {
    fn from(branch: Branch<K>) -> Self {
        Node::Branch(branch)
    }
}

#[cfg(test)]
mod node_tests {
    use super::*;

    #[test]
    fn test_leaf_search() {
        let mut leaf = Leaf::new(NodeId(1));
        leaf.entries = vec![(10, 'a'), (20, 'b'), (30, 'c')];
        assert_eq!(leaf.search(&20), Ok(1));
        assert_eq!(leaf.search(&5), Err(0));
        assert_eq!(leaf.search(&25), Err(2));
        assert_eq!(leaf.first_key(), Some(&10));
    }

    #[test]
    fn test_branch_routes_equal_keys_right() {
        let mut branch = Branch::new(NodeId(1));
        branch.keys = vec![10, 20];
        branch.children = vec![NodeId(2), NodeId(3), NodeId(4)];
        assert_eq!(branch.route(&5), 0);
        assert_eq!(branch.route(&10), 1);
        assert_eq!(branch.route(&19), 1);
        assert_eq!(branch.route(&20), 2);
        assert_eq!(branch.route(&99), 2);
        assert_eq!(branch.child_index(NodeId(3)), 1);
    }

    #[test]
    #[should_panic(expected = "is not a child")]
    fn test_child_index_of_stranger_panics() {
        let mut branch: Branch<u32> = Branch::new(NodeId(1));
        branch.children = vec![NodeId(2)];
        branch.child_index(NodeId(9));
    }

    #[test]
    fn test_node_links() {
        let mut node: Node<u32, u32> = Leaf::new(NodeId(4)).into();
        node.set_parent(Some(NodeId(1)));
        node.set_left(Some(NodeId(3)));
        node.set_right(Some(NodeId(5)));
        assert_eq!(node.id(), NodeId(4));
        assert_eq!(
            (node.parent(), node.left(), node.right()),
            (Some(NodeId(1)), Some(NodeId(3)), Some(NodeId(5)))
        );
        assert!(node.is_leaf());
        assert!(node.is_empty());
    }
}
