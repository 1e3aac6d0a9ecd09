use super::node::{Branch, Leaf, Node, NodeId};
use crate::error::Result;

/// Storage behind a [`BTree`](super::BTree).
///
/// Nodes are handed out by value; the tree mutates its copy and writes it
/// back with `store_leaf`/`store_branch`. Ids stay valid until `free`.
pub trait NodeAdapter<K, I> {
    /// Create an empty root leaf unless a tree already exists.
    fn init(&mut self) -> Result<()>;

    fn load_root(&mut self) -> Result<NodeId>;

    fn set_root(&mut self, id: NodeId) -> Result<()>;

    fn is_root(&mut self, id: NodeId) -> Result<bool> {
        Ok(self.load_root()? == id)
    }

    /// Leftmost leaf, where in-order traversal starts.
    fn load_first_leaf(&mut self) -> Result<NodeId>;

    fn set_first_leaf(&mut self, id: NodeId) -> Result<()>;

    /// Panics if `id` does not name a live node.
    fn load_node(&mut self, id: NodeId) -> Result<Node<K, I>>;

    fn load_leaf(&mut self, id: NodeId) -> Result<Leaf<K, I>> {
        match self.load_node(id)? {
            Node::Leaf(leaf) => Ok(leaf),
            Node::Branch(_) => panic!("node {id} is a branch, expected a leaf"),
        }
    }

    fn load_branch(&mut self, id: NodeId) -> Result<Branch<K>> {
        match self.load_node(id)? {
            Node::Branch(branch) => Ok(branch),
            Node::Leaf(_) => panic!("node {id} is a leaf, expected a branch"),
        }
    }

    fn create_leaf(&mut self) -> Result<Leaf<K, I>>;

    fn create_branch(&mut self) -> Result<Branch<K>>;

    /// Fail with `OutOfSpace` unless `nodes` more nodes can be created.
    fn ensure_room(&mut self, nodes: usize) -> Result<()>;

    fn store_leaf(&mut self, leaf: &Leaf<K, I>) -> Result<()>;

    fn store_branch(&mut self, branch: &Branch<K>) -> Result<()>;

    fn store_node(&mut self, node: &Node<K, I>) -> Result<()> {
        match node {
            Node::Leaf(leaf) => self.store_leaf(leaf),
            Node::Branch(branch) => self.store_branch(branch),
        }
    }

    fn free(&mut self, id: NodeId) -> Result<()>;
}
