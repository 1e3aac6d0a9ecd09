use std::collections::HashMap;

use super::{
    adapter::NodeAdapter,
    node::{Branch, Leaf, Node, NodeId},
};
use crate::error::{Result, StoreError};

/// Map-backed node storage, optionally capped at a number of live nodes.
#[derive(Debug)]
pub struct MemoryAdapter<K, I> {
    nodes: HashMap<NodeId, Node<K, I>>,
    next_id: u32,
    root: Option<NodeId>,
    first_leaf: Option<NodeId>,
    node_limit: Option<usize>,
}

impl<K, I> Default for MemoryAdapter<K, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, I> MemoryAdapter<K, I> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            next_id: 1,
            root: None,
            first_leaf: None,
            node_limit: None,
        }
    }

    /// Adapter that refuses to hold more than `limit` live nodes.
    pub fn with_node_limit(limit: usize) -> Self {
        Self {
            node_limit: Some(limit),
            ..Self::new()
        }
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn room(&self) -> usize {
        self.node_limit
            .map_or(usize::MAX, |limit| limit.saturating_sub(self.nodes.len()))
    }

    fn next_id(&mut self) -> Result<NodeId> {
        if self.room() == 0 {
            return Err(StoreError::OutOfSpace);
        }
        let id = NodeId(self.next_id);
        self.next_id += 1;
        Ok(id)
    }

    fn put(&mut self, node: Node<K, I>) {
        let id = node.id();
        let previous = self.nodes.insert(id, node);
        assert!(previous.is_some(), "storing node {id} which was never created");
    }
}

impl<K: Ord + Clone, I: Clone> NodeAdapter<K, I> for MemoryAdapter<K, I> {
    fn init(&mut self) -> Result<()> {
        if self.root.is_none() {
            let leaf = self.create_leaf()?;
            self.root = Some(leaf.id);
            self.first_leaf = Some(leaf.id);
        }
        Ok(())
    }

    fn load_root(&mut self) -> Result<NodeId> {
        Ok(self.root.expect("tree used before init"))
    }

    fn set_root(&mut self, id: NodeId) -> Result<()> {
        self.root = Some(id);
        Ok(())
    }

    fn load_first_leaf(&mut self) -> Result<NodeId> {
        Ok(self.first_leaf.expect("tree used before init"))
    }

    fn set_first_leaf(&mut self, id: NodeId) -> Result<()> {
        self.first_leaf = Some(id);
        Ok(())
    }

    fn load_node(&mut self, id: NodeId) -> Result<Node<K, I>> {
        match self.nodes.get(&id) {
            Some(node) => Ok(node.clone()),
            None => panic!("node {id} does not exist"),
        }
    }

    fn create_leaf(&mut self) -> Result<Leaf<K, I>> {
        let leaf = Leaf::new(self.next_id()?);
        self.nodes.insert(leaf.id, Node::Leaf(leaf.clone()));
        Ok(leaf)
    }

    fn create_branch(&mut self) -> Result<Branch<K>> {
        let branch = Branch::new(self.next_id()?);
        self.nodes.insert(branch.id, Node::Branch(branch.clone()));
        Ok(branch)
    }

    fn ensure_room(&mut self, nodes: usize) -> Result<()> {
        if self.room() < nodes {
            return Err(StoreError::OutOfSpace);
        }
        Ok(())
    }

    fn store_leaf(&mut self, leaf: &Leaf<K, I>) -> Result<()> {
        self.put(Node::Leaf(leaf.clone()));
        Ok(())
    }

    fn store_branch(&mut self, branch: &Branch<K>) -> Result<()> {
        self.put(Node::Branch(branch.clone()));
        Ok(())
    }

    fn free(&mut self, id: NodeId) -> Result<()> {
        assert!(self.nodes.remove(&id).is_some(), "freeing unknown node {id}");
        Ok(())
    }
}

#[cfg(test)]
mod memory_adapter_tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let mut adapter: MemoryAdapter<u32, u32> = MemoryAdapter::new();
        adapter.init().unwrap();
        let root = adapter.load_root().unwrap();
        adapter.init().unwrap();
        assert_eq!(adapter.load_root().unwrap(), root);
        assert_eq!(adapter.load_first_leaf().unwrap(), root);
        assert!(adapter.is_root(root).unwrap());
        assert_eq!(adapter.len(), 1);
    }

    #[test]
    fn test_store_and_free() {
        let mut adapter: MemoryAdapter<u32, u32> = MemoryAdapter::new();
        let mut leaf = adapter.create_leaf().unwrap();
        leaf.entries.push((1, 10));
        adapter.store_leaf(&leaf).unwrap();
        assert_eq!(adapter.load_leaf(leaf.id).unwrap().entries, vec![(1, 10)]);

        adapter.free(leaf.id).unwrap();
        assert!(adapter.is_empty());
    }

    #[test]
    fn test_node_limit() {
        let mut adapter: MemoryAdapter<u32, u32> = MemoryAdapter::with_node_limit(2);
        adapter.init().unwrap();
        assert!(adapter.ensure_room(1).is_ok());
        assert!(matches!(adapter.ensure_room(2), Err(StoreError::OutOfSpace)));

        let branch = adapter.create_branch().unwrap();
        assert!(matches!(adapter.create_leaf(), Err(StoreError::OutOfSpace)));
        adapter.free(branch.id).unwrap();
        assert!(adapter.create_leaf().is_ok());
    }

    #[test]
    #[should_panic(expected = "expected a branch")]
    fn test_loading_wrong_kind_panics() {
        let mut adapter: MemoryAdapter<u32, u32> = MemoryAdapter::new();
        let leaf = adapter.create_leaf().unwrap();
        let _ = adapter.load_branch(leaf.id);
    }
}
