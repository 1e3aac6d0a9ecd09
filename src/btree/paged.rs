//! Page-backed node storage.
//!
//! Every node occupies one page allocated through the free-space bitmap; its
//! [`NodeId`] is the page id. Root and first-leaf ids live in the control
//! block.
//!
//! ```text
//! +------+-------+--------+------+-------+-----+---------------------+
//! | kind | count | parent | left | right | pad | entries ...         |
//! | u8   | u16   | u16    | u16  | u16   |     |                     |
//! +------+-------+--------+------+-------+-----+---------------------+
//! 0      1       3        5      7       9     16
//! ```
//!
//! Leaf entries are `key ‖ item`. A branch stores `child0` followed by
//! `count` pairs of `key ‖ child`. Link fields use 0 for none.

use std::marker::PhantomData;

use tracing::debug;

use super::{
    adapter::NodeAdapter,
    node::{Branch, Leaf, Node, NodeId},
    Capacity,
};
use crate::{
    buffer_manager::BufferManager,
    control::ControlBlock,
    error::{Result, StoreError},
    free_space::FreeSpaceMap,
    page::{DataBlock, PageId, PAGE_SIZE},
    record::RowId,
};

const KIND_LEAF: u8 = 1;
const KIND_BRANCH: u8 = 2;

const KIND: usize = 0;
const COUNT: usize = 1;
const PARENT: usize = 3;
const LEFT: usize = 5;
const RIGHT: usize = 7;
const HEADER_SIZE: usize = 16;

const CHILD_SIZE: usize = 2;

/// Fixed-width big-endian encoding for index keys and items.
pub trait FixedCodec: Sized {
    const SIZE: usize;

    fn encode(&self, buf: &mut [u8]);

    fn decode(buf: &[u8]) -> Self;
}

impl FixedCodec for u32 {
    const SIZE: usize = 4;

    fn encode(&self, buf: &mut [u8]) {
        buf[..4].copy_from_slice(&self.to_be_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(&buf[..4]);
        u32::from_be_bytes(bytes)
    }
}

impl FixedCodec for u64 {
    const SIZE: usize = 8;

    fn encode(&self, buf: &mut [u8]) {
        buf[..8].copy_from_slice(&self.to_be_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        let mut bytes = [0; 8];
        bytes.copy_from_slice(&buf[..8]);
        u64::from_be_bytes(bytes)
    }
}

impl FixedCodec for RowId {
    const SIZE: usize = 8;

    fn encode(&self, buf: &mut [u8]) {
        self.record_id.encode(&mut buf[..4]);
        buf[4..6].copy_from_slice(&self.data_block_id.to_be_bytes());
        buf[6..8].copy_from_slice(&self.local_id.to_be_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        RowId::new(
            u32::decode(&buf[..4]),
            u16::from_be_bytes([buf[4], buf[5]]),
            u16::from_be_bytes([buf[6], buf[7]]),
        )
    }
}

fn page_of(id: NodeId) -> PageId {
    PageId::try_from(id.0).unwrap_or_else(|_| panic!("node {id} is not a page id"))
}

fn link_to_page(link: Option<NodeId>) -> PageId {
    link.map_or(0, page_of)
}

fn page_to_link(page_id: PageId) -> Option<NodeId> {
    (page_id != 0).then(|| NodeId(page_id.into()))
}

pub struct PagedAdapter<'a, K, I> {
    pool: &'a mut BufferManager,
    space: FreeSpaceMap,
    _marker: PhantomData<(K, I)>,
}

impl<'a, K: FixedCodec, I: FixedCodec> PagedAdapter<'a, K, I> {
    pub fn new(pool: &'a mut BufferManager, space: FreeSpaceMap) -> Self {
        Self {
            pool,
            space,
            _marker: PhantomData,
        }
    }

    /// Most entries that fit in a node page.
    pub fn max_capacity() -> Capacity {
        Capacity::new(
            (PAGE_SIZE - HEADER_SIZE) / (K::SIZE + I::SIZE),
            (PAGE_SIZE - HEADER_SIZE - CHILD_SIZE) / (K::SIZE + CHILD_SIZE),
        )
    }

    /// `requested`, or the page maximum if `None`. A capacity larger than a
    /// page can hold is rejected.
    pub fn capacity(requested: Option<Capacity>) -> Result<Capacity> {
        let max = Self::max_capacity();
        let Some(capacity) = requested else {
            return Ok(max);
        };
        if capacity.leaf > max.leaf {
            return Err(StoreError::CapacityExceeded {
                requested: capacity.leaf,
                max: max.leaf,
            });
        }
        if capacity.branch > max.branch {
            return Err(StoreError::CapacityExceeded {
                requested: capacity.branch,
                max: max.branch,
            });
        }
        Ok(capacity)
    }

    fn write_header(
        page: &mut DataBlock,
        kind: u8,
        count: usize,
        parent: Option<NodeId>,
        left: Option<NodeId>,
        right: Option<NodeId>,
    ) {
        page.write_u8(KIND, kind);
        page.write_u16(COUNT, count as u16);
        page.write_u16(PARENT, link_to_page(parent));
        page.write_u16(LEFT, link_to_page(left));
        page.write_u16(RIGHT, link_to_page(right));
    }

    fn allocate(&mut self, kind: u8) -> Result<NodeId> {
        let page_id = self.space.allocate(self.pool)?;
        Self::write_header(self.pool.fetch(page_id)?, kind, 0, None, None, None);
        self.pool.mark_dirty(page_id)?;
        Ok(NodeId(page_id.into()))
    }

    fn decode_leaf(page: &DataBlock, id: NodeId) -> Leaf<K, I> {
        let count = usize::from(page.read_u16(COUNT));
        let entry_size = K::SIZE + I::SIZE;
        let entries = (0..count)
            .map(|i| {
                let offset = HEADER_SIZE + i * entry_size;
                let bytes = page.read_bytes(offset, entry_size);
                (K::decode(&bytes[..K::SIZE]), I::decode(&bytes[K::SIZE..]))
            })
            .collect();
        Leaf {
            id,
            parent: page_to_link(page.read_u16(PARENT)),
            left: page_to_link(page.read_u16(LEFT)),
            right: page_to_link(page.read_u16(RIGHT)),
            entries,
        }
    }

    fn decode_branch(page: &DataBlock, id: NodeId) -> Branch<K> {
        let count = usize::from(page.read_u16(COUNT));
        let pair_size = K::SIZE + CHILD_SIZE;
        let mut children = Vec::with_capacity(count + 1);
        let mut keys = Vec::with_capacity(count);
        children.push(NodeId(page.read_u16(HEADER_SIZE).into()));
        for i in 0..count {
            let offset = HEADER_SIZE + CHILD_SIZE + i * pair_size;
            keys.push(K::decode(page.read_bytes(offset, K::SIZE)));
            children.push(NodeId(page.read_u16(offset + K::SIZE).into()));
        }
        Branch {
            id,
            parent: page_to_link(page.read_u16(PARENT)),
            left: page_to_link(page.read_u16(LEFT)),
            right: page_to_link(page.read_u16(RIGHT)),
            keys,
            children,
        }
    }
}

impl<K, I> NodeAdapter<K, I> for PagedAdapter<'_, K, I>
where
    K: FixedCodec + Ord + Clone,
    I: FixedCodec + Clone,
{
    fn init(&mut self) -> Result<()> {
        if ControlBlock::snapshot(self.pool)?.index_root == 0 {
            let leaf = self.create_leaf()?;
            self.set_root(leaf.id)?;
            self.set_first_leaf(leaf.id)?;
        }
        Ok(())
    }

    fn load_root(&mut self) -> Result<NodeId> {
        page_to_link(ControlBlock::snapshot(self.pool)?.index_root).ok_or(StoreError::NotFormatted)
    }

    fn set_root(&mut self, id: NodeId) -> Result<()> {
        ControlBlock::modify(self.pool, |control| control.set_index_root(page_of(id)))
    }

    fn load_first_leaf(&mut self) -> Result<NodeId> {
        page_to_link(ControlBlock::snapshot(self.pool)?.index_first_leaf)
            .ok_or(StoreError::NotFormatted)
    }

    fn set_first_leaf(&mut self, id: NodeId) -> Result<()> {
        ControlBlock::modify(self.pool, |control| {
            control.set_index_first_leaf(page_of(id))
        })
    }

    fn load_node(&mut self, id: NodeId) -> Result<Node<K, I>> {
        let page = self.pool.fetch(page_of(id))?;
        match page.read_u8(KIND) {
            KIND_LEAF => Ok(Node::Leaf(Self::decode_leaf(page, id))),
            KIND_BRANCH => Ok(Node::Branch(Self::decode_branch(page, id))),
            kind => panic!("page {id} does not hold an index node (kind {kind})"),
        }
    }

    fn create_leaf(&mut self) -> Result<Leaf<K, I>> {
        Ok(Leaf::new(self.allocate(KIND_LEAF)?))
    }

    fn create_branch(&mut self) -> Result<Branch<K>> {
        Ok(Branch::new(self.allocate(KIND_BRANCH)?))
    }

    fn ensure_room(&mut self, nodes: usize) -> Result<()> {
        let free = self.space.count_free(self.pool)?;
        if (free as usize) < nodes {
            debug!(free, nodes, "not enough free pages for index nodes");
            return Err(StoreError::OutOfSpace);
        }
        Ok(())
    }

    fn store_leaf(&mut self, leaf: &Leaf<K, I>) -> Result<()> {
        let max = Self::max_capacity().leaf;
        assert!(
            leaf.entries.len() <= max,
            "leaf {} holds {} entries, a page fits {max}",
            leaf.id,
            leaf.entries.len()
        );
        let page_id = page_of(leaf.id);
        let page = self.pool.fetch(page_id)?;
        Self::write_header(
            page,
            KIND_LEAF,
            leaf.entries.len(),
            leaf.parent,
            leaf.left,
            leaf.right,
        );
        let entry_size = K::SIZE + I::SIZE;
        for (i, (key, item)) in leaf.entries.iter().enumerate() {
            let offset = HEADER_SIZE + i * entry_size;
            let buf = &mut page.bytes_mut()[offset..offset + entry_size];
            key.encode(&mut buf[..K::SIZE]);
            item.encode(&mut buf[K::SIZE..]);
        }
        self.pool.mark_dirty(page_id)
    }

    fn store_branch(&mut self, branch: &Branch<K>) -> Result<()> {
        let max = Self::max_capacity().branch;
        assert!(
            branch.keys.len() <= max,
            "branch {} holds {} keys, a page fits {max}",
            branch.id,
            branch.keys.len()
        );
        assert_eq!(branch.children.len(), branch.keys.len() + 1);
        let page_id = page_of(branch.id);
        let page = self.pool.fetch(page_id)?;
        Self::write_header(
            page,
            KIND_BRANCH,
            branch.keys.len(),
            branch.parent,
            branch.left,
            branch.right,
        );
        page.write_u16(HEADER_SIZE, page_of(branch.children[0]));
        let pair_size = K::SIZE + CHILD_SIZE;
        for (i, (key, &child)) in branch.keys.iter().zip(&branch.children[1..]).enumerate() {
            let offset = HEADER_SIZE + CHILD_SIZE + i * pair_size;
            key.encode(&mut page.bytes_mut()[offset..offset + K::SIZE]);
            page.write_u16(offset + K::SIZE, page_of(child));
        }
        self.pool.mark_dirty(page_id)
    }

    fn free(&mut self, id: NodeId) -> Result<()> {
        let page_id = page_of(id);
        self.pool.fetch(page_id)?.clear();
        self.pool.mark_dirty(page_id)?;
        self.space.release(self.pool, page_id)
    }
}
