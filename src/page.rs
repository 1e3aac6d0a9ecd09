//! Fixed-size pages and their byte accessors.
//!
//! A [`DataBlock`] has no type of its own. Typed views (control block, record
//! page, index node) borrow one and interpret bytes at fixed offsets. All
//! multi-byte integers are big-endian.

/// Identity of a page within the datafile.
pub type PageId = u16;

/// Size of every page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Most pages a datafile can address with a 16-bit id.
pub const MAX_PAGES: u32 = 1 << 16;

/// Default datafile size: 256 MiB.
pub const DEFAULT_DATAFILE_PAGES: u32 = MAX_PAGES;

/// The page struct holding one page worth of bytes plus its id.
#[derive(Clone)]
pub struct DataBlock {
    id: PageId,
    contents: Box<[u8; PAGE_SIZE]>,
}

impl std::fmt::Debug for DataBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataBlock").field("id", &self.id).finish()
    }
}

impl DataBlock {
    pub fn new(id: PageId) -> Self {
        Self {
            id,
            contents: Box::new([0; PAGE_SIZE]),
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    /// Rebind this buffer to another page id. Contents are left untouched.
    pub(crate) fn set_id(&mut self, id: PageId) {
        self.id = id;
    }

    pub fn bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.contents
    }

    pub fn bytes_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.contents
    }

    /// Zero the whole page.
    pub fn clear(&mut self) {
        self.contents.fill(0);
    }

    pub fn read_u8(&self, offset: usize) -> u8 {
        self.contents[offset]
    }

    pub fn write_u8(&mut self, offset: usize, value: u8) {
        self.contents[offset] = value;
    }

    pub fn read_u16(&self, offset: usize) -> u16 {
        let mut bytes = [0; 2];
        bytes.copy_from_slice(&self.contents[offset..offset + 2]);
        u16::from_be_bytes(bytes)
    }

    pub fn write_u16(&mut self, offset: usize, value: u16) {
        self.contents[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    }

    pub fn read_u32(&self, offset: usize) -> u32 {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(&self.contents[offset..offset + 4]);
        u32::from_be_bytes(bytes)
    }

    pub fn write_u32(&mut self, offset: usize, value: u32) {
        self.contents[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }

    /// Borrow `len` raw bytes starting at `offset`.
    pub fn read_bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.contents[offset..offset + len]
    }

    /// Copy `bytes` into the page starting at `offset`.
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.contents[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}
