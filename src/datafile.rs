//! Raw page I/O against a fixed-size backing store.
//!
//! ```text
//! +------------------+------------------+------------------+
//! | Page 0 (4KB)     | Page 1 (4KB)     | Page 2 (4KB)     | ...
//! +------------------+------------------+------------------+
//! ^ offset 0         ^ offset 4096      ^ offset 8192
//! ```
//!
//! The datafile never grows: it is preallocated on creation and addressed by
//! `page_id * PAGE_SIZE`. Caching lives in the buffer pool, not here.

use std::{
    cell::RefCell,
    collections::HashMap,
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    rc::Rc,
};

use tracing::debug;

use crate::{
    error::{Result, StoreError},
    page::{PageId, PAGE_SIZE},
};

/// Page-granular backing store used by the buffer pool.
pub trait Datafile {
    /// Read page `id` into `buf`.
    fn read_block(&mut self, id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()>;

    /// Write `buf` to page `id`.
    fn write_block(&mut self, id: PageId, buf: &[u8; PAGE_SIZE]) -> Result<()>;

    /// Number of addressable pages.
    fn page_count(&self) -> u32;

    /// Push written pages to durable storage.
    fn sync(&mut self) -> Result<()>;

    /// Flush and release the underlying resource.
    fn close(&mut self) -> Result<()>;
}

fn check_range(id: PageId, page_count: u32) -> Result<()> {
    if u32::from(id) >= page_count {
        return Err(StoreError::PageOutOfRange {
            page_id: id.into(),
            page_count,
        });
    }
    Ok(())
}

/// Datafile backed by a single preallocated file on disk.
#[derive(Debug)]
pub struct FileDatafile {
    path: PathBuf,
    file: File,
    page_count: u32,
    created: bool,
}

impl FileDatafile {
    /// Open the datafile at `path`, creating and preallocating it to
    /// `page_count` pages if it does not exist yet.
    ///
    /// An existing file is reused as-is; its size decides the page count.
    pub fn open<P: AsRef<Path>>(path: P, page_count: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let created = !path.exists();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let page_count = if created {
            let len = u64::from(page_count) * PAGE_SIZE as u64;
            preallocate(&file, len)?;
            debug!(path = %path.display(), pages = page_count, "created datafile");
            page_count
        } else {
            let len = file.metadata()?.len();
            if len % PAGE_SIZE as u64 != 0 {
                return Err(StoreError::config(format!(
                    "datafile {} has size {} which is not a multiple of {}",
                    path.display(),
                    len,
                    PAGE_SIZE
                )));
            }
            (len / PAGE_SIZE as u64) as u32
        };

        Ok(Self {
            path,
            file,
            page_count,
            created,
        })
    }

    /// Whether `open` created the file.
    pub fn created(&self) -> bool {
        self.created
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn seek_to(&mut self, id: PageId) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(u64::from(id) * PAGE_SIZE as u64))?;
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn preallocate(file: &File, len: u64) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor is owned by `file` and stays open for the call.
    let rc = unsafe { libc::posix_fallocate(file.as_raw_fd(), 0, len as libc::off_t) };
    match rc {
        0 => Ok(()),
        // Filesystems without fallocate support still get a sized (sparse) file.
        libc::EOPNOTSUPP | libc::EINVAL => file.set_len(len),
        errno => Err(io::Error::from_raw_os_error(errno)),
    }
}

#[cfg(not(target_os = "linux"))]
fn preallocate(file: &File, len: u64) -> io::Result<()> {
    file.set_len(len)
}

impl Datafile for FileDatafile {
    fn read_block(&mut self, id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        check_range(id, self.page_count)?;
        self.seek_to(id)?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&mut self, id: PageId, buf: &[u8; PAGE_SIZE]) -> Result<()> {
        check_range(id, self.page_count)?;
        self.seek_to(id)?;
        self.file.write_all(buf)?;
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryPages {
    pages: HashMap<PageId, Box<[u8; PAGE_SIZE]>>,
    failing_page: Option<PageId>,
    writes: usize,
}

/// In-memory datafile for tests and throwaway stores.
///
/// Pages are allocated lazily and read back as zeros until written. Clones
/// share the same pages, so a second pool over a clone sees what the first
/// one flushed.
#[derive(Debug, Clone)]
pub struct MemoryDatafile {
    inner: Rc<RefCell<MemoryPages>>,
    page_count: u32,
}

impl MemoryDatafile {
    pub fn new(page_count: u32) -> Self {
        Self {
            inner: Rc::new(RefCell::new(MemoryPages::default())),
            page_count,
        }
    }

    /// Make every write to `page` fail with an I/O error until cleared.
    pub fn fail_writes_to(&self, page: Option<PageId>) {
        self.inner.borrow_mut().failing_page = page;
    }

    /// Number of successful block writes so far.
    pub fn write_count(&self) -> usize {
        self.inner.borrow().writes
    }

    /// Copy of the stored bytes of `id`, bypassing any pool.
    pub fn snapshot(&self, id: PageId) -> [u8; PAGE_SIZE] {
        self.inner
            .borrow()
            .pages
            .get(&id)
            .map(|page| **page)
            .unwrap_or([0; PAGE_SIZE])
    }
}

impl Datafile for MemoryDatafile {
    fn read_block(&mut self, id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        check_range(id, self.page_count)?;
        match self.inner.borrow().pages.get(&id) {
            Some(page) => buf.copy_from_slice(&page[..]),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_block(&mut self, id: PageId, buf: &[u8; PAGE_SIZE]) -> Result<()> {
        check_range(id, self.page_count)?;
        let mut inner = self.inner.borrow_mut();
        if inner.failing_page == Some(id) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("injected write failure on page {id}"),
            )
            .into());
        }
        inner.pages.insert(id, Box::new(*buf));
        inner.writes += 1;
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod datafile_tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_is_preallocated_on_creation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.db");
        let datafile = FileDatafile::open(&path, 16).unwrap();
        assert!(datafile.created());
        assert_eq!(datafile.page_count(), 16);
        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            16 * PAGE_SIZE as u64
        );
    }

    #[test]
    fn test_write_then_read_after_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.db");
        {
            let mut datafile = FileDatafile::open(&path, 8).unwrap();
            let mut buf = [0u8; PAGE_SIZE];
            buf[0] = 42;
            buf[PAGE_SIZE - 1] = 99;
            datafile.write_block(5, &buf).unwrap();
            datafile.close().unwrap();
        }

        let mut datafile = FileDatafile::open(&path, 1000).unwrap();
        assert!(!datafile.created());
        assert_eq!(datafile.page_count(), 8, "existing size wins");
        let mut buf = [0u8; PAGE_SIZE];
        datafile.read_block(5, &mut buf).unwrap();
        assert_eq!(buf[0], 42);
        assert_eq!(buf[PAGE_SIZE - 1], 99);
    }

    #[test]
    fn test_out_of_range_page_is_rejected() {
        let dir = tempdir().unwrap();
        let mut datafile = FileDatafile::open(dir.path().join("data.db"), 8).unwrap();
        let mut buf = [0u8; PAGE_SIZE];
        let err = datafile.read_block(8, &mut buf).unwrap_err();
        assert!(matches!(
            err,
            StoreError::PageOutOfRange {
                page_id: 8,
                page_count: 8
            }
        ));
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.db");
        std::fs::write(&path, vec![0u8; PAGE_SIZE + 10]).unwrap();
        assert!(FileDatafile::open(&path, 8).is_err());
    }

    #[test]
    fn test_memory_clones_share_pages() {
        let mut first = MemoryDatafile::new(4);
        let mut second = first.clone();
        let mut buf = [7u8; PAGE_SIZE];
        first.write_block(2, &buf).unwrap();

        buf.fill(0);
        second.read_block(2, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 7));

        second.read_block(3, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0), "unwritten pages read as zero");
    }

    #[test]
    fn test_memory_write_failure_injection() {
        let mut datafile = MemoryDatafile::new(4);
        datafile.fail_writes_to(Some(1));
        let buf = [1u8; PAGE_SIZE];
        assert!(datafile.write_block(1, &buf).unwrap_err().is_fatal());
        datafile.write_block(2, &buf).unwrap();
        assert_eq!(datafile.write_count(), 1);

        datafile.fail_writes_to(None);
        datafile.write_block(1, &buf).unwrap();
        assert_eq!(datafile.snapshot(1)[0], 1);
    }
}
