use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;
use log::debug;

use crate::error::MemError;

/// Upper bound on pages kept in the free list for reuse.
const FREE_LIST_LIMIT: usize = 8;

struct Region {
    ptr: *mut u8,
    len: usize,
}

// Regions are only handed between threads through the allocator's mutex.
unsafe impl Send for Region {}

fn page_size() -> usize {
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

fn errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// Broker for W^X executable memory.
///
/// Pages are mapped writable, filled with code, then flipped to
/// read-execute by [`ExecPage::publish`]; write and execute permission are
/// never held at the same time. Dropped pages return to a bounded free
/// list guarded by a mutex, so allocation is the only operation that ever
/// takes a lock.
///
/// A process-wide instance is available through
/// [`ExecAllocator::global`], but any number of private allocators can be
/// created and passed to the compiler instead.
pub struct ExecAllocator {
    free: Mutex<Vec<Region>>,
}

lazy_static! {
    static ref GLOBAL: Arc<ExecAllocator> = Arc::new(ExecAllocator::new());
}

impl ExecAllocator {
    pub fn new() -> ExecAllocator {
        ExecAllocator {
            free: Mutex::new(Vec::new()),
        }
    }

    /// The process-wide default allocator.
    pub fn global() -> &'static Arc<ExecAllocator> {
        &GLOBAL
    }

    /// Returns a page-aligned writable region of at least `size` bytes.
    pub fn allocate(self: &Arc<Self>, size: usize) -> Result<ExecPage, MemError> {
        let page = page_size();
        let len = (size.max(1) + page - 1) / page * page;

        {
            let mut free = self.free.lock().unwrap();
            if let Some(pos) = free.iter().position(|r| r.len >= len) {
                let region = free.remove(pos);
                let rc = unsafe {
                    libc::mprotect(
                        region.ptr as *mut libc::c_void,
                        region.len,
                        libc::PROT_READ | libc::PROT_WRITE,
                    )
                };
                if rc != 0 {
                    return Err(MemError::Protect(errno()));
                }
                debug!("reusing {} byte page at {:p}", region.len, region.ptr);
                return Ok(ExecPage {
                    ptr: region.ptr,
                    len: region.len,
                    pool: Arc::clone(self),
                });
            }
        }

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(MemError::Map(errno()));
        }

        debug!("mapped {} byte page at {:p}", len, ptr);
        Ok(ExecPage {
            ptr: ptr as *mut u8,
            len,
            pool: Arc::clone(self),
        })
    }

    fn release(&self, region: Region) {
        let mut free = self.free.lock().unwrap();
        if free.len() < FREE_LIST_LIMIT {
            free.push(region);
        } else {
            unsafe {
                libc::munmap(region.ptr as *mut libc::c_void, region.len);
            }
        }
    }
}

impl Default for ExecAllocator {
    fn default() -> ExecAllocator {
        ExecAllocator::new()
    }
}

/// An owned executable page.
///
/// The page starts out writable; after [`publish`](ExecPage::publish) it
/// is read-execute until dropped. Dropping returns the page to its
/// allocator.
pub struct ExecPage {
    ptr: *mut u8,
    len: usize,
    pool: Arc<ExecAllocator>,
}

impl ExecPage {
    /// Base address of the page.
    pub fn base(&self) -> *const u8 {
        self.ptr
    }

    /// Usable capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.len
    }

    /// Copies the final code image onto the page. Only valid before
    /// [`publish`](ExecPage::publish).
    pub fn copy_code(&mut self, image: &[u8]) {
        assert!(image.len() <= self.len);
        unsafe {
            std::ptr::copy_nonoverlapping(image.as_ptr(), self.ptr, image.len());
        }
    }

    /// Flips the page from writable to read-execute.
    pub fn publish(&mut self) -> Result<(), MemError> {
        let rc = unsafe {
            libc::mprotect(
                self.ptr as *mut libc::c_void,
                self.len,
                libc::PROT_READ | libc::PROT_EXEC,
            )
        };
        if rc != 0 {
            return Err(MemError::Protect(errno()));
        }
        Ok(())
    }
}

impl Drop for ExecPage {
    fn drop(&mut self) {
        // Make the page inaccessible until it is reused; failure here
        // only delays the unmap to process exit.
        unsafe {
            libc::mprotect(self.ptr as *mut libc::c_void, self.len, libc::PROT_NONE);
        }
        self.pool.release(Region {
            ptr: self.ptr,
            len: self.len,
        });
    }
}
