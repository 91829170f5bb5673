// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! DMA heap device session.
//!
//! The CMA heap is normally exposed as `/dev/dma_heap/linux,cma`. When the
//! CMA size is given on the kernel command line instead of the device tree the
//! same heap is named `reserved`, so [`DmaHeap::open`] tries both.

use core::fmt;
use dma_heap::HeapKind;
use std::{
    ffi::{c_void, CString},
    io,
    os::fd::{AsRawFd, BorrowedFd, OwnedFd},
    path::{Path, PathBuf},
    ptr::{null_mut, NonNull},
    sync::OnceLock,
};
use tracing::{debug, error};

/// Primary CMA heap device.
pub const DMA_HEAP_CMA: &str = "/dev/dma_heap/linux,cma";

/// Alternate name of the CMA heap on kernels configured through `cma=`.
pub const DMA_HEAP_CMA_ALT: &str = "/dev/dma_heap/reserved";

mod sys {
    use nix::{ioctl_write_ptr_bad, request_code_write};
    use std::{ffi::c_char, mem::size_of};

    // DMA_BUF_SET_NAME is declared with a `const char *` argument but the
    // kernel reads the string from the pointer value itself.
    ioctl_write_ptr_bad!(
        dma_buf_set_name,
        request_code_write!(b'b', 1, size_of::<*const c_char>()),
        c_char
    );
}

/// Returns the system page size.
#[allow(clippy::cast_sign_loss)]
pub fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(|| unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize)
}

/// Rounds `size` up to the next multiple of `page`.
///
/// Returns `None` for a zero size or when the rounded size does not fit in a
/// `usize`.
pub fn page_align(size: usize, page: usize) -> Option<usize> {
    if size == 0 {
        return None;
    }
    size.checked_next_multiple_of(page)
}

/// Kernel operations needed to back a region.
///
/// [`DmaHeap`] is the production implementation. The default `set_name` and
/// `map` methods operate on any dma-buf fd, so an implementation normally only
/// provides the allocation itself.
pub trait Heap {
    /// Whether the heap can serve allocations at all.
    fn is_available(&self) -> bool;

    /// Allocates a new buffer of exactly `len` bytes and returns its handle.
    /// The handle is close-on-exec.
    fn allocate(&self, len: usize) -> io::Result<OwnedFd>;

    /// Attaches a diagnostic name to a buffer handle.
    fn set_name(&self, fd: BorrowedFd<'_>, name: &str) -> io::Result<()> {
        let name =
            CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        unsafe { sys::dma_buf_set_name(fd.as_raw_fd(), name.as_ptr()) }?;
        Ok(())
    }

    /// Maps `len` bytes of the buffer shared and read/write.
    fn map(&self, fd: BorrowedFd<'_>, len: usize) -> io::Result<NonNull<c_void>> {
        let ptr = unsafe {
            libc::mmap(
                null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd.as_raw_fd(),
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        NonNull::new(ptr).ok_or_else(|| io::Error::other("mmap returned null"))
    }
}

/// Session on a DMA heap device.
///
/// Opening never fails. When no device path can be opened the session is
/// unavailable and every allocation through it fails immediately.
pub struct DmaHeap {
    heap: Option<dma_heap::Heap>,
    path: Option<PathBuf>,
}

impl DmaHeap {
    /// Opens the CMA heap, falling back to its alternate name.
    pub fn open() -> Self {
        Self::open_paths([DMA_HEAP_CMA, DMA_HEAP_CMA_ALT])
    }

    /// Opens the first heap device in `paths` that can be opened.
    pub fn open_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut tried = Vec::new();
        for path in paths {
            let path = path.as_ref();
            match dma_heap::Heap::new(HeapKind::Custom(path.to_path_buf())) {
                Ok(heap) => {
                    debug!("opened dma heap {}", path.display());
                    return Self {
                        heap: Some(heap),
                        path: Some(path.to_path_buf()),
                    };
                }
                Err(e) => {
                    debug!("could not open {}: {}", path.display(), e);
                    tried.push(path.display().to_string());
                }
            }
        }

        error!("could not open dmaheap device (tried: {})", tried.join(", "));
        Self {
            heap: None,
            path: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.heap.is_some()
    }

    /// The device path this session opened, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl fmt::Debug for DmaHeap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DmaHeap").field("path", &self.path).finish()
    }
}

impl Heap for DmaHeap {
    fn is_available(&self) -> bool {
        self.is_open()
    }

    fn allocate(&self, len: usize) -> io::Result<OwnedFd> {
        let Some(heap) = &self.heap else {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        };

        // dma-heap requests O_RDWR | O_CLOEXEC buffer handles.
        Ok(heap.allocate(len)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_align() {
        assert_eq!(page_align(0, 4096), None);
        assert_eq!(page_align(1, 4096), Some(4096));
        assert_eq!(page_align(4095, 4096), Some(4096));
        assert_eq!(page_align(4096, 4096), Some(4096));
        assert_eq!(page_align(4097, 4096), Some(8192));
        assert_eq!(page_align(1920 * 1080 * 2, 4096), Some(4149248));
        assert_eq!(page_align(usize::MAX, 4096), None);
    }

    #[test]
    fn test_page_align_smallest_multiple() {
        let page = page_size();
        assert!(page.is_power_of_two());
        for size in (1..4 * page).step_by(97) {
            let aligned = page_align(size, page).unwrap();
            assert_eq!(aligned % page, 0);
            assert!(aligned >= size);
            assert!(aligned - size < page);
        }
    }

    #[test]
    fn test_open_missing_device() {
        let heap = DmaHeap::open_paths(["/nonexistent/dma_heap/linux,cma"]);
        assert!(!heap.is_open());
        assert!(!heap.is_available());
        assert_eq!(heap.path(), None);
        assert!(heap.allocate(4096).is_err());
    }

    #[test]
    fn test_open_fallback() {
        // Any read/write character device exercises the fallback order.
        let heap = DmaHeap::open_paths(["/nonexistent/dma_heap/linux,cma", "/dev/null"]);
        assert!(heap.is_open());
        assert_eq!(heap.path(), Some(Path::new("/dev/null")));

        // The device opened but is not a heap, so the allocation ioctl fails.
        let err = heap.allocate(4096).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOTTY));
    }
}
