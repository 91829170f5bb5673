// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    error::{Error, Result},
    heap::{page_align, page_size, DmaHeap, Heap},
    region::{Address, Region},
    tracker::Tracker,
};
use dma_buf::DmaBuf;
use std::{
    io,
    os::fd::{AsFd, OwnedFd, RawFd},
};
use tracing::{debug, trace, warn};

/// Allocator of named, mapped DMA heap buffers.
///
/// Each successful [`allocate`](Allocator::allocate) returns the address of a
/// shared read/write mapping backed by a dma-buf handle. The allocator owns
/// both until the address is released or the allocator is dropped, at which
/// point every outstanding mapping is unmapped and every handle closed.
///
/// # Thread Safety
///
/// `Allocator` is `Send + Sync` when its heap is. Kernel allocation and mapping
/// run concurrently; only the region table is serialized.
///
/// # Example
///
/// ```no_run
/// use edgefirst_dmaheap::Allocator;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let allocator = Allocator::new();
/// let addr = allocator.allocate("isp-stats", 1920 * 1080 * 2)?;
///
/// // Hand the dma-buf to another subsystem.
/// let fd = allocator.handle(addr).unwrap();
/// println!("buffer {} fd {}", addr, fd);
///
/// allocator.release(addr);
/// assert_eq!(allocator.handle(addr), None);
/// # Ok(())
/// # }
/// ```
pub struct Allocator<H: Heap = DmaHeap> {
    // Dropped before `heap` so regions are gone before the session closes.
    tracker: Tracker,
    heap: H,
}

impl Allocator<DmaHeap> {
    /// Creates an allocator on the CMA heap.
    ///
    /// If no heap device can be opened the allocator is still created, but
    /// every allocation fails with [`Error::DeviceUnavailable`].
    pub fn new() -> Self {
        Self::with_heap(DmaHeap::open())
    }
}

impl Default for Allocator<DmaHeap> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Heap> Allocator<H> {
    pub fn with_heap(heap: H) -> Self {
        Self {
            tracker: Tracker::new(),
            heap,
        }
    }

    pub fn heap(&self) -> &H {
        &self.heap
    }

    /// Allocates and maps a buffer of at least `size` bytes.
    ///
    /// The size is rounded up to the page size. `name` is attached to the
    /// dma-buf for debugging tools; it need not be unique and failing to set
    /// it does not fail the allocation.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `size` is zero or too large to page align
    /// - no heap device could be opened
    /// - the kernel refuses the allocation
    /// - the buffer cannot be mapped (its handle is closed before returning)
    pub fn allocate(&self, name: &str, size: usize) -> Result<Address> {
        let len = page_align(size, page_size()).ok_or(Error::InvalidSize { size })?;

        if !self.heap.is_available() {
            return Err(Error::DeviceUnavailable);
        }

        let fd = self.heap.allocate(len).map_err(|source| {
            warn!("dmaheap allocation failure for {} ({} bytes): {}", name, len, source);
            Error::Allocation {
                name: name.to_owned(),
                size: len,
                source,
            }
        })?;

        if let Err(e) = self.heap.set_name(fd.as_fd(), name) {
            trace!("could not name dmabuf {:?} {}: {}", fd, name, e);
        }

        let region = Region::map(&self.heap, fd, len).map_err(|source| {
            warn!("dmaheap mmap failure for {} ({} bytes): {}", name, len, source);
            Error::Mapping {
                name: name.to_owned(),
                size: len,
                source,
            }
        })?;

        let addr = self.tracker.insert(region);
        debug!("allocated {} {} bytes at {}", name, len, addr);
        Ok(addr)
    }

    /// Unmaps the region at `addr` and closes its handle.
    ///
    /// Releasing an address that is not tracked, including one already
    /// released, does nothing and returns `false`.
    pub fn release(&self, addr: Address) -> bool {
        let released = self.tracker.release(addr);
        if released {
            debug!("released {}", addr);
        }
        released
    }

    /// Kernel handle of the region at `addr`, or `None` if it is not tracked.
    ///
    /// The fd remains owned by the allocator and is closed on release.
    pub fn handle(&self, addr: Address) -> Option<RawFd> {
        self.tracker.handle(addr)
    }

    /// Page-aligned size of the region at `addr`.
    pub fn size(&self, addr: Address) -> Option<usize> {
        self.tracker.size(addr)
    }

    pub fn contains(&self, addr: Address) -> bool {
        self.tracker.contains(addr)
    }

    /// Duplicates the handle of the region at `addr`.
    pub fn try_clone_fd(&self, addr: Address) -> Option<io::Result<OwnedFd>> {
        self.tracker.try_clone_fd(addr)
    }

    /// Returns an independent [`DmaBuf`] for the region at `addr`.
    pub fn dmabuf(&self, addr: Address) -> Option<io::Result<DmaBuf>> {
        self.try_clone_fd(addr).map(|fd| fd.map(DmaBuf::from))
    }

    /// Number of regions currently tracked.
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }
}

impl<H: Heap> Drop for Allocator<H> {
    fn drop(&mut self) {
        let count = self.tracker.remove_all();
        debug!("dmaheap allocator dropped, freed {} outstanding regions", count);
    }
}
