// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::heap::Heap;
use core::fmt;
use std::{
    ffi::c_void,
    io,
    mem::ManuallyDrop,
    os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd},
    ptr::{self, NonNull},
};
use tracing::warn;

/// Address of a mapped region as handed out by the allocator.
///
/// An `Address` is only a key; holding one does not keep the region alive.
/// It stays valid until the region is released or the allocator is dropped.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(usize);

impl Address {
    /// Wraps an arbitrary pointer, for example one received back from another
    /// subsystem. Looking up an address the allocator never returned is
    /// harmless.
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize)
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.0 as *const u8
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.0 as *mut u8
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Address({:#x})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A dma-buf handle together with its mapping.
///
/// The handle and the mapping are acquired by [`Region::map`] and released by
/// `Drop`, so a `Region` can never hold one without the other.
pub struct Region {
    fd: OwnedFd,
    ptr: NonNull<c_void>,
    len: usize,
}

// The mapping is MAP_SHARED kernel memory owned solely by this value.
unsafe impl Send for Region {}

#[allow(clippy::len_without_is_empty)]
impl Region {
    /// Maps `len` bytes of `fd` through `heap`.
    ///
    /// On failure `fd` is dropped, closing the buffer handle before the error
    /// is returned.
    pub fn map<H: Heap + ?Sized>(heap: &H, fd: OwnedFd, len: usize) -> io::Result<Self> {
        let ptr = heap.map(fd.as_fd(), len)?;
        Ok(Self { fd, ptr, len })
    }

    pub fn address(&self) -> Address {
        Address::from_ptr(self.ptr.as_ptr())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }

    pub fn raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    /// Gives up the mapping without unmapping it and returns the handle.
    ///
    /// Only for a region whose address range was already unmapped or replaced
    /// outside of this value.
    pub fn into_fd(self) -> OwnedFd {
        let this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so `fd` is moved out exactly once.
        unsafe { ptr::read(&this.fd) }
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Region")
            .field("address", &self.address())
            .field("len", &self.len)
            .field("fd", &self.fd)
            .finish()
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        // The handle is closed after this returns, when `fd` is dropped.
        if unsafe { libc::munmap(self.ptr.as_ptr(), self.len) } != 0 {
            warn!(
                "munmap of {} failed: {}",
                self.address(),
                io::Error::last_os_error()
            );
        }
    }
}
