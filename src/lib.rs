// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! # EdgeFirst DMA Heap Allocator
//!
//! This library allocates physically contiguous buffers from the Linux DMA
//! heap (CMA), maps them into the process and keeps track of each mapping so
//! it can be resolved back to its dma-buf handle or released.
//!
//! ## Features
//!
//! - **Device Fallback**: Opens `/dev/dma_heap/linux,cma` and falls back to
//!   `/dev/dma_heap/reserved` on kernels which name the CMA heap differently.
//! - **Named Buffers**: Each dma-buf is tagged with a name visible in
//!   `/sys/kernel/debug/dma_buf/bufinfo`.
//! - **Leak Free**: A buffer handle and its mapping are always acquired and
//!   released together, including on every failure path and when the
//!   allocator is dropped.
//! - **Thread Safe**: Allocations, lookups and releases may be issued from
//!   any number of threads.
//!
//! ## Example
//!
//! ```no_run
//! use edgefirst_dmaheap::{heap::page_size, Allocator};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let allocator = Allocator::new();
//! let stats = allocator.allocate("isp-stats", 65536)?;
//! let lut = allocator.allocate("lens-shading", 1000)?;
//!
//! assert_eq!(allocator.size(lut), Some(page_size()));
//! let fd = allocator.handle(stats).unwrap();
//! println!("isp-stats fd {}", fd);
//!
//! allocator.release(stats);
//! // `lut` is released when the allocator is dropped.
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Requirements
//!
//! - **Linux**: Kernel 5.10+ with DMA heap support (`CONFIG_DMABUF_HEAPS_CMA`)
//!
//! ## Safety
//!
//! The ioctl and mmap calls are confined to the [`heap`] and [`region`]
//! modules. Callers receive addresses rather than references, so reading or
//! writing a buffer through [`Address::as_mut_ptr`] is up to the caller and
//! must not outlive the region.

pub mod allocator;
pub mod error;
pub mod heap;
pub mod region;
pub mod tracker;

pub use allocator::Allocator;
pub use error::{Error, Result};
pub use heap::{DmaHeap, Heap};
pub use region::Address;
