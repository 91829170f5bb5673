// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use std::io;
use thiserror::Error;

/// Errors reported by the DMA heap allocator.
///
/// Addresses that are not tracked are never an error; lookups return `None`
/// and releases are a no-op.
#[derive(Error, Debug)]
pub enum Error {
    /// No DMA heap device could be opened when the session was created.
    #[error("dma heap device unavailable")]
    DeviceUnavailable,

    /// The requested size was zero or overflows when page aligned.
    #[error("invalid buffer size: {size}")]
    InvalidSize { size: usize },

    /// The kernel refused the allocation request, usually because the heap
    /// is exhausted.
    #[error("dma heap allocation failure for {name} ({size} bytes): {source}")]
    Allocation {
        name: String,
        size: usize,
        #[source]
        source: io::Error,
    },

    /// The buffer was allocated but could not be mapped. The buffer handle has
    /// already been closed.
    #[error("dma heap mmap failure for {name} ({size} bytes): {source}")]
    Mapping {
        name: String,
        size: usize,
        #[source]
        source: io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
