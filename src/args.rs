// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the EdgeFirst DMA heap tool.
///
/// Allocates one named buffer per requested size, reports the dma-buf handle
/// and mapping of each, then releases them explicitly or leaves them to be
/// freed when the allocator is dropped. Arguments can be specified via
/// command line or environment variables.
///
/// # Example
///
/// ```bash
/// # Three buffers from the default CMA heap
/// edgefirst-dmaheap --size "4147200 4147200 65536" --name isp
///
/// # Via environment variables
/// export DMA_HEAP=/dev/dma_heap/reserved
/// export DMA_SIZE=8294400
/// edgefirst-dmaheap --json
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// DMA heap devices to try, in order
    #[arg(
        long,
        env = "DMA_HEAP",
        default_value = "/dev/dma_heap/linux,cma /dev/dma_heap/reserved",
        value_delimiter = ' '
    )]
    pub heap: Vec<PathBuf>,

    /// Buffer sizes in bytes, one buffer is allocated per size
    #[arg(long, env = "DMA_SIZE", default_value = "4096", value_delimiter = ' ')]
    pub size: Vec<usize>,

    /// Buffer name prefix, each buffer is named <name>-<index>
    #[arg(long, env = "DMA_NAME", default_value = "edgefirst")]
    pub name: String,

    /// Fill each buffer with this byte value after mapping
    #[arg(long)]
    pub fill: Option<u8>,

    /// Release each buffer explicitly instead of on allocator teardown
    #[arg(long)]
    pub release: bool,

    /// Print the allocation report as JSON
    #[arg(long)]
    pub json: bool,

    /// Also log to the systemd journal
    #[arg(long, env = "JOURNALD")]
    pub journald: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
