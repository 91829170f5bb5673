// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use args::Args;
use clap::Parser;
use edgefirst_dmaheap::{Address, Allocator, DmaHeap};
use serde_json::json;
use std::{
    error::Error,
    ptr,
    time::{Duration, Instant},
};
use tracing::{info, warn};
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, Layer, Registry};

mod args;

fn init_tracing(args: &Args) -> Result<(), Box<dyn Error>> {
    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let stdout_log = tracing_subscriber::fmt::layer().with_filter(level);

    let journald = if args.journald {
        match tracing_journald::layer() {
            Ok(layer) => Some(layer.with_filter(level)),
            Err(e) => {
                eprintln!("journald unavailable: {e}");
                None
            }
        }
    } else {
        None
    };

    let subscriber = Registry::default().with(stdout_log).with(journald);
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;

    Ok(())
}

/// Whole microseconds in `elapsed`, saturating at `u64::MAX`.
fn micros(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(&args)?;

    let heap = DmaHeap::open_paths(&args.heap);
    if let Some(path) = heap.path() {
        info!("using dma heap {}", path.display());
    }
    let allocator = Allocator::with_heap(heap);

    let mut buffers: Vec<(String, Address)> = Vec::with_capacity(args.size.len());
    let mut report = Vec::with_capacity(args.size.len());

    for (index, size) in args.size.iter().enumerate() {
        let name = format!("{}-{}", args.name, index);
        let now = Instant::now();
        let addr = allocator.allocate(&name, *size)?;
        let alloc_time = now.elapsed();

        let len = allocator.size(addr).unwrap_or_default();
        let fd = allocator.handle(addr).unwrap_or(-1);

        if let Some(byte) = args.fill {
            // The region stays mapped for `len` bytes until released below or
            // on allocator drop.
            unsafe { ptr::write_bytes(addr.as_mut_ptr(), byte, len) };
        }

        if args.json {
            report.push(json!({
                "name": name,
                "requested": size,
                "size": len,
                "fd": fd,
                "address": addr.to_string(),
                "alloc_us": micros(alloc_time),
            }));
        } else {
            println!(
                "{} requested: {} size: {} fd: {} address: {} alloc: {:?}",
                name, size, len, fd, addr, alloc_time
            );
        }

        buffers.push((name, addr));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if args.release {
        for (name, addr) in buffers {
            if !allocator.release(addr) {
                warn!("{} at {} was not tracked", name, addr);
            }
        }
    } else {
        info!("leaving {} buffers to allocator teardown", allocator.len());
    }

    Ok(())
}
