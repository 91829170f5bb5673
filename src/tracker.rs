// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::region::{Address, Region};
use std::{
    collections::{hash_map::Entry, HashMap},
    io,
    os::fd::{OwnedFd, RawFd},
    sync::{Mutex, MutexGuard, PoisonError},
};
use tracing::warn;

/// Table of live regions keyed by their mapped address.
///
/// Every access goes through a single lock. Removing a region drops it while
/// the lock is held, so a release is complete before any later lookup of the
/// same address can observe the table.
#[derive(Debug, Default)]
pub struct Tracker {
    regions: Mutex<HashMap<Address, Region>>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the map half-updated, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, HashMap<Address, Region>> {
        self.regions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts tracking `region` and returns its address.
    ///
    /// The kernel only hands out an address that is not mapped, so a record
    /// already stored under it belongs to a mapping that was replaced outside
    /// the tracker. That record's handle is closed without unmapping, which
    /// would tear down the new region.
    pub fn insert(&self, region: Region) -> Address {
        let addr = region.address();
        let mut regions = self.lock();
        match regions.entry(addr) {
            Entry::Vacant(entry) => {
                entry.insert(region);
            }
            Entry::Occupied(mut entry) => {
                let stale = entry.insert(region);
                warn!(
                    "address {} was still tracked with fd {}, closing it",
                    addr,
                    stale.raw_fd()
                );
                drop(stale.into_fd());
            }
        }
        addr
    }

    /// Kernel handle of the region mapped at `addr`.
    pub fn handle(&self, addr: Address) -> Option<RawFd> {
        self.lock().get(&addr).map(Region::raw_fd)
    }

    /// Page-aligned size of the region mapped at `addr`.
    pub fn size(&self, addr: Address) -> Option<usize> {
        self.lock().get(&addr).map(Region::len)
    }

    pub fn contains(&self, addr: Address) -> bool {
        self.lock().contains_key(&addr)
    }

    /// Duplicates the handle of the region at `addr`. The duplicate remains
    /// valid after the region is released.
    pub fn try_clone_fd(&self, addr: Address) -> Option<io::Result<OwnedFd>> {
        self.lock()
            .get(&addr)
            .map(|region| region.fd().try_clone_to_owned())
    }

    /// Unmaps and closes the region at `addr`. Returns `false` if the address
    /// was not tracked.
    pub fn release(&self, addr: Address) -> bool {
        let mut regions = self.lock();
        match regions.remove(&addr) {
            Some(region) => {
                drop(region);
                true
            }
            None => false,
        }
    }

    /// Unmaps and closes every tracked region, returning how many there were.
    pub fn remove_all(&self) -> usize {
        let mut regions = self.lock();
        let count = regions.len();
        regions.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
