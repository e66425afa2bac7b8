//! [`CandidateSet`] – known ore sites awaiting extraction.

use std::collections::HashMap;

use quarry_types::{BlockPos, OreSite};

struct Entry {
    seq: u64,
    site: OreSite,
}

/// Ore sites keyed by position.
///
/// Each position remembers the order in which it was first seen; re-inserting
/// a known position replaces the site but keeps its original order, so the
/// selector's tie-break stays stable across re-scans.
#[derive(Default)]
pub struct CandidateSet {
    sites: HashMap<BlockPos, Entry>,
    next_seq: u64,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the site at `site.position`.  Returns `true` when the
    /// position was not known before.
    pub fn insert(&mut self, site: OreSite) -> bool {
        if let Some(entry) = self.sites.get_mut(&site.position) {
            entry.site = site;
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.sites.insert(site.position, Entry { seq, site });
        true
    }

    pub fn remove(&mut self, pos: BlockPos) -> Option<OreSite> {
        self.sites.remove(&pos).map(|e| e.site)
    }

    pub fn get(&self, pos: BlockPos) -> Option<&OreSite> {
        self.sites.get(&pos).map(|e| &e.site)
    }

    pub fn contains(&self, pos: BlockPos) -> bool {
        self.sites.contains_key(&pos)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn clear(&mut self) {
        self.sites.clear();
    }

    /// Sites paired with their first-seen sequence number, unordered.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &OreSite)> {
        self.sites.values().map(|e| (e.seq, &e.site))
    }
}
