//! Cached Mapping Table (CMT) and Global Translation Directory (GTD) of one bank.

use crate::config::*;

const UNMAPPED_ENTRY: u32 = u32::MAX;

/// One cached map page.
#[derive(Clone, Debug)]
pub struct CmtSlot {
    /// `None` while the slot is empty.
    pub map_page: Option<MapPageId>,
    pub entries: Vec<Option<Ppn>>,
    pub dirty: bool,
    pub ref_time: Counter,
}

impl CmtSlot {
    fn new(entries: usize) -> Self {
        CmtSlot {
            map_page: None,
            entries: vec![None; entries],
            dirty: false,
            ref_time: 0,
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.map_page.is_some()
    }

    pub fn clear(&mut self) {
        self.map_page = None;
        self.entries.iter_mut().for_each(|e| *e = None);
        self.dirty = false;
        self.ref_time = 0;
    }
}

pub struct MapCache {
    slots: Vec<CmtSlot>,
    gtd: Vec<Option<Ppn>>,
}

impl MapCache {
    pub fn new(slots: usize, entries_per_page: usize, map_pages: usize) -> Self {
        MapCache {
            slots: vec![CmtSlot::new(entries_per_page); slots],
            gtd: vec![None; map_pages],
        }
    }

    pub fn find(&self, map_page: MapPageId) -> Option<usize> {
        self.slots.iter().position(|s| s.map_page == Some(map_page))
    }

    pub fn free_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| !s.is_occupied())
    }

    /// Oldest occupied slot; the first one wins on equal timestamps.
    pub fn lru_slot(&self) -> usize {
        self.slots
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| s.ref_time)
            .map_or(0, |(i, _)| i)
    }

    pub fn slot(&self, slot: usize) -> &CmtSlot {
        &self.slots[slot]
    }

    pub fn slot_mut(&mut self, slot: usize) -> &mut CmtSlot {
        &mut self.slots[slot]
    }

    pub fn slots(&self) -> &[CmtSlot] {
        &self.slots
    }

    /// Installs `entries` for `map_page` as a clean slot.
    pub fn fill(&mut self, slot: usize, map_page: MapPageId, entries: Vec<Option<Ppn>>, now: Counter) {
        let s = &mut self.slots[slot];
        debug_assert_eq!(s.entries.len(), entries.len());
        s.map_page = Some(map_page);
        s.entries = entries;
        s.dirty = false;
        s.ref_time = now;
    }

    pub fn gtd(&self, map_page: MapPageId) -> Option<Ppn> {
        self.gtd[map_page]
    }

    pub fn set_gtd(&mut self, map_page: MapPageId, ppn: Ppn) -> Option<Ppn> {
        self.gtd[map_page].replace(ppn)
    }
}

/// Serializes map entries into a flash page image, 4 bytes little-endian each.
pub fn encode_map_page(entries: &[Option<Ppn>], page_size: usize) -> Vec<u8> {
    let mut page = vec![ERASED_BYTE; page_size];
    for (chunk, entry) in page.chunks_exact_mut(MAP_ENTRY_SIZE).zip(entries) {
        let raw = entry.map_or(UNMAPPED_ENTRY, |ppn| ppn as u32);
        chunk.copy_from_slice(&raw.to_le_bytes());
    }
    page
}

pub fn decode_map_page(page: &[u8], entries: usize) -> Vec<Option<Ppn>> {
    page.chunks_exact(MAP_ENTRY_SIZE)
        .take(entries)
        .map(|chunk| {
            let raw = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            (raw != UNMAPPED_ENTRY).then_some(raw as Ppn)
        })
        .collect()
}
