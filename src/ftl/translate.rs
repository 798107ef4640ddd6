use log::{debug, trace};

use crate::address::LpnLocation;
use crate::block::Area;
use crate::cache::{decode_map_page, encode_map_page};
use crate::config::*;
use crate::error::{Error, Result};
use crate::nand::FlashDevice;

use super::Ftl;

impl<D: FlashDevice> Ftl<D> {
    fn count_lookup(&mut self, hit: bool) {
        if hit {
            self.stats.cache_hit += 1;
        } else {
            self.stats.cache_miss += 1;
        }
    }

    /// Read-path lookup. A miss on a map page that was never flushed is
    /// answered without touching flash.
    pub fn resolve(&mut self, lpn: Lpn) -> Result<Option<Ppn>> {
        let loc = self.geo.locate_lpn(lpn);

        if let Some(slot) = self.banks[loc.bank].cache.find(loc.map_page) {
            self.count_lookup(true);
            return Ok(self.banks[loc.bank].cache.slot(slot).entries[loc.map_offset]);
        }
        self.count_lookup(false);

        if self.banks[loc.bank].cache.gtd(loc.map_page).is_none() {
            return Ok(None);
        }
        let slot = self.ensure_loaded(loc.bank, loc.map_page)?;
        Ok(self.banks[loc.bank].cache.slot(slot).entries[loc.map_offset])
    }

    /// Write-path lookup: the map page is always cached afterwards.
    pub(super) fn lookup_for_write(&mut self, loc: LpnLocation) -> Result<Option<Ppn>> {
        let hit = self.banks[loc.bank].cache.find(loc.map_page).is_some();
        self.count_lookup(hit);

        let slot = self.ensure_loaded(loc.bank, loc.map_page)?;
        Ok(self.banks[loc.bank].cache.slot(slot).entries[loc.map_offset])
    }

    /// Returns the CMT slot caching `map_page`, evicting the least recently
    /// used slot when none is free.
    pub(super) fn ensure_loaded(&mut self, bank: BankId, map_page: MapPageId) -> Result<usize> {
        if let Some(slot) = self.banks[bank].cache.find(map_page) {
            return Ok(slot);
        }

        let slot = match self.banks[bank].cache.free_slot() {
            Some(slot) => slot,
            None => {
                let victim = self.banks[bank].cache.lru_slot();
                self.evict(bank, victim)?;
                victim
            }
        };

        if self.banks[bank].cache.gtd(map_page).is_some() {
            self.load(bank, map_page, slot)?;
        } else {
            let entries = vec![None; self.geo.map_entries_per_page];
            self.banks[bank].cache.fill(slot, map_page, entries, self.ref_time);
            trace!("bank {} map page {} created in slot {}", bank, map_page, slot);
        }
        Ok(slot)
    }

    fn evict(&mut self, bank: BankId, slot: usize) -> Result<()> {
        let victim = self.banks[bank].cache.slot(slot);
        debug!(
            "bank {} evict slot {} (map page {:?}, dirty {})",
            bank, slot, victim.map_page, victim.dirty
        );
        if victim.dirty {
            self.flush(bank, slot)?;
        }
        self.banks[bank].cache.slot_mut(slot).clear();
        Ok(())
    }

    fn load(&mut self, bank: BankId, map_page: MapPageId, slot: usize) -> Result<()> {
        let ppn = self.banks[bank]
            .cache
            .gtd(map_page)
            .ok_or_else(|| Error::Invariant(format!("map page {} of bank {} was never flushed", map_page, bank)))?;
        let addr = self.geo.ppn_to_addr(ppn);

        let mut page = vec![0u8; self.geo.page_size()];
        let tag = self.nand.read(addr, &mut page)?;
        self.stats.map_read += 1;
        debug_assert_eq!(tag as MapPageId, map_page, "map page tag mismatch at {}", addr);

        let entries = decode_map_page(&page, self.geo.map_entries_per_page);
        self.banks[bank].cache.fill(slot, map_page, entries, self.ref_time);
        trace!("bank {} map page {} loaded from {} into slot {}", bank, map_page, addr, slot);
        Ok(())
    }

    /// Persists a dirty slot to the open translation block and repoints the GTD.
    pub(super) fn flush(&mut self, bank: BankId, slot: usize) -> Result<()> {
        let cached = self.banks[bank].cache.slot(slot);
        if !cached.dirty {
            return Ok(());
        }
        let map_page = cached
            .map_page
            .ok_or_else(|| Error::Invariant(format!("dirty empty slot {} in bank {}", slot, bank)))?;
        let image = encode_map_page(&cached.entries, self.geo.page_size());

        if let Some(old) = self.banks[bank].cache.gtd(map_page) {
            self.invalidate(old);
        }

        let addr = self.allocate(bank, Area::Translation)?;
        let ppn = self.program(addr, &image, map_page as u32)?;
        self.stats.map_write += 1;

        self.banks[bank].cache.set_gtd(map_page, ppn);
        self.banks[bank].cache.slot_mut(slot).dirty = false;
        debug!("bank {} map page {} flushed to {}", bank, map_page, addr);
        Ok(())
    }

    /// Points `lpn` at `ppn`, caching its map page first. Returns the
    /// previous mapping.
    pub fn update(&mut self, lpn: Lpn, ppn: Ppn) -> Result<Option<Ppn>> {
        let loc = self.geo.locate_lpn(lpn);
        let slot = self.ensure_loaded(loc.bank, loc.map_page)?;

        let now = self.ref_time;
        let cached = self.banks[loc.bank].cache.slot_mut(slot);
        let prev = cached.entries[loc.map_offset].replace(ppn);
        cached.dirty = true;
        cached.ref_time = now;
        Ok(prev)
    }
}
