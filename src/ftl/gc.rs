use log::{debug, warn};

use crate::address::PhysAddr;
use crate::block::Area;
use crate::config::*;
use crate::error::{Error, Result};
use crate::nand::FlashDevice;

use super::Ftl;

impl<D: FlashDevice> Ftl<D> {
    /// Opens the relocation target for `area` and picks the greedy victim.
    fn prepare_gc(&mut self, bank: BankId, area: Area) -> Result<Option<BlockId>> {
        let Some(victim) = self.banks[bank].table.pick_victim(area) else {
            warn!("bank {}: no full {} block to reclaim", bank, area.name());
            return Ok(None);
        };
        let target = self.banks[bank]
            .table
            .open_block(area)
            .ok_or(Error::NoFreeBlock { bank, area: area.name() })?;

        debug!(
            "bank {} {} gc: victim {} ({} valid, {} stale), target {}",
            bank,
            area.name(),
            victim,
            self.banks[bank].table.block(victim).valid_counter,
            self.banks[bank].table.block(victim).invalid_counter(),
            target
        );
        Ok(Some(victim))
    }

    fn erase_victim(&mut self, bank: BankId, victim: BlockId) -> Result<()> {
        debug_assert_eq!(self.banks[bank].table.block(victim).valid_counter, 0);
        self.nand.erase(bank, victim)?;
        self.banks[bank].table.reset(victim);
        self.stats.erase_cnt += 1;
        Ok(())
    }

    /// Reclaims the full data block with the fewest valid pages, moving its
    /// live pages and repointing their mappings through the CMT.
    pub(super) fn garbage_collect(&mut self, bank: BankId) -> Result<()> {
        let Some(victim) = self.prepare_gc(bank, Area::Data)? else {
            return Ok(());
        };

        let mut page_buf = vec![0u8; self.geo.page_size()];
        for page in self.banks[bank].table.valid_pages(victim) {
            let old = PhysAddr { bank, block: victim, page };
            let old_ppn = self.geo.addr_to_ppn(old);

            let tag = self.nand.read(old, &mut page_buf)?;
            self.stats.gc_read += 1;

            let lpn = tag as Lpn;
            let loc = self.geo.locate_lpn(lpn);
            if loc.bank != bank {
                return Err(Error::Invariant(format!("page {} tagged with lpn {} of bank {}", old, lpn, loc.bank)));
            }

            let slot = self.ensure_loaded(bank, loc.map_page)?;
            let current = self.banks[bank].cache.slot(slot).entries[loc.map_offset];
            if current != Some(old_ppn) {
                return Err(Error::Invariant(format!(
                    "valid page {} holds lpn {} but it maps to {:?}",
                    old, lpn, current
                )));
            }

            let target = self.next_page(bank, Area::Data)?;
            let new_ppn = self.program(target, &page_buf, tag)?;
            self.stats.gc_write += 1;

            let prev = self.update(lpn, new_ppn)?;
            debug_assert_eq!(prev, Some(old_ppn));
            self.invalidate(old_ppn);
        }

        self.erase_victim(bank, victim)?;
        self.stats.gc_cnt += 1;
        Ok(())
    }

    /// Reclaims the full translation block with the fewest valid map pages
    /// and repoints the GTD at their new copies.
    pub(super) fn map_garbage_collect(&mut self, bank: BankId) -> Result<()> {
        let Some(victim) = self.prepare_gc(bank, Area::Translation)? else {
            return Ok(());
        };

        let mut page_buf = vec![0u8; self.geo.page_size()];
        for page in self.banks[bank].table.valid_pages(victim) {
            let old = PhysAddr { bank, block: victim, page };
            let old_ppn = self.geo.addr_to_ppn(old);

            let tag = self.nand.read(old, &mut page_buf)?;
            self.stats.map_gc_read += 1;

            let map_page = tag as MapPageId;
            if self.banks[bank].cache.gtd(map_page) != Some(old_ppn) {
                return Err(Error::Invariant(format!(
                    "valid translation page {} is not the current copy of map page {}",
                    old, map_page
                )));
            }

            let target = self.next_page(bank, Area::Translation)?;
            let new_ppn = self.program(target, &page_buf, tag)?;
            self.stats.map_gc_write += 1;

            self.banks[bank].cache.set_gtd(map_page, new_ppn);
            self.invalidate(old_ppn);
        }

        self.erase_victim(bank, victim)?;
        self.stats.map_gc_cnt += 1;
        Ok(())
    }
}
