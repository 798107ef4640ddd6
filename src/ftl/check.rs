use std::collections::HashSet;

use crate::block::Area;
use crate::error::{Error, Result};
use crate::nand::FlashDevice;

use super::Ftl;

macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err(Error::Invariant(format!($($arg)+)));
        }
    };
}

impl<D: FlashDevice> Ftl<D> {
    /// Walks all metadata and reports the first broken invariant.
    pub fn verify(&self) -> Result<()> {
        for (bank_id, bank) in self.banks.iter().enumerate() {
            let table = &bank.table;

            for (id, block) in table.blocks().iter().enumerate() {
                let written = block.pages.iter().take_while(|p| p.written).count();
                ensure!(
                    block.pages[written..].iter().all(|p| !p.written),
                    "bank {} block {} written pages are not a prefix",
                    bank_id,
                    id
                );
                ensure!(
                    block.pages.iter().all(|p| p.written || !p.valid),
                    "bank {} block {} has a valid unwritten page",
                    bank_id,
                    id
                );

                let valid = block.pages.iter().filter(|p| p.valid).count();
                ensure!(
                    block.valid_counter == valid,
                    "bank {} block {} counts {} valid pages, found {}",
                    bank_id,
                    id,
                    block.valid_counter,
                    valid
                );
                ensure!(
                    block.full == (written == block.pages.len()),
                    "bank {} block {} full flag disagrees with {} written pages",
                    bank_id,
                    id,
                    written
                );
                ensure!(
                    written == 0 || block.area.is_some(),
                    "bank {} block {} holds pages but has no area",
                    bank_id,
                    id
                );
            }

            for area in [Area::Data, Area::Translation] {
                if let Some(id) = table.cursor(area) {
                    let block = table.block(id);
                    ensure!(
                        block.area == Some(area) && !block.full,
                        "bank {} {} cursor at unusable block {}",
                        bank_id,
                        area.name(),
                        id
                    );
                }
            }

            let mut cached = HashSet::new();
            for slot in bank.cache.slots() {
                if let Some(map_page) = slot.map_page {
                    ensure!(
                        cached.insert(map_page),
                        "bank {} caches map page {} twice",
                        bank_id,
                        map_page
                    );
                }
                ensure!(slot.is_occupied() || !slot.dirty, "bank {} has a dirty empty slot", bank_id);
            }

            for map_page in 0..self.geo.map_pages_per_bank() {
                if let Some(ppn) = bank.cache.gtd(map_page) {
                    let addr = self.geo.ppn_to_addr(ppn);
                    ensure!(addr.bank == bank_id, "map page {} of bank {} stored in {}", map_page, bank_id, addr);
                    ensure!(
                        table.block(addr.block).area == Some(Area::Translation) && table.is_valid(addr.block, addr.page),
                        "GTD of bank {} points map page {} at stale page {}",
                        bank_id,
                        map_page,
                        addr
                    );
                }
            }
        }
        Ok(())
    }
}
