//! Demand-based FTL engine: two-level mapping with a bounded map-page cache
//! and separate garbage collection for data and translation blocks.

use log::{debug, trace};

use crate::address::PhysAddr;
use crate::block::{Area, BlockTable};
use crate::cache::MapCache;
use crate::config::*;
use crate::error::{Error, Result};
use crate::nand::{FlashDevice, NandArray};
use crate::stats::FtlStats;

mod check;
mod gc;
mod io;
mod translate;

/// State owned by one bank: block tables, CMT and GTD.
pub struct Bank {
    table: BlockTable,
    cache: MapCache,
}

impl Bank {
    fn new(geo: &Geometry) -> Self {
        Bank {
            table: BlockTable::new(geo.blocks_per_bank, geo.pages_per_block),
            cache: MapCache::new(geo.cache_slots_per_bank, geo.map_entries_per_page, geo.map_pages_per_bank()),
        }
    }

    pub fn table(&self) -> &BlockTable {
        &self.table
    }

    pub fn cache(&self) -> &MapCache {
        &self.cache
    }
}

pub struct Ftl<D: FlashDevice = NandArray> {
    geo: Geometry,
    nand: D,
    banks: Vec<Bank>,
    // advanced once per host write; recency clock for CMT eviction
    ref_time: Counter,
    stats: FtlStats,
}

impl Ftl<NandArray> {
    /// Builds an engine over a fresh in-memory NAND array.
    pub fn open(geo: Geometry) -> Result<Self> {
        geo.validate()?;
        let nand = NandArray::new(geo.banks, geo.blocks_per_bank, geo.pages_per_block, geo.page_size())?;
        Ftl::with_device(geo, nand)
    }
}

impl<D: FlashDevice> Ftl<D> {
    pub fn with_device(geo: Geometry, nand: D) -> Result<Self> {
        geo.validate()?;
        if nand.page_size() < geo.page_size() {
            return Err(Error::InvalidGeometry(format!(
                "device pages hold {} bytes, geometry needs {}",
                nand.page_size(),
                geo.page_size()
            )));
        }
        geo.log_summary();

        let banks = (0..geo.banks).map(|_| Bank::new(&geo)).collect();
        Ok(Ftl {
            stats: FtlStats::new(geo.sectors_per_page),
            geo,
            nand,
            banks,
            ref_time: 0,
        })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geo
    }

    pub fn stats(&self) -> &FtlStats {
        &self.stats
    }

    pub fn device(&self) -> &D {
        &self.nand
    }

    pub fn bank(&self, bank: BankId) -> &Bank {
        &self.banks[bank]
    }

    pub fn ref_time(&self) -> Counter {
        self.ref_time
    }

    /// Picks the next page of `area` in `bank`, reclaiming first once the
    /// bank's full blocks of that area reach the watermark.
    fn allocate(&mut self, bank: BankId, area: Area) -> Result<PhysAddr> {
        let full = self.banks[bank].table.full_count(area);
        match area {
            Area::Data if full >= self.geo.data_gc_watermark() => self.garbage_collect(bank)?,
            Area::Translation if full >= self.geo.map_gc_watermark() => self.map_garbage_collect(bank)?,
            _ => {}
        }
        self.next_page(bank, area)
    }

    /// Next page of the open `area` block, without any watermark check.
    fn next_page(&mut self, bank: BankId, area: Area) -> Result<PhysAddr> {
        let (block, page) = self.banks[bank]
            .table
            .next_page(area)
            .ok_or(Error::NoFreeBlock { bank, area: area.name() })?;
        trace!("allocate {} page ({}, {}, {})", area.name(), bank, block, page);
        Ok(PhysAddr { bank, block, page })
    }

    /// Programs a page and records it in the block table.
    fn program(&mut self, addr: PhysAddr, data: &[u8], tag: u32) -> Result<Ppn> {
        self.nand.program(addr, data, tag)?;
        self.banks[addr.bank].table.commit(addr.block, addr.page);
        Ok(self.geo.addr_to_ppn(addr))
    }

    /// Marks a superseded physical page stale.
    fn invalidate(&mut self, ppn: Ppn) {
        let addr = self.geo.ppn_to_addr(ppn);
        let was_valid = self.banks[addr.bank].table.invalidate(addr.block, addr.page);
        debug_assert!(was_valid, "invalidating stale page {}", addr);
        if !was_valid {
            debug!("page {} was already invalid", addr);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::FlashError;

    pub(crate) fn scenario_geometry() -> Geometry {
        Geometry {
            banks: 2,
            blocks_per_bank: 4,
            pages_per_block: 4,
            sectors_per_page: 1,
            sector_size: 8,
            map_entries_per_page: 2,
            cache_slots_per_bank: 2,
            map_blocks_per_bank: 2,
            op_ratio: 7,
            gc_reserved_blocks: 1,
        }
    }

    fn sector(byte: u8) -> Vec<u8> {
        vec![byte; 8]
    }

    #[test]
    fn open_rejects_bad_geometry() {
        let geo = Geometry { banks: 0, ..scenario_geometry() };
        assert!(matches!(Ftl::open(geo), Err(Error::InvalidGeometry(_))));
    }

    #[test]
    fn device_page_must_fit_geometry() {
        let geo = scenario_geometry();
        let nand = NandArray::new(2, 4, 4, 4).unwrap();
        assert!(matches!(Ftl::with_device(geo, nand), Err(Error::InvalidGeometry(_))));
    }

    #[test]
    fn scenario_same_map_page() {
        let mut ftl = Ftl::open(scenario_geometry()).unwrap();
        let mut buf = vec![0u8; 8];

        // LPN 0 and 2 share bank 0, map page 0
        ftl.write(0, 1, &sector(0xa1)).unwrap();
        ftl.write(2, 1, &sector(0xb2)).unwrap();

        ftl.read(0, 1, &mut buf).unwrap();
        assert_eq!(buf, sector(0xa1));
        ftl.read(2, 1, &mut buf).unwrap();
        assert_eq!(buf, sector(0xb2));

        let first = PhysAddr { bank: 0, block: 0, page: 0 };
        assert!(ftl.bank(0).table().is_valid(first.block, first.page));

        ftl.write(0, 1, &sector(0xc3)).unwrap();
        ftl.read(0, 1, &mut buf).unwrap();
        assert_eq!(buf, sector(0xc3));

        assert!(!ftl.bank(0).table().is_valid(first.block, first.page));
        assert_eq!(ftl.bank(0).table().block(0).valid_counter, 2);
        ftl.verify().unwrap();
    }

    /// Passes through to a [`NandArray`] until `budget` programs are used up.
    struct FaultyNand {
        inner: NandArray,
        budget: usize,
    }

    impl FlashDevice for FaultyNand {
        fn page_size(&self) -> usize {
            self.inner.page_size()
        }

        fn program(&mut self, addr: PhysAddr, data: &[u8], tag: u32) -> std::result::Result<(), FlashError> {
            if self.budget == 0 {
                return Err(FlashError::AlreadyWritten(addr));
            }
            self.budget -= 1;
            self.inner.program(addr, data, tag)
        }

        fn read(&mut self, addr: PhysAddr, data: &mut [u8]) -> std::result::Result<u32, FlashError> {
            self.inner.read(addr, data)
        }

        fn erase(&mut self, bank: BankId, block: BlockId) -> std::result::Result<(), FlashError> {
            self.inner.erase(bank, block)
        }
    }

    #[test]
    fn device_faults_surface_as_errors() {
        let geo = scenario_geometry();
        let inner = NandArray::new(2, 4, 4, geo.page_size()).unwrap();
        let mut ftl = Ftl::with_device(geo, FaultyNand { inner, budget: 1 }).unwrap();

        ftl.write(0, 1, &sector(1)).unwrap();
        let err = ftl.write(1, 1, &sector(2)).unwrap_err();
        assert!(matches!(err, Error::Flash(FlashError::AlreadyWritten(_))));
    }

    #[test]
    fn allocation_clears_cursor_when_block_fills() {
        let mut ftl = Ftl::open(scenario_geometry()).unwrap();
        for _ in 0..4 {
            let addr = ftl.allocate(0, Area::Data).unwrap();
            ftl.program(addr, &sector(1), 0).unwrap();
        }
        assert_eq!(ftl.bank(0).table().cursor(Area::Data), None);
        assert!(ftl.bank(0).table().block(0).full);
    }
}
