use byte_unit::Byte;
use log::info;
use num_integer::Integer;

use crate::error::{Error, Result};

pub type BaseType = usize;

pub type Lpn = BaseType;
pub type Ppn = BaseType;
pub type BankId = BaseType;
pub type BlockId = BaseType;
pub type PageId = BaseType;
pub type MapPageId = BaseType;
pub type Counter = BaseType;

pub const BANKS: BaseType = 4;
pub const BLOCKS_PER_BANK: BaseType = 64;
pub const PAGES_PER_BLOCK: BaseType = 32;
pub const SECTORS_PER_PAGE: BaseType = 8;
pub const SECTOR_SIZE: BaseType = 4;

pub const MAP_ENTRY_SIZE: BaseType = 4;
pub const MAP_ENTRIES_PER_PAGE: BaseType = SECTORS_PER_PAGE * SECTOR_SIZE / MAP_ENTRY_SIZE;
pub const CACHE_SLOTS_PER_BANK: BaseType = 16;
pub const MAP_BLOCKS_PER_BANK: BaseType = 12;

pub const OP_RATIO: BaseType = 7;
pub const GC_RESERVED_BLOCKS: BaseType = 1;

/// Byte value of an erased flash cell.
pub const ERASED_BYTE: u8 = 0xff;

/// Flash and cache geometry. Fixed for the lifetime of an [`crate::Ftl`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geometry {
    pub banks: BaseType,
    pub blocks_per_bank: BaseType,
    pub pages_per_block: BaseType,
    pub sectors_per_page: BaseType,
    pub sector_size: BaseType,
    pub map_entries_per_page: BaseType,
    pub cache_slots_per_bank: BaseType,
    /// Blocks per bank budgeted for translation pages; the rest hold data.
    pub map_blocks_per_bank: BaseType,
    /// Over-provisioning, percent of the data area hidden from the host.
    pub op_ratio: BaseType,
    pub gc_reserved_blocks: BaseType,
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry {
            banks: BANKS,
            blocks_per_bank: BLOCKS_PER_BANK,
            pages_per_block: PAGES_PER_BLOCK,
            sectors_per_page: SECTORS_PER_PAGE,
            sector_size: SECTOR_SIZE,
            map_entries_per_page: MAP_ENTRIES_PER_PAGE,
            cache_slots_per_bank: CACHE_SLOTS_PER_BANK,
            map_blocks_per_bank: MAP_BLOCKS_PER_BANK,
            op_ratio: OP_RATIO,
            gc_reserved_blocks: GC_RESERVED_BLOCKS,
        }
    }
}

impl Geometry {
    pub fn page_size(&self) -> BaseType {
        self.sectors_per_page * self.sector_size
    }

    pub fn pages_per_bank(&self) -> BaseType {
        self.blocks_per_bank * self.pages_per_block
    }

    pub fn total_ppns(&self) -> BaseType {
        self.banks * self.pages_per_bank()
    }

    pub fn data_blocks_per_bank(&self) -> BaseType {
        self.blocks_per_bank.saturating_sub(self.map_blocks_per_bank)
    }

    pub fn lpns_per_bank(&self) -> BaseType {
        let usable = self.data_blocks_per_bank().saturating_sub(self.gc_reserved_blocks)
            * self.pages_per_block;
        usable * (100 - self.op_ratio.min(100)) / 100
    }

    pub fn total_lpns(&self) -> BaseType {
        self.lpns_per_bank() * self.banks
    }

    pub fn total_sectors(&self) -> BaseType {
        self.total_lpns() * self.sectors_per_page
    }

    pub fn map_pages_per_bank(&self) -> BaseType {
        Integer::div_ceil(&self.lpns_per_bank(), &self.map_entries_per_page)
    }

    /// Full data blocks at which a bank must reclaim before the next data page.
    pub fn data_gc_watermark(&self) -> BaseType {
        self.data_blocks_per_bank() - self.gc_reserved_blocks
    }

    /// Full translation blocks at which a bank must reclaim before the next map page.
    pub fn map_gc_watermark(&self) -> BaseType {
        self.map_blocks_per_bank - self.gc_reserved_blocks
    }

    pub fn validate(&self) -> Result<()> {
        let dims = [
            ("banks", self.banks),
            ("blocks_per_bank", self.blocks_per_bank),
            ("pages_per_block", self.pages_per_block),
            ("sectors_per_page", self.sectors_per_page),
            ("sector_size", self.sector_size),
            ("map_entries_per_page", self.map_entries_per_page),
            ("cache_slots_per_bank", self.cache_slots_per_bank),
        ];
        if let Some((name, _)) = dims.iter().find(|(_, v)| *v == 0) {
            return Err(Error::InvalidGeometry(format!("{} must be positive", name)));
        }

        if self.gc_reserved_blocks == 0 {
            return Err(Error::InvalidGeometry("at least one block per area must stay free for GC".into()));
        }
        let min_area = self.gc_reserved_blocks + 1;
        if self.map_blocks_per_bank < min_area {
            return Err(Error::InvalidGeometry(format!(
                "need at least {} translation blocks per bank, got {}",
                min_area, self.map_blocks_per_bank
            )));
        }
        if self.data_blocks_per_bank() < min_area {
            return Err(Error::InvalidGeometry(format!(
                "need at least {} data blocks per bank, got {}",
                min_area,
                self.data_blocks_per_bank()
            )));
        }
        if self.op_ratio >= 100 {
            return Err(Error::InvalidGeometry(format!("op ratio {}% leaves no user space", self.op_ratio)));
        }
        if self.lpns_per_bank() == 0 {
            return Err(Error::InvalidGeometry("geometry exposes no logical pages".into()));
        }
        // every victim must carry at least one stale page
        if self.lpns_per_bank() >= self.data_gc_watermark() * self.pages_per_block {
            return Err(Error::InvalidGeometry("data area has no over-provisioned space".into()));
        }
        if self.map_pages_per_bank() >= self.map_gc_watermark() * self.pages_per_block {
            return Err(Error::InvalidGeometry(format!(
                "{} map pages do not fit in {} translation blocks",
                self.map_pages_per_bank(),
                self.map_blocks_per_bank
            )));
        }
        if self.map_entries_per_page * MAP_ENTRY_SIZE > self.page_size() {
            return Err(Error::InvalidGeometry(format!(
                "{} map entries do not fit in a {} byte page",
                self.map_entries_per_page,
                self.page_size()
            )));
        }
        if self.total_ppns() >= u32::MAX as BaseType || self.total_lpns() >= u32::MAX as BaseType {
            return Err(Error::InvalidGeometry("address space exceeds 32-bit page numbers".into()));
        }
        Ok(())
    }

    pub fn log_summary(&self) {
        let physical = self.total_ppns() * self.page_size();
        let user = self.total_lpns() * self.page_size();

        info!("Bank: {}", self.banks);
        info!("Blocks / Bank: {} blocks", self.blocks_per_bank);
        info!("Pages / Block: {} pages", self.pages_per_block);
        info!("Sectors per Page: {}", self.sectors_per_page);
        info!("OP ratio: {}%", self.op_ratio);
        info!("Physical Blocks: {}", self.banks * self.blocks_per_bank);
        info!("User Blocks: {}", self.banks * self.data_blocks_per_bank());
        info!("Map Blocks: {}", self.banks * self.map_blocks_per_bank);
        info!("PPNs: {}", self.total_ppns());
        info!("LPNs: {}", self.total_lpns());
        info!("Physical Capacity: {} bytes, {}", physical, Byte::from(physical).get_appropriate_unit(true).to_string());
        info!("User Capacity: {} bytes, {}", user, Byte::from(user).get_appropriate_unit(true).to_string());
    }
}
