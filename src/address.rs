use std::fmt;

use num_integer::div_rem;

use crate::config::*;

/// Where a logical page's mapping entry lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LpnLocation {
    pub bank: BankId,
    pub map_page: MapPageId,
    pub map_offset: BaseType,
}

/// Physical flash page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysAddr {
    pub bank: BankId,
    pub block: BlockId,
    pub page: PageId,
}

impl fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.bank, self.block, self.page)
    }
}

// LPNs are striped across banks; each bank owns every B-th LPN and groups
// E consecutive own LPNs per map page.
impl Geometry {
    pub fn locate_lpn(&self, lpn: Lpn) -> LpnLocation {
        let stride = self.banks * self.map_entries_per_page;
        let (map_page, rest) = div_rem(lpn, stride);
        LpnLocation {
            bank: lpn % self.banks,
            map_page,
            map_offset: rest / self.banks,
        }
    }

    pub fn lpn_at(&self, loc: LpnLocation) -> Lpn {
        loc.map_page * self.banks * self.map_entries_per_page + loc.map_offset * self.banks + loc.bank
    }

    pub fn ppn_to_addr(&self, ppn: Ppn) -> PhysAddr {
        let (bank, in_bank) = div_rem(ppn, self.pages_per_bank());
        let (block, page) = div_rem(in_bank, self.pages_per_block);
        PhysAddr { bank, block, page }
    }

    pub fn addr_to_ppn(&self, addr: PhysAddr) -> Ppn {
        addr.bank * self.pages_per_bank() + addr.block * self.pages_per_block + addr.page
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn small() -> Geometry {
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

    #[test]
    fn lpn_striping() {
        let geo = small();
        assert_eq!(geo.locate_lpn(0), LpnLocation { bank: 0, map_page: 0, map_offset: 0 });
        assert_eq!(geo.locate_lpn(1), LpnLocation { bank: 1, map_page: 0, map_offset: 0 });
        assert_eq!(geo.locate_lpn(2), LpnLocation { bank: 0, map_page: 0, map_offset: 1 });
        assert_eq!(geo.locate_lpn(5), LpnLocation { bank: 1, map_page: 1, map_offset: 0 });

        for lpn in 0..64 {
            assert_eq!(geo.lpn_at(geo.locate_lpn(lpn)), lpn);
        }
    }

    #[test]
    fn ppn_decode() {
        let geo = small();
        assert_eq!(geo.ppn_to_addr(0), PhysAddr { bank: 0, block: 0, page: 0 });
        assert_eq!(geo.ppn_to_addr(7), PhysAddr { bank: 0, block: 1, page: 3 });
        assert_eq!(geo.ppn_to_addr(16), PhysAddr { bank: 1, block: 0, page: 0 });
        assert_eq!(geo.addr_to_ppn(PhysAddr { bank: 1, block: 2, page: 1 }), 25);
    }
}
