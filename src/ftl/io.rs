use std::ops::Range;

use log::trace;

use crate::block::Area;
use crate::config::*;
use crate::error::{Error, Result};
use crate::nand::FlashDevice;

use super::Ftl;

/// Part of a host request that falls into one logical page.
struct PageSpan {
    lpn: Lpn,
    /// Byte range inside the flash page.
    in_page: Range<usize>,
    /// Byte range inside the host buffer.
    in_buf: Range<usize>,
}

impl<D: FlashDevice> Ftl<D> {
    fn spans(&self, lba: usize, nsect: usize, buf_len: usize) -> Result<Vec<PageSpan>> {
        let end = lba.checked_add(nsect).unwrap_or(usize::MAX);
        let limit = self.geo.total_sectors();
        if end > limit {
            return Err(Error::OutOfRange { lba, end, limit });
        }
        let expected = nsect * self.geo.sector_size;
        if buf_len != expected {
            return Err(Error::BufferSize { expected, actual: buf_len });
        }
        if nsect == 0 {
            return Ok(Vec::new());
        }

        let spp = self.geo.sectors_per_page;
        let ss = self.geo.sector_size;
        let spans = (lba / spp..=(end - 1) / spp)
            .map(|lpn| {
                let first = lba.max(lpn * spp);
                let last = end.min((lpn + 1) * spp);
                let in_page = (first - lpn * spp) * ss..(last - lpn * spp) * ss;
                let in_buf = (first - lba) * ss..(last - lba) * ss;
                PageSpan { lpn, in_page, in_buf }
            })
            .collect();
        Ok(spans)
    }

    /// Writes `nsect` sectors starting at sector `lba`. Partially covered
    /// pages keep their untouched sectors.
    pub fn write(&mut self, lba: usize, nsect: usize, data: &[u8]) -> Result<()> {
        let spans = self.spans(lba, nsect, data.len())?;

        for span in spans {
            let loc = self.geo.locate_lpn(span.lpn);
            let target = self.allocate(loc.bank, Area::Data)?;
            let prev = self.lookup_for_write(loc)?;

            let mut staged = vec![ERASED_BYTE; self.geo.page_size()];
            if let Some(old) = prev {
                self.nand.read(self.geo.ppn_to_addr(old), &mut staged)?;
                self.stats.nand_read += 1;
                self.invalidate(old);
            }
            staged[span.in_page.clone()].copy_from_slice(&data[span.in_buf.clone()]);

            let ppn = self.program(target, &staged, span.lpn as u32)?;
            self.stats.nand_write += 1;
            let replaced = self.update(span.lpn, ppn)?;
            debug_assert_eq!(replaced, prev);
            trace!("write lpn {} -> {} (was {:?})", span.lpn, target, prev);
        }

        self.stats.host_write += nsect;
        self.ref_time += 1;
        Ok(())
    }

    /// Reads `nsect` sectors starting at sector `lba`. Never-written sectors
    /// read back erased.
    pub fn read(&mut self, lba: usize, nsect: usize, buf: &mut [u8]) -> Result<()> {
        let spans = self.spans(lba, nsect, buf.len())?;
        let mut page = vec![ERASED_BYTE; self.geo.page_size()];

        for span in spans {
            match self.resolve(span.lpn)? {
                Some(ppn) => {
                    self.nand.read(self.geo.ppn_to_addr(ppn), &mut page)?;
                    self.stats.nand_read += 1;
                }
                None => page.fill(ERASED_BYTE),
            }
            buf[span.in_buf].copy_from_slice(&page[span.in_page]);
            trace!("read lpn {}", span.lpn);
        }

        self.stats.host_read += nsect;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ftl::test::scenario_geometry;
    use rand::prelude::*;

    fn geometry() -> Geometry {
        Geometry {
            banks: 2,
            blocks_per_bank: 16,
            pages_per_block: 8,
            sectors_per_page: 4,
            sector_size: 4,
            map_entries_per_page: 4,
            cache_slots_per_bank: 2,
            map_blocks_per_bank: 4,
            op_ratio: 20,
            gc_reserved_blocks: 1,
        }
    }

    #[test]
    fn unwritten_sectors_read_erased() {
        let mut ftl = Ftl::open(geometry()).unwrap();
        let mut buf = vec![0u8; 6 * 4];
        ftl.read(3, 6, &mut buf).unwrap();
        assert!(buf.iter().all(|b| *b == ERASED_BYTE));
        assert_eq!(ftl.stats().nand_read, 0);
        assert_eq!(ftl.stats().host_read, 6);
    }

    #[test]
    fn partial_page_write_keeps_neighbours() {
        let mut ftl = Ftl::open(geometry()).unwrap();

        ftl.write(0, 8, &[0x11; 32]).unwrap();
        // sectors 1..6 straddle pages 0 and 1
        ftl.write(1, 5, &[0x22; 20]).unwrap();

        let mut buf = vec![0u8; 32];
        ftl.read(0, 8, &mut buf).unwrap();
        assert_eq!(&buf[..4], &[0x11; 4]);
        assert_eq!(&buf[4..24], &[0x22; 20]);
        assert_eq!(&buf[24..], &[0x11; 8]);

        // read-modify-write of both covered pages
        assert_eq!(ftl.stats().nand_write, 4);
        assert!(ftl.stats().nand_read >= 2);
    }

    #[test]
    fn partial_write_into_empty_page_pads_erased() {
        let mut ftl = Ftl::open(geometry()).unwrap();
        ftl.write(5, 2, &[0x33; 8]).unwrap();

        let mut buf = vec![0u8; 16];
        ftl.read(4, 4, &mut buf).unwrap();
        assert_eq!(&buf[..4], &[ERASED_BYTE; 4]);
        assert_eq!(&buf[4..12], &[0x33; 8]);
        assert_eq!(&buf[12..], &[ERASED_BYTE; 4]);
    }

    #[test]
    fn rejects_out_of_range_and_short_buffer() {
        let mut ftl = Ftl::open(geometry()).unwrap();
        let limit = ftl.geometry().total_sectors();

        let mut buf = vec![0u8; 8];
        assert!(matches!(ftl.read(limit - 1, 2, &mut buf), Err(Error::OutOfRange { .. })));
        assert!(matches!(ftl.write(0, 3, &buf), Err(Error::BufferSize { expected: 12, actual: 8 })));
        assert_eq!(ftl.stats().host_write, 0);
        assert_eq!(ftl.ref_time(), 0);
    }

    #[test]
    fn timestamp_advances_once_per_write() {
        let mut ftl = Ftl::open(geometry()).unwrap();
        ftl.write(0, 16, &[1; 64]).unwrap();
        assert_eq!(ftl.ref_time(), 1);

        let mut buf = vec![0u8; 64];
        ftl.read(0, 16, &mut buf).unwrap();
        assert_eq!(ftl.ref_time(), 1);
    }

    #[test]
    fn write_only_workload_without_gc_has_unit_waf() {
        let mut ftl = Ftl::open(geometry()).unwrap();

        // LPNs 0..4 fall in map page 0 of both banks, so nothing is evicted
        for lpn in 0..4 {
            ftl.write(lpn * 4, 4, &[lpn as u8; 16]).unwrap();
        }
        let stats = ftl.stats();
        assert_eq!(stats.gc_cnt, 0);
        assert_eq!(stats.map_write, 0);
        assert_eq!(stats.waf(), 1.0);
    }

    #[test]
    fn random_workload_matches_shadow_copy() {
        let mut ftl = Ftl::open(geometry()).unwrap();
        let sectors = ftl.geometry().total_sectors();
        let ss = ftl.geometry().sector_size;
        let mut shadow = vec![ERASED_BYTE; sectors * ss];
        let mut rng = SmallRng::seed_from_u64(7);

        for round in 0..2000 {
            let lba = rng.gen_range(0..sectors);
            let nsect = rng.gen_range(1..=(sectors - lba).min(9));
            let range = lba * ss..(lba + nsect) * ss;

            if rng.gen_bool(0.6) {
                let data: Vec<u8> = (0..nsect * ss).map(|_| rng.gen()).collect();
                ftl.write(lba, nsect, &data).unwrap();
                shadow[range].copy_from_slice(&data);
            } else {
                let mut buf = vec![0u8; nsect * ss];
                ftl.read(lba, nsect, &mut buf).unwrap();
                assert_eq!(buf, &shadow[range], "round {} lba {} nsect {}", round, lba, nsect);
            }
        }

        assert!(ftl.stats().gc_cnt > 0);
        assert!(ftl.stats().map_write > 0);
        assert!(ftl.stats().map_gc_cnt > 0);
        ftl.verify().unwrap();

        let geo = ftl.geometry().clone();
        for bank in 0..geo.banks {
            for (id, block) in ftl.bank(bank).table().blocks().iter().enumerate() {
                let written = block.pages.iter().filter(|p| p.written).count();
                assert_eq!(ftl.device().written_pages(bank, id), written);
            }
        }

        let mut buf = vec![0u8; sectors * ss];
        ftl.read(0, sectors, &mut buf).unwrap();
        assert_eq!(buf, shadow);
    }

    #[test]
    fn scenario_geometry_round_trip() {
        let mut ftl = Ftl::open(scenario_geometry()).unwrap();
        let sectors = ftl.geometry().total_sectors();
        for lba in 0..sectors {
            ftl.write(lba, 1, &[lba as u8; 8]).unwrap();
        }
        for lba in 0..sectors {
            let mut buf = vec![0u8; 8];
            ftl.read(lba, 1, &mut buf).unwrap();
            assert_eq!(buf, vec![lba as u8; 8]);
        }
    }
}
