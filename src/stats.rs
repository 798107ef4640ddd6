use std::fmt;

use crate::config::Counter;

/// Operation counters. Host counters are in sectors, all others in pages.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FtlStats {
    pub host_read: Counter,
    pub host_write: Counter,
    pub nand_read: Counter,
    pub nand_write: Counter,
    pub gc_read: Counter,
    pub gc_write: Counter,
    pub gc_cnt: Counter,
    pub map_read: Counter,
    pub map_write: Counter,
    pub map_gc_cnt: Counter,
    pub map_gc_read: Counter,
    pub map_gc_write: Counter,
    pub cache_hit: Counter,
    pub cache_miss: Counter,
    pub erase_cnt: Counter,
    pub sectors_per_page: Counter,
}

fn ratio(num: f64, den: Counter) -> f64 {
    if den == 0 {
        0.0
    } else {
        num / den as f64
    }
}

impl FtlStats {
    pub fn new(sectors_per_page: Counter) -> Self {
        FtlStats {
            sectors_per_page,
            ..Default::default()
        }
    }

    pub fn physical_writes(&self) -> Counter {
        self.nand_write + self.gc_write + self.map_write + self.map_gc_write
    }

    pub fn physical_reads(&self) -> Counter {
        self.nand_read + self.gc_read + self.map_read + self.map_gc_read
    }

    pub fn waf(&self) -> f64 {
        ratio((self.physical_writes() * self.sectors_per_page) as f64, self.host_write)
    }

    pub fn raf(&self) -> f64 {
        ratio((self.physical_reads() * self.sectors_per_page) as f64, self.host_read)
    }

    /// Percent of translation lookups served from the CMT.
    pub fn hit_rate(&self) -> f64 {
        ratio(self.cache_hit as f64 * 100.0, self.cache_hit + self.cache_miss)
    }

    pub fn valid_per_gc(&self) -> f64 {
        ratio(self.gc_write as f64, self.gc_cnt)
    }

    pub fn valid_per_map_gc(&self) -> f64 {
        ratio(self.map_gc_write as f64, self.map_gc_cnt)
    }
}

impl fmt::Display for FtlStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Results ------")?;
        writeln!(f, "Host read: {}, writes: {}", self.host_read, self.host_write)?;
        writeln!(f, "Nand read: {}, writes: {}", self.nand_read, self.nand_write)?;
        writeln!(f, "GC read: {}, writes: {}", self.gc_read, self.gc_write)?;
        writeln!(f, "Number of GCs: {}", self.gc_cnt)?;
        writeln!(f, "MAP read: {}, MAP writes: {}", self.map_read, self.map_write)?;
        writeln!(f, "Number of MAP GCs: {}", self.map_gc_cnt)?;
        writeln!(f, "MAP GC read: {}, MAP GC writes: {}", self.map_gc_read, self.map_gc_write)?;
        writeln!(f, "Block erases: {}", self.erase_cnt)?;
        writeln!(f, "Valid pages per GC: {:.2} pages", self.valid_per_gc())?;
        writeln!(f, "Valid pages per Map GC: {:.2} pages", self.valid_per_map_gc())?;
        writeln!(f, "Cache hit rate: {:.2} %", self.hit_rate())?;
        writeln!(f, "WAF: {:.2}", self.waf())?;
        write!(f, "RAF: {:.2}", self.raf())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_stats_do_not_divide_by_zero() {
        let stats = FtlStats::new(8);
        assert_eq!(stats.waf(), 0.0);
        assert_eq!(stats.raf(), 0.0);
        assert_eq!(stats.hit_rate(), 0.0);
        assert_eq!(stats.valid_per_gc(), 0.0);
    }

    #[test]
    fn amplification() {
        let stats = FtlStats {
            host_write: 16,
            nand_write: 2,
            map_write: 1,
            gc_write: 1,
            cache_hit: 3,
            cache_miss: 1,
            ..FtlStats::new(8)
        };
        assert_eq!(stats.waf(), 2.0);
        assert_eq!(stats.hit_rate(), 75.0);

        let report = stats.to_string();
        assert!(report.contains("WAF: 2.00"));
        assert!(report.contains("Cache hit rate: 75.00 %"));
    }
}
