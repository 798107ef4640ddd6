use std::fmt;

use crate::config::*;

/// Which kind of page a block holds while it is open.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Area {
    Data,
    Translation,
}

impl Area {
    pub fn opposite(self) -> Area {
        match self {
            Area::Data => Area::Translation,
            Area::Translation => Area::Data,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Area::Data => "data",
            Area::Translation => "translation",
        }
    }
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct PageState {
    pub written: bool,
    pub valid: bool,
}

#[derive(Clone)]
pub struct Block {
    pub valid_counter: Counter,
    pub area: Option<Area>,
    pub full: bool,
    pub pages: Vec<PageState>,
}

impl Block {
    pub fn new(pages: usize) -> Self {
        Block {
            valid_counter: 0,
            area: None,
            full: false,
            pages: vec![PageState::default(); pages],
        }
    }

    pub fn invalid_counter(&self) -> Counter {
        self.pages.iter().filter(|p| p.written).count() - self.valid_counter
    }

    fn next_free_page(&self) -> Option<PageId> {
        self.pages.iter().position(|p| !p.written)
    }

    fn write_one_page(&mut self, page: PageId) {
        debug_assert!(self.valid_counter < self.pages.len(), "write more pages than block has");
        debug_assert!(!self.pages[page].written, "page {} programmed twice", page);

        self.pages[page] = PageState { written: true, valid: true };
        self.valid_counter += 1;
        if page == self.pages.len() - 1 {
            self.full = true;
        }
    }

    fn erase(&mut self) {
        self.pages.iter_mut().for_each(|p| *p = PageState::default());
        self.valid_counter = 0;
        self.area = None;
        self.full = false;
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} full={} valid={} [", self.area, self.full, self.valid_counter)?;
        for page in &self.pages {
            let symbol = match (page.written, page.valid) {
                (true, true) => "V",
                (true, false) => "I",
                _ => ".",
            };
            write!(f, "{}", symbol)?;
        }
        write!(f, "]")
    }
}

/// Per-bank block and page state plus the open data/translation cursors.
pub struct BlockTable {
    blocks: Vec<Block>,
    open_data: Option<BlockId>,
    open_map: Option<BlockId>,
}

impl BlockTable {
    pub fn new(blocks: usize, pages_per_block: usize) -> Self {
        BlockTable {
            blocks: vec![Block::new(pages_per_block); blocks],
            open_data: None,
            open_map: None,
        }
    }

    pub fn block(&self, block: BlockId) -> &Block {
        &self.blocks[block]
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn cursor(&self, area: Area) -> Option<BlockId> {
        match area {
            Area::Data => self.open_data,
            Area::Translation => self.open_map,
        }
    }

    fn cursor_mut(&mut self, area: Area) -> &mut Option<BlockId> {
        match area {
            Area::Data => &mut self.open_data,
            Area::Translation => &mut self.open_map,
        }
    }

    /// Opens the first block that is neither full nor owned by the other area
    /// and makes it the `area` cursor.
    pub fn open_block(&mut self, area: Area) -> Option<BlockId> {
        let other = Some(area.opposite());
        let id = self.blocks.iter().position(|b| !b.full && b.area != other)?;

        self.blocks[id].area = Some(area);
        *self.cursor_mut(area) = Some(id);
        Some(id)
    }

    /// Next page to program for `area`, opening a block when no cursor is set.
    /// Nothing is marked until [`BlockTable::commit`].
    pub fn next_page(&mut self, area: Area) -> Option<(BlockId, PageId)> {
        let block = match self.cursor(area) {
            Some(block) => block,
            None => self.open_block(area)?,
        };
        let page = self.blocks[block].next_free_page()?;
        Some((block, page))
    }

    /// Records a programmed page as written and valid.
    pub fn commit(&mut self, block: BlockId, page: PageId) {
        let blk = &mut self.blocks[block];
        blk.write_one_page(page);

        if blk.full {
            if let Some(area) = blk.area {
                let cursor = self.cursor_mut(area);
                if *cursor == Some(block) {
                    *cursor = None;
                }
            }
        }
    }

    /// Marks a page stale. Returns false when it was not valid.
    pub fn invalidate(&mut self, block: BlockId, page: PageId) -> bool {
        let blk = &mut self.blocks[block];
        let state = &mut blk.pages[page];
        if !state.valid {
            return false;
        }

        state.valid = false;
        debug_assert!(blk.valid_counter > 0, "valid counter underflow");
        blk.valid_counter = blk.valid_counter.saturating_sub(1);
        true
    }

    pub fn is_valid(&self, block: BlockId, page: PageId) -> bool {
        self.blocks[block].pages[page].valid
    }

    pub fn full_count(&self, area: Area) -> usize {
        self.blocks
            .iter()
            .filter(|b| b.full && b.area == Some(area))
            .count()
    }

    /// Greedy victim: the full `area` block with the fewest valid pages.
    pub fn pick_victim(&self, area: Area) -> Option<BlockId> {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.full && b.area == Some(area))
            .min_by_key(|(_, b)| b.valid_counter)
            .map(|(id, _)| id)
    }

    pub fn valid_pages(&self, block: BlockId) -> Vec<PageId> {
        self.blocks[block]
            .pages
            .iter()
            .enumerate()
            .filter(|(_, p)| p.valid)
            .map(|(id, _)| id)
            .collect()
    }

    /// Returns an erased block to the unassigned pool.
    pub fn reset(&mut self, block: BlockId) {
        self.blocks[block].erase();
        for area in [Area::Data, Area::Translation] {
            let cursor = self.cursor_mut(area);
            if *cursor == Some(block) {
                *cursor = None;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn allocates_in_order_and_closes_full_block() {
        let mut table = BlockTable::new(4, 4);

        for expected in 0..4 {
            let (block, page) = table.next_page(Area::Data).unwrap();
            assert_eq!((block, page), (0, expected));
            table.commit(block, page);
        }
        assert!(table.block(0).full);
        assert_eq!(table.cursor(Area::Data), None);
        assert_eq!(table.full_count(Area::Data), 1);

        assert_eq!(table.next_page(Area::Data), Some((1, 0)));
    }

    #[test]
    fn areas_never_share_a_block() {
        let mut table = BlockTable::new(4, 4);

        let (data, _) = table.next_page(Area::Data).unwrap();
        let (map, _) = table.next_page(Area::Translation).unwrap();
        assert_ne!(data, map);
        assert_eq!(table.block(data).area, Some(Area::Data));
        assert_eq!(table.block(map).area, Some(Area::Translation));
    }

    #[test]
    fn invalidate_counts_once() {
        let mut table = BlockTable::new(2, 4);
        let (block, page) = table.next_page(Area::Data).unwrap();
        table.commit(block, page);

        assert!(table.invalidate(block, page));
        assert!(!table.invalidate(block, page));
        assert_eq!(table.block(block).valid_counter, 0);
        assert_eq!(table.block(block).invalid_counter(), 1);
    }

    #[test]
    fn victim_is_least_valid_full_block() {
        let mut table = BlockTable::new(4, 2);
        for _ in 0..6 {
            let (block, page) = table.next_page(Area::Data).unwrap();
            table.commit(block, page);
        }
        table.invalidate(1, 0);
        table.invalidate(2, 0);

        assert_eq!(table.pick_victim(Area::Data), Some(1));
        assert_eq!(table.pick_victim(Area::Translation), None);

        table.reset(1);
        assert_eq!(table.block(1).area, None);
        assert!(table.valid_pages(1).is_empty());
        assert_eq!(table.valid_pages(2), vec![1]);
    }
}
