use log::trace;

use crate::address::PhysAddr;
use crate::config::{BankId, BlockId, PageId, ERASED_BYTE};
use crate::error::FlashError;

/// Flash array the translation layer programs into.
///
/// Implementations must reject overwrites without an intervening erase and
/// programs that skip ahead of the next free page in a block.
pub trait FlashDevice {
    /// Bytes per page payload.
    fn page_size(&self) -> usize;

    fn program(&mut self, addr: PhysAddr, data: &[u8], tag: u32) -> Result<(), FlashError>;

    /// Fills `data` with the page payload and returns its out-of-band tag.
    fn read(&mut self, addr: PhysAddr, data: &mut [u8]) -> Result<u32, FlashError>;

    fn erase(&mut self, bank: BankId, block: BlockId) -> Result<(), FlashError>;
}

#[derive(Clone)]
struct Page {
    data: Vec<u8>,
    tag: u32,
}

#[derive(Clone)]
struct Block {
    pages: Vec<Option<Page>>,
    cursor: PageId, // points to the next page to program
    erase_counter: usize,
}

impl Block {
    fn new(pages: usize) -> Self {
        Block {
            pages: vec![None; pages],
            cursor: 0,
            erase_counter: 0,
        }
    }
}

/// In-memory NAND array, `banks × blocks × pages`.
pub struct NandArray {
    blocks: Vec<Vec<Block>>,
    pages_per_block: usize,
    page_size: usize,
}

impl NandArray {
    pub fn new(banks: usize, blocks: usize, pages: usize, page_size: usize) -> Result<Self, FlashError> {
        if banks == 0 || blocks == 0 || pages == 0 || page_size == 0 {
            return Err(FlashError::InvalidGeometry { banks, blocks, pages });
        }

        Ok(NandArray {
            blocks: vec![vec![Block::new(pages); blocks]; banks],
            pages_per_block: pages,
            page_size,
        })
    }

    pub fn erase_count(&self, bank: BankId, block: BlockId) -> usize {
        self.blocks
            .get(bank)
            .and_then(|b| b.get(block))
            .map_or(0, |b| b.erase_counter)
    }

    /// Number of programmed pages in a block; always a prefix `[0, n)`.
    pub fn written_pages(&self, bank: BankId, block: BlockId) -> usize {
        self.blocks
            .get(bank)
            .and_then(|b| b.get(block))
            .map_or(0, |b| b.cursor)
    }

    fn block_mut(&mut self, bank: BankId, block: BlockId, page: PageId) -> Result<&mut Block, FlashError> {
        if page >= self.pages_per_block {
            return Err(FlashError::InvalidAddress { bank, block, page });
        }
        self.blocks
            .get_mut(bank)
            .and_then(|b| b.get_mut(block))
            .ok_or(FlashError::InvalidAddress { bank, block, page })
    }
}

impl FlashDevice for NandArray {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn program(&mut self, addr: PhysAddr, data: &[u8], tag: u32) -> Result<(), FlashError> {
        let page_size = self.page_size;
        let block = self.block_mut(addr.bank, addr.block, addr.page)?;

        if block.pages[addr.page].is_some() {
            return Err(FlashError::AlreadyWritten(addr));
        }
        if addr.page != block.cursor {
            return Err(FlashError::OutOfOrder { addr, expected: block.cursor });
        }

        let mut payload = vec![ERASED_BYTE; page_size];
        let len = data.len().min(page_size);
        payload[..len].copy_from_slice(&data[..len]);

        block.pages[addr.page] = Some(Page { data: payload, tag });
        block.cursor += 1;
        trace!("nand program {} tag {}", addr, tag);
        Ok(())
    }

    fn read(&mut self, addr: PhysAddr, data: &mut [u8]) -> Result<u32, FlashError> {
        let block = self.block_mut(addr.bank, addr.block, addr.page)?;
        let page = block.pages[addr.page].as_ref().ok_or(FlashError::Empty(addr))?;

        let len = data.len().min(page.data.len());
        data[..len].copy_from_slice(&page.data[..len]);
        Ok(page.tag)
    }

    fn erase(&mut self, bank: BankId, block: BlockId) -> Result<(), FlashError> {
        let blk = self.block_mut(bank, block, 0)?;
        if blk.cursor == 0 {
            return Err(FlashError::EmptyBlock { bank, block });
        }

        blk.pages.iter_mut().for_each(|p| *p = None);
        blk.cursor = 0;
        blk.erase_counter += 1;
        trace!("nand erase ({}, {})", bank, block);
        Ok(())
    }
}
