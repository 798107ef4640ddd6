use std::io;

use thiserror::Error;

use crate::address::PhysAddr;
use crate::config::{BankId, BlockId, PageId};

/// Protocol errors reported by a [`crate::nand::FlashDevice`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlashError {
    #[error("invalid geometry: {banks} banks, {blocks} blocks, {pages} pages")]
    InvalidGeometry { banks: usize, blocks: usize, pages: usize },
    #[error("invalid address: bank {bank}, block {block}, page {page}")]
    InvalidAddress { bank: BankId, block: BlockId, page: PageId },
    #[error("{0} already written since last erase")]
    AlreadyWritten(PhysAddr),
    #[error("{addr} programmed out of order, next page is {expected}")]
    OutOfOrder { addr: PhysAddr, expected: PageId },
    /// Read of a page never programmed since the last erase.
    #[error("{0} is empty")]
    Empty(PhysAddr),
    /// Erase of a block with no programmed page. Kept apart from `Empty`
    /// because it names a block rather than a page.
    #[error("bank {bank}, block {block} is already erased")]
    EmptyBlock { bank: BankId, block: BlockId },
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("Flash error: {0}")]
    Flash(#[from] FlashError),
    #[error("Sectors {lba}..{end} outside of {limit} addressable sectors")]
    OutOfRange { lba: usize, end: usize, limit: usize },
    #[error("Buffer holds {actual} bytes, request needs {expected}")]
    BufferSize { expected: usize, actual: usize },
    #[error("No free {area} block left in bank {bank}")]
    NoFreeBlock { bank: BankId, area: &'static str },
    #[error("Invariant violated: {0}")]
    Invariant(String),
    #[error("Script line {line}: {msg}")]
    Script { line: usize, msg: String },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
