//! Demand-based flash translation layer (DFTL) simulator.
//!
//! [`Ftl`] maps host sectors onto an in-memory NAND array through a per-bank
//! Global Translation Directory and a bounded Cached Mapping Table, and
//! reclaims data and translation blocks with greedy garbage collection.

pub mod address;
pub mod block;
pub mod cache;
pub mod config;
pub mod error;
pub mod ftl;
pub mod nand;
pub mod script;
pub mod stats;

pub use config::Geometry;
pub use error::{Error, FlashError, Result};
pub use ftl::Ftl;
pub use nand::{FlashDevice, NandArray};
pub use stats::FtlStats;
