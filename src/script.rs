//! Benchmark scripts: an `S <seed>` line followed by `R <lba> <nsect>` and
//! `W <lba> <nsect>` requests in sector units.

use std::io::Write;

use log::{debug, info};
use rand::prelude::*;

use crate::error::{Error, Result};
use crate::ftl::Ftl;
use crate::nand::FlashDevice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read { lba: usize, nsect: usize },
    Write { lba: usize, nsect: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub seed: u64,
    pub ops: Vec<Op>,
}

fn number<T: std::str::FromStr>(line: usize, field: Option<&str>, what: &str) -> Result<T> {
    let field = field.ok_or_else(|| Error::Script { line, msg: format!("missing {}", what) })?;
    field.parse().map_err(|_| Error::Script {
        line,
        msg: format!("bad {} {:?}", what, field),
    })
}

impl Script {
    pub fn parse(text: &str) -> Result<Script> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty());

        let (line, header) = lines.next().ok_or(Error::Script { line: 1, msg: "empty script".into() })?;
        let mut fields = header.split_whitespace();
        if fields.next() != Some("S") {
            return Err(Error::Script { line, msg: "expected `S <seed>`".into() });
        }
        let seed = number(line, fields.next(), "seed")?;

        let mut ops = Vec::new();
        for (line, text) in lines {
            let mut fields = text.split_whitespace();
            let kind = fields.next();
            let lba = number(line, fields.next(), "lba")?;
            let nsect = number(line, fields.next(), "sector count")?;
            if fields.next().is_some() {
                return Err(Error::Script { line, msg: "trailing fields".into() });
            }

            ops.push(match kind {
                Some("R") => Op::Read { lba, nsect },
                Some("W") => Op::Write { lba, nsect },
                other => {
                    return Err(Error::Script {
                        line,
                        msg: format!("wrong op type {:?}", other.unwrap_or_default()),
                    })
                }
            });
        }
        Ok(Script { seed, ops })
    }

    /// Replays the script, echoing every request with the first byte of each
    /// sector read or written.
    pub fn run<D: FlashDevice, W: Write>(&self, ftl: &mut Ftl<D>, out: &mut W) -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(self.seed);
        let ss = ftl.geometry().sector_size;

        for (i, op) in self.ops.iter().enumerate() {
            match *op {
                Op::Read { lba, nsect } => {
                    let mut buf = vec![0u8; nsect * ss];
                    ftl.read(lba, nsect, &mut buf)?;
                    write!(out, "Read({},{}): [ ", lba, nsect)?;
                    for sector in buf.chunks(ss) {
                        write!(out, "{:2x} ", sector[0])?;
                    }
                    writeln!(out, "]")?;
                }
                Op::Write { lba, nsect } => {
                    let mut buf = Vec::with_capacity(nsect * ss);
                    for _ in 0..nsect {
                        let byte: u8 = rng.gen();
                        buf.extend(std::iter::repeat(byte).take(ss));
                    }
                    ftl.write(lba, nsect, &buf)?;
                    write!(out, "Write({},{}): [ ", lba, nsect)?;
                    for sector in buf.chunks(ss) {
                        write!(out, "{:2x} ", sector[0])?;
                    }
                    writeln!(out, "]")?;
                }
            }
            if (i + 1) % 10_000 == 0 {
                debug!("{} requests replayed", i + 1);
            }
        }
        info!("{} requests replayed", self.ops.len());
        Ok(())
    }
}
