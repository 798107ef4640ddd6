#[macro_use]
extern crate log;
extern crate simplelog;

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use dftl_sim::config::*;
use dftl_sim::script::Script;
use dftl_sim::{Ftl, Result};
use simplelog::*;
use time::macros::format_description;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Benchmark script; read from stdin when omitted
    input: Option<PathBuf>,

    /// Where to write the request echo and results; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Over-provisioning ratio in percent
    #[arg(long, default_value_t = OP_RATIO)]
    op: usize,

    /// Cached map pages per bank
    #[arg(long, default_value_t = CACHE_SLOTS_PER_BANK)]
    cache_slots: usize,

    /// Log more: -v for debug, -vv for trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let text = match &args.input {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            text
        }
    };
    let script = Script::parse(&text)?;

    let geo = Geometry {
        op_ratio: args.op,
        cache_slots_per_bank: args.cache_slots,
        ..Geometry::default()
    };
    let mut fw = Ftl::open(geo)?;

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };
    script.run(&mut fw, &mut out)?;
    writeln!(out)?;
    writeln!(out, "{}", fw.stats())?;
    out.flush()?;

    info!("WAF {:.2}, RAF {:.2}, cache hit rate {:.2} %", fw.stats().waf(), fw.stats().raf(), fw.stats().hit_rate());
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_cfg = ConfigBuilder::new()
        .set_time_format_custom(format_description!("[hour]:[minute]:[second].[subsecond]"))
        .build();

    if let Err(e) = TermLogger::init(args.log_level(), log_cfg, TerminalMode::Stderr, ColorChoice::Auto) {
        eprintln!("logger init failed: {}", e);
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
