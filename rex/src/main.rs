// SPDX-License-Identifier: MIT

mod profile;
mod utils;

use std::{
    fs::{File, OpenOptions},
    io::BufReader,
    path::PathBuf,
    process::ExitCode,
};

use anyhow::Context;
use clap::{Parser, error::ErrorKind};
use colored::Colorize;
use log::info;
use rexfs::{constant::ARENA_DEFAULT_CAPACITY, prelude::*};

use crate::{
    profile::Profile,
    utils::string::{pretty_bytes, sep_u64},
};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\nCopyright (c) 2025 Killian Massa (Mki). MIT License."
);

#[derive(Parser, Debug)]
#[command(
    name = "rex",
    version = VERSION,
    about = "Rebuilds exFAT metadata from a recovery log",
    long_about = None
)]
struct Cli {
    /// Block device or image holding the damaged volume
    device: PathBuf,

    /// Recovery log: one entry offset per line, optionally followed by its parent's
    logfile: PathBuf,

    /// Replay and report, but never write to the device
    #[arg(long)]
    dry_run: bool,

    /// TOML profile describing the volume geometry
    #[arg(short, long, value_name = "PROFILE")]
    config: Option<PathBuf>,

    /// Write the reconstructed directory tree snapshot to this file
    #[arg(long, value_name = "PATH")]
    tree_out: Option<PathBuf>,

    /// Maximum number of tree nodes, root included
    #[arg(long, value_name = "N")]
    arena_capacity: Option<u32>,

    /// Partition start sector on the device (overrides the profile)
    #[arg(long, value_name = "SECTOR")]
    partition_start: Option<u64>,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Errors only
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn print_geometry(geo: &VolumeGeometry) {
    println!("{}", "Volume".bold());
    println!(
        "  partition     sector {} ({})",
        sep_u64(geo.partition_start_sector),
        pretty_bytes(geo.partition_offset())
    );
    println!(
        "  clusters      {} x {}",
        sep_u64(geo.heap_clusters() as u64),
        pretty_bytes(geo.cluster_size())
    );
    println!(
        "  FAT           sector {}, {} sectors",
        sep_u64(geo.fat_offset_sectors as u64),
        sep_u64(geo.fat_length_sectors() as u64)
    );
    println!(
        "  cluster heap  sector {}",
        sep_u64(geo.cluster_heap_offset_sectors as u64)
    );
    println!("  label         {:?}", geo.volume_label);
}

fn print_summary(rec: &Reconstruction) {
    let stats = &rec.stats;
    println!("{}", "Replay".bold());
    println!("  lines         {}", sep_u64(stats.lines));
    println!("  applied       {}", sep_u64(stats.applied).green());
    println!("  duplicates    {}", sep_u64(stats.duplicates));
    let skipped = sep_u64(stats.skipped());
    if stats.skipped() > 0 {
        println!("  skipped       {}", skipped.yellow());
        for (label, count) in [
            ("malformed", stats.skipped_malformed),
            ("checksum", stats.skipped_checksum),
            ("entry type", stats.skipped_entry_type),
            ("out of range", stats.skipped_out_of_range),
            ("bad name", stats.skipped_name),
            ("unparseable", stats.skipped_unparseable),
        ] {
            if count > 0 {
                println!("    {label:<12}{}", sep_u64(count));
            }
        }
    } else {
        println!("  skipped       {skipped}");
    }
    if stats.cross_links > 0 {
        println!("  cross-linked  {}", sep_u64(stats.cross_links).red());
    }
    println!("  adopted       {}", sep_u64(stats.adopted));
    println!(
        "  tree          {} nodes, {} at the root",
        sep_u64(rec.arena.len() as u64 - 1),
        sep_u64(rec.arena.children(ROOT).count() as u64)
    );
    println!(
        "  clusters      {} in use ({})",
        sep_u64(rec.fat.used_clusters() as u64),
        pretty_bytes(rec.fat.used_clusters() as u64 * rec.geometry.cluster_size())
    );
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let profile = match &cli.config {
        Some(path) => Profile::from_file(path)?,
        None => Profile::default(),
    };
    let mut geometry = profile.geometry();
    if let Some(sector) = cli.partition_start {
        geometry.partition_start_sector = sector;
    }
    geometry.validate().map_err(RexError::from)?;

    let log_file = File::open(&cli.logfile)
        .with_context(|| format!("cannot open recovery log {}", cli.logfile.display()))?;
    let mut device = OpenOptions::new()
        .read(true)
        .write(!cli.dry_run)
        .open(&cli.device)
        .with_context(|| format!("cannot open device {}", cli.device.display()))?;

    if !cli.quiet {
        print_geometry(&geometry);
    }

    let capacity = cli
        .arena_capacity
        .or(profile.replay.arena_capacity)
        .unwrap_or(ARENA_DEFAULT_CAPACITY);
    let conservative = profile.replay.conservative_bitmap.unwrap_or(true);

    let mut io = StdRexIO::new_with_offset(&mut device, geometry.partition_offset());
    let spinner = utils::progress::replay_spinner(cli.quiet)?;
    let rec = {
        let mut driver = ReconstructionDriver::new(&mut io, geometry)?
            .with_arena_capacity(capacity)
            .with_conservative_bitmap(conservative);
        driver.build_allocators()?;
        let replayed = driver.replay(RecoveryLog::new(BufReader::new(log_file)), |stats| {
            utils::progress::update(&spinner, stats);
            true
        });
        spinner.finish_and_clear();
        replayed?;
        driver.finish()?
    };

    if !cli.quiet {
        print_summary(&rec);
    }

    if let Some(path) = &cli.tree_out {
        let mut out = File::create(path)
            .with_context(|| format!("cannot create {}", path.display()))?;
        let written = rec
            .arena
            .write_snapshot(&mut StdRexIO::new(&mut out), 0)
            .map_err(RexError::from)?;
        info!(
            "tree snapshot written to {} ({})",
            path.display(),
            pretty_bytes(written)
        );
    }

    if cli.dry_run {
        println!("{}", "Dry run: nothing was written to the device.".yellow());
        return Ok(());
    }

    let report = commit(&mut io, &rec).map_err(RexError::from)?;
    println!(
        "{} {} written, {} root entry sets, boot checksum {:#010x}",
        "Committed:".green().bold(),
        pretty_bytes(report.bytes_written),
        sep_u64(report.root_entry_sets as u64),
        report.boot_checksum
    );
    Ok(())
}

/// OS error code of a failed open, or 1.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<std::io::Error>())
        .and_then(|e| e.raw_os_error())
        .and_then(|code| u8::try_from(code).ok())
        .filter(|&code| code != 0)
        .unwrap_or(1)
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };
    utils::log::init(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "[rex] error:".red().bold());
            ExitCode::from(exit_code(&err))
        }
    }
}
