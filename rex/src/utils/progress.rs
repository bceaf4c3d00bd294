// SPDX-License-Identifier: MIT

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rexfs::prelude::ReplayStats;

use crate::utils::string::sep_u64;

/// Spinner shown while the log is replayed; hidden when `quiet`.
pub fn replay_spinner(quiet: bool) -> anyhow::Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("replaying recovery log");
    Ok(pb)
}

pub fn describe(stats: &ReplayStats) -> String {
    format!(
        "{} records, {} applied, {} skipped",
        sep_u64(stats.records),
        sep_u64(stats.applied),
        sep_u64(stats.skipped())
    )
}

/// Refreshes the spinner every 256 records.
pub fn update(pb: &ProgressBar, stats: &ReplayStats) {
    if stats.records % 256 == 0 {
        pb.set_message(describe(stats));
    }
}
