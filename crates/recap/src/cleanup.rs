// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `recap cleanup` command implementation.

use std::path::Path;
use std::time::Duration;

use recap_config::RecapConfig;
use recap_core::error::RecapError;
use recap_storage::cleanup_old_files;
use tracing::info;

const SECS_PER_DAY: u64 = 86_400;

/// Deletes artifacts in `storage.output_dir` older than `days`.
pub async fn run_cleanup(config: &RecapConfig, days: u64) -> Result<(), RecapError> {
    let dir = Path::new(&config.storage.output_dir);
    let older_than = Duration::from_secs(days.saturating_mul(SECS_PER_DAY));
    let removed = cleanup_old_files(dir, older_than).await?;
    info!(removed, days, dir = %dir.display(), "artifact cleanup finished");
    println!("removed {removed} file(s) older than {days} day(s) from {}", dir.display());
    Ok(())
}
