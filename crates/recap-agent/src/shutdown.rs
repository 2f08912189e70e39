// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graceful shutdown coordination with signal handling.
//!
//! Installs handlers for SIGTERM and SIGINT (Ctrl+C), triggering a
//! [`CancellationToken`] that the front-end loop, relay and workers monitor.
//! In-flight turns are drained before the process exits.

use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is received.
/// If the SIGTERM handler cannot be installed, only Ctrl+C is watched.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {
                            info!("received SIGINT (Ctrl+C), initiating shutdown");
                        }
                        _ = sigterm.recv() => {
                            info!("received SIGTERM, initiating shutdown");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler, watching Ctrl+C only");
                    let _ = ctrl_c.await;
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Waits up to `timeout` for the tasks in `tasks` to finish, then aborts the rest.
///
/// Returns the number of tasks that were aborted.
pub async fn drain_tasks<T: 'static>(tasks: &mut JoinSet<T>, timeout: Duration) -> usize {
    if tasks.is_empty() {
        debug!("no in-flight tasks to drain");
        return 0;
    }

    info!(count = tasks.len(), "waiting for in-flight tasks to complete");

    let drained = tokio::time::timeout(timeout, async {
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined
                && e.is_panic()
            {
                warn!(error = %e, "task panicked during drain");
            }
        }
    })
    .await;

    match drained {
        Ok(()) => {
            info!("all in-flight tasks drained");
            0
        }
        Err(_) => {
            let remaining = tasks.len();
            warn!(remaining, "timeout reached, aborting remaining tasks");
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
            remaining
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn install_signal_handler_returns_token() {
        let token = install_signal_handler();
        assert!(!token.is_cancelled());
        token.cancel();
    }

    #[tokio::test]
    async fn drain_empty_set_returns_immediately() {
        let mut tasks: JoinSet<()> = JoinSet::new();
        assert_eq!(drain_tasks(&mut tasks, Duration::from_millis(10)).await, 0);
    }

    #[tokio::test]
    async fn drain_waits_for_short_tasks() {
        let mut tasks = JoinSet::new();
        for ms in [5u64, 10, 15] {
            tasks.spawn(async move { tokio::time::sleep(Duration::from_millis(ms)).await });
        }
        assert_eq!(drain_tasks(&mut tasks, Duration::from_secs(2)).await, 0);
        assert!(tasks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn drain_aborts_stuck_tasks() {
        let mut tasks = JoinSet::new();
        tasks.spawn(async { tokio::time::sleep(Duration::from_secs(3600)).await });
        tasks.spawn(async {});
        assert_eq!(drain_tasks(&mut tasks, Duration::from_secs(1)).await, 1);
        assert!(tasks.is_empty());
    }
}
