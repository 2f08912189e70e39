// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `recap status` command implementation.
//!
//! Reads the ledger directly, so it works whether or not `serve` is running.

use recap_config::RecapConfig;
use recap_core::error::RecapError;
use recap_core::traits::StateStore;

/// Prints the request record and, once dispatched, its job as JSON.
pub async fn run_status(config: &RecapConfig, request_id: &str) -> Result<(), RecapError> {
    let store = crate::open_store(config).await?;
    let report = status_report(store.as_ref(), request_id).await;
    store.close().await?;

    let rendered = serde_json::to_string_pretty(&report?)
        .map_err(|e| RecapError::Internal(format!("failed to render status: {e}")))?;
    println!("{rendered}");
    Ok(())
}

async fn status_report(
    store: &dyn StateStore,
    request_id: &str,
) -> Result<serde_json::Value, RecapError> {
    let request = store
        .get_request(request_id)
        .await?
        .ok_or_else(|| RecapError::RequestNotFound(request_id.to_string()))?;

    let job = match request.job_id.as_deref() {
        Some(job_id) => store.get_job(job_id).await?.map(|job| {
            serde_json::json!({
                "job_id": job.job_id,
                "attempt_count": job.attempt_count,
                "result": job.result,
                "created_at": job.created_at,
                "updated_at": job.updated_at,
            })
        }),
        None => None,
    };

    Ok(serde_json::json!({
        "request": request,
        "job": job,
    }))
}
