use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;

use nuri::error::Error;
use nuri::metrics;
use nuri::models::{Actor, PlatformTarget};

use super::App;

pub async fn publish(
    app: &App,
    content_id: i64,
    platform: Option<PlatformTarget>,
    user: Option<i64>,
) -> Result<()> {
    let dispatcher = app.dispatcher()?;
    let results = dispatcher
        .publish_now(content_id, platform, Actor::from_user(user))
        .await?;

    println!("Publish results for content #{content_id}");
    for result in &results {
        println!("  {result}");
    }

    if results.iter().all(|r| r.is_skipped()) {
        if let Some(first) = results.first() {
            return Err(Error::NotConfigured {
                platform: first.platform,
            }
            .into());
        }
    }
    if !results.iter().any(|r| r.is_success()) {
        anyhow::bail!("No platform accepted the post");
    }
    Ok(())
}

/// Dump the counters gathered by this process in Prometheus text format
fn print_metrics() {
    if !metrics::metrics_initialized() {
        tracing::warn!("Metrics are not initialized; nothing to print");
        return;
    }
    match metrics::encode_metrics() {
        Ok(text) => print!("{text}"),
        Err(e) => tracing::warn!(error = %e, "Failed to encode metrics"),
    }
}

/// One sweep, or a loop until Ctrl-C; `show_metrics` prints counters at the end
pub async fn dispatch(app: &App, run_loop: bool, show_metrics: bool) -> Result<()> {
    let dispatcher = app.dispatcher()?;

    if !run_loop {
        let report = dispatcher.run_due(Utc::now()).await?;
        println!(
            "Claimed {}, published {}, retried {}, failed {}, lost {}",
            report.claimed, report.published, report.retried, report.failed, report.lost
        );
        for job in &report.jobs {
            println!("  job #{} -> {}", job.job_id, job.status);
            for result in &job.results {
                println!("    {result}");
            }
        }
        if show_metrics {
            print_metrics();
        }
        return Ok(());
    }

    println!(
        "Dispatcher running every {}s, press Ctrl-C to stop",
        app.config.dispatcher.sweep_interval_secs
    );
    let handle = Arc::new(dispatcher).start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    handle.stop().await;

    if show_metrics {
        print_metrics();
    }
    Ok(())
}
