use anyhow::Result;
use chrono::Utc;

use nuri::models::Platform;
use nuri::storage::{ErrorFilter, ErrorSink};
use nuri::utils::truncate_text;

use super::App;

pub struct ErrorsParams {
    pub platform: Option<Platform>,
    pub unresolved: bool,
    pub page: u32,
    pub limit: u32,
    pub stats: bool,
}

pub fn errors(app: &App, params: ErrorsParams) -> Result<()> {
    if params.stats {
        let stats = app.store.error_stats(Utc::now())?;

        println!("API Error Statistics");
        println!("====================");
        println!("Total:         {}", stats.total);
        println!("Unresolved:    {}", stats.unresolved);
        println!("Last 24h:      {}", stats.last_24h);
        println!("Last 7 days:   {}", stats.last_7d);
        println!("Error rate:    {:.2}%", stats.error_rate);
        println!("Success rate:  {:.2}%", stats.success_rate);
        println!(
            "Retries:       avg {:.1}, max {}",
            stats.avg_retry_count, stats.max_retry_count
        );

        if !stats.by_platform.is_empty() {
            println!("\nBy platform (7 days):");
            for (platform, count) in &stats.by_platform {
                println!("  {platform:<10} {count}");
            }
        }
        if !stats.top_endpoints.is_empty() {
            println!("\nTop endpoints (7 days):");
            for (endpoint, count) in &stats.top_endpoints {
                println!("  {endpoint:<24} {count}");
            }
        }
        return Ok(());
    }

    let filter = ErrorFilter {
        platform: params.platform,
        resolved: params.unresolved.then_some(false),
        page: params.page,
        limit: params.limit,
    };
    let page = app.store.list_errors(&filter)?;

    for record in &page.items {
        println!(
            "#{:<5} {} {:<9} {} {} {:<4} {}{}",
            record.id,
            record.created_at.format("%Y-%m-%d %H:%M"),
            record.platform.as_str(),
            record.method,
            record.endpoint,
            record
                .status_code
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            truncate_text(&record.message, 60),
            if record.resolved { " [resolved]" } else { "" }
        );
    }
    println!(
        "\nPage {}/{} ({} total)",
        page.page,
        page.total_pages().max(1),
        page.total
    );
    Ok(())
}

pub fn resolve_error(app: &App, id: i64) -> Result<()> {
    let record = app.store.resolve(id)?;
    println!("Error #{} marked resolved", record.id);
    Ok(())
}
