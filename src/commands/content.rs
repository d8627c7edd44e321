use anyhow::{Context, Result};
use std::path::PathBuf;

use nuri::models::{Actor, Content, ContentStatus, NewContent, PlatformTarget};
use nuri::storage::ContentFilter;
use nuri::utils::truncate_text;

use super::App;

pub struct CreateParams {
    pub title: String,
    pub body: Option<String>,
    pub file: Option<PathBuf>,
    pub excerpt: Option<String>,
    pub platform: PlatformTarget,
    pub author: Option<i64>,
    pub screen: bool,
}

pub fn create(app: &App, params: CreateParams) -> Result<()> {
    let body = match (params.body, params.file) {
        (Some(body), _) => body,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read body file: {}", path.display()))?,
        (None, None) => anyhow::bail!("Either --body or --file is required"),
    };

    let mut new = NewContent::new(params.title, body).with_platform(params.platform);
    if let Some(excerpt) = params.excerpt {
        new = new.with_excerpt(excerpt);
    }
    if let Some(author) = params.author {
        new = new.with_author(author);
    }
    let actor = Actor::from_user(params.author);
    let pipeline = app.pipeline();

    if params.screen {
        let submission = pipeline.submit(new, actor)?;
        print_content(&submission.content);
        if !submission.check.similar.is_empty() {
            println!("\nSimilar contents:");
            for similar in &submission.check.similar {
                println!(
                    "  #{:<6} {:.2}  {}",
                    similar.id,
                    similar.similarity,
                    truncate_text(&similar.title, 60)
                );
            }
        }
        if submission.check.is_duplicate {
            println!("\n[WARN] Flagged as duplicate");
        }
    } else {
        let content = pipeline.create_content(new, actor)?;
        print_content(&content);
    }

    Ok(())
}

pub fn show(app: &App, id: i64) -> Result<()> {
    let detail = app.pipeline().get_content(id)?;
    print_content(&detail.content);

    if let Some(excerpt) = &detail.content.excerpt {
        println!("Excerpt:     {excerpt}");
    }
    if !detail.content.seo_issues.is_empty() {
        println!("SEO issues:");
        for issue in &detail.content.seo_issues {
            println!("  - {issue}");
        }
    }

    if !detail.pending_jobs.is_empty() {
        println!("\nPending jobs:");
        for job in &detail.pending_jobs {
            println!(
                "  job #{} {} at {} (retries {})",
                job.id,
                job.platform,
                job.due_at().format("%Y-%m-%d %H:%M UTC"),
                job.retry_count
            );
        }
    }

    if !detail.history.is_empty() {
        println!("\nHistory:");
        for entry in &detail.history {
            println!(
                "  {} {:<14} {:<8} {} -> {}",
                entry.created_at.format("%Y-%m-%d %H:%M"),
                entry.action.as_str(),
                entry.actor.to_string(),
                entry.old_value.as_deref().unwrap_or("-"),
                entry.new_value.as_deref().unwrap_or("-"),
            );
        }
    }

    if !detail.attempts.is_empty() {
        println!("\nPublish attempts:");
        for attempt in &detail.attempts {
            println!(
                "  {} {:<9} {:<7} {}",
                attempt.created_at.format("%Y-%m-%d %H:%M"),
                attempt.platform.as_str(),
                attempt.outcome.as_str(),
                attempt
                    .external_url
                    .as_deref()
                    .or(attempt.error.as_deref())
                    .unwrap_or("")
            );
        }
    }

    Ok(())
}

pub fn status(app: &App, id: i64, status: ContentStatus, user: Option<i64>) -> Result<()> {
    let content = app
        .pipeline()
        .change_status(id, status, Actor::from_user(user))?;
    println!(
        "Content #{} is now {} ({})",
        content.id,
        content.status,
        content.status.korean_name()
    );
    Ok(())
}

pub fn pipeline(app: &App) -> Result<()> {
    let overview = app.pipeline().overview()?;

    println!("Content Pipeline");
    println!("================");
    for stage in &overview.stages {
        println!(
            "\n{} ({}) - {}",
            stage.status,
            stage.status.korean_name(),
            stage.count
        );
        for item in &stage.items {
            println!("  #{:<6} {}", item.id, truncate_text(&item.title, 60));
        }
    }
    println!("\nTotal: {}", overview.total);

    for warning in &overview.bottlenecks {
        println!("[WARN] {warning}");
    }
    Ok(())
}

pub fn list(
    app: &App,
    query: Option<String>,
    status: Option<ContentStatus>,
    page: u32,
    limit: u32,
) -> Result<()> {
    let filter = ContentFilter {
        query,
        status,
        page,
        limit,
        ..Default::default()
    };
    let result = app.pipeline().search(&filter)?;

    for content in &result.items {
        println!(
            "#{:<6} {:<9} {}",
            content.id,
            content.status.as_str(),
            truncate_text(&content.title, 60)
        );
    }
    println!(
        "\nPage {}/{} ({} total)",
        result.page,
        result.total_pages().max(1),
        result.total
    );
    Ok(())
}

fn print_content(content: &Content) {
    println!("Content #{}", content.id);
    println!("Title:       {}", content.title);
    println!(
        "Status:      {} ({})",
        content.status,
        content.status.korean_name()
    );
    println!("Platform:    {}", content.platform);
    println!("SEO score:   {}", content.seo_score);
    if content.is_duplicate {
        println!("Duplicate:   yes");
    }
    if let Some(published_at) = content.published_at {
        println!("Published:   {}", published_at.format("%Y-%m-%d %H:%M UTC"));
    }
}
