use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Utc};

use nuri::models::{Actor, PlatformTarget, ScheduledJob};
use nuri::scheduling::CalendarView;
use nuri::utils::truncate_text;

use super::{parse_when, App};

pub fn schedule(
    app: &App,
    content_id: i64,
    at: &str,
    platform: Option<PlatformTarget>,
    user: Option<i64>,
) -> Result<()> {
    let when = parse_when(at)?;
    let platform = match platform {
        Some(platform) => platform,
        None => app.pipeline().get_content(content_id)?.content.platform,
    };

    let job = app
        .scheduling()
        .schedule(content_id, platform, when, Actor::from_user(user))?;
    print_job("Scheduled", &job);
    Ok(())
}

pub fn cancel(app: &App, job_id: i64, user: Option<i64>) -> Result<()> {
    let job = app.scheduling().cancel(job_id, Actor::from_user(user))?;
    print_job("Cancelled", &job);
    Ok(())
}

pub fn reschedule(app: &App, job_id: i64, at: &str) -> Result<()> {
    let when = parse_when(at)?;
    let job = app.scheduling().reschedule(job_id, when)?;
    print_job("Rescheduled", &job);
    Ok(())
}

pub fn requeue(app: &App, job_id: i64, user: Option<i64>) -> Result<()> {
    let job = app.scheduling().requeue(job_id, Actor::from_user(user))?;
    print_job("Requeued", &job);
    Ok(())
}

pub fn calendar(app: &App, month: Option<String>, week: Option<String>) -> Result<()> {
    let scheduling = app.scheduling();

    let view = if let Some(week) = week {
        let start = NaiveDate::parse_from_str(&week, "%Y-%m-%d")
            .with_context(|| format!("Invalid week start '{week}', expected YYYY-MM-DD"))?;
        scheduling.weekly_calendar(start)?
    } else if let Some(month) = month {
        let first = NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d")
            .with_context(|| format!("Invalid month '{month}', expected YYYY-MM"))?;
        scheduling.monthly_calendar(first.year(), first.month())?
    } else {
        scheduling.this_month(Utc::now())?
    };

    print_calendar(&view);
    Ok(())
}

fn print_job(action: &str, job: &ScheduledJob) {
    println!(
        "{action} job #{} for content #{}: {} at {} [{}]",
        job.id,
        job.content_id,
        job.platform,
        job.due_at().format("%Y-%m-%d %H:%M UTC"),
        job.status
    );
}

fn print_calendar(view: &CalendarView) {
    println!(
        "Calendar {} ~ {}",
        view.from.format("%Y-%m-%d"),
        view.to.format("%Y-%m-%d")
    );
    println!("========================");

    if view.days.is_empty() {
        println!("No scheduled publishes");
        return;
    }

    for (day, events) in &view.days {
        println!("\n{day}");
        for event in events {
            println!(
                "  {} job #{:<5} {:<9} {:<9} {}",
                event.scheduled_for.format("%H:%M"),
                event.job_id,
                event.platform.as_str(),
                event.status.as_str(),
                truncate_text(&event.title, 50)
            );
        }
    }
    println!("\nTotal: {}", view.total);
}
