use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::Parser;

use crate::{
    analysis::report::{day_report, DayReport},
    storage::settings::SettingsProvider,
    utils::{
        percentage::{duration_percentage, Percentage},
        time::format_duration,
    },
};

use super::{
    parsing::{parse_date_arg, DateStyle, DATE_HELP},
    AppContext,
};

#[derive(Debug, Parser)]
pub struct DayCommand {
    #[arg(long, short, help = DATE_HELP)]
    date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(short = 'p', long = "percentage", help = "Hide apps below this share of active time", default_value_t = Percentage::ZERO)]
    min_percentage: Percentage,
    #[arg(long, help = "Print the report as json")]
    json: bool,
}

/// Resolves the requested logical date. Without one, today according to the configured day
/// boundary is used.
pub fn resolve_date(
    context: &AppContext,
    date: Option<&str>,
    date_style: DateStyle,
    boundary_hour: u32,
) -> Result<NaiveDate> {
    match date {
        Some(value) => parse_date_arg(
            value,
            context.clock.time().with_timezone(&Local),
            date_style,
        ),
        None => Ok(context.clock.today(boundary_hour)),
    }
}

pub async fn process_day_command(
    context: &AppContext,
    DayCommand {
        date,
        date_style,
        min_percentage,
        json,
    }: DayCommand,
) -> Result<()> {
    let settings = context.settings.settings().await?;
    let date = resolve_date(
        context,
        date.as_deref(),
        date_style,
        settings.day_boundary_hour,
    )?;

    let report = day_report(&context.store, &context.settings, date).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, min_percentage);
    }
    Ok(())
}

fn print_report(report: &DayReport, min_percentage: Percentage) {
    println!(
        "{}\tactive {}\tfocus {}%\tkeys {}",
        report.logical_date,
        format_duration(report.active),
        *duration_percentage(report.focus, report.active) as i32,
        report.total_keys
    );

    if report.apps.is_empty() {
        println!("\nNo activity recorded");
    } else {
        println!("\nApps");
        for app in &report.apps {
            let share = duration_percentage(app.duration, report.active);
            if share < min_percentage {
                continue;
            }
            let switches = report
                .app_events
                .iter()
                .find(|v| v.app == app.app)
                .map_or(0, |v| v.events);
            println!(
                "  {}%\t{}\t{} switches\t{}",
                *share as i32,
                format_duration(app.duration),
                switches,
                app.app
            );
        }

        println!("\nCategories");
        for category in &report.categories {
            println!(
                "  {}%\t{}\t{}",
                *duration_percentage(category.duration, report.active) as i32,
                format_duration(category.duration),
                category.category
            );
        }
    }

    if !report.notes.is_empty() {
        println!("\nNotes");
        for note in &report.notes {
            println!(
                "  {}\t{}",
                note.timestamp.with_timezone(&Local).format("%H:%M"),
                note.content
            );
        }
    }

    if let Some(blog) = &report.blog {
        println!("\nBlog\n{blog}");
    }
}
