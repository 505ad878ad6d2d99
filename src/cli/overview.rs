use ansi_term::Colour;
use anyhow::Result;
use chrono::Local;
use clap::Parser;

use crate::{
    analysis::{
        report::{range_overview, OverviewDay},
        summary::{clamp_limit, DateRange, DEFAULT_LIMIT},
    },
    storage::event_store::EventStore,
};

use super::{
    parsing::{parse_date_arg, DateStyle, DATE_HELP},
    AppContext,
};

const HEATMAP_WIDTH: f64 = 30.;

#[derive(Debug, Parser)]
pub struct OverviewCommand {
    #[arg(long, short, help = DATE_HELP)]
    from: Option<String>,
    #[arg(long, short, help = DATE_HELP)]
    to: Option<String>,
    #[arg(long, short, default_value_t = DEFAULT_LIMIT as i64, allow_negative_numbers = true, help = "Number of days to show. Brought into 1..=365")]
    limit: i64,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(long, help = "Print the overview as json")]
    json: bool,
}

pub async fn process_overview_command(
    context: &AppContext,
    OverviewCommand {
        from,
        to,
        limit,
        date_style,
        json,
    }: OverviewCommand,
) -> Result<()> {
    let now = context.clock.time().with_timezone(&Local);
    let range = DateRange {
        from: from
            .map(|v| parse_date_arg(&v, now, date_style))
            .transpose()?,
        to: to.map(|v| parse_date_arg(&v, now, date_style)).transpose()?,
    };

    let overview = range_overview(&context.store, range, clamp_limit(limit)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&overview)?);
    } else if overview.is_empty() {
        println!("No activity recorded");
    } else {
        for day in &overview {
            print_day(day);
        }
    }
    Ok(())
}

/// Lists every logical date with data and the most recent window event.
pub async fn process_dates_command(context: &AppContext) -> Result<()> {
    let dates = context.store.available_dates().await?;
    for date in &dates {
        println!("{date}");
    }
    if let Some(last) = context.store.last_window_event().await? {
        println!(
            "\nLast event {} {}",
            last.timestamp.with_timezone(&Local).format("%x %H:%M:%S"),
            last.app_name
        );
    }
    Ok(())
}

fn print_day(day: &OverviewDay) {
    let cells = (day.intensity * HEATMAP_WIDTH).round() as usize;
    let bar = format!("{:<width$}", "█".repeat(cells), width = HEATMAP_WIDTH as usize);
    println!(
        "{}  {}  {:>7} keys  {:>3} apps",
        day.summary.logical_date,
        intensity_colour(day.intensity).paint(bar),
        day.summary.total_keys,
        day.summary.unique_apps
    );
}

fn intensity_colour(intensity: f64) -> Colour {
    match intensity {
        v if v >= 0.8 => Colour::Fixed(46),
        v if v >= 0.6 => Colour::Fixed(40),
        v if v >= 0.4 => Colour::Fixed(34),
        v if v >= 0.2 => Colour::Fixed(28),
        _ => Colour::Fixed(22),
    }
}
