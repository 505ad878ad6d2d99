use anyhow::Result;
use chrono::{Local, Utc};
use clap::Parser;

use crate::{
    storage::{
        entities::{DailyBlog, Note},
        event_store::EventStore,
        settings::SettingsProvider,
    },
    utils::time::logical_date,
};

use super::{
    day::resolve_date,
    parsing::{parse_moment_arg, DateStyle, DATE_HELP},
    AppContext,
};

#[derive(Debug, Parser)]
pub struct NoteCommand {
    #[arg(help = "Text of the note")]
    content: String,
    #[arg(long, help = "When the note was taken, for example \"today 14:30\". Defaults to now")]
    at: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

#[derive(Debug, Parser)]
pub struct BlogCommand {
    #[arg(long, short, help = DATE_HELP)]
    date: Option<String>,
    #[arg(long, help = "Replace the blog of the date with this text")]
    set: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

/// Saves a note at the given moment. Writing a note at an existing timestamp replaces it.
pub async fn process_note_command(
    context: &AppContext,
    NoteCommand {
        content,
        at,
        date_style,
    }: NoteCommand,
) -> Result<()> {
    let settings = context.settings.settings().await?;
    let moment = match at {
        Some(value) => parse_moment_arg(
            &value,
            context.clock.time().with_timezone(&Local),
            date_style,
        )?,
        None => context.clock.time().with_timezone(&Local),
    };

    let note = Note {
        timestamp: moment.with_timezone(&Utc),
        content,
        logical_date: logical_date(&moment, settings.day_boundary_hour),
    };
    let date = note.logical_date;
    context.store.upsert_note(note).await?;
    println!("Note saved for {date}");
    Ok(())
}

pub async fn process_blog_command(
    context: &AppContext,
    BlogCommand {
        date,
        set,
        date_style,
    }: BlogCommand,
) -> Result<()> {
    let settings = context.settings.settings().await?;
    let logical_date = resolve_date(
        context,
        date.as_deref(),
        date_style,
        settings.day_boundary_hour,
    )?;

    match set {
        Some(content) => {
            context
                .store
                .save_blog(DailyBlog {
                    logical_date,
                    content,
                })
                .await?;
            println!("Blog saved for {logical_date}");
        }
        None => match context.store.blog_for(logical_date).await? {
            Some(blog) => println!("{}", blog.content),
            None => println!("No blog for {logical_date}"),
        },
    }
    Ok(())
}
