use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use crate::{
    analysis::categories::{categorize, subject, CategoryRule, UNCATEGORIZED},
    storage::settings::{Settings, SettingsProvider},
};

use super::AppContext;

#[derive(Debug, Subcommand)]
pub enum RulesCommand {
    #[command(about = "List category rules in the order they are tried")]
    Show,
    #[command(about = "Add a rule. Patterns are regular expressions matched against \"app — title\"")]
    Add {
        pattern: String,
        category: String,
        #[arg(long, help = "1-based position of the new rule. Appended by default")]
        position: Option<usize>,
    },
    #[command(about = "Remove the rule at a 1-based position")]
    Remove { position: usize },
    #[command(about = "Remove every rule")]
    Clear,
    #[command(about = "Set the categories counted as focus time")]
    Focus { categories: Vec<String> },
    #[command(about = "Show which category an app and window title would get")]
    Test {
        app: String,
        #[arg(long)]
        title: Option<String>,
    },
}

#[derive(Debug, Parser)]
pub struct ConfigCommand {
    #[arg(long, help = "Hour (0-23) at which a new logical day starts")]
    day_boundary_hour: Option<u32>,
    #[arg(long, help = "Days of records kept by purge. 0 keeps everything")]
    retention_days: Option<u32>,
}

pub async fn process_rules_command(
    context: &AppContext,
    command: RulesCommand,
) -> Result<()> {
    match command {
        RulesCommand::Show => print_rules(&*context.settings.settings().await?),
        RulesCommand::Add {
            pattern,
            category,
            position,
        } => {
            let mut entity = context.settings.load_entity().await?;
            insert_rule(
                &mut entity.category_rules,
                CategoryRule::new(pattern, category),
                position,
            )?;
            print_rules(&*context.settings.save(entity).await?);
        }
        RulesCommand::Remove { position } => {
            let mut entity = context.settings.load_entity().await?;
            let removed = remove_rule(&mut entity.category_rules, position)?;
            context.settings.save(entity).await?;
            println!("Removed {} -> {}", removed.pattern, removed.category);
        }
        RulesCommand::Clear => {
            context
                .settings
                .update(|entity| entity.category_rules.clear())
                .await?;
            println!("All rules removed");
        }
        RulesCommand::Focus { categories } => {
            let settings = context
                .settings
                .update(|entity| entity.focus_categories = categories)
                .await?;
            println!("Focus categories: {}", settings.focus_categories.join(", "));
        }
        RulesCommand::Test { app, title } => {
            let settings = context.settings.settings().await?;
            let subject = subject(&app, title.as_deref());
            println!("{subject} -> {}", categorize(&subject, &settings.rules));
        }
    }
    Ok(())
}

pub async fn process_config_command(
    context: &AppContext,
    ConfigCommand {
        day_boundary_hour,
        retention_days,
    }: ConfigCommand,
) -> Result<()> {
    let settings = if day_boundary_hour.is_none() && retention_days.is_none() {
        context.settings.settings().await?
    } else {
        context
            .settings
            .update(|entity| {
                if let Some(hour) = day_boundary_hour {
                    entity.day_boundary_hour = hour;
                }
                if let Some(days) = retention_days {
                    entity.data_retention_days = days;
                }
            })
            .await?
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&settings.to_entity())?
    );
    Ok(())
}

fn print_rules(settings: &Settings) {
    if settings.rules.is_empty() {
        println!("No rules, everything is {UNCATEGORIZED}");
    }
    for (index, rule) in settings.rules.rules().iter().enumerate() {
        println!("{:>3}. {} -> {}", index + 1, rule.pattern, rule.category);
    }
    if !settings.focus_categories.is_empty() {
        println!("Focus: {}", settings.focus_categories.join(", "));
    }
}

fn insert_rule(
    rules: &mut Vec<CategoryRule>,
    rule: CategoryRule,
    position: Option<usize>,
) -> Result<()> {
    match position {
        None => rules.push(rule),
        Some(position) if (1..=rules.len() + 1).contains(&position) => {
            rules.insert(position - 1, rule)
        }
        Some(position) => bail!(
            "Position {position} is outside 1..={}",
            rules.len() + 1
        ),
    }
    Ok(())
}

fn remove_rule(rules: &mut Vec<CategoryRule>, position: usize) -> Result<CategoryRule> {
    if !(1..=rules.len()).contains(&position) {
        bail!("There is no rule at position {position}");
    }
    Ok(rules.remove(position - 1))
}

#[cfg(test)]
mod tests {
    use crate::analysis::categories::CategoryRule;

    use super::{insert_rule, remove_rule};

    fn rules() -> Vec<CategoryRule> {
        vec![CategoryRule::new("a", "A"), CategoryRule::new("b", "B")]
    }

    #[test]
    fn rules_are_inserted_at_position() {
        let mut list = rules();
        insert_rule(&mut list, CategoryRule::new("c", "C"), Some(1)).unwrap();
        insert_rule(&mut list, CategoryRule::new("d", "D"), None).unwrap();
        insert_rule(&mut list, CategoryRule::new("e", "E"), Some(5)).unwrap();
        let patterns = list.iter().map(|v| v.pattern.as_str()).collect::<Vec<_>>();
        assert_eq!(patterns, vec!["c", "a", "b", "d", "e"]);

        assert!(insert_rule(&mut list, CategoryRule::new("f", "F"), Some(0)).is_err());
        assert!(insert_rule(&mut list, CategoryRule::new("f", "F"), Some(7)).is_err());
    }

    #[test]
    fn rules_are_removed_by_position() {
        let mut list = rules();
        assert_eq!(remove_rule(&mut list, 2).unwrap().category, "B");
        assert!(remove_rule(&mut list, 0).is_err());
        assert!(remove_rule(&mut list, 2).is_err());
        assert_eq!(list, vec![CategoryRule::new("a", "A")]);
    }
}
