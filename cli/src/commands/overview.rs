use anyhow::Result;

use slank_core::models::MEALS;
use slank_core::service::Tracker;

use super::helpers::{meal_bar, parse_date};

const BAR_WIDTH: usize = 40;

pub(crate) fn cmd_overview(
    tracker: &Tracker,
    person: &str,
    date: Option<String>,
    level: usize,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let overview = tracker.day_overview(person, date, level)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&overview)?);
        return Ok(());
    }

    println!("=== {person} — {date} ===\n");

    if overview.entries.is_empty() {
        println!("  No entries logged.\n");
    }
    for meal in MEALS {
        let entries: Vec<_> = overview.entries.iter().filter(|e| e.meal == meal).collect();
        if entries.is_empty() {
            continue;
        }
        let label = meal.as_str().to_uppercase();
        let subtotal = overview.totals.for_meal(meal);
        println!("  {label} ({subtotal:.0} kcal)");
        for e in entries {
            let name = &e.name;
            let quantity = e.quantity;
            let serving = &e.serving;
            let grams = e.grams;
            let cal = e.calories;
            println!("    {name} — {quantity} {serving} ({grams:.0} g) — {cal:.0} kcal");
        }
        println!();
    }

    let bar = meal_bar(&overview.totals, BAR_WIDTH);
    if !bar.is_empty() {
        println!("  [{bar}]");
    }
    let consumed = overview.consumed;
    println!("  Consumed: {consumed:.0} kcal");

    match (overview.expenditure, overview.remaining) {
        (Some(expenditure), Some(remaining)) => {
            println!("  Expenditure: {expenditure:.0} kcal (activity level {level})");
            if let Some(deficit) = overview.target_deficit {
                println!("  Target deficit: {deficit:.0} kcal");
            }
            println!("  Remaining: {remaining:.0} kcal");
        }
        _ => {
            eprintln!(
                "Note: no weight or personal info recorded for '{person}', energy budget unavailable"
            );
        }
    }

    Ok(())
}
