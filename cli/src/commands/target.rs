use anyhow::{Result, bail};
use std::process;

use slank_core::metrics::weight_loss_plan;
use slank_core::service::Tracker;

use super::helpers::parse_date;

pub(crate) fn cmd_target_show(tracker: &Tracker, person: &str, json: bool) -> Result<()> {
    let target = tracker.target(person)?;

    if json {
        println!("{}", serde_json::json!({ "target": target }));
        return Ok(());
    }

    match target {
        Some(deficit) => println!("Daily deficit target for {person}: {deficit:.0} kcal"),
        None => {
            eprintln!("No target set for '{person}'");
            process::exit(2);
        }
    }
    Ok(())
}

pub(crate) fn cmd_target_set(tracker: &Tracker, person: &str, deficit: f64, json: bool) -> Result<()> {
    tracker.set_target(person, deficit)?;

    if json {
        println!("{}", serde_json::json!({ "target": deficit }));
        return Ok(());
    }
    println!("Daily deficit target for {person} set to {deficit:.0} kcal");
    Ok(())
}

/// The weight-loss calculator: how fast to lose and what daily deficit that
/// needs. With `--save` the computed deficit becomes the person's target.
#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_target_plan(
    tracker: &Tracker,
    person: &str,
    desired: f64,
    target_date: &str,
    current: Option<f64>,
    start: Option<String>,
    save: bool,
    json: bool,
) -> Result<()> {
    let current = match current {
        Some(kg) => kg,
        None => match tracker.current_weight(person)? {
            Some(entry) => entry.weight,
            None => bail!("No weight entries for '{person}'. Pass --current or log a weight first"),
        },
    };
    let start = parse_date(start)?;
    let target_date = parse_date(Some(target_date.to_string()))?;

    let plan = weight_loss_plan(current, desired, start, target_date)?;

    if save {
        tracker.set_target(person, plan.deficit_per_day)?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let kg = plan.kg_to_lose;
    let days = plan.days;
    let weeks = plan.weeks;
    let per_week = plan.kg_per_week;
    let deficit = plan.deficit_per_day;
    println!("Plan for {person}: lose {kg:.1} kg in {days} days ({weeks} weeks)");
    println!("  Rate: {per_week:.2} kg/week");
    println!("  Required daily deficit: {deficit:.0} kcal");
    if save {
        println!("  Saved as daily target.");
    }
    Ok(())
}
