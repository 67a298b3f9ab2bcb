use anyhow::Result;

use slank_core::models::{LogEntry, parse_meal};
use slank_core::service::Tracker;

use super::helpers::parse_date;

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_log(
    tracker: &Tracker,
    person: &str,
    food: &str,
    quantity: f64,
    serving: &str,
    meal: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let entry = LogEntry {
        date: parse_date(date)?,
        meal: parse_meal(meal)?,
        name: food.to_string(),
        quantity,
        serving: serving.to_string(),
    };
    tracker.add_log_entry(person, &entry)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
        return Ok(());
    }

    let date = entry.date;
    let meal = entry.meal;
    println!("Logged {quantity} {serving} of {food} for {meal} on {date}");
    Ok(())
}
